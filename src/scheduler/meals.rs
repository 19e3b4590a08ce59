use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};

use super::{Evaluator, ReminderContext, ReminderError, RunReport, TickTime};
use crate::models::{MealType, ReminderKind};
use crate::preferences::{MealReminders, NotificationCategory};
use crate::push::PushPayload;
use crate::store::UserPreferences;

/// Minutes either side of a configured meal time in which a reminder may go out.
const WINDOW_MINUTES: u32 = 5;

pub struct MealReminderEvaluator {
    ctx: ReminderContext,
}

impl MealReminderEvaluator {
    pub fn new(ctx: ReminderContext) -> Self {
        Self { ctx }
    }

    async fn check_user(&self, user: &UserPreferences, now: NaiveDateTime) -> Result<usize, ReminderError> {
        let due = due_meals(&user.preferences.meals, now);
        if due.is_empty() || !self.ctx.store.has_push_subscription(user.user_id).await? {
            return Ok(0);
        }

        let today = now.date();
        let mut sent = 0;
        for meal in due {
            if self.ctx.store.meal_logged(user.user_id, meal, today).await? {
                continue;
            }
            if !self
                .ctx
                .store
                .claim_reminder(user.user_id, ReminderKind::Meal(meal), today)
                .await?
            {
                continue;
            }

            let payload = PushPayload::new(
                format!("Time for {}", meal.as_str()),
                format!("Don't forget to log your {}.", meal.as_str()),
            )
            .with_tag(format!("meal-{}-{}", meal.as_str(), today))
            .with_action_url("/meals");
            let delivery = self.ctx.notifier.notify_user(user.user_id, &payload).await?;
            tracing::info!(
                user_id = %user.user_id,
                meal = meal.as_str(),
                delivered = delivery.delivered,
                "🍽️ Meal reminder sent"
            );
            sent += 1;
        }

        Ok(sent)
    }
}

/// Meals whose reminder time lies within the window around `now`. The window
/// does not wrap across midnight.
fn due_meals(reminders: &MealReminders, now: NaiveDateTime) -> Vec<MealType> {
    let minute_of_day = now.hour() * 60 + now.minute();
    MealType::REMINDABLE
        .into_iter()
        .filter(|meal| {
            reminders
                .time_for(*meal)
                .is_some_and(|time| time.minute_of_day().abs_diff(minute_of_day) <= WINDOW_MINUTES)
        })
        .collect()
}

#[async_trait]
impl Evaluator for MealReminderEvaluator {
    fn name(&self) -> &'static str {
        "meals"
    }

    async fn evaluate(&self, now: TickTime) -> Result<RunReport, ReminderError> {
        let users = self
            .ctx
            .store
            .find_users_with_preference(NotificationCategory::MealReminders)
            .await?;
        let mut report = RunReport::default();

        for user in &users {
            report.examined += 1;
            match self.check_user(user, now.local).await {
                Ok(sent) => report.sent += sent,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(user_id = %user.user_id, "❌ Meal reminder check failed: {}", e);
                }
            }
        }

        Ok(report)
    }
}
