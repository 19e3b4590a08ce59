//! Daily goal reminders, checked shortly before each hour boundary.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};

use super::{Evaluator, ReminderContext, ReminderError, RunReport, TickTime};
use crate::models::{DailyActivitySummary, GoalCategory, ReminderKind};
use crate::preferences::NotificationCategory;
use crate::push::PushPayload;
use crate::store::UserPreferences;

/// How the daily-goal evaluator words its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyGoalPolicy {
    /// A single reminder listing incomplete categories at the user's time.
    IncompleteList,
    /// As `IncompleteList`, plus an evening check-in for every enabled user
    /// during the run at `hour`: encouragement with 2 of 3 goals complete,
    /// a reminder with fewer.
    EveningSplit { hour: u32 },
}

impl FromStr for DailyGoalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "incomplete-list" => Ok(DailyGoalPolicy::IncompleteList),
            "evening-split" => Ok(DailyGoalPolicy::EveningSplit { hour: 20 }),
            other => Err(format!(
                "unknown daily goal policy {other:?} (expected incomplete-list or evening-split)"
            )),
        }
    }
}

pub struct DailyGoalEvaluator {
    ctx: ReminderContext,
    policy: DailyGoalPolicy,
}

impl DailyGoalEvaluator {
    pub fn new(ctx: ReminderContext, policy: DailyGoalPolicy) -> Self {
        Self { ctx, policy }
    }

    fn is_evening_check_in(&self, now: NaiveDateTime) -> bool {
        matches!(self.policy, DailyGoalPolicy::EveningSplit { hour } if hour == now.hour())
    }

    async fn check_user(&self, user: &UserPreferences, now: NaiveDateTime) -> Result<usize, ReminderError> {
        let evening = self.is_evening_check_in(now);
        let reminder_hour = user.preferences.daily_goal.time.hour();
        let due = evening || reminder_hour == now.hour() || reminder_hour == now.hour() + 1;
        if !due || !self.ctx.store.has_push_subscription(user.user_id).await? {
            return Ok(0);
        }

        let today = now.date();
        let summary = self
            .ctx
            .store
            .find_daily_activity(user.user_id, today)
            .await?
            .unwrap_or_default();

        let message = if evening {
            evening_message(&summary)
        } else {
            incomplete_message(&summary)
        };
        let Some((kind, payload)) = message else {
            return Ok(0);
        };

        if !self.ctx.store.claim_reminder(user.user_id, kind, today).await? {
            return Ok(0);
        }

        let payload = payload
            .with_tag(format!("{}-{}", kind.as_key(), today))
            .with_action_url("/");
        let delivery = self.ctx.notifier.notify_user(user.user_id, &payload).await?;
        tracing::info!(
            user_id = %user.user_id,
            kind = %kind.as_key(),
            delivered = delivery.delivered,
            "🎯 Daily goal reminder sent"
        );
        Ok(1)
    }
}

fn incomplete_message(summary: &DailyActivitySummary) -> Option<(ReminderKind, PushPayload)> {
    let missing = summary.incomplete();
    if missing.is_empty() {
        return None;
    }
    Some((
        ReminderKind::DailyGoal,
        PushPayload::new(
            "Daily goals check-in 🎯",
            format!("Still to do today: {}.", describe(&missing)),
        ),
    ))
}

fn evening_message(summary: &DailyActivitySummary) -> Option<(ReminderKind, PushPayload)> {
    let missing = summary.incomplete();
    let payload = match summary.completed_count() {
        3 => return None,
        2 => PushPayload::new(
            "Almost a perfect day! 💪",
            format!(
                "You've completed 2 of 3 goals today. Just {} to go!",
                describe(&missing)
            ),
        ),
        done => PushPayload::new(
            "Keep your streak alive",
            format!(
                "You've completed {done} of 3 goals today. Still to do: {}.",
                describe(&missing)
            ),
        ),
    };
    Some((ReminderKind::EveningCheckIn, payload))
}

/// "a", "a and b", "a, b and c".
fn describe(categories: &[GoalCategory]) -> String {
    let parts: Vec<&str> = categories.iter().map(|c| c.describe()).collect();
    match parts.split_last() {
        None => String::new(),
        Some((last, [])) => (*last).to_string(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

#[async_trait]
impl Evaluator for DailyGoalEvaluator {
    fn name(&self) -> &'static str {
        "daily-goal"
    }

    async fn evaluate(&self, now: TickTime) -> Result<RunReport, ReminderError> {
        let users = self
            .ctx
            .store
            .find_users_with_preference(NotificationCategory::DailyGoal)
            .await?;
        let mut report = RunReport::default();

        for user in &users {
            report.examined += 1;
            match self.check_user(user, now.local).await {
                Ok(sent) => report.sent += sent,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(user_id = %user.user_id, "❌ Daily goal check failed: {}", e);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{NotificationPreferences, ReminderTime};
    use crate::test_support::{tick, InMemoryStore, RecordingSender};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryStore>,
        sender: Arc<RecordingSender>,
        evaluator: DailyGoalEvaluator,
        user: Uuid,
    }

    fn harness(policy: DailyGoalPolicy, reminder_hour: u32) -> Harness {
        let store = Arc::new(InMemoryStore::default());
        let sender = Arc::new(RecordingSender::default());
        let user = Uuid::new_v4();
        let mut preferences = NotificationPreferences::default();
        preferences.daily_goal.enabled = true;
        preferences.daily_goal.time = ReminderTime::new(reminder_hour, 0).expect("valid time");
        store.set_preferences(user, preferences);
        store.subscribe(user);
        let evaluator =
            DailyGoalEvaluator::new(ReminderContext::new(store.clone(), sender.clone()), policy);
        Harness { store, sender, evaluator, user }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
    }

    #[tokio::test]
    async fn missing_summary_lists_every_category() {
        let h = harness(DailyGoalPolicy::IncompleteList, 20);

        h.evaluator.evaluate(tick("2025-03-10T19:55:00Z")).await.expect("run");

        let sent = h.sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1.body,
            "Still to do today: log your meals, complete a workout and finish your fast."
        );
    }

    #[tokio::test]
    async fn due_in_both_adjacent_runs_sends_once() {
        let h = harness(DailyGoalPolicy::IncompleteList, 20);

        h.evaluator.evaluate(tick("2025-03-10T19:55:00Z")).await.expect("run");
        h.evaluator.evaluate(tick("2025-03-10T20:55:00Z")).await.expect("run");

        assert_eq!(h.sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn nothing_is_sent_outside_the_reminder_hour() {
        let h = harness(DailyGoalPolicy::IncompleteList, 20);

        let report = h.evaluator.evaluate(tick("2025-03-10T17:55:00Z")).await.expect("run");

        assert_eq!(report.examined, 1);
        assert_eq!(report.sent, 0);
    }

    #[tokio::test]
    async fn all_goals_complete_sends_nothing() {
        let h = harness(DailyGoalPolicy::IncompleteList, 20);
        h.store.set_activity(
            h.user,
            day(),
            DailyActivitySummary {
                fast_completed: true,
                meals_logged: true,
                workout_completed: true,
                streak_maintained: true,
            },
        );

        h.evaluator.evaluate(tick("2025-03-10T19:55:00Z")).await.expect("run");

        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn evening_split_encourages_with_two_of_three_complete() {
        let h = harness(DailyGoalPolicy::EveningSplit { hour: 20 }, 9);
        h.store.set_activity(
            h.user,
            day(),
            DailyActivitySummary {
                fast_completed: true,
                meals_logged: true,
                workout_completed: false,
                streak_maintained: false,
            },
        );

        h.evaluator.evaluate(tick("2025-03-10T20:55:00Z")).await.expect("run");

        let sent = h.sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.title, "Almost a perfect day! 💪");
        assert_eq!(
            sent[0].1.body,
            "You've completed 2 of 3 goals today. Just complete a workout to go!"
        );
    }

    #[tokio::test]
    async fn evening_split_reminds_with_fewer_than_two_complete() {
        let h = harness(DailyGoalPolicy::EveningSplit { hour: 20 }, 9);
        h.store.set_activity(
            h.user,
            day(),
            DailyActivitySummary {
                fast_completed: true,
                ..DailyActivitySummary::default()
            },
        );

        h.evaluator.evaluate(tick("2025-03-10T20:55:00Z")).await.expect("run");

        let sent = h.sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.title, "Keep your streak alive");
    }

    #[tokio::test]
    async fn evening_split_is_silent_when_every_goal_is_done() {
        let h = harness(DailyGoalPolicy::EveningSplit { hour: 20 }, 9);
        h.store.set_activity(
            h.user,
            day(),
            DailyActivitySummary {
                fast_completed: true,
                meals_logged: true,
                workout_completed: true,
                streak_maintained: true,
            },
        );

        let report = h.evaluator.evaluate(tick("2025-03-10T20:55:00Z")).await.expect("run");

        assert_eq!(report.examined, 1);
        assert_eq!(report.sent, 0);
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn users_without_subscriptions_get_nothing() {
        let store = Arc::new(InMemoryStore::default());
        let sender = Arc::new(RecordingSender::default());
        let mut preferences = NotificationPreferences::default();
        preferences.daily_goal.enabled = true;
        store.set_preferences(Uuid::new_v4(), preferences);
        let evaluator = DailyGoalEvaluator::new(
            ReminderContext::new(store.clone(), sender.clone()),
            DailyGoalPolicy::EveningSplit { hour: 20 },
        );

        evaluator.evaluate(tick("2025-03-10T20:55:00Z")).await.expect("run");

        assert!(sender.sent().is_empty());
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("incomplete-list".parse::<DailyGoalPolicy>(), Ok(DailyGoalPolicy::IncompleteList));
        assert_eq!("evening-split".parse::<DailyGoalPolicy>(), Ok(DailyGoalPolicy::EveningSplit { hour: 20 }));
        assert!("sometimes".parse::<DailyGoalPolicy>().is_err());
    }
}
