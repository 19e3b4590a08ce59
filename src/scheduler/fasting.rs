//! Fasting progress alerts: one at 80% of the goal, one when it is reached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{format_remaining, Evaluator, ReminderContext, ReminderError, RunReport, TickTime};
use crate::models::{FastMilestone, FastSession};
use crate::push::PushPayload;

/// Progress window for the 80% alert. The upper bound stops a late first
/// check from sending a stale "80%" message.
const EIGHTY_PERCENT_WINDOW: std::ops::Range<f64> = 80.0..85.0;

pub struct FastingEvaluator {
    ctx: ReminderContext,
}

impl FastingEvaluator {
    pub fn new(ctx: ReminderContext) -> Self {
        Self { ctx }
    }

    async fn check_fast(&self, fast: &FastSession, now: DateTime<Utc>) -> Result<usize, ReminderError> {
        let Some(progress) = fast.progress_pct(now) else {
            tracing::warn!(fast_id = %fast.id, goal_hours = fast.goal_hours, "⚠️ Skipping fast with invalid goal");
            return Ok(0);
        };

        let Some(milestone) = due_milestone(fast, progress) else {
            return Ok(0);
        };

        if !self.user_accepts_alerts(fast.user_id).await? {
            return Ok(0);
        }

        if !self.ctx.store.mark_fast_notified(fast.id, milestone).await? {
            tracing::debug!(fast_id = %fast.id, ?milestone, "Milestone already claimed");
            return Ok(0);
        }

        let payload = milestone_payload(fast, milestone, now);
        let delivery = self.ctx.notifier.notify_user(fast.user_id, &payload).await?;
        tracing::info!(
            fast_id = %fast.id,
            user_id = %fast.user_id,
            ?milestone,
            delivered = delivery.delivered,
            expired = delivery.expired,
            "🔔 Fasting alert sent"
        );
        Ok(1)
    }

    async fn user_accepts_alerts(&self, user_id: Uuid) -> Result<bool, ReminderError> {
        let preferences = self
            .ctx
            .store
            .find_preferences(user_id)
            .await?
            .unwrap_or_default();
        if !preferences.fasting.enabled {
            return Ok(false);
        }
        Ok(self.ctx.store.has_push_subscription(user_id).await?)
    }
}

fn due_milestone(fast: &FastSession, progress: f64) -> Option<FastMilestone> {
    if progress >= 100.0 && !fast.notified_complete {
        Some(FastMilestone::Complete)
    } else if EIGHTY_PERCENT_WINDOW.contains(&progress) && !fast.notified_80_percent {
        Some(FastMilestone::EightyPercent)
    } else {
        None
    }
}

fn milestone_payload(fast: &FastSession, milestone: FastMilestone, now: DateTime<Utc>) -> PushPayload {
    match milestone {
        FastMilestone::EightyPercent => PushPayload::new(
            "Almost there! 🔥",
            format!(
                "You're 80% through your {}h fast. Only {} to go!",
                fast.goal_hours,
                format_remaining(fast.remaining_hours(now))
            ),
        )
        .with_tag(format!("fast-80-{}", fast.id)),
        FastMilestone::Complete => PushPayload::new(
            "Fasting goal reached 🎉",
            format!("You've completed your {}h fast. Great work!", fast.goal_hours),
        )
        .with_tag(format!("fast-complete-{}", fast.id)),
    }
    .with_action_url("/fasting")
}

#[async_trait]
impl Evaluator for FastingEvaluator {
    fn name(&self) -> &'static str {
        "fasting"
    }

    async fn evaluate(&self, now: TickTime) -> Result<RunReport, ReminderError> {
        let fasts = self.ctx.store.find_active_fasts().await?;
        let mut report = RunReport::default();

        for fast in fasts.iter().filter(|fast| fast.is_active()) {
            report.examined += 1;
            match self.check_fast(fast, now.utc).await {
                Ok(sent) => report.sent += sent,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        fast_id = %fast.id,
                        user_id = %fast.user_id,
                        "❌ Fasting check failed: {}",
                        e
                    );
                }
            }
        }

        Ok(report)
    }
}
