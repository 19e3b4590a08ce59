use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ReminderStore, StoreError, UserPreferences};
use crate::models::{
    DailyActivitySummary, FastMilestone, FastSession, MealType, PushSubscription, ReminderKind,
};
use crate::preferences::{NotificationCategory, NotificationPreferences};

/// PostgreSQL adapter for [`ReminderStore`].
#[derive(Clone)]
pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_preferences(
    user_id: Uuid,
    settings: serde_json::Value,
) -> Result<NotificationPreferences, StoreError> {
    serde_json::from_value(settings).map_err(|e| StoreError::InvalidPreferences {
        user_id,
        message: e.to_string(),
    })
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn find_active_fasts(&self) -> Result<Vec<FastSession>, StoreError> {
        let fasts = sqlx::query_as::<_, FastSession>(
            r#"
            SELECT id, user_id, start_time, end_time, goal_hours, is_completed,
                   notified_80_percent, notified_complete
            FROM fasts
            WHERE end_time IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(fasts)
    }

    async fn find_users_with_preference(
        &self,
        category: NotificationCategory,
    ) -> Result<Vec<UserPreferences>, StoreError> {
        let default_enabled = NotificationPreferences::default().is_enabled(category);
        let rows: Vec<(Uuid, serde_json::Value)> = sqlx::query_as(
            r#"
            SELECT user_id, settings
            FROM notification_preferences
            WHERE COALESCE((settings -> $1 ->> 'enabled')::boolean, $2)
            "#,
        )
        .bind(category.json_key())
        .bind(default_enabled)
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for (user_id, settings) in rows {
            match decode_preferences(user_id, settings) {
                Ok(preferences) if preferences.is_enabled(category) => {
                    users.push(UserPreferences { user_id, preferences });
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%user_id, "⚠️ Skipping user: {}", e),
            }
        }

        Ok(users)
    }

    async fn find_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<Option<NotificationPreferences>, StoreError> {
        let settings: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT settings FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        settings
            .map(|settings| decode_preferences(user_id, settings))
            .transpose()
    }

    async fn find_daily_activity(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyActivitySummary>, StoreError> {
        let summary = sqlx::query_as::<_, DailyActivitySummary>(
            r#"
            SELECT fast_completed, meals_logged, workout_completed, streak_maintained
            FROM daily_activity_summaries
            WHERE user_id = $1 AND date = $2
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn meal_logged(
        &self,
        user_id: Uuid,
        meal: MealType,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM meal_logs WHERE user_id = $1 AND meal_type = $2 AND date = $3)",
        )
        .bind(user_id)
        .bind(meal.as_str())
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn has_push_subscription(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM push_subscriptions WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, StoreError> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            "SELECT id, user_id, endpoint, p256dh, auth FROM push_subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn remove_push_subscription(&self, endpoint: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_fast_notified(
        &self,
        fast_id: Uuid,
        milestone: FastMilestone,
    ) -> Result<bool, StoreError> {
        let sql = match milestone {
            FastMilestone::EightyPercent => {
                "UPDATE fasts SET notified_80_percent = true WHERE id = $1 AND notified_80_percent = false"
            }
            FastMilestone::Complete => {
                "UPDATE fasts SET notified_complete = true WHERE id = $1 AND notified_complete = false"
            }
        };

        let result = sqlx::query(sql).bind(fast_id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_reminder(
        &self,
        user_id: Uuid,
        kind: ReminderKind,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO reminder_deliveries (user_id, kind, day)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(kind.as_key())
        .bind(date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
