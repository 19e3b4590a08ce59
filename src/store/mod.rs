//! Data store port consumed by the reminder scheduler.
//!
//! The scheduler never creates or deletes domain rows. Its only writes are
//! guard claims, which are compare-and-set so overlapping runs cannot both
//! win the same notification.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    DailyActivitySummary, FastMilestone, FastSession, MealType, PushSubscription, ReminderKind,
};
use crate::preferences::{NotificationCategory, NotificationPreferences};

mod postgres;

pub use postgres::PgReminderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("stored preferences for user {user_id} are invalid: {message}")]
    InvalidPreferences { user_id: Uuid, message: String },
}

/// A user together with their decoded notification preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub preferences: NotificationPreferences,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// All fasts without an end time.
    async fn find_active_fasts(&self) -> Result<Vec<FastSession>, StoreError>;

    /// Users whose stored preferences enable `category`.
    ///
    /// Rows that fail to decode are logged and skipped.
    async fn find_users_with_preference(
        &self,
        category: NotificationCategory,
    ) -> Result<Vec<UserPreferences>, StoreError>;

    /// Preferences for one user, `None` when nothing has been saved yet.
    async fn find_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<Option<NotificationPreferences>, StoreError>;

    async fn find_daily_activity(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyActivitySummary>, StoreError>;

    async fn meal_logged(
        &self,
        user_id: Uuid,
        meal: MealType,
        date: NaiveDate,
    ) -> Result<bool, StoreError>;

    async fn has_push_subscription(&self, user_id: Uuid) -> Result<bool, StoreError>;

    async fn push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, StoreError>;

    async fn remove_push_subscription(&self, endpoint: &str) -> Result<(), StoreError>;

    /// Flip the guard for `milestone` on a fast. Returns `true` only for the
    /// caller that changed it from false to true.
    async fn mark_fast_notified(
        &self,
        fast_id: Uuid,
        milestone: FastMilestone,
    ) -> Result<bool, StoreError>;

    /// Record that `kind` was sent to a user on `date`. Returns `false` when
    /// it had already been recorded.
    async fn claim_reminder(
        &self,
        user_id: Uuid,
        kind: ReminderKind,
        date: NaiveDate,
    ) -> Result<bool, StoreError>;
}
