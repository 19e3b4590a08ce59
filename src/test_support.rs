//! In-memory doubles for exercising evaluators without PostgreSQL or a push
//! service.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::models::{
    DailyActivitySummary, FastMilestone, FastSession, MealType, PushSubscription, ReminderKind,
};
use crate::preferences::{NotificationCategory, NotificationPreferences};
use crate::push::{DeliveryOutcome, PushError, PushPayload, PushSender};
use crate::scheduler::TickTime;
use crate::store::{ReminderStore, StoreError, UserPreferences};

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// Tick whose local wall-clock time equals its UTC time.
pub fn tick(s: &str) -> TickTime {
    let utc = utc(s);
    TickTime {
        utc,
        local: utc.naive_utc(),
    }
}

pub struct FixtureClock {
    now: DateTime<Utc>,
}

impl FixtureClock {
    pub fn at(s: &str) -> Self {
        Self { now: utc(s) }
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now
    }
}

#[derive(Default)]
struct State {
    fasts: Vec<FastSession>,
    preferences: HashMap<Uuid, NotificationPreferences>,
    activity: HashMap<(Uuid, NaiveDate), DailyActivitySummary>,
    meals: HashSet<(Uuid, MealType, NaiveDate)>,
    subscriptions: Vec<PushSubscription>,
    claims: HashSet<(Uuid, ReminderKind, NaiveDate)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("store mutex")
    }

    /// Add an active fast that started `elapsed` before `now`.
    pub fn start_fast(&self, user_id: Uuid, goal_hours: f64, now: DateTime<Utc>, elapsed: Duration) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().expect("store mutex").fasts.push(FastSession {
            id,
            user_id,
            start_time: now - elapsed,
            end_time: None,
            goal_hours,
            is_completed: false,
            notified_80_percent: false,
            notified_complete: false,
        });
        id
    }

    pub fn fast(&self, id: Uuid) -> FastSession {
        self.state
            .lock()
            .expect("store mutex")
            .fasts
            .iter()
            .find(|fast| fast.id == id)
            .cloned()
            .expect("fast exists")
    }

    pub fn set_preferences(&self, user_id: Uuid, preferences: NotificationPreferences) {
        self.state
            .lock()
            .expect("store mutex")
            .preferences
            .insert(user_id, preferences);
    }

    pub fn set_activity(&self, user_id: Uuid, date: NaiveDate, summary: DailyActivitySummary) {
        self.state
            .lock()
            .expect("store mutex")
            .activity
            .insert((user_id, date), summary);
    }

    pub fn log_meal(&self, user_id: Uuid, meal: MealType, date: NaiveDate) {
        self.state
            .lock()
            .expect("store mutex")
            .meals
            .insert((user_id, meal, date));
    }

    pub fn subscribe(&self, user_id: Uuid) {
        let id = Uuid::new_v4();
        self.state
            .lock()
            .expect("store mutex")
            .subscriptions
            .push(PushSubscription {
                id,
                user_id,
                endpoint: format!("https://push.example/{id}"),
                p256dh: "p256dh".into(),
                auth: "auth".into(),
            });
    }
}

#[async_trait]
impl ReminderStore for InMemoryStore {
    async fn find_active_fasts(&self) -> Result<Vec<FastSession>, StoreError> {
        Ok(self
            .state()
            .fasts
            .iter()
            .filter(|fast| fast.end_time.is_none())
            .cloned()
            .collect())
    }

    async fn find_users_with_preference(
        &self,
        category: NotificationCategory,
    ) -> Result<Vec<UserPreferences>, StoreError> {
        Ok(self
            .state()
            .preferences
            .iter()
            .filter(|(_, preferences)| preferences.is_enabled(category))
            .map(|(user_id, preferences)| UserPreferences {
                user_id: *user_id,
                preferences: preferences.clone(),
            })
            .collect())
    }

    async fn find_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<Option<NotificationPreferences>, StoreError> {
        Ok(self.state().preferences.get(&user_id).cloned())
    }

    async fn find_daily_activity(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyActivitySummary>, StoreError> {
        Ok(self.state().activity.get(&(user_id, date)).cloned())
    }

    async fn meal_logged(
        &self,
        user_id: Uuid,
        meal: MealType,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        Ok(self.state().meals.contains(&(user_id, meal, date)))
    }

    async fn has_push_subscription(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .subscriptions
            .iter()
            .any(|sub| sub.user_id == user_id))
    }

    async fn push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(self
            .state()
            .subscriptions
            .iter()
            .filter(|sub| sub.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn remove_push_subscription(&self, endpoint: &str) -> Result<(), StoreError> {
        self.state().subscriptions.retain(|sub| sub.endpoint != endpoint);
        Ok(())
    }

    async fn mark_fast_notified(
        &self,
        fast_id: Uuid,
        milestone: FastMilestone,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        let Some(fast) = state.fasts.iter_mut().find(|fast| fast.id == fast_id) else {
            return Ok(false);
        };
        let flag = match milestone {
            FastMilestone::EightyPercent => &mut fast.notified_80_percent,
            FastMilestone::Complete => &mut fast.notified_complete,
        };
        if *flag {
            return Ok(false);
        }
        *flag = true;
        Ok(true)
    }

    async fn claim_reminder(
        &self,
        user_id: Uuid,
        kind: ReminderKind,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        Ok(self.state().claims.insert((user_id, kind, date)))
    }
}

/// Records every payload handed to it, keyed by the subscription's user.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(Uuid, PushPayload)>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(Uuid, PushPayload)> {
        self.sent.lock().expect("sender mutex").clone()
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<DeliveryOutcome, PushError> {
        self.sent
            .lock()
            .expect("sender mutex")
            .push((subscription.user_id, payload.clone()));
        Ok(DeliveryOutcome::Delivered)
    }
}
