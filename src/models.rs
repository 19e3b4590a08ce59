use serde::{ Serialize, Deserialize };
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FastSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub goal_hours: f64,
    pub is_completed: bool,
    pub notified_80_percent: bool,
    pub notified_complete: bool,
}

impl FastSession {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Percentage of the goal elapsed at `now`, or `None` for a non-positive goal.
    pub fn progress_pct(&self, now: DateTime<Utc>) -> Option<f64> {
        if self.goal_hours.is_nan() || self.goal_hours <= 0.0 {
            return None;
        }
        let elapsed_secs = (now - self.start_time).num_milliseconds() as f64 / 1000.0;
        Some(elapsed_secs * 100.0 / (self.goal_hours * 3600.0))
    }

    /// Hours left until the goal, never negative.
    pub fn remaining_hours(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_hours = (now - self.start_time).num_milliseconds() as f64 / 3_600_000.0;
        (self.goal_hours - elapsed_hours).max(0.0)
    }
}

/// The two one-shot notifications a fast can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FastMilestone {
    EightyPercent,
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyActivitySummary {
    pub fast_completed: bool,
    pub meals_logged: bool,
    pub workout_completed: bool,
    pub streak_maintained: bool,
}

/// A daily goal category tracked by [`DailyActivitySummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalCategory {
    Meals,
    Workout,
    Fast,
}

impl GoalCategory {
    pub fn describe(self) -> &'static str {
        match self {
            GoalCategory::Meals => "log your meals",
            GoalCategory::Workout => "complete a workout",
            GoalCategory::Fast => "finish your fast",
        }
    }
}

impl DailyActivitySummary {
    pub fn incomplete(&self) -> Vec<GoalCategory> {
        let mut missing = Vec::new();
        if !self.meals_logged {
            missing.push(GoalCategory::Meals);
        }
        if !self.workout_completed {
            missing.push(GoalCategory::Workout);
        }
        if !self.fast_completed {
            missing.push(GoalCategory::Fast);
        }
        missing
    }

    pub fn completed_count(&self) -> usize {
        3 - self.incomplete().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    /// Meals that can carry a reminder time.
    pub const REMINDABLE: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// Reminders guarded by a per-day delivery record rather than a row flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Meal(MealType),
    DailyGoal,
    EveningCheckIn,
}

impl ReminderKind {
    pub fn as_key(self) -> String {
        match self {
            ReminderKind::Meal(meal) => format!("meal:{}", meal.as_str()),
            ReminderKind::DailyGoal => "daily-goal".into(),
            ReminderKind::EveningCheckIn => "evening-check-in".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveFastSummary {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub goal_hours: f64,
    pub progress_pct: f64,
    pub remaining: String,
}
