//! Typed per-user notification preferences.
//!
//! Stored as one JSONB document per user. Decoding validates clock times, so
//! evaluators only ever see well-formed values.

use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A wall-clock reminder time, serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReminderTime(NaiveTime);

impl ReminderTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    pub fn minute_of_day(self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

impl TryFrom<String> for ReminderTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| format!("invalid reminder time {value:?} (expected HH:MM)"))
    }
}

impl From<ReminderTime> for String {
    fn from(value: ReminderTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FastingAlerts {
    pub enabled: bool,
}

impl Default for FastingAlerts {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MealReminders {
    pub enabled: bool,
    pub breakfast: Option<ReminderTime>,
    pub lunch: Option<ReminderTime>,
    pub dinner: Option<ReminderTime>,
}

impl MealReminders {
    pub fn time_for(&self, meal: crate::models::MealType) -> Option<ReminderTime> {
        use crate::models::MealType;
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
            MealType::Snack => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct DailyGoalReminder {
    pub enabled: bool,
    pub time: ReminderTime,
}

impl Default for DailyGoalReminder {
    fn default() -> Self {
        Self {
            enabled: false,
            time: ReminderTime::new(20, 0).unwrap_or(ReminderTime(NaiveTime::MIN)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationPreferences {
    pub fasting: FastingAlerts,
    pub meals: MealReminders,
    pub daily_goal: DailyGoalReminder,
}

/// Notification category used to select users from the store. Fasting
/// alerts are checked per fast through `find_preferences`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    MealReminders,
    DailyGoal,
}

impl NotificationCategory {
    /// JSON key of the category inside the stored document.
    pub fn json_key(self) -> &'static str {
        match self {
            NotificationCategory::MealReminders => "meals",
            NotificationCategory::DailyGoal => "dailyGoal",
        }
    }
}

impl NotificationPreferences {
    pub fn is_enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::MealReminders => self.meals.enabled,
            NotificationCategory::DailyGoal => self.daily_goal.enabled,
        }
    }
}
