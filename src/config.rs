use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::push::VapidConfig;
use crate::scheduler::{DailyGoalPolicy, SchedulerSettings};

pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// `None` disables push delivery and the reminder scheduler.
    pub vapid: Option<VapidConfig>,
    pub scheduler: SchedulerSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            database_url,
            port: try_load(&lookup, "PORT", 3050)?,
            vapid: load_vapid(&lookup),
            scheduler: load_scheduler(&lookup)?,
        })
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn load_vapid(lookup: &impl Fn(&str) -> Option<String>) -> Option<VapidConfig> {
    let keys = ["VAPID_PUBLIC_KEY", "VAPID_PRIVATE_KEY", "VAPID_SUBJECT"];
    let values: Vec<Option<String>> = keys
        .iter()
        .map(|key| lookup(*key).filter(|value| !value.trim().is_empty()))
        .collect();

    match values.as_slice() {
        [Some(public_key), Some(private_key), Some(subject)] => Some(VapidConfig {
            public_key: public_key.clone(),
            private_key: private_key.clone(),
            subject: subject.clone(),
        }),
        _ => {
            let missing: Vec<&str> = keys
                .iter()
                .zip(&values)
                .filter(|(_, value)| value.is_none())
                .map(|(key, _)| *key)
                .collect();
            info!("Push notifications disabled, missing {}", missing.join(", "));
            None
        }
    }
}

fn load_scheduler(lookup: &impl Fn(&str) -> Option<String>) -> Result<SchedulerSettings> {
    let defaults = SchedulerSettings::default();

    let fasting_secs: u64 = try_load(lookup, "FASTING_CHECK_SECS", defaults.fasting_every.as_secs())?;
    let meal_secs: u64 = try_load(lookup, "MEAL_CHECK_SECS", defaults.meals_every.as_secs())?;
    let daily_goal_minute: u32 = try_load(lookup, "DAILY_GOAL_MINUTE", defaults.daily_goal_minute)?;
    let policy_name: String = try_load(lookup, "DAILY_GOAL_POLICY", "incomplete-list".to_string())?;
    let evening_hour: u32 = try_load(lookup, "EVENING_CHECK_IN_HOUR", 20)?;

    if fasting_secs == 0 || meal_secs == 0 {
        bail!("FASTING_CHECK_SECS and MEAL_CHECK_SECS must be greater than zero");
    }
    if daily_goal_minute > 59 {
        bail!("DAILY_GOAL_MINUTE must be between 0 and 59, got {daily_goal_minute}");
    }
    if evening_hour > 23 {
        bail!("EVENING_CHECK_IN_HOUR must be between 0 and 23, got {evening_hour}");
    }

    let daily_goal_policy = match policy_name.parse::<DailyGoalPolicy>().map_err(|e| anyhow!(e))? {
        DailyGoalPolicy::EveningSplit { .. } => DailyGoalPolicy::EveningSplit { hour: evening_hour },
        policy => policy,
    };

    Ok(SchedulerSettings {
        fasting_every: Duration::from_secs(fasting_secs),
        meals_every: Duration::from_secs(meal_secs),
        daily_goal_minute,
        daily_goal_policy,
    })
}
