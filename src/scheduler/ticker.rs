use std::pin::Pin;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Timelike};
use mockable::Clock;
use tokio::time::{Interval, MissedTickBehavior, Sleep};

use super::Cadence;

/// Produces the ticks for one [`Cadence`].
///
/// `tick` is cancel-safe: a pending hourly sleep survives being dropped from
/// a `select!` and is resumed on the next call.
pub(super) enum Ticker {
    Every(Interval),
    Hourly(HourlyTicker),
}

impl Ticker {
    pub(super) fn new(cadence: Cadence) -> Self {
        match cadence {
            Cadence::Every(period) => {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticker::Every(interval)
            }
            Cadence::HourlyAt { minute } => Ticker::Hourly(HourlyTicker {
                minute,
                last: None,
                pending: None,
            }),
        }
    }

    pub(super) async fn tick(&mut self, clock: &dyn Clock) {
        match self {
            Ticker::Every(interval) => {
                interval.tick().await;
            }
            Ticker::Hourly(hourly) => hourly.tick(clock).await,
        }
    }
}

pub(super) struct HourlyTicker {
    minute: u32,
    last: Option<NaiveDateTime>,
    pending: Option<(NaiveDateTime, Pin<Box<Sleep>>)>,
}

impl HourlyTicker {
    async fn tick(&mut self, clock: &dyn Clock) {
        if self.pending.is_none() {
            let now = clock.local().naive_local();
            let target = next_hourly_target(now, self.minute, self.last);
            let delay = (target - now).to_std().unwrap_or_default();
            self.pending = Some((target, Box::pin(tokio::time::sleep(delay))));
        }

        if let Some((target, sleep)) = self.pending.as_mut() {
            sleep.as_mut().await;
            self.last = Some(*target);
        }
        self.pending = None;
    }
}

/// First `hh:minute:00` at or after `now` that is strictly later than `last`.
pub(super) fn next_hourly_target(
    now: NaiveDateTime,
    minute: u32,
    last: Option<NaiveDateTime>,
) -> NaiveDateTime {
    let hour_start = now
        - ChronoDuration::minutes(i64::from(now.minute()))
        - ChronoDuration::seconds(i64::from(now.second()))
        - ChronoDuration::nanoseconds(i64::from(now.nanosecond()));
    let mut target = hour_start + ChronoDuration::minutes(i64::from(minute % 60));
    if target < now {
        target += ChronoDuration::hours(1);
    }
    if let Some(last) = last {
        while target <= last {
            target += ChronoDuration::hours(1);
        }
    }
    target
}
