//! Reminder scheduler.
//!
//! One [`ReminderScheduler`] owns a timer loop per evaluator. Each tick
//! spawns the evaluator run as its own task so a slow, failing or panicking
//! run never holds up the loop. Runs of the same evaluator may overlap; the
//! persisted guards keep that from producing duplicate notifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use mockable::Clock;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::push::{Notifier, PushError, PushSender};
use crate::store::{ReminderStore, StoreError};

mod daily_goal;
mod fasting;
mod format;
mod meals;
mod ticker;

pub use daily_goal::{DailyGoalEvaluator, DailyGoalPolicy};
pub use fasting::FastingEvaluator;
pub use format::format_remaining;
pub use meals::MealReminderEvaluator;

use ticker::Ticker;

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Push(#[from] PushError),
}

/// The instant a run was triggered, as UTC and as local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    pub utc: DateTime<Utc>,
    pub local: NaiveDateTime,
}

impl TickTime {
    pub fn capture(clock: &dyn Clock) -> Self {
        Self {
            utc: clock.utc(),
            local: clock.local().naive_local(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub examined: usize,
    pub sent: usize,
    pub failed: usize,
}

/// One category-specific scan-and-notify routine.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Scan once. Per-record failures are logged and counted in the report;
    /// only a failure to list the candidates fails the run.
    async fn evaluate(&self, now: TickTime) -> Result<RunReport, ReminderError>;
}

/// Collaborators shared by every evaluator.
#[derive(Clone)]
pub struct ReminderContext {
    pub store: Arc<dyn ReminderStore>,
    pub notifier: Notifier,
}

impl ReminderContext {
    pub fn new(store: Arc<dyn ReminderStore>, sender: Arc<dyn PushSender>) -> Self {
        let notifier = Notifier::new(Arc::clone(&store), sender);
        Self { store, notifier }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Every(Duration),
    /// Once per hour at the given minute of local wall-clock time.
    HourlyAt { minute: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub fasting_every: Duration,
    pub meals_every: Duration,
    pub daily_goal_minute: u32,
    pub daily_goal_policy: DailyGoalPolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            fasting_every: Duration::from_secs(60),
            meals_every: Duration::from_secs(5 * 60),
            daily_goal_minute: 55,
            daily_goal_policy: DailyGoalPolicy::IncompleteList,
        }
    }
}

struct ScheduledEvaluator {
    cadence: Cadence,
    evaluator: Arc<dyn Evaluator>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

pub struct ReminderScheduler {
    jobs: Vec<Arc<ScheduledEvaluator>>,
    clock: Arc<dyn Clock>,
    running: Option<Running>,
}

impl ReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Vec::new(),
            clock,
            running: None,
        }
    }

    pub fn with_evaluator(mut self, cadence: Cadence, evaluator: Arc<dyn Evaluator>) -> Self {
        self.jobs.push(Arc::new(ScheduledEvaluator { cadence, evaluator }));
        self
    }

    /// The fasting, meal and daily-goal evaluators on their configured cadences.
    pub fn with_default_evaluators(
        settings: &SchedulerSettings,
        context: ReminderContext,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(clock)
            .with_evaluator(
                Cadence::Every(settings.fasting_every),
                Arc::new(FastingEvaluator::new(context.clone())),
            )
            .with_evaluator(
                Cadence::Every(settings.meals_every),
                Arc::new(MealReminderEvaluator::new(context.clone())),
            )
            .with_evaluator(
                Cadence::HourlyAt {
                    minute: settings.daily_goal_minute,
                },
                Arc::new(DailyGoalEvaluator::new(context, settings.daily_goal_policy)),
            )
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            tracing::warn!("⚠️ Reminder scheduler already running");
            return;
        }

        let (shutdown, _) = watch::channel(false);
        let loops = self
            .jobs
            .iter()
            .map(|job| {
                tokio::spawn(drive(
                    Arc::clone(job),
                    Arc::clone(&self.clock),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        tracing::info!(evaluators = self.jobs.len(), "⏰ Reminder scheduler started");
        self.running = Some(Running { shutdown, loops });
    }

    /// Cancel every timer and wait for in-flight runs to finish.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        for handle in running.loops {
            if let Err(e) = handle.await {
                tracing::error!("❌ Scheduler loop ended abnormally: {}", e);
            }
        }
        tracing::info!("🛑 Reminder scheduler stopped");
    }
}

/// Build and start the scheduler, or return `None` when no push sender is
/// configured.
pub fn start_if_configured(
    settings: &SchedulerSettings,
    store: Arc<dyn ReminderStore>,
    sender: Option<Arc<dyn PushSender>>,
    clock: Arc<dyn Clock>,
) -> Option<ReminderScheduler> {
    let Some(sender) = sender else {
        tracing::info!("ℹ️ Push credentials not configured, reminder scheduler disabled");
        return None;
    };

    let context = ReminderContext::new(store, sender);
    let mut scheduler = ReminderScheduler::with_default_evaluators(settings, context, clock);
    scheduler.start();
    Some(scheduler)
}

async fn drive(
    job: Arc<ScheduledEvaluator>,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = job.evaluator.name();
    let mut ticker = Ticker::new(job.cadence);
    let mut runs = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            Some(joined) = runs.join_next(), if !runs.is_empty() => log_join(name, joined),
            _ = ticker.tick(clock.as_ref()) => {
                let now = TickTime::capture(clock.as_ref());
                runs.spawn(run_once(Arc::clone(&job.evaluator), now));
            }
        }
    }

    while let Some(joined) = runs.join_next().await {
        log_join(name, joined);
    }
}

async fn run_once(evaluator: Arc<dyn Evaluator>, now: TickTime) {
    let name = evaluator.name();
    match evaluator.evaluate(now).await {
        Ok(report) => tracing::debug!(
            evaluator = name,
            examined = report.examined,
            sent = report.sent,
            failed = report.failed,
            "Reminder run finished"
        ),
        Err(e) => tracing::error!(evaluator = name, "❌ Reminder run failed: {}", e),
    }
}

fn log_join(name: &str, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(evaluator = name, "💥 Reminder run panicked");
        } else {
            tracing::warn!(evaluator = name, "⚠️ Reminder run cancelled: {}", e);
        }
    }
}
