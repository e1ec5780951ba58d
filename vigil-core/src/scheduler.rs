//! Time-driven triggers for the check cycles and the daily report.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::monitor::Monitor;
use crate::report::Reporter;

/// Next instant strictly after `now` at which the wall clock in `offset`
/// reads `at`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local_now = now.with_timezone(&offset).naive_local();
    let mut candidate = local_now.date().and_time(at);
    if candidate <= local_now {
        candidate += chrono::Duration::days(1);
    }
    let utc = candidate - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Held while a trigger's run is in flight.
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawn `work` unless the previous run of the same trigger is still going.
/// A panic inside `work` is logged and releases the trigger.
fn spawn_guarded<F>(trigger: &'static str, flag: &Arc<AtomicBool>, work: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Some(guard) = FlightGuard::acquire(flag) else {
        warn!(trigger, "Previous run still in progress, skipping this one");
        return None;
    };
    Some(tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = tokio::spawn(work).await {
            error!(trigger, error = %e, "Scheduled run aborted");
        }
    }))
}

pub struct Scheduler {
    monitor: Arc<Monitor>,
    reporter: Arc<Reporter>,
    tick: Duration,
    daily_at: NaiveTime,
    offset: FixedOffset,
    website_busy: Arc<AtomicBool>,
    daily_busy: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        monitor: Arc<Monitor>,
        reporter: Arc<Reporter>,
        tick: Duration,
        daily_at: NaiveTime,
        offset: FixedOffset,
    ) -> Self {
        Self {
            monitor,
            reporter,
            tick,
            daily_at,
            offset,
            website_busy: Arc::new(AtomicBool::new(false)),
            daily_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(monitor: Arc<Monitor>, reporter: Arc<Reporter>, config: &Config) -> Result<Self> {
        Ok(Self::new(
            monitor,
            reporter,
            config.website_tick(),
            config.daily_time()?,
            config.utc_offset()?,
        ))
    }

    /// Drive both triggers until `shutdown` flips (or its sender goes away).
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(
            tick_secs = self.tick.as_secs(),
            daily_at = %self.daily_at,
            offset = %self.offset,
            "Scheduler started"
        );
        tokio::join!(
            self.website_loop(shutdown.clone()),
            self.daily_loop(shutdown)
        );
        info!("Scheduler stopped");
    }

    async fn website_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let monitor = self.monitor.clone();
                    spawn_guarded("website", &self.website_busy, async move {
                        if let Err(e) = monitor.run_website_cycle().await {
                            error!(error = %e, "Website cycle failed");
                        }
                    });
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn daily_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut after = Utc::now();
        loop {
            let next = next_daily_run(after, self.daily_at, self.offset);
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            info!(next_run = %next, "Daily run scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    let monitor = self.monitor.clone();
                    let reporter = self.reporter.clone();
                    spawn_guarded("daily", &self.daily_busy, async move {
                        run_daily(&monitor, &reporter, next).await;
                    });
                }
                _ = shutdown.changed() => break,
            }
            after = Utc::now().max(next + chrono::Duration::seconds(1));
        }
    }
}

/// Domain cycle first so the report reflects fresh registration data. Checks
/// are stamped with the scheduled instant, so consecutive daily runs are
/// exactly one day apart for the interval gate.
async fn run_daily(monitor: &Monitor, reporter: &Reporter, scheduled: DateTime<Utc>) {
    if let Err(e) = monitor.run_domain_cycle_at(scheduled).await {
        error!(error = %e, "Domain cycle failed");
    }
    if let Err(e) = reporter.send_daily_reports().await {
        error!(error = %e, "Daily report dispatch failed");
    }
}
