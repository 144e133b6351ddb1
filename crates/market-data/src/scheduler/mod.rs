//! Time-triggered fetching for watched symbols.
//!
//! The scheduler plans one day of jobs at a time, wakes up on a fixed tick,
//! and runs due jobs one after another through the service's paced fetch.
//! A batch the limiter refuses is deferred as a whole; a failed attempt is
//! retried after a fixed delay, measured from its own failure, until the
//! attempt budget is spent. Planning a new market day supersedes quote and
//! history jobs still pending from earlier days.

mod job;
mod plan;

pub use job::{FetchJob, JobQueue, JobStatus};
pub use plan::{parse_fetch_times, SchedulePlan};

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::errors::RetryClass;
use crate::models::{normalize_symbol, DataKind};
use crate::service::MarketDataService;

use job::to_chrono;

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub planned: usize,
    pub cleaned: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub deferred: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    watchlist: BTreeSet<String>,
    queue: JobQueue,
    planned_for: Option<NaiveDate>,
}

struct SchedulerInner {
    service: Arc<MarketDataService>,
    config: SchedulerConfig,
    plan: SchedulePlan,
    state: Mutex<SchedulerState>,
    // One tick at a time, whether from the ticker or a direct call
    tick_lock: tokio::sync::Mutex<()>,
}

struct TickerTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct DataScheduler {
    inner: Arc<SchedulerInner>,
    task: Mutex<Option<TickerTask>>,
}

impl DataScheduler {
    pub fn new(service: Arc<MarketDataService>, config: SchedulerConfig) -> Self {
        let plan = SchedulePlan::from_config(&config);
        Self {
            inner: Arc::new(SchedulerInner {
                service,
                config,
                plan,
                state: Mutex::new(SchedulerState::default()),
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Add a symbol to the watchlist. Returns false if it was already watched.
    pub fn watch(&self, symbol: &str) -> bool {
        self.inner.watch(symbol, Utc::now())
    }

    /// Remove a symbol and its pending jobs. Returns false if it was not watched.
    pub fn unwatch(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        let mut state = self.inner.state();
        if !state.watchlist.remove(&symbol) {
            return false;
        }
        let removed = state.queue.remove_pending(&symbol);
        info!("Unwatched {} ({} pending jobs dropped)", symbol, removed);
        true
    }

    pub fn watchlist(&self) -> Vec<String> {
        self.inner.state().watchlist.iter().cloned().collect()
    }

    pub fn jobs(&self) -> Vec<FetchJob> {
        self.inner.state().queue.jobs()
    }

    /// Run one scheduling pass as of `now`.
    ///
    /// `now` drives planning, due checks and job bookkeeping; during the
    /// batch it advances with elapsed time, so a retry is scheduled relative
    /// to the failure that caused it. The limiter always reads the wall
    /// clock, so outside tests pass `Utc::now()`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        self.inner.tick(now).await
    }

    /// Spawn the ticker. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut task = self.task();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let period = inner.config.tick_interval;

        let handle = tokio::spawn(async move {
            info!("Market data scheduler started ({:?} tick)", period);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = inner.tick(Utc::now()).await;
                        if !report.is_idle() {
                            info!("Scheduler tick: {:?}", report);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Market data scheduler stopped");
        });

        *task = Some(TickerTask { shutdown, handle });
        true
    }

    /// Signal the ticker and wait for it to exit.
    pub async fn stop(&self) {
        let task = self.task().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    fn task(&self) -> MutexGuard<'_, Option<TickerTask>> {
        self.task.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler task mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl SchedulerInner {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn watch(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return false;
        }

        let mut state = self.state();
        if !state.watchlist.insert(symbol.clone()) {
            return false;
        }

        if self.service.cached_quote(&symbol).is_none() {
            state.queue.enqueue(&symbol, DataKind::Quote, now, now);
        }
        if let Some(date) = state.planned_for {
            self.plan_symbol(&mut state, &symbol, date, now);
        }
        info!("Watching {}", symbol);
        true
    }

    /// Plan the day once per market-local date. Returns the number of jobs added.
    fn plan_day(&self, state: &mut SchedulerState, now: DateTime<Utc>) -> usize {
        let today = self.plan.local_date(now);
        if state.planned_for == Some(today) {
            return 0;
        }
        state.planned_for = Some(today);

        let symbols: Vec<String> = state.watchlist.iter().cloned().collect();
        let mut planned = 0;
        for symbol in &symbols {
            planned += self.plan_symbol(state, symbol, today, now);
        }
        info!(
            "Planned {} jobs for {} ({} symbols)",
            planned,
            today,
            symbols.len()
        );
        planned
    }

    fn plan_symbol(
        &self,
        state: &mut SchedulerState,
        symbol: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> usize {
        let slots = self.plan.remaining(date, now);
        let (Some(&first), Some(&last)) = (slots.first(), slots.last()) else {
            return 0;
        };

        let superseded = state.queue.supersede(symbol, DataKind::Quote, date)
            + state.queue.supersede(symbol, DataKind::Historical, date);
        if superseded > 0 {
            info!(
                "Dropped {} stale pending jobs for {} before planning {}",
                superseded, symbol, date
            );
        }

        let mut added = 0;
        for at in &slots {
            state.queue.enqueue_planned(symbol, DataKind::Quote, *at, date, now);
            added += 1;
        }

        state
            .queue
            .enqueue_planned(symbol, DataKind::Historical, last, date, now);
        added += 1;

        let company_stale = match self.service.cached_company(symbol) {
            Some(overview) => overview
                .age(now)
                .to_std()
                .map_or(false, |age| age >= self.service.config().company_ttl),
            None => true,
        };
        if company_stale && !state.queue.has_pending(symbol, DataKind::Company) {
            state
                .queue
                .enqueue_planned(symbol, DataKind::Company, first, date, now);
            added += 1;
        }

        added
    }

    async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let _tick = self.tick_lock.lock().await;
        let started = Instant::now();
        let mut report = TickReport::default();

        let due = {
            let mut state = self.state();
            report.planned = self.plan_day(&mut state, now);
            report.cleaned = state.queue.cleanup(now, self.config.job_retention);
            state.queue.due(now)
        };
        if due.is_empty() {
            return report;
        }

        let permit = self.service.rate_status();
        if !permit.allowed {
            let deferral_until = now + to_chrono(self.config.deferral_delay);
            let ids: Vec<Uuid> = due.iter().map(|j| j.id).collect();
            self.state().queue.defer(&ids, deferral_until);
            info!(
                "Deferred {} due jobs until {}: {} requests left today, next slot {}",
                ids.len(),
                deferral_until,
                permit.remaining_today,
                permit.next_allowed_at
            );
            report.deferred = ids.len();
            return report;
        }

        for (index, job) in due.iter().enumerate() {
            if !self.state().queue.mark_running(job.id) {
                // Dropped by unwatch since the batch was collected
                continue;
            }
            debug!("Running {} job for {}", job.kind, job.symbol);

            match self.service.fetch_paced(job.kind, &job.symbol).await {
                Ok(_) => {
                    self.state()
                        .queue
                        .mark_completed(job.id, batch_clock(now, started));
                    report.completed += 1;
                }
                Err(e) if e.retry_class() == RetryClass::Defer => {
                    let deferral_until =
                        batch_clock(now, started) + to_chrono(self.config.deferral_delay);
                    let rest: Vec<Uuid> = due[index + 1..].iter().map(|j| j.id).collect();
                    {
                        let mut state = self.state();
                        state.queue.release(job.id, deferral_until);
                        state.queue.defer(&rest, deferral_until);
                    }
                    report.deferred += 1 + rest.len();
                    info!(
                        "Daily request cap reached; deferred {} jobs until {}",
                        1 + rest.len(),
                        deferral_until
                    );
                    break;
                }
                Err(e) => {
                    let status = self.state().queue.record_failure(
                        job.id,
                        &e.to_string(),
                        e.retry_class(),
                        batch_clock(now, started),
                        self.config.retry_delay,
                        self.config.max_attempts,
                    );
                    match status {
                        Some(JobStatus::Failed) => {
                            error!(
                                "{} job for {} failed permanently: {}",
                                job.kind, job.symbol, e
                            );
                            report.failed += 1;
                        }
                        _ => {
                            warn!(
                                "{} job for {} failed, retrying in {:?}: {}",
                                job.kind, job.symbol, self.config.retry_delay, e
                            );
                            report.retried += 1;
                        }
                    }
                }
            }
        }

        report
    }
}

/// `now` advanced by the time spent since the tick started.
fn batch_clock(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    now + to_chrono(started.elapsed())
}
