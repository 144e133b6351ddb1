//! Fetch jobs and the queue that drives their state machine.
//!
//! ```text
//! pending ──(due, allowed)──► running ──(ok)──────────────► completed
//!    ▲  │                        │
//!    │  └─(denied)─► pending     ├──(error, attempts < max)─► pending (+retry delay)
//!    │               (deferred)  │
//!    └───────(released)──────────┴──(error, attempts >= max
//!                                     or not retryable)─────► failed
//! ```

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::RetryClass;
use crate::models::{normalize_symbol, DataKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchJob {
    pub id: Uuid,
    pub symbol: String,
    pub kind: DataKind,
    pub scheduled_time: DateTime<Utc>,
    pub attempts: u32,
    pub status: JobStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Market date this job was planned for; `None` for on-demand jobs.
    pub planned_for: Option<NaiveDate>,
}

impl FetchJob {
    fn new(symbol: &str, kind: DataKind, at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: normalize_symbol(symbol),
            kind,
            scheduled_time: at,
            attempts: 0,
            status: JobStatus::Pending,
            last_error: None,
            created_at: now,
            finished_at: None,
            planned_for: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_time <= now
    }
}

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Vec<FetchJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&FetchJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// All jobs ordered by scheduled time.
    pub fn jobs(&self) -> Vec<FetchJob> {
        let mut jobs = self.jobs.clone();
        jobs.sort_by_key(|j| j.scheduled_time);
        jobs
    }

    pub fn enqueue(
        &mut self,
        symbol: &str,
        kind: DataKind,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let job = FetchJob::new(symbol, kind, at, now);
        let id = job.id;
        self.jobs.push(job);
        id
    }

    /// Enqueue a job belonging to the plan for market date `date`.
    pub fn enqueue_planned(
        &mut self,
        symbol: &str,
        kind: DataKind,
        at: DateTime<Utc>,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Uuid {
        let mut job = FetchJob::new(symbol, kind, at, now);
        job.planned_for = Some(date);
        let id = job.id;
        self.jobs.push(job);
        id
    }

    /// Drop pending jobs of this kind for the symbol that were planned for a
    /// market date before `date`. Returns how many were removed.
    pub fn supersede(&mut self, symbol: &str, kind: DataKind, date: NaiveDate) -> usize {
        let symbol = normalize_symbol(symbol);
        let before = self.jobs.len();
        self.jobs.retain(|j| {
            !(j.symbol == symbol
                && j.kind == kind
                && j.status == JobStatus::Pending
                && j.planned_for.is_some_and(|planned| planned < date))
        });
        before - self.jobs.len()
    }

    /// Pending jobs whose time has come, oldest first.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<FetchJob> {
        let mut due: Vec<FetchJob> = self.jobs.iter().filter(|j| j.is_due(now)).cloned().collect();
        due.sort_by_key(|j| j.scheduled_time);
        due
    }

    /// Pending to running. Counts an attempt. Returns false if the job is gone
    /// or not pending.
    pub fn mark_running(&mut self, id: Uuid) -> bool {
        match self.find_mut(id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Running;
                job.attempts += 1;
                true
            }
            _ => false,
        }
    }

    pub fn mark_completed(&mut self, id: Uuid, now: DateTime<Utc>) {
        if let Some(job) = self.find_mut(id) {
            job.status = JobStatus::Completed;
            job.last_error = None;
            job.finished_at = Some(now);
        }
    }

    /// Apply a failed attempt and return the job's new status.
    pub fn record_failure(
        &mut self,
        id: Uuid,
        error: &str,
        class: RetryClass,
        now: DateTime<Utc>,
        retry_delay: Duration,
        max_attempts: u32,
    ) -> Option<JobStatus> {
        if class == RetryClass::Defer {
            self.release(id, now + to_chrono(retry_delay));
            return self.get(id).map(|j| j.status);
        }

        let job = self.find_mut(id)?;
        job.last_error = Some(error.to_string());
        if class == RetryClass::Never || job.attempts >= max_attempts {
            job.status = JobStatus::Failed;
            job.finished_at = Some(now);
        } else {
            job.status = JobStatus::Pending;
            job.scheduled_time = now + to_chrono(retry_delay);
        }
        Some(job.status)
    }

    /// Undo a run that never reached the provider: back to pending, attempt
    /// handed back.
    pub fn release(&mut self, id: Uuid, until: DateTime<Utc>) {
        if let Some(job) = self.find_mut(id) {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Pending;
                job.attempts = job.attempts.saturating_sub(1);
            }
            job.scheduled_time = until;
        }
    }

    /// Push pending jobs back to `until`.
    pub fn defer(&mut self, ids: &[Uuid], until: DateTime<Utc>) {
        for job in self.jobs.iter_mut() {
            if job.status == JobStatus::Pending && ids.contains(&job.id) {
                job.scheduled_time = until;
            }
        }
    }

    /// Drop finished jobs older than `max_age`. Returns how many were removed.
    pub fn cleanup(&mut self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let cutoff = now - to_chrono(max_age);
        let before = self.jobs.len();
        self.jobs.retain(|j| match (j.status.is_finished(), j.finished_at) {
            (true, Some(finished)) => finished >= cutoff,
            _ => true,
        });
        before - self.jobs.len()
    }

    /// Pending or running job of this kind exists for the symbol.
    pub fn has_pending(&self, symbol: &str, kind: DataKind) -> bool {
        let symbol = normalize_symbol(symbol);
        self.jobs.iter().any(|j| {
            j.symbol == symbol
                && j.kind == kind
                && matches!(j.status, JobStatus::Pending | JobStatus::Running)
        })
    }

    /// Remove pending jobs for a symbol. Returns how many were removed.
    pub fn remove_pending(&mut self, symbol: &str) -> usize {
        let symbol = normalize_symbol(symbol);
        let before = self.jobs.len();
        self.jobs
            .retain(|j| !(j.symbol == symbol && j.status == JobStatus::Pending));
        before - self.jobs.len()
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut FetchJob> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRY: Duration = Duration::from_secs(300);

    fn queue_with_job(now: DateTime<Utc>) -> (JobQueue, Uuid) {
        let mut queue = JobQueue::new();
        let id = queue.enqueue("spy", DataKind::Quote, now, now);
        (queue, id)
    }

    #[test]
    fn test_enqueue_and_due() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        let later = queue.enqueue("QQQ", DataKind::Quote, now + chrono::Duration::hours(1), now);
        let soon = queue.enqueue("spy", DataKind::Quote, now, now);

        let due = queue.due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, soon);
        assert_eq!(due[0].symbol, "SPY");
        assert_eq!(due[0].status, JobStatus::Pending);

        let due_later = queue.due(now + chrono::Duration::hours(2));
        assert_eq!(due_later.len(), 2);
        assert_eq!(due_later[1].id, later);
    }

    #[test]
    fn test_success_path() {
        let now = Utc::now();
        let (mut queue, id) = queue_with_job(now);

        assert!(queue.mark_running(id));
        assert!(!queue.mark_running(id));
        queue.mark_completed(id, now);

        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.finished_at, Some(now));
        assert!(queue.due(now).is_empty());
    }

    #[test]
    fn test_retry_then_fail_at_max_attempts() {
        let now = Utc::now();
        let (mut queue, id) = queue_with_job(now);

        for attempt in 1..=3u32 {
            assert!(queue.mark_running(id));
            let status = queue
                .record_failure(id, "timeout", RetryClass::Retry, now, RETRY, 3)
                .unwrap();
            if attempt < 3 {
                assert_eq!(status, JobStatus::Pending);
                let job = queue.get(id).unwrap();
                assert_eq!(job.scheduled_time, now + chrono::Duration::seconds(300));
                // Not due until the retry delay passes
                assert!(queue.due(now).is_empty());
                queue.defer(&[id], now);
            } else {
                assert_eq!(status, JobStatus::Failed);
            }
        }

        let job = queue.get(id).unwrap();
        assert_eq!(job.attempts, 3);
        assert_eq!(job.last_error.as_deref(), Some("timeout"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_never_retry_fails_immediately() {
        let now = Utc::now();
        let (mut queue, id) = queue_with_job(now);
        queue.mark_running(id);

        let status = queue.record_failure(id, "Invalid API call", RetryClass::Never, now, RETRY, 3);

        assert_eq!(status, Some(JobStatus::Failed));
        assert_eq!(queue.get(id).unwrap().attempts, 1);
    }

    #[test]
    fn test_defer_class_hands_attempt_back() {
        let now = Utc::now();
        let (mut queue, id) = queue_with_job(now);
        queue.mark_running(id);

        let status = queue.record_failure(id, "cap", RetryClass::Defer, now, RETRY, 3);

        assert_eq!(status, Some(JobStatus::Pending));
        let job = queue.get(id).unwrap();
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.is_none());
    }

    #[test]
    fn test_defer_only_touches_pending() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        let a = queue.enqueue("A", DataKind::Quote, now, now);
        let b = queue.enqueue("B", DataKind::Quote, now, now);
        queue.mark_running(b);

        let until = now + chrono::Duration::minutes(5);
        queue.defer(&[a, b], until);

        assert_eq!(queue.get(a).unwrap().scheduled_time, until);
        assert_eq!(queue.get(b).unwrap().scheduled_time, now);
    }

    #[test]
    fn test_cleanup_keeps_pending_and_recent() {
        let now = Utc::now();
        let old = now - chrono::Duration::hours(30);
        let mut queue = JobQueue::new();

        let done_old = queue.enqueue("A", DataKind::Quote, old, old);
        queue.mark_running(done_old);
        queue.mark_completed(done_old, old);

        let done_recent = queue.enqueue("B", DataKind::Quote, now, now);
        queue.mark_running(done_recent);
        queue.mark_completed(done_recent, now);

        let pending_old = queue.enqueue("C", DataKind::Quote, old, old);

        let removed = queue.cleanup(now, Duration::from_secs(24 * 60 * 60));

        assert_eq!(removed, 1);
        assert!(queue.get(done_old).is_none());
        assert!(queue.get(done_recent).is_some());
        assert!(queue.get(pending_old).is_some());
    }

    #[test]
    fn test_has_pending_and_remove() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        queue.enqueue("spy", DataKind::Company, now, now);

        assert!(queue.has_pending("SPY", DataKind::Company));
        assert!(!queue.has_pending("SPY", DataKind::Quote));

        assert_eq!(queue.remove_pending("SPY"), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_supersede_only_drops_older_planned_jobs() {
        let now = Utc::now();
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        let mut queue = JobQueue::new();
        let on_demand = queue.enqueue("SPY", DataKind::Quote, now, now);
        queue.enqueue_planned("SPY", DataKind::Quote, now, monday, now);
        let running = queue.enqueue_planned("SPY", DataKind::Quote, now, monday, now);
        queue.mark_running(running);
        let history = queue.enqueue_planned("SPY", DataKind::Historical, now, monday, now);
        let today = queue.enqueue_planned("SPY", DataKind::Quote, now, tuesday, now);
        let other = queue.enqueue_planned("QQQ", DataKind::Quote, now, monday, now);

        assert_eq!(queue.supersede("spy", DataKind::Quote, tuesday), 1);

        let left: Vec<Uuid> = queue.jobs().iter().map(|j| j.id).collect();
        for id in [on_demand, running, history, today, other] {
            assert!(left.contains(&id));
        }
        assert_eq!(queue.len(), 5);
    }
}
