mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use options_tutor_market_data::{
    DataKind, DataScheduler, JobStatus, MarketDataConfig, MarketDataService, SchedulerConfig,
};

use common::{service_config, Outcome, StubProvider};

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: Duration::from_millis(10),
        retry_delay: Duration::ZERO,
        fetch_times: Vec::new(),
        timezone: chrono_tz::UTC,
        ..SchedulerConfig::default()
    }
}

fn setup(daily_cap: u32) -> (Arc<StubProvider>, Arc<MarketDataService>, DataScheduler) {
    let provider = StubProvider::new();
    let service = Arc::new(MarketDataService::new(provider.clone(), service_config(daily_cap)));
    let scheduler = DataScheduler::new(service.clone(), scheduler_config());
    (provider, service, scheduler)
}

#[tokio::test]
async fn new_symbol_gets_immediate_quote_job() {
    let (provider, service, scheduler) = setup(25);

    assert!(scheduler.watch("aapl"));
    assert!(!scheduler.watch("AAPL"));
    assert_eq!(scheduler.watchlist(), vec!["AAPL".to_string()]);

    let report = scheduler.tick(Utc::now()).await;

    assert_eq!(report.completed, 1);
    assert_eq!(provider.calls(), 1);
    assert!(service.cached_quote("AAPL").is_some());
    let jobs = scheduler.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].attempts, 1);
}

#[tokio::test]
async fn failing_job_fails_after_max_attempts() {
    let (provider, _service, scheduler) = setup(25);
    provider.set_outcome(Outcome::Network);
    scheduler.watch("SPY");

    let now = Utc::now();
    let first = scheduler.tick(now).await;
    let second = scheduler.tick(now).await;
    let third = scheduler.tick(now).await;
    let fourth = scheduler.tick(now).await;

    assert_eq!(first.retried, 1);
    assert_eq!(second.retried, 1);
    assert_eq!(third.failed, 1);
    assert!(fourth.is_idle());
    assert_eq!(provider.calls(), 3);

    let job = &scheduler.jobs()[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.last_error.as_deref().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn parse_errors_are_retried() {
    let (provider, _service, scheduler) = setup(25);
    provider.set_outcome(Outcome::Parse);
    scheduler.watch("SPY");

    let report = scheduler.tick(Utc::now()).await;

    assert_eq!(report.retried, 1);
    assert_eq!(scheduler.jobs()[0].status, JobStatus::Pending);
}

#[tokio::test]
async fn provider_rejection_fails_without_retry() {
    let (provider, _service, scheduler) = setup(25);
    provider.set_outcome(Outcome::Rejected);
    scheduler.watch("NOPE");

    let report = scheduler.tick(Utc::now()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(provider.calls(), 1);
    assert_eq!(scheduler.jobs()[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn denied_batch_is_deferred_without_spending_attempts() {
    let (provider, _service, scheduler) = setup(0);
    scheduler.watch("SPY");
    scheduler.watch("QQQ");

    let now = Utc::now();
    let report = scheduler.tick(now).await;

    assert_eq!(report.deferred, 2);
    assert_eq!(provider.calls(), 0);
    for job in scheduler.jobs() {
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.scheduled_time, now + chrono::Duration::minutes(5));
    }
}

#[tokio::test]
async fn cap_hit_mid_batch_defers_the_rest() {
    let (provider, _service, scheduler) = setup(1);
    scheduler.watch("SPY");
    scheduler.watch("QQQ");
    scheduler.watch("IWM");

    let report = scheduler.tick(Utc::now()).await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.deferred, 2);
    assert_eq!(provider.calls(), 1);
    let pending: Vec<_> = scheduler
        .jobs()
        .into_iter()
        .filter(|j| j.status == JobStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|j| j.attempts == 0));
}

#[tokio::test]
async fn plans_one_day_of_jobs() {
    let provider = StubProvider::new();
    let service = Arc::new(MarketDataService::new(provider.clone(), service_config(25)));
    let config = SchedulerConfig {
        fetch_times: vec![
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        ],
        ..scheduler_config()
    };
    let scheduler = DataScheduler::new(service, config);
    scheduler.watch("SPY");

    // Monday morning, before the first slot
    let monday = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
    let report = scheduler.tick(monday).await;

    // three quotes, one history, one overview
    assert_eq!(report.planned, 5);
    assert_eq!(report.completed, 0);
    let jobs = scheduler.jobs();
    let count = |kind: DataKind| {
        jobs.iter()
            .filter(|j| j.kind == kind && j.scheduled_time.date_naive() == monday.date_naive())
            .count()
    };
    assert_eq!(count(DataKind::Quote), 3);
    assert_eq!(count(DataKind::Historical), 1);
    assert_eq!(count(DataKind::Company), 1);

    let history = jobs.iter().find(|j| j.kind == DataKind::Historical).unwrap();
    assert_eq!(history.scheduled_time, Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap());

    // Same day again plans nothing
    assert_eq!(scheduler.tick(monday).await.planned, 0);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn due_jobs_are_paced_and_stay_within_quota() {
    let provider = StubProvider::new();
    let spacing = Duration::from_millis(150);
    let service = Arc::new(MarketDataService::new(
        provider.clone(),
        MarketDataConfig {
            min_request_interval: spacing,
            ..service_config(2)
        },
    ));
    let scheduler = DataScheduler::new(service.clone(), scheduler_config());
    for symbol in ["AAA", "BBB", "CCC"] {
        scheduler.watch(symbol);
    }

    let report = scheduler.tick(Utc::now()).await;

    assert_eq!(report.completed, 2);
    assert_eq!(report.deferred, 1);
    assert_eq!(provider.calls(), 2);
    assert_eq!(service.rate_status().remaining_today, 0);

    let log = provider.call_log();
    let gap = log[1].1 - log[0].1;
    assert!(
        gap >= chrono::Duration::milliseconds(140),
        "calls only {}ms apart",
        gap.num_milliseconds()
    );
}

#[tokio::test]
async fn retry_delay_counts_from_each_failure() {
    let provider = StubProvider::new();
    provider.set_outcome(Outcome::Network);
    let service = Arc::new(MarketDataService::new(
        provider.clone(),
        MarketDataConfig {
            min_request_interval: Duration::from_millis(150),
            ..service_config(25)
        },
    ));
    let retry_delay = Duration::from_secs(2);
    let scheduler = DataScheduler::new(
        service,
        SchedulerConfig {
            retry_delay,
            ..scheduler_config()
        },
    );
    for symbol in ["AAA", "BBB", "CCC"] {
        scheduler.watch(symbol);
    }

    let report = scheduler.tick(Utc::now()).await;
    assert_eq!(report.retried, 3);

    let log = provider.call_log();
    assert_eq!(log.len(), 3);
    let jobs = scheduler.jobs();
    let retry_delay = chrono::Duration::from_std(retry_delay).unwrap();
    let slack = chrono::Duration::milliseconds(50);
    for (symbol, called_at) in &log {
        let job = jobs.iter().find(|j| &j.symbol == symbol).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(
            job.scheduled_time + slack >= *called_at + retry_delay,
            "{} retries {}ms after its failure",
            symbol,
            (job.scheduled_time - *called_at).num_milliseconds()
        );
    }

    let first = jobs.iter().find(|j| j.symbol == "AAA").unwrap();
    let last = jobs.iter().find(|j| j.symbol == "CCC").unwrap();
    assert!(last.scheduled_time - first.scheduled_time >= chrono::Duration::milliseconds(200));
}

#[tokio::test]
async fn new_day_supersedes_stale_pending_jobs() {
    // No quota at all, so nothing ever runs
    let (provider, service, _) = setup(0);
    let config = SchedulerConfig {
        fetch_times: vec![
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        ],
        ..scheduler_config()
    };
    let scheduler = DataScheduler::new(service, config);
    scheduler.watch("SPY");

    // Monday 2024-06-03 through Friday 2024-06-07
    for day in 3..=7 {
        let morning = Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 6, day, 21, 0, 0).unwrap();

        let planned = scheduler.tick(morning).await.planned;
        // quotes and history every day, the overview only once
        assert_eq!(planned, if day == 3 { 5 } else { 4 });
        // every planned job is due and refused
        assert_eq!(scheduler.tick(evening).await.deferred, 5);
    }

    let friday = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
    let planned: Vec<_> = scheduler
        .jobs()
        .into_iter()
        .filter(|j| j.planned_for.is_some())
        .collect();
    let pending = |kind: DataKind| {
        planned
            .iter()
            .filter(|j| j.kind == kind && j.status == JobStatus::Pending)
            .count()
    };
    assert_eq!(pending(DataKind::Quote), 3);
    assert_eq!(pending(DataKind::Historical), 1);
    assert_eq!(pending(DataKind::Company), 1);
    assert!(planned
        .iter()
        .filter(|j| j.kind != DataKind::Company)
        .all(|j| j.planned_for == Some(friday)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn unwatch_drops_pending_jobs() {
    let (_provider, _service, scheduler) = setup(0);
    scheduler.watch("SPY");
    assert_eq!(scheduler.jobs().len(), 1);

    assert!(scheduler.unwatch("spy"));
    assert!(!scheduler.unwatch("spy"));
    assert!(scheduler.jobs().is_empty());
    assert!(scheduler.watchlist().is_empty());
}

#[tokio::test]
async fn start_and_stop_ticker() {
    let (provider, service, scheduler) = setup(25);
    scheduler.watch("SPY");

    assert!(scheduler.start());
    assert!(!scheduler.start());
    assert!(scheduler.is_running());

    for _ in 0..100 {
        if service.cached_quote("SPY").is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    assert_eq!(provider.calls(), 1);
    assert!(service.cached_quote("SPY").is_some());
}
