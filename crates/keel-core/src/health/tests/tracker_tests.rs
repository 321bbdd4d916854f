use std::time::{Duration, Instant};

use crate::health::{HealthTracker, Operation};
use crate::module::ModuleState;

/// An instant `elapsed` ago, so track_end records a chosen duration.
fn started(elapsed: Duration) -> Instant {
    Instant::now().checked_sub(elapsed).unwrap()
}

#[test]
fn test_counts_and_failures_per_operation() {
    let tracker = HealthTracker::new();

    for _ in 0..3 {
        let t = tracker.track_start("db", Operation::Initialize);
        tracker.track_end("db", Operation::Initialize, t, true, ModuleState::Initialized);
    }
    let t = tracker.track_start("db", Operation::Initialize);
    tracker.track_end("db", Operation::Initialize, t, false, ModuleState::Error);

    let metrics = tracker.module_metrics("db").unwrap();
    let init = metrics.operations.get(&Operation::Initialize).unwrap();
    assert_eq!(init.count, 4);
    assert_eq!(init.failures, 1);
    assert_eq!(metrics.last_state, Some(ModuleState::Error));
}

#[test]
fn test_average_and_last_duration() {
    let tracker = HealthTracker::new();

    tracker.track_end(
        "db",
        Operation::Start,
        started(Duration::from_millis(100)),
        true,
        ModuleState::Running,
    );
    tracker.track_end(
        "db",
        Operation::Start,
        started(Duration::from_millis(300)),
        true,
        ModuleState::Running,
    );

    let metrics = tracker.module_metrics("db").unwrap();
    let start = metrics.operations.get(&Operation::Start).unwrap();
    assert_eq!(start.count, 2);
    assert!(start.last_duration >= Duration::from_millis(300));
    assert!(start.avg_duration >= Duration::from_millis(200));
    assert!(start.avg_duration < Duration::from_millis(300));
}

#[test]
fn test_track_error_counts_per_module() {
    let tracker = HealthTracker::new();
    tracker.track_error("flaky");
    tracker.track_error("flaky");
    tracker.track_error("other");

    let metrics = tracker.module_metrics("flaky").unwrap();
    assert_eq!(metrics.error_count, 2);
    assert!(metrics.last_error_at.is_some());

    let ranked = tracker.most_error_prone_modules(10);
    assert_eq!(ranked[0], ("flaky".to_string(), 2));
    assert_eq!(ranked[1], ("other".to_string(), 1));
}

#[test]
fn test_slowest_modules_requires_completed_initialize() {
    let tracker = HealthTracker::new();

    tracker.track_end(
        "slow",
        Operation::Initialize,
        started(Duration::from_millis(200)),
        true,
        ModuleState::Initialized,
    );
    tracker.track_end(
        "quick",
        Operation::Initialize,
        started(Duration::from_millis(10)),
        true,
        ModuleState::Initialized,
    );
    // Start-only module must not appear.
    tracker.track_end(
        "start-only",
        Operation::Start,
        started(Duration::from_millis(500)),
        true,
        ModuleState::Running,
    );

    let slowest = tracker.slowest_modules(10);
    assert_eq!(slowest.len(), 2);
    assert_eq!(slowest[0].0, "slow");
    assert_eq!(slowest[1].0, "quick");

    let top_one = tracker.slowest_modules(1);
    assert_eq!(top_one.len(), 1);
}

#[test]
fn test_system_health_aggregates_and_flags_slow_modules() {
    let tracker = HealthTracker::new();

    tracker.track_end(
        "sluggish",
        Operation::Initialize,
        started(Duration::from_millis(400)),
        true,
        ModuleState::Initialized,
    );
    for name in ["a", "b", "c"] {
        tracker.track_end(
            name,
            Operation::Initialize,
            started(Duration::from_millis(10)),
            true,
            ModuleState::Initialized,
        );
    }
    tracker.track_end(
        "a",
        Operation::Start,
        started(Duration::from_millis(5)),
        false,
        ModuleState::Error,
    );
    tracker.track_error("a");

    let health = tracker.system_health();
    assert_eq!(health.total_modules, 4);
    assert_eq!(health.total_operations, 5);
    assert_eq!(health.total_failures, 1);
    assert_eq!(health.total_errors, 1);
    // System average is ~107 ms; only "sluggish" exceeds twice that.
    assert_eq!(health.slow_modules, vec!["sluggish"]);
}

#[test]
fn test_empty_tracker_health() {
    let tracker = HealthTracker::new();
    let health = tracker.system_health();
    assert_eq!(health.total_modules, 0);
    assert_eq!(health.total_operations, 0);
    assert_eq!(health.average_initialize, Duration::ZERO);
    assert!(health.slow_modules.is_empty());
    assert!(tracker.module_metrics("nope").is_none());
}
