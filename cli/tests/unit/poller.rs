//! Convergence polling: tick counts, timeouts and supersession.

#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::time::Duration;

use multipass_run::application::ports::PollOutcome;
use multipass_run::application::services::poller::{
    PollPolicy, PollRegistry, gone, poll_until, reachable, reaches,
};
use multipass_run::domain::InstanceState;

use crate::helpers::{FakeMultipass, RecordingEvents, err_output, list_json, ok_output};

fn policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::ZERO,
        max_attempts,
    }
}

#[tokio::test]
async fn test_never_true_runs_exactly_max_attempts_then_times_out() {
    let mp = FakeMultipass::with_lists(vec![
        list_json(&[("dev1", "Starting", None)]),
        list_json(&[("dev1", "Starting", None)]),
        list_json(&[("dev1", "Stopped", None)]),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(
        &mp,
        &events,
        "dev1",
        reaches(InstanceState::Running),
        policy(3),
        None,
    )
    .await;

    assert_eq!(mp.count("list"), 3);
    assert_eq!(events.snapshots(), 3);
    match outcome {
        PollOutcome::TimedOut { attempts, last } => {
            assert_eq!(attempts, 3);
            let last = last.expect("last observed record");
            assert_eq!(last.state, InstanceState::Stopped, "last snapshot, not a rollback");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stops_at_first_tick_where_predicate_holds() {
    let mp = FakeMultipass::with_lists(vec![
        list_json(&[("dev1", "Starting", None)]),
        list_json(&[("dev1", "Running", None)]),
        list_json(&[("dev1", "Running", Some("10.0.0.2"))]),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(
        &mp,
        &events,
        "dev1",
        reaches(InstanceState::Running),
        policy(30),
        None,
    )
    .await;

    assert_eq!(mp.count("list"), 2);
    assert!(outcome.converged());
    assert_eq!(outcome.attempts(), 2);
}

#[tokio::test]
async fn test_reachable_waits_for_address() {
    let mp = FakeMultipass::with_lists(vec![
        list_json(&[("dev1", "Running", None)]),
        list_json(&[("dev1", "Running", Some("10.0.0.2"))]),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(&mp, &events, "dev1", reachable(), policy(60), None).await;

    match outcome {
        PollOutcome::Converged { attempts, instance } => {
            assert_eq!(attempts, 2);
            assert_eq!(
                instance.and_then(|i| i.ipv4).as_deref(),
                Some("10.0.0.2")
            );
        }
        other => panic!("expected convergence, got {other:?}"),
    }
}

#[tokio::test]
async fn test_gone_converges_when_record_disappears() {
    let mp = FakeMultipass::with_lists(vec![
        list_json(&[("dev1", "Deleted", None)]),
        list_json(&[]),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(&mp, &events, "dev1", gone(), policy(5), None).await;

    assert!(outcome.converged());
    assert_eq!(outcome.attempts(), 2);
}

#[tokio::test]
async fn test_superseded_poll_stops_before_reading() {
    let mp = FakeMultipass::default();
    let events = RecordingEvents::default();
    let registry = PollRegistry::new();
    let stale = registry.begin("dev1");
    let _fresh = registry.begin("Dev1");

    let outcome = poll_until(
        &mp,
        &events,
        "dev1",
        reaches(InstanceState::Running),
        policy(10),
        Some(&stale),
    )
    .await;

    assert_eq!(outcome, PollOutcome::Superseded { attempts: 0 });
    assert_eq!(mp.count("list"), 0);
}

#[tokio::test]
async fn test_zero_budget_times_out_without_reading() {
    let mp = FakeMultipass::default();
    let events = RecordingEvents::default();

    let outcome = poll_until(&mp, &events, "dev1", gone(), policy(0), None).await;

    assert!(matches!(outcome, PollOutcome::TimedOut { attempts: 0, last: None }));
    assert_eq!(mp.count("list"), 0);
}

/// Replies in order; the last one repeats.
fn scripted_lists(replies: Vec<std::process::Output>) -> FakeMultipass {
    let mp = FakeMultipass::default();
    *mp.lists.lock().expect("lock") = VecDeque::from(replies);
    mp
}

#[tokio::test]
async fn test_failed_read_does_not_count_as_gone() {
    let mp = scripted_lists(vec![
        err_output(1, b"cannot connect to the multipass socket"),
        ok_output(&list_json(&[("dev1", "Running", None)])),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(&mp, &events, "dev1", gone(), policy(5), None).await;

    assert!(!outcome.converged(), "a daemon outage is not a purge");
    assert_eq!(mp.count("list"), 5);
    assert_eq!(events.snapshots(), 5, "failed reads are still emitted");
}

#[tokio::test]
async fn test_failed_read_consumes_attempt_then_converges() {
    let mp = scripted_lists(vec![
        err_output(1, b"cannot connect to the multipass socket"),
        ok_output(&list_json(&[])),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(&mp, &events, "dev1", gone(), policy(5), None).await;

    assert!(outcome.converged());
    assert_eq!(outcome.attempts(), 2);
}

#[tokio::test]
async fn test_timeout_keeps_last_observed_record_across_failed_tick() {
    let mp = scripted_lists(vec![
        ok_output(&list_json(&[("dev1", "Stopping", None)])),
        err_output(1, b"cannot connect to the multipass socket"),
    ]);
    let events = RecordingEvents::default();

    let outcome = poll_until(
        &mp,
        &events,
        "dev1",
        reaches(InstanceState::Stopped),
        policy(3),
        None,
    )
    .await;

    match outcome {
        PollOutcome::TimedOut { attempts, last } => {
            assert_eq!(attempts, 3);
            let last = last.expect("record from the successful tick");
            assert_eq!(last.state, InstanceState::Stopping);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}
