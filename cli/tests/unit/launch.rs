//! Launch with streamed progress.

#![allow(clippy::expect_used)]

use std::sync::Mutex;

use multipass_run::application::services::launch::launch_instance;
use multipass_run::domain::{ErrorKind, LaunchProgress, LaunchSpec};
use multipass_run::infra::provisioner::MultipassProvisioner;

use crate::helpers::{FakeMultipass, Reply, ScriptedRunner, err_output, ok_output};

fn fake_with_lines(lines: &[&str]) -> FakeMultipass {
    FakeMultipass {
        launch_lines: lines.iter().map(|l| (*l).to_string()).collect(),
        ..FakeMultipass::default()
    }
}

#[tokio::test]
async fn test_progress_reports_download_then_provisioning() {
    let mp = fake_with_lines(&["Retrieving image: 42%", "Launching default"]);
    let mut seen: Vec<LaunchProgress> = Vec::new();
    let mut on_progress = |p: &LaunchProgress| seen.push(p.clone());

    let outcome = launch_instance(&mp, &LaunchSpec::named("dev1"), Some(&mut on_progress)).await;

    assert!(outcome.success());
    assert!(outcome.was_downloading);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].message, "Retrieving image: 42%");
    assert!(seen[0].downloading);
    assert_eq!(seen[1].message, "Creating instance...");
    assert!(!seen[1].downloading);
}

#[tokio::test]
async fn test_cached_image_never_sets_downloading() {
    let mp = fake_with_lines(&["Launching dev1", "Starting dev1", "Launched: dev1"]);
    let mut count = 0;
    let mut on_progress = |_: &LaunchProgress| count += 1;

    let outcome = launch_instance(&mp, &LaunchSpec::named("dev1"), Some(&mut on_progress)).await;

    assert!(outcome.success());
    assert!(!outcome.was_downloading);
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_without_callback_blocks_and_reports_no_download() {
    let mp = fake_with_lines(&["Retrieving image: 10%"]);

    let outcome = launch_instance(&mp, &LaunchSpec::named("dev1"), None).await;

    assert!(outcome.success());
    assert!(!outcome.was_downloading);
}

#[tokio::test]
async fn test_failure_message_prefers_stderr() {
    let mp = fake_with_lines(&["Retrieving image: 5%"]);
    *mp.launch_exit.lock().expect("lock") = err_output(2, b"launch failed: disk too small");
    let mut on_progress = |_: &LaunchProgress| {};

    let outcome = launch_instance(&mp, &LaunchSpec::named("dev1"), Some(&mut on_progress)).await;

    let err = outcome.error.expect("failed");
    assert_eq!(err.kind, ErrorKind::Other);
    assert_eq!(err.message, "launch failed: disk too small");
    assert!(outcome.was_downloading, "sticky flag survives failure");
}

#[tokio::test]
async fn test_failure_without_output_uses_fallback() {
    let mp = FakeMultipass::default();
    *mp.launch_exit.lock().expect("lock") = err_output(1, b"");

    let outcome = launch_instance(&mp, &LaunchSpec::named("dev1"), None).await;

    assert_eq!(
        outcome.error.expect("failed").message,
        "Failed to launch instance"
    );
}

#[tokio::test]
async fn test_launch_arguments_through_provisioner() {
    let runner = ScriptedRunner::new([
        Reply::NotFound,
        Reply::Exit(ok_output(b"Retrieving image: 99%\nLaunched: dev1\n")),
    ]);
    let mp = MultipassProvisioner::new(
        runner.clone(),
        vec!["multipass".to_string(), "/snap/bin/multipass".to_string()],
    );
    let spec = LaunchSpec {
        image: Some("24.04".to_string()),
        cpus: Some("2".to_string()),
        disk: Some("10G".to_string()),
        ..LaunchSpec::named("dev1")
    };
    let seen = Mutex::new(Vec::new());
    let mut on_progress = |p: &LaunchProgress| seen.lock().expect("lock").push(p.message.clone());

    let outcome = launch_instance(&mp, &spec, Some(&mut on_progress)).await;

    assert!(outcome.success());
    assert!(outcome.was_downloading);
    let calls = runner.calls();
    assert_eq!(calls.len(), 2, "retried against the second candidate");
    assert_eq!(calls[1].0, "/snap/bin/multipass");
    assert_eq!(
        calls[1].1,
        vec!["launch", "24.04", "--name", "dev1", "--cpus", "2", "--disk", "10G"]
    );
    assert_eq!(*seen.lock().expect("lock"), vec!["Retrieving image: 99%"]);
}
