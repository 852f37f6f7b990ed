//! Candidate-path fallback in `CommandResolver`.

#![allow(clippy::expect_used)]

use multipass_run::domain::InvokeError;
use multipass_run::infra::resolver::CommandResolver;
use proptest::prelude::*;

use crate::helpers::{Reply, ScriptedRunner, err_output, ok_output};

fn candidates(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("/opt/mp{i}/multipass")).collect()
}

#[tokio::test]
async fn test_invoke_skips_missing_candidate() {
    let runner = ScriptedRunner::new([Reply::NotFound, Reply::Exit(ok_output(b"ok"))]);
    let resolver = CommandResolver::new(runner.clone(), candidates(3));

    let out = resolver.invoke(&["version"]).await.expect("resolves");

    assert_eq!(out.stdout, b"ok");
    assert_eq!(
        runner.programs(),
        vec!["/opt/mp0/multipass", "/opt/mp1/multipass"]
    );
}

#[tokio::test]
async fn test_invoke_skips_non_executable_candidate() {
    let runner = ScriptedRunner::new([Reply::PermissionDenied, Reply::Exit(ok_output(b""))]);
    let resolver = CommandResolver::new(runner.clone(), candidates(2));

    assert!(resolver.invoke(&["list"]).await.is_ok());
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_invoke_non_zero_exit_stops_search() {
    let runner = ScriptedRunner::new([Reply::Exit(err_output(2, b"instance \"x\" does not exist"))]);
    let resolver = CommandResolver::new(runner.clone(), candidates(3));

    let out = resolver.invoke(&["start", "x"]).await.expect("ran");

    assert!(!out.status.success());
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_invoke_spawn_failure_stops_search() {
    let runner = ScriptedRunner::new([Reply::Fail("timed out after 30s".to_string())]);
    let resolver = CommandResolver::new(runner.clone(), candidates(3));

    let err = resolver.invoke(&["list"]).await.expect_err("spawn error");

    assert!(matches!(err, InvokeError::Spawn(ref m) if m.contains("timed out")));
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_invoke_reports_not_installed_with_every_candidate() {
    let runner = ScriptedRunner::new([Reply::NotFound, Reply::NotFound]);
    let resolver = CommandResolver::new(runner.clone(), candidates(2));

    let err = resolver.invoke(&["list"]).await.expect_err("nothing resolves");

    match err {
        InvokeError::NotInstalled { tried } => {
            assert!(tried.contains("/opt/mp0/multipass"));
            assert!(tried.contains("/opt/mp1/multipass"));
        }
        InvokeError::Spawn(m) => panic!("expected NotInstalled, got Spawn({m})"),
    }
}

#[tokio::test]
async fn test_invoke_with_no_candidates_is_not_installed() {
    let runner = ScriptedRunner::default();
    let resolver = CommandResolver::new(runner.clone(), Vec::new());

    assert!(matches!(
        resolver.invoke(&["list"]).await,
        Err(InvokeError::NotInstalled { .. })
    ));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_invoke_streaming_retries_whole_spawn() {
    let runner = ScriptedRunner::new([
        Reply::NotFound,
        Reply::Exit(ok_output(b"Retrieving image: 10%\rRetrieving image: 90%\nLaunching dev\n")),
    ]);
    let resolver = CommandResolver::new(runner.clone(), candidates(2));
    let mut lines = Vec::new();

    resolver
        .invoke_streaming(&["launch", "--name", "dev"], &mut |l: &str| lines.push(l.to_string()))
        .await
        .expect("resolves");

    assert_eq!(runner.calls().len(), 2);
    assert_eq!(
        lines,
        vec!["Retrieving image: 10%", "Retrieving image: 90%", "Launching dev"]
    );
}

proptest! {
    #[test]
    fn prop_first_k_missing_then_success_invokes_k_plus_one(k in 0usize..6, extra in 0usize..3) {
        let mut replies: Vec<Reply> = (0..k).map(|_| Reply::NotFound).collect();
        replies.push(Reply::Exit(ok_output(b"found")));
        let runner = ScriptedRunner::new(replies);
        let resolver = CommandResolver::new(runner.clone(), candidates(k + 1 + extra));

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let out = rt.block_on(resolver.invoke(&["list"])).expect("resolves");

        prop_assert_eq!(out.stdout, b"found".to_vec());
        prop_assert_eq!(runner.calls().len(), k + 1);
        prop_assert_eq!(&runner.programs()[k], &format!("/opt/mp{k}/multipass"));
    }
}
