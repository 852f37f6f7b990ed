//! List, info and find through `MultipassProvisioner` with a scripted runner.

#![allow(clippy::expect_used)]

use multipass_run::application::services::registry::{
    find_images, get_instance_info, list_instances,
};
use multipass_run::domain::{ErrorKind, InstanceState};
use multipass_run::infra::provisioner::MultipassProvisioner;

use crate::helpers::{Reply, ScriptedRunner, err_output, ok_output};

fn provisioner(replies: Vec<Reply>) -> (MultipassProvisioner<ScriptedRunner>, ScriptedRunner) {
    let runner = ScriptedRunner::new(replies);
    let mp = MultipassProvisioner::new(
        runner.clone(),
        vec!["multipass".to_string(), "/snap/bin/multipass".to_string()],
    );
    (mp, runner)
}

#[tokio::test]
async fn test_list_partitions_active_and_deleted() {
    let body = br#"{"list":[
        {"name":"dev1","state":"Running","ipv4":["10.0.0.2"],"release":"22.04 LTS"},
        {"name":"old","state":"DELETED","ipv4":[],"release":"20.04 LTS"}
    ]}"#;
    let (mp, runner) = provisioner(vec![Reply::Exit(ok_output(body))]);

    let lists = list_instances(&mp).await;

    assert!(lists.error.is_none());
    assert_eq!(lists.active.len(), 1);
    assert_eq!(lists.active[0].name, "dev1");
    assert_eq!(lists.active[0].state, InstanceState::Running);
    assert_eq!(lists.active[0].ipv4.as_deref(), Some("10.0.0.2"));
    assert_eq!(lists.deleted.len(), 1);
    assert_eq!(lists.deleted[0].name, "old");
    assert_eq!(runner.calls()[0].1, vec!["list", "--format", "json"]);
}

#[tokio::test]
async fn test_list_not_installed_when_no_candidate_resolves() {
    let (mp, runner) = provisioner(vec![Reply::NotFound, Reply::NotFound]);

    let lists = list_instances(&mp).await;

    assert!(lists.active.is_empty());
    assert_eq!(lists.error_kind(), Some(ErrorKind::NotInstalled));
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_list_daemon_not_running_from_socket_error() {
    let (mp, _) = provisioner(vec![Reply::Exit(err_output(
        2,
        b"list failed: cannot connect to the multipass socket",
    ))]);

    let lists = list_instances(&mp).await;

    assert_eq!(lists.error_kind(), Some(ErrorKind::DaemonNotRunning));
}

#[tokio::test]
async fn test_list_other_failure_keeps_message() {
    let (mp, _) = provisioner(vec![Reply::Exit(err_output(1, b"something odd happened"))]);

    let lists = list_instances(&mp).await;

    let err = lists.error.expect("error recorded");
    assert_eq!(err.kind, ErrorKind::Other);
    assert_eq!(err.message, "something odd happened");
}

#[tokio::test]
async fn test_list_invalid_json_is_other() {
    let (mp, _) = provisioner(vec![Reply::Exit(ok_output(b"not json"))]);

    assert_eq!(list_instances(&mp).await.error_kind(), Some(ErrorKind::Other));
}

#[tokio::test]
async fn test_info_parses_record() {
    let body = br#"{"info":{"dev1":{
        "state":"Running","ipv4":["10.0.0.2"],"release":"24.04 LTS",
        "zone":{"name":"zone1"},"snapshot_count":"1","cpu_count":"2",
        "load":[0.5,0.25,0.1],
        "disks":{"sda1":{"used":"1073741824","total":"5368709120"}},
        "memory":{"used":536870912,"total":1073741824},
        "mounts":{}
    }}}"#;
    let (mp, runner) = provisioner(vec![Reply::Exit(ok_output(body))]);

    let info = get_instance_info(&mp, "dev1").await.expect("info");

    assert_eq!(info.zone, "zone1");
    assert_eq!(info.snapshot_count, 1);
    assert_eq!(info.disk_display(), "1.00 GB / 5.00 GB");
    assert_eq!(info.memory_display(), "0.50 GB / 1.00 GB");
    assert_eq!(info.mounts_display(), "--");
    assert_eq!(
        runner.calls()[0].1,
        vec!["info", "dev1", "--format", "json"]
    );
}

#[tokio::test]
async fn test_info_unknown_instance_is_error() {
    let (mp, _) = provisioner(vec![Reply::Exit(err_output(
        2,
        b"info failed: instance \"ghost\" does not exist",
    ))]);

    let err = get_instance_info(&mp, "ghost").await.expect_err("missing");

    assert_eq!(err.kind, ErrorKind::Other);
    assert!(err.message.contains("does not exist"));
}

#[tokio::test]
async fn test_find_prefers_deprecated_blueprints_and_sorts_lts_first() {
    let body = br#"{
        "errors": [],
        "images": {
            "22.04": {"aliases":["jammy"],"os":"Ubuntu","release":"22.04 LTS","remote":"","version":"20240101"},
            "24.10": {"aliases":["oracular"],"os":"Ubuntu","release":"24.10","remote":"","version":"20240201"},
            "24.04": {"aliases":["noble","lts"],"os":"Ubuntu","release":"24.04 LTS","remote":"","version":"20240301"}
        },
        "blueprints": {"old": {}},
        "blueprints (deprecated)": {"docker": {}, "minikube": {}}
    }"#;
    let (mp, _) = provisioner(vec![Reply::Exit(ok_output(body))]);

    let result = find_images(&mp).await.expect("catalog");

    assert_eq!(result.blueprints.len(), 2);
    assert!(result.blueprints.contains_key("docker"));
    let order: Vec<&str> = result
        .sorted_images()
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(order, vec!["24.04", "22.04", "24.10"]);
}

#[tokio::test]
async fn test_find_failure_is_none() {
    let (mp, _) = provisioner(vec![Reply::Exit(err_output(1, b"remote unavailable"))]);

    assert!(find_images(&mp).await.is_none());
}
