// ABOUTME: Integration tests for update, update_code and symlink as transactions.
// ABOUTME: Injects failures and checks that compensations restore the previous state.

mod support;

use cutover::deploy::{DeployErrorKind, DeployOptions};
use cutover::diagnostics::WarningKind;
use cutover::release::ReleaseName;
use std::sync::Arc;
use support::{
    BrokenStrategy, CopyStrategy, REVISION, RecordingTransport, Site, exists, local_orchestrator,
    orchestrator,
};

#[tokio::test]
async fn update_creates_release_and_repoints_current() {
    support::init_tracing();
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    site.point_current("20230101000000");

    let orch = local_orchestrator(&site);
    let release = orch.update().await.unwrap();

    assert_eq!(site.current_release().as_deref(), Some(release.as_str()));
    let marker = std::fs::read_to_string(site.release_dir(release.as_str()).join("REVISION"));
    assert_eq!(marker.unwrap().trim(), REVISION);
    assert!(!exists(&site.root().join("current.next")));
    assert!(orch.take_warnings().is_empty());
}

#[tokio::test]
async fn update_code_leaves_current_alone() {
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    site.point_current("20230101000000");

    let release = local_orchestrator(&site).update_code().await.unwrap();

    assert!(site.release_dir(release.as_str()).is_dir());
    assert_eq!(site.current_release().as_deref(), Some("20230101000000"));
}

#[tokio::test]
async fn failed_strategy_removes_the_partial_release() {
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    site.point_current("20230101000000");
    let transport = Arc::new(RecordingTransport::new());
    let orch = orchestrator(&site, transport.clone(), BrokenStrategy);

    let err = orch.update().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Strategy);
    assert_eq!(site.releases(), vec!["20230101000000"]);
    assert_eq!(site.current_release().as_deref(), Some("20230101000000"));
    assert!(transport.position("ln -sfn").is_none());
}

#[tokio::test]
async fn failed_symlink_restores_current_then_removes_release() {
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    site.point_current("20230101000000");
    let transport = Arc::new(
        RecordingTransport::new()
            .failing_when(|_, cmd| cmd.contains("ln -sfn") && !cmd.contains("20230101000000")),
    );
    let orch = orchestrator(&site, transport.clone(), CopyStrategy);

    let err = orch.update().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::CommandFailed);
    assert_eq!(err.command_error().and_then(|e| e.exit_status()), Some(1));

    let commands = transport.commands();
    let restore = commands
        .iter()
        .position(|c| c.contains("ln -sfn") && c.contains("20230101000000"))
        .expect("current restored");
    let removal = commands
        .iter()
        .position(|c| c.contains("rm -rf"))
        .expect("release removed");
    assert!(restore < removal, "compensations run newest first: {commands:?}");

    assert_eq!(site.current_release().as_deref(), Some("20230101000000"));
    assert_eq!(site.releases(), vec!["20230101000000"]);
    assert!(orch.take_warnings().is_empty());
}

#[tokio::test]
async fn failed_first_symlink_removes_current_and_warns() {
    let site = Site::new();
    let transport =
        Arc::new(RecordingTransport::new().failing_when(|_, cmd| cmd.contains("ln -sfn")));
    let orch = orchestrator(&site, transport.clone(), CopyStrategy);

    let err = orch.update().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::CommandFailed);
    assert!(!exists(&site.current()));
    assert!(site.releases().is_empty());
    let warnings = orch.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::NoRollbackTarget);
}

#[tokio::test]
async fn failing_compensation_is_a_warning_not_the_error() {
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    site.point_current("20230101000000");
    // every symlink fails, including the one restoring current
    let transport =
        Arc::new(RecordingTransport::new().failing_when(|_, cmd| cmd.contains("ln -sfn")));
    let orch = orchestrator(&site, transport.clone(), CopyStrategy);

    let err = orch.update().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::CommandFailed);
    // the removal still ran after the failed restore
    assert_eq!(site.releases(), vec!["20230101000000"]);
    let warnings = orch.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::RollbackStep);
    assert!(warnings[0].message.contains("point current back at 20230101000000"));
}

#[tokio::test]
async fn standalone_symlink_keeps_current_on_failure() {
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    site.add_release("20230102000000", "bbb");
    site.point_current("20230101000000");
    let transport = Arc::new(
        RecordingTransport::new()
            .failing_when(|_, cmd| cmd.contains("ln -sfn") && cmd.contains("20230102000000")),
    );
    let orch = orchestrator(&site, transport, CopyStrategy);

    orch.symlink().await.unwrap_err();

    assert_eq!(site.current_release().as_deref(), Some("20230101000000"));
    assert_eq!(site.releases().len(), 2);
}

#[tokio::test]
async fn failed_preflight_check_changes_nothing() {
    let site = Site::bare();
    let transport = Arc::new(RecordingTransport::new());
    let orch = orchestrator(&site, transport.clone(), CopyStrategy);

    let err = orch.deploy(DeployOptions::default()).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::DependencyCheckFailed);
    assert!(err.to_string().contains("Please run `cutover setup'"));
    assert!(transport.position("mkdir").is_none());
    assert!(transport.position("ln -sfn").is_none());
    assert!(!exists(&site.root()));
}

#[tokio::test]
async fn deploy_updates_then_cleans_up() {
    let mut site = Site::new();
    site.keep_releases = 2;
    site.add_release("20230101000000", "aaa");
    site.add_release("20230102000000", "bbb");
    site.point_current("20230102000000");

    let release = local_orchestrator(&site)
        .deploy(DeployOptions::default())
        .await
        .unwrap();

    assert_eq!(
        site.releases(),
        vec!["20230102000000".to_string(), release.to_string()]
    );
    assert_eq!(site.current_release().as_deref(), Some(release.as_str()));
}

#[tokio::test]
async fn deploy_keep_all_skips_cleanup() {
    let mut site = Site::new();
    site.keep_releases = 1;
    site.add_release("20230101000000", "aaa");
    site.add_release("20230102000000", "bbb");

    local_orchestrator(&site)
        .deploy(DeployOptions {
            skip_check: true,
            keep_all: true,
        })
        .await
        .unwrap();

    assert_eq!(site.releases().len(), 3);
}

#[tokio::test]
async fn failed_cleanup_after_deploy_is_a_warning() {
    let mut site = Site::new();
    site.keep_releases = 1;
    site.add_release("20230101000000", "aaa");
    site.add_release("20230102000000", "bbb");
    site.point_current("20230102000000");
    let transport = Arc::new(RecordingTransport::new().failing_when(|_, cmd| {
        cmd.contains("rm -rf") && cmd.contains("20230101000000")
    }));
    let orch = orchestrator(&site, transport, CopyStrategy);

    let release = orch
        .deploy(DeployOptions {
            skip_check: true,
            keep_all: false,
        })
        .await
        .unwrap();

    assert_eq!(site.current_release().as_deref(), Some(release.as_str()));
    assert_eq!(site.releases().len(), 3);
    let warnings = orch.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::CleanupFailed);
    assert!(warnings[0].message.contains(release.as_str()));
}

#[tokio::test]
async fn failed_symlink_restores_a_current_outside_releases() {
    let site = Site::new();
    let legacy = site.root().join("legacy");
    std::fs::create_dir_all(&legacy).unwrap();
    std::os::unix::fs::symlink(&legacy, site.current()).unwrap();
    let transport = Arc::new(
        RecordingTransport::new()
            .failing_when(|_, cmd| cmd.contains("ln -sfn") && cmd.contains("/releases/")),
    );
    let orch = orchestrator(&site, transport, CopyStrategy);

    let err = orch.update().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::CommandFailed);
    assert_eq!(std::fs::read_link(site.current()).unwrap(), legacy);
    assert!(site.releases().is_empty());
    assert!(orch.take_warnings().is_empty());
}

#[tokio::test]
async fn existing_release_directory_is_never_reused() {
    let site = Site::new();
    let now = chrono::Utc::now();
    let taken: Vec<String> = (0..60)
        .map(|s| ReleaseName::from_time(now + chrono::Duration::seconds(s)).to_string())
        .collect();
    for name in &taken {
        site.add_release(name, "aaa");
    }
    site.point_current(&taken[0]);
    let transport = Arc::new(RecordingTransport::new());
    let orch = orchestrator(&site, transport.clone(), BrokenStrategy);

    let err = orch.update().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::ReleaseExists);
    assert!(err.to_string().contains("localhost"));
    assert_eq!(site.releases(), taken);
    assert_eq!(site.current_release().as_deref(), Some(taken[0].as_str()));
    assert!(transport.position("rm -rf").is_none());
}

#[tokio::test]
async fn failed_rename_leaves_no_staged_link() {
    let site = Site::new();
    site.add_release("20230101000000", "aaa");
    // a real directory where the link should be makes `mv -T` fail
    std::fs::create_dir_all(site.current().join("keep")).unwrap();

    let err = local_orchestrator(&site).symlink().await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::CommandFailed);
    assert!(!exists(&site.root().join("current.next")));
    assert!(site.current().join("keep").is_dir());
}
