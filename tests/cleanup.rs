// ABOUTME: Integration tests for the release retention policy.
// ABOUTME: Verifies which releases cleanup removes and that the live release survives.

mod support;

use cutover::diagnostics::WarningKind;
use std::sync::Arc;
use support::{CopyStrategy, RecordingTransport, Site, local_orchestrator, orchestrator, release};

fn site_with(names: &[&str], keep: usize) -> Site {
    let mut site = Site::new();
    site.keep_releases = keep;
    for name in names {
        site.add_release(name, "rev");
    }
    site
}

#[tokio::test]
async fn keeps_the_newest_releases() {
    support::init_tracing();
    let site = site_with(&["20230101000000", "20230102000000", "20230103000000"], 2);
    site.point_current("20230103000000");

    let cleanup = local_orchestrator(&site).cleanup().await.unwrap();

    assert_eq!(cleanup.removed, vec![release("20230101000000")]);
    assert_eq!(cleanup.kept, 2);
    assert_eq!(site.releases(), vec!["20230102000000", "20230103000000"]);
}

#[tokio::test]
async fn nothing_to_do_within_the_window() {
    let site = site_with(&["20230101000000", "20230102000000"], 2);
    let transport = Arc::new(RecordingTransport::new());
    let orch = orchestrator(&site, transport.clone(), CopyStrategy);

    let cleanup = orch.cleanup().await.unwrap();

    assert!(cleanup.removed.is_empty());
    assert_eq!(site.releases().len(), 2);
    assert!(transport.position("rm -rf").is_none());
    let warnings = orch.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::NothingToClean);
    assert_eq!(warnings[0].message, "no old releases to clean up");
}

#[tokio::test]
async fn never_removes_the_live_release() {
    let site = site_with(&["20230101000000", "20230102000000", "20230103000000"], 1);
    // manual repoint to an old release
    site.point_current("20230101000000");

    let cleanup = local_orchestrator(&site).cleanup().await.unwrap();

    assert_eq!(cleanup.removed, vec![release("20230102000000")]);
    assert_eq!(site.releases(), vec!["20230101000000", "20230103000000"]);
    assert_eq!(site.current_release().as_deref(), Some("20230101000000"));
}

#[tokio::test]
async fn removes_expired_releases_in_one_batch() {
    let site = site_with(
        &[
            "20230101000000",
            "20230102000000",
            "20230103000000",
            "20230104000000",
        ],
        1,
    );
    let transport = Arc::new(RecordingTransport::new());
    let orch = orchestrator(&site, transport.clone(), CopyStrategy);

    orch.cleanup().await.unwrap();

    let removals: Vec<_> = transport
        .commands()
        .into_iter()
        .filter(|c| c.contains("rm -rf"))
        .collect();
    assert_eq!(removals.len(), 1);
    assert!(removals[0].contains("20230101000000"));
    assert!(removals[0].contains("20230103000000"));
    assert_eq!(site.releases(), vec!["20230104000000"]);
}

#[tokio::test]
async fn keep_zero_without_current_removes_everything() {
    let site = site_with(&["20230101000000", "20230102000000"], 0);

    let cleanup = local_orchestrator(&site).cleanup().await.unwrap();

    assert_eq!(cleanup.removed.len(), 2);
    assert!(site.releases().is_empty());
}
