//! Rebase label driven by mergeability

mod common;

use common::{handler, FakePlatform, FakeProbe, HEAD_SHA};
use std::sync::Arc;
use wildfly_bot_core::webhook::PullRequestPayload;
use wildfly_bot_core::PullRequestSnapshot;

const POLICY: &str = "wildfly:\n  rules: []\n";

/// `opened` payload as GitHub sends it before mergeability is computed
fn payload(mergeable: &str, labels: &[&str]) -> PullRequestSnapshot {
    let labels: Vec<String> = labels
        .iter()
        .map(|l| format!("{{\"name\": \"{}\"}}", l))
        .collect();
    let body = format!(
        r#"{{
            "action": "opened",
            "number": 1,
            "pull_request": {{
                "title": "[WFLY-12345] Valid pull request title",
                "body": "Pull request body",
                "user": {{"login": "xstefank"}},
                "head": {{"sha": "{}", "ref": "feature"}},
                "base": {{"sha": "0000", "ref": "main"}},
                "labels": [{}],
                "mergeable": {}
            }},
            "repository": {{"name": "wildfly", "owner": {{"login": "xstefank"}}}}
        }}"#,
        HEAD_SHA,
        labels.join(", "),
        mergeable
    );
    PullRequestPayload::from_slice(body.as_bytes())
        .expect("valid payload")
        .into_snapshot()
}

async fn run(platform: FakePlatform, event: PullRequestSnapshot) -> Arc<FakePlatform> {
    let platform = Arc::new(
        platform
            .with_policy(POLICY)
            .with_commits(["WFLY-1 commit"]),
    );
    let probe = Arc::new(FakeProbe::default());
    handler(&platform, &probe, false)
        .handle(event)
        .await
        .expect("event handled");
    platform
}

#[tokio::test]
async fn test_conflicting_pull_request_gets_rebase_label() {
    let platform = run(FakePlatform::new().with_mergeable(false), payload("null", &[])).await;

    assert_eq!(platform.labels_added(), vec!["rebase-this"]);
    assert!(platform.labels_removed().is_empty());
}

#[tokio::test]
async fn test_rebase_label_removed_once_mergeable() {
    let platform = run(
        FakePlatform::new().with_mergeable(true),
        payload("null", &["rebase-this"]),
    )
    .await;

    assert_eq!(platform.labels_removed(), vec!["rebase-this"]);
    assert!(platform.labels_added().is_empty());
}

#[tokio::test]
async fn test_payload_value_wins_over_platform_read() {
    let platform = run(FakePlatform::new().with_mergeable(true), payload("false", &[])).await;

    assert_eq!(platform.labels_added(), vec!["rebase-this"]);
}

#[tokio::test]
async fn test_unknown_mergeability_leaves_labels_alone() {
    let platform = run(FakePlatform::new(), payload("null", &["rebase-this"])).await;

    assert!(platform.labels_added().is_empty());
    assert!(platform.labels_removed().is_empty());
}
