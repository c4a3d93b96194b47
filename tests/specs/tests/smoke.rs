// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `tokenkeeper` binary against a
//! mock provider and inspect the files it leaves behind.

use std::time::Duration;

use tokenkeeper::credential::store::{CredentialStore, StatusReport};
use tokenkeeper::credential::HealthStatus;
use tokenkeeper::test_support::{credential, error_body, token_body, MockProvider};
use tokenkeeper_specs::{wait_for, Keeper};

const TIMEOUT: Duration = Duration::from_secs(20);
/// Prefix `args` with the mock provider's client id.
fn with_client<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut full: Vec<&'a str> = vec!["--client-id", "test-client"];
    full.extend_from_slice(args);
    full
}

// -- check --------------------------------------------------------------------

#[tokio::test]
async fn check_without_client_id_is_config_error() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;

    let out = keeper.run(&["check"], TIMEOUT).await?;
    assert_eq!(out.code, Some(2), "{out:?}");
    assert!(out.stderr.contains("--client-id"), "{out:?}");
    Ok(())
}

#[tokio::test]
async fn check_refreshes_expiring_credential() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;
    let store = CredentialStore::new(keeper.state_dir());
    store.save(&credential("old-access", Some("keep-me"), 120))?;
    mock.set_refresh(200, token_body("new-access", None, 3600));

    let out = keeper.run(&with_client(&["check"]), TIMEOUT).await?;
    assert_eq!(out.code, Some(0), "{out:?}");
    assert!(out.stdout.starts_with("ready"), "{out:?}");

    let stored = store.load()?.ok_or_else(|| anyhow::anyhow!("no credential"))?;
    assert_eq!(stored.access_token, "new-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("keep-me"));
    let backup = store.load_backup()?.ok_or_else(|| anyhow::anyhow!("no backup"))?;
    assert_eq!(backup.credentials.access_token, "old-access");

    let requests = mock.token_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].form.get("refresh_token").map(String::as_str), Some("keep-me"));
    Ok(())
}

#[tokio::test]
async fn check_exhausted_writes_notice_and_exits_one() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;
    let store = CredentialStore::new(keeper.state_dir());
    store.save(&credential("dead", Some("revoked"), -60))?;
    mock.set_refresh(400, error_body("invalid_grant"));

    let out = keeper.run(&with_client(&["check"]), TIMEOUT).await?;
    assert_eq!(out.code, Some(1), "{out:?}");
    assert!(store.notification_exists());
    assert_eq!(mock.refresh_calls(), 1);

    let report: StatusReport = store.load_report()?.ok_or_else(|| anyhow::anyhow!("no report"))?;
    assert_eq!(report.status, HealthStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn check_serves_limited_grant_with_client_secret() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?.with_client_secret("shh");
    CredentialStore::new(keeper.state_dir()).save(&credential("dead", Some("revoked"), -60))?;
    mock.set_refresh(400, error_body("invalid_grant"));
    mock.set_client_credentials(200, token_body("app-only", None, 3600));

    let out = keeper.run(&with_client(&["check"]), TIMEOUT).await?;
    assert_eq!(out.code, Some(0), "{out:?}");
    assert!(out.stdout.starts_with("degraded"), "{out:?}");

    let status = keeper.run(&["status", "--json"], TIMEOUT).await?;
    assert_eq!(status.code, Some(0), "{status:?}");
    let json: serde_json::Value = serde_json::from_str(&status.stdout)?;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["capability"], "limited");
    Ok(())
}

// -- status -------------------------------------------------------------------

#[tokio::test]
async fn status_on_empty_state_reports_no_credentials() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;

    let out = keeper.run(&["status"], TIMEOUT).await?;
    assert_eq!(out.code, Some(1), "{out:?}");
    assert!(out.stdout.contains("status: no_credentials"), "{out:?}");
    assert_eq!(std::fs::read_dir(keeper.state_dir())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn status_probe_reports_acceptance() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;
    CredentialStore::new(keeper.state_dir()).save(&credential("live", Some("refresh"), 3600))?;
    mock.accept_token("live");

    let out = keeper.run(&["status", "--probe", "--json"], TIMEOUT).await?;
    assert_eq!(out.code, Some(0), "{out:?}");
    let json: serde_json::Value = serde_json::from_str(&out.stdout)?;
    assert_eq!(json["status"], "valid");
    assert_eq!(json["probe"], "accepted");
    assert_eq!(json["notification"], false);
    assert_eq!(mock.refresh_calls(), 0);
    Ok(())
}

// -- monitor ------------------------------------------------------------------

#[tokio::test]
async fn monitor_refreshes_and_exits_on_sigterm() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;
    let store = CredentialStore::new(keeper.state_dir());
    store.save(&credential("old-access", Some("refresh"), 30))?;
    mock.set_refresh(200, token_body("monitored", Some("rotated"), 3600));

    let mut process = keeper.spawn(&with_client(&["monitor"]))?;
    wait_for(TIMEOUT, || store.load_report().ok().flatten().is_some()).await?;

    let stored = store.load()?.ok_or_else(|| anyhow::anyhow!("no credential"))?;
    assert_eq!(stored.access_token, "monitored");
    assert_eq!(stored.refresh_token.as_deref(), Some("rotated"));

    process.terminate().await?;
    let status = process.wait_exit(TIMEOUT).await?;
    assert!(status.success(), "monitor exited with {status}");
    Ok(())
}

#[tokio::test]
async fn monitor_picks_up_external_reauthorization() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let keeper = Keeper::new(&mock)?;
    let store = CredentialStore::new(keeper.state_dir());

    let mut process = keeper.spawn(&with_client(&["monitor"]))?;
    wait_for(TIMEOUT, || store.notification_exists()).await?;

    // The bootstrap flow writes a fresh user credential.
    mock.accept_token("reauthorized");
    store.save(&credential("reauthorized", Some("refresh"), 3600))?;
    wait_for(TIMEOUT, || {
        let recovered = store.load_report().ok().flatten().is_some_and(|r| r.consecutive_failures == 0);
        recovered && !store.notification_exists()
    })
    .await?;

    let report = store.load_report()?.ok_or_else(|| anyhow::anyhow!("no report"))?;
    assert_eq!(report.status, HealthStatus::Valid);

    process.terminate().await?;
    assert!(process.wait_exit(TIMEOUT).await?.success());
    Ok(())
}
