// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::run_until;
use crate::credential::store::CredentialStore;
use crate::test_support::{credential, token_body, MockProvider};

#[tokio::test]
async fn monitor_refreshes_then_stops_on_cancel() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let dir = tempfile::tempdir()?;
    let state = dir.path().join("state");
    let store = CredentialStore::new(&state);
    store.save(&credential("expiring", Some("refresh"), 60))?;
    mock.set_refresh(200, token_body("renewed", None, 3600));

    let config = mock.config(&state);
    let shutdown = CancellationToken::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_until(&config, shutdown).await })
    };

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.load_report()?.is_none() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    let code = tokio::time::timeout(Duration::from_secs(5), task).await???;
    assert_eq!(code, 0);
    assert_eq!(mock.refresh_calls(), 1);

    let stored = store.load()?.ok_or_else(|| anyhow::anyhow!("no credential"))?;
    assert_eq!(stored.access_token, "renewed");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
    Ok(())
}

#[tokio::test]
async fn monitor_creates_state_dir() -> anyhow::Result<()> {
    let mock = MockProvider::start().await?;
    let dir = tempfile::tempdir()?;
    let state = dir.path().join("nested/state");

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    assert_eq!(run_until(&mock.config(&state), shutdown).await?, 0);
    assert!(state.is_dir());
    Ok(())
}
