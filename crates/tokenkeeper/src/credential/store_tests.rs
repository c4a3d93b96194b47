// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{credential, write_raw};

#[test]
fn missing_files_load_as_none() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path());
    assert!(store.load()?.is_none());
    assert!(store.load_backup()?.is_none());
    assert!(store.load_session()?.is_none());
    assert!(store.load_report()?.is_none());
    assert!(!store.notification_exists());
    assert!(!store.clear_notification()?);
    Ok(())
}

#[test]
fn save_then_load_primary() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path().join("nested"));
    let creds = credential("access", Some("refresh"), 3600);
    store.save(&creds)?;
    assert_eq!(store.load()?, Some(creds));
    Ok(())
}

#[test]
fn reads_files_written_by_external_bootstrap() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_raw(
        dir.path(),
        PRIMARY_FILE,
        r#"{"access_token": "BQD", "refresh_token": "AQC", "expires_at": 1760000000.123, "scope": "user-read-playback-state"}"#,
    )?;
    write_raw(dir.path(), SESSION_FILE, r#"{"device_id": "abc"}"#)?;

    let store = CredentialStore::new(dir.path());
    let creds = store.load()?.ok_or_else(|| anyhow::anyhow!("no credentials"))?;
    assert_eq!(creds.access_token, "BQD");
    assert_eq!(creds.expires_at, 1_760_000_000);

    let session = store.load_session()?.ok_or_else(|| anyhow::anyhow!("no session"))?;
    assert_eq!(session.device_id.as_deref(), Some("abc"));
    assert_eq!(session.auth_retry_count, 0);
    Ok(())
}

#[yare::parameterized(
    not_json = { "{not json" },
    missing_expiry = { r#"{"access_token": "a"}"# },
    empty_token = { r#"{"access_token": "", "expires_at": 5}"# },
    empty_file = { "" },
)]
fn corrupt_primary_is_reported(contents: &str) {
    let dir = tempfile::tempdir().expect("tempdir");
    write_raw(dir.path(), PRIMARY_FILE, contents).expect("write");
    let store = CredentialStore::new(dir.path());
    match store.load() {
        Err(StoreError::Corrupt { path, .. }) => assert_eq!(path, store.primary_path()),
        other => unreachable!("expected corrupt error, got {other:?}"),
    }
}

#[test]
fn backup_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path());
    let backup = BackupCredentialSet { credentials: credential("a", Some("r"), 60), backup_time: 1_700_000_000 };
    store.save_backup(&backup)?;
    assert_eq!(store.load_backup()?, Some(backup));
    Ok(())
}

#[test]
fn notification_lifecycle() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path());
    store.write_notification("re-authorize")?;
    assert!(store.notification_exists());
    assert_eq!(std::fs::read_to_string(store.notification_path())?, "re-authorize");
    assert!(store.clear_notification()?);
    assert!(!store.notification_exists());
    Ok(())
}

#[test]
fn writes_leave_no_temp_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path());
    for i in 0..10 {
        store.save(&credential(&format!("a{i}"), None, 60))?;
    }
    let names: Vec<String> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![PRIMARY_FILE.to_owned()]);
    Ok(())
}

#[test]
fn concurrent_writers_never_tear_the_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || -> Result<(), StoreError> {
                for j in 0..20 {
                    store.save(&credential(&format!("writer{i}-{j}"), Some("r"), 60))?;
                    store.load()?;
                }
                Ok(())
            })
        })
        .collect();
    for h in handles {
        h.join().map_err(|_| anyhow::anyhow!("writer panicked"))??;
    }
    assert!(store.load()?.is_some_and(|c| c.access_token.starts_with("writer")));
    Ok(())
}

#[test]
fn report_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CredentialStore::new(dir.path());
    let report = StatusReport {
        status: HealthStatus::Degraded,
        message: "limited grant".to_owned(),
        timestamp: 1_700_000_000,
        datetime: "2023-11-14T22:13:20+00:00".to_owned(),
        consecutive_failures: 0,
        last_successful_auth: Some(1_699_999_000),
        capability: Capability::Limited,
        credential_expires_at: Some(1_700_000_600),
        next_check_secs: 300,
    };
    store.save_report(&report)?;
    assert_eq!(store.load_report()?, Some(report));

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(store.report_path())?)?;
    assert_eq!(raw["status"], "degraded");
    assert_eq!(raw["capability"], "limited");
    Ok(())
}
