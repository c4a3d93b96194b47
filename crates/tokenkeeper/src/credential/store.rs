// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: JSON records in the state directory, written
//! atomically (unique temp file + rename).

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credential::{BackupCredentialSet, Capability, CredentialSet, HealthStatus, SessionMetadata};
use crate::error::StoreError;

pub const PRIMARY_FILE: &str = "tokens.json";
pub const BACKUP_FILE: &str = "tokens_backup.json";
pub const SESSION_FILE: &str = "session.json";
pub const NOTIFICATION_FILE: &str = "auth_failure_notice.txt";
pub const REPORT_FILE: &str = "token_status.json";

/// Outcome of the most recent health check, for operators and `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: HealthStatus,
    pub message: String,
    pub timestamp: u64,
    /// RFC 3339 rendering of `timestamp`.
    pub datetime: String,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_auth: Option<u64>,
    #[serde(default)]
    pub capability: Capability,
    /// `expires_at` of the primary file when the report was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_expires_at: Option<u64>,
    pub next_check_secs: u64,
}

/// Durable storage for every file the keeper owns. No business logic.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(PRIMARY_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn notification_path(&self) -> PathBuf {
        self.dir.join(NOTIFICATION_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    /// Load the primary credential. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<CredentialSet>, StoreError> {
        let path = self.primary_path();
        let creds: Option<CredentialSet> = read_json(&path)?;
        match creds {
            Some(c) if c.access_token.is_empty() => Err(StoreError::Corrupt {
                path,
                reason: "empty access_token".to_owned(),
            }),
            other => Ok(other),
        }
    }

    pub fn save(&self, creds: &CredentialSet) -> Result<(), StoreError> {
        write_json(&self.primary_path(), creds)
    }

    pub fn load_backup(&self) -> Result<Option<BackupCredentialSet>, StoreError> {
        let path = self.backup_path();
        let backup: Option<BackupCredentialSet> = read_json(&path)?;
        match backup {
            Some(b) if b.credentials.access_token.is_empty() => Err(StoreError::Corrupt {
                path,
                reason: "empty access_token".to_owned(),
            }),
            other => Ok(other),
        }
    }

    pub fn save_backup(&self, backup: &BackupCredentialSet) -> Result<(), StoreError> {
        write_json(&self.backup_path(), backup)
    }

    pub fn load_session(&self) -> Result<Option<SessionMetadata>, StoreError> {
        read_json(&self.session_path())
    }

    pub fn save_session(&self, session: &SessionMetadata) -> Result<(), StoreError> {
        write_json(&self.session_path(), session)
    }

    pub fn notification_exists(&self) -> bool {
        self.notification_path().exists()
    }

    pub fn write_notification(&self, text: &str) -> Result<(), StoreError> {
        write_atomic(&self.notification_path(), text.as_bytes())
    }

    /// Remove the notification artifact. Returns whether one was present.
    pub fn clear_notification(&self) -> Result<bool, StoreError> {
        let path = self.notification_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    pub fn load_report(&self) -> Result<Option<StatusReport>, StoreError> {
        read_json(&self.report_path())
    }

    pub fn save_report(&self, report: &StatusReport) -> Result<(), StoreError> {
        write_json(&self.report_path(), report)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::Io { path: path.to_owned(), source }),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| StoreError::Corrupt { path: path.to_owned(), reason: e.to_string() })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Corrupt { path: path.to_owned(), reason: e.to_string() })?;
    write_atomic(path, json.as_bytes())
}

/// Write `bytes` to `path` atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent writers in this
/// or another process never share a `.tmp` file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let io_err = |source| StoreError::Io { path: path.to_owned(), source };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    if let Err(e) = std::fs::write(&tmp_path, bytes) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
