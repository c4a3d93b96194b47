// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential lifecycle: data model, storage, provider calls, refresh,
//! degraded recovery, and the state machine that ties them together.
//!
//! The primary credential file is shared with the playback controller and is
//! the only channel between the two processes. Both sides read it before
//! writing and replace it with an atomic rename.

pub mod machine;
pub mod provider;
pub mod recovery;
pub mod refresh;
pub mod store;

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};

/// Token lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Saturation point for [`SessionMetadata::auth_retry_count`].
pub const MAX_AUTH_RETRY_COUNT: u32 = 1000;

/// Resolve the state directory for credential files.
///
/// Checks `TOKENKEEPER_STATE_DIR`, then `$XDG_STATE_HOME/tokenkeeper`,
/// then `$HOME/.local/state/tokenkeeper`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOKENKEEPER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tokenkeeper");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/tokenkeeper");
    }
    PathBuf::from(".tokenkeeper")
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// The primary user credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds.
    #[serde(deserialize_with = "de_epoch_secs")]
    pub expires_at: u64,
}

impl CredentialSet {
    /// Seconds until expiry; negative once expired.
    pub fn expires_in(&self, now: u64) -> i64 {
        self.expires_at as i64 - now as i64
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    pub fn freshness(&self, now: u64, margin: Duration) -> Freshness {
        Freshness::of(self.expires_at, now, margin)
    }

    /// Apply a token endpoint response. A missing refresh token keeps the
    /// current one.
    pub fn rotated(&self, token: &TokenResponse, now: u64) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone().or_else(|| self.refresh_token.clone()),
            expires_at: now + token.expires_in_secs(),
        }
    }
}

/// Where a credential sits relative to its expiry and the refresh margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Valid,
    ExpiringSoon,
    Expired,
}

impl Freshness {
    pub fn of(expires_at: u64, now: u64, margin: Duration) -> Self {
        if now >= expires_at {
            Self::Expired
        } else if now >= expires_at.saturating_sub(margin.as_secs()) {
            Self::ExpiringSoon
        } else {
            Self::Valid
        }
    }
}

/// Snapshot of the last known-good primary credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCredentialSet {
    #[serde(flatten)]
    pub credentials: CredentialSet,
    #[serde(default, deserialize_with = "de_epoch_secs")]
    pub backup_time: u64,
}

/// Session bookkeeping persisted next to the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_auth: Option<u64>,
    #[serde(default)]
    pub auth_retry_count: u32,
}

impl SessionMetadata {
    pub fn record_success(&mut self, now: u64) {
        self.last_successful_auth = Some(now);
        self.auth_retry_count = 0;
    }

    pub fn record_failure(&mut self) {
        self.auth_retry_count = (self.auth_retry_count + 1).min(MAX_AUTH_RETRY_COUNT);
    }
}

/// Derived health of the credential. Never persisted as ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    NoCredentials,
    Valid,
    ExpiringSoon,
    Expired,
    Degraded,
    Failed,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredentials => "no_credentials",
            Self::Valid => "valid",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

impl From<Freshness> for HealthStatus {
    fn from(f: Freshness) -> Self {
        match f {
            Freshness::Valid => Self::Valid,
            Freshness::ExpiringSoon => Self::ExpiringSoon,
            Freshness::Expired => Self::Expired,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller may do with the current access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// User-scoped token: playback control allowed.
    #[default]
    Full,
    /// Client-credentials token: no user scope.
    Limited,
}

/// A usable access token handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub access_token: String,
    pub expires_at: u64,
    pub capability: Capability,
}

impl Ready {
    pub fn is_limited(&self) -> bool {
        self.capability == Capability::Limited
    }
}

/// Result of a full bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Ready(Ready),
    Degraded(Ready),
}

impl AuthOutcome {
    pub fn ready(&self) -> &Ready {
        match self {
            Self::Ready(r) | Self::Degraded(r) => r,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Only a limited grant is served while degraded.
impl From<Ready> for AuthOutcome {
    fn from(ready: Ready) -> Self {
        if ready.is_limited() {
            Self::Degraded(ready)
        } else {
            Self::Ready(ready)
        }
    }
}

/// OAuth2 token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }
}

/// Accept integer or fractional epoch seconds.
fn de_epoch_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Secs {
        Int(u64),
        Float(f64),
    }

    match Secs::deserialize(deserializer)? {
        Secs::Int(s) => Ok(s),
        Secs::Float(s) if s.is_finite() && s >= 0.0 => Ok(s as u64),
        Secs::Float(s) => Err(serde::de::Error::custom(format!("invalid timestamp: {s}"))),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
