// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Error classes shared by the refresh, recovery, and storage layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network error, timeout, 5xx, or rate limit. Retried locally.
    TransientNetwork,
    /// Refresh token revoked or client rejected. Never retried with the same token.
    PermanentGrant,
    /// A durable write or read failed; the in-memory credential stays authoritative.
    Storage,
    /// Probe result disagrees with the local clock or with an API failure.
    ProbeAmbiguous,
    /// Every recovery strategy failed; a human must re-authorize.
    Unrecoverable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "TRANSIENT_NETWORK",
            Self::PermanentGrant => "PERMANENT_GRANT",
            Self::Storage => "STORAGE",
            Self::ProbeAmbiguous => "PROBE_AMBIGUOUS",
            Self::Unrecoverable => "UNRECOVERABLE",
        }
    }

    /// Whether a later check may succeed without human action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork | Self::Storage | Self::ProbeAmbiguous)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only failure surfaced to callers of the state machine.
///
/// `kind` is [`ErrorKind::Unrecoverable`] once recovery is exhausted, or
/// [`ErrorKind::TransientNetwork`] when the credential has expired and the
/// provider cannot be reached right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unrecoverable {
    pub kind: ErrorKind,
    pub reason: String,
}

impl Unrecoverable {
    pub fn exhausted(reason: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Unrecoverable, reason: reason.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { kind: ErrorKind::TransientNetwork, reason: reason.into() }
    }
}

impl fmt::Display for Unrecoverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl std::error::Error for Unrecoverable {}

/// Failure of a durable read or write in the credential store.
#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: std::io::Error },
    /// The file exists but does not hold a valid record.
    Corrupt { path: PathBuf, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Corrupt { path, reason } => write!(f, "{}: corrupt: {reason}", path.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Corrupt { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
