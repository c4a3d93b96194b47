// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth token refresh with classification and retries.

use std::fmt;
use std::time::Duration;

use crate::credential::provider::ProviderClient;
use crate::credential::TokenResponse;
use crate::error::ErrorKind;

/// Failure of a token endpoint call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The grant or the client was rejected. Retrying with the same input cannot succeed.
    Permanent(String),
    /// Network error, timeout, rate limit, or server error.
    Transient(String),
}

impl RefreshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Permanent(_) => ErrorKind::PermanentGrant,
            Self::Transient(_) => ErrorKind::TransientNetwork,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Permanent(m) | Self::Transient(m) => m,
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for RefreshError {}

impl From<reqwest::Error> for RefreshError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transient(e.to_string())
    }
}

/// Classify a non-success token endpoint response.
///
/// `invalid_grant` on 400 means the refresh token is dead. `invalid_client`
/// and `unauthorized_client` on 400/401 mean the client itself is rejected.
/// Everything else, including 429 and 5xx, is transient.
pub fn classify(status: u16, body: &str) -> RefreshError {
    let code = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned));
    let code = code.as_deref().unwrap_or_else(|| {
        ["invalid_grant", "invalid_client", "unauthorized_client"]
            .into_iter()
            .find(|c| body.contains(c))
            .unwrap_or("")
    });

    let msg = format!("token endpoint returned {status}: {}", body.trim());
    match (status, code) {
        (400, "invalid_grant") => RefreshError::Permanent(msg),
        (400 | 401, "invalid_client" | "unauthorized_client") => RefreshError::Permanent(msg),
        _ => RefreshError::Transient(msg),
    }
}

/// Bounded exponential backoff for transient refresh failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed: `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Refresh with exponential backoff retries.
///
/// Uses the same refresh token on every attempt. Stops at the first permanent
/// failure.
pub async fn refresh_with_retries(
    provider: &ProviderClient,
    refresh_token: &str,
    policy: &RetryPolicy,
) -> Result<TokenResponse, RefreshError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match provider.exchange_refresh_token(refresh_token).await {
            Ok(token) => return Ok(token),
            Err(e @ RefreshError::Permanent(_)) => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(e);
                }
                let delay = policy.delay(attempt - 1);
                tracing::debug!(attempt, err = %e, delay_ms = delay.as_millis() as u64, "refresh attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
