// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tokenkeeper status` reports credential health without changing state.
//!
//! Reads the primary file, the re-authorization notice, and the last status
//! report. Never refreshes, never writes.

use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::credential::provider::{Probe, ProviderClient};
use crate::credential::store::{StatusReport, NOTIFICATION_FILE};
use crate::credential::{epoch_secs, Capability, CredentialSet, HealthStatus};

/// CLI arguments for `tokenkeeper status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, clap::Args)]
pub struct StatusArgs {
    /// Also ask the provider whether the access token is accepted.
    #[arg(long)]
    pub probe: bool,
    /// Print a JSON snapshot instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Point-in-time view of the credential, as printed by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: HealthStatus,
    pub capability: Capability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub has_refresh_token: bool,
    pub notification: bool,
    /// Set when the primary file exists but cannot be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<StatusReport>,
}

impl StatusSnapshot {
    /// Healthy enough for playback: full or limited capability.
    pub fn is_usable(&self) -> bool {
        matches!(self.status, HealthStatus::Valid | HealthStatus::ExpiringSoon | HealthStatus::Degraded)
    }
}

/// Run the `tokenkeeper status` subcommand. Returns a process exit code.
pub async fn run(config: &Config, args: &StatusArgs) -> anyhow::Result<i32> {
    let snapshot = snapshot(config, args.probe).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_text(&snapshot);
    }
    Ok(if snapshot.is_usable() { 0 } else { 1 })
}

/// Collect the current snapshot, optionally probing the provider.
pub async fn snapshot(config: &Config, probe: bool) -> anyhow::Result<StatusSnapshot> {
    let store = config.store();
    let now = epoch_secs();
    let margin = Duration::from_secs(config.refresh_margin_secs);

    let (credentials, primary_error) = match store.load() {
        Ok(c) => (c, None),
        Err(e) => (None, Some(e.to_string())),
    };
    let last_report = store.load_report().ok().flatten();
    let notification = store.notification_exists();
    let mut status = derive_status(credentials.as_ref(), last_report.as_ref(), notification, now, margin);

    let mut probe_result = None;
    if probe {
        if let Some(creds) = &credentials {
            let client = ProviderClient::new(config.endpoints(), config.http_timeout())?;
            let result = client.probe(&creds.access_token).await;
            if result == Probe::Rejected && matches!(status, HealthStatus::Valid | HealthStatus::ExpiringSoon) {
                status = HealthStatus::Expired;
            }
            probe_result = Some(match result {
                Probe::Accepted => "accepted",
                Probe::Rejected => "rejected",
                Probe::Unreachable(_) => "unreachable",
            });
        }
    }

    Ok(StatusSnapshot {
        status,
        capability: if status == HealthStatus::Degraded { Capability::Limited } else { Capability::Full },
        expires_at: credentials.as_ref().map(|c| c.expires_at),
        expires_in: credentials.as_ref().map(|c| c.expires_in(now)),
        has_refresh_token: credentials.as_ref().is_some_and(|c| c.refresh_token.is_some()),
        notification,
        primary_error,
        probe: probe_result,
        last_report,
    })
}

/// Derive health from files alone.
///
/// A pending notice means recovery was exhausted. A degraded report counts
/// only while the primary file still holds the credential it was written
/// against; any external write supersedes it.
pub fn derive_status(
    credentials: Option<&CredentialSet>,
    report: Option<&StatusReport>,
    notification: bool,
    now: u64,
    margin: Duration,
) -> HealthStatus {
    let Some(creds) = credentials else {
        return if notification { HealthStatus::Failed } else { HealthStatus::NoCredentials };
    };
    let report_current = report.filter(|r| r.credential_expires_at == Some(creds.expires_at));
    if notification && report_current.is_some_and(|r| r.status == HealthStatus::Failed) {
        return HealthStatus::Failed;
    }
    if report_current.is_some_and(|r| r.status == HealthStatus::Degraded) {
        return HealthStatus::Degraded;
    }
    if notification && creds.is_expired(now) {
        return HealthStatus::Failed;
    }
    creds.freshness(now, margin).into()
}

fn print_text(snapshot: &StatusSnapshot) {
    println!("status: {}", snapshot.status);
    if snapshot.capability == Capability::Limited {
        println!("capability: limited (no playback control)");
    }
    if let Some(secs) = snapshot.expires_in {
        if secs > 0 {
            println!("expires in: {}m {}s", secs / 60, secs % 60);
        } else {
            println!("expired: {}m {}s ago", -secs / 60, -secs % 60);
        }
    }
    if !snapshot.has_refresh_token && snapshot.expires_at.is_some() {
        println!("refresh token: missing");
    }
    if let Some(ref err) = snapshot.primary_error {
        println!("primary credential unreadable: {err}");
    }
    if let Some(probe) = snapshot.probe {
        println!("probe: {probe}");
    }
    if snapshot.notification {
        println!("re-authorization required (see {NOTIFICATION_FILE})");
    }
    if let Some(ref report) = snapshot.last_report {
        println!("last check: {} ({})", report.datetime, report.message);
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
