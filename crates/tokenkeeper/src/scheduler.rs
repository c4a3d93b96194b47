// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background health checker for the credential.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::credential::machine::AuthStateMachine;
use crate::credential::store::StatusReport;
use crate::credential::{epoch_secs, AuthOutcome};
use crate::error::Unrecoverable;

/// Check cadence with backoff after repeated failures.
///
/// Up to `threshold` consecutive failures keep the base interval. Each
/// further failure doubles it, capped at `max_factor` times the base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPolicy {
    base: Duration,
    threshold: u32,
    max_factor: u32,
    consecutive_failures: u32,
}

impl IntervalPolicy {
    pub fn new(base: Duration, threshold: u32, max_factor: u32) -> Self {
        Self { base, threshold, max_factor: max_factor.max(1), consecutive_failures: 0 }
    }

    /// Start from a failure count carried over from an earlier run.
    pub fn with_failures(mut self, failures: u32) -> Self {
        self.consecutive_failures = failures;
        self
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Reset after a successful check. Returns the failure count that was cleared.
    pub fn record_success(&mut self) -> u32 {
        std::mem::take(&mut self.consecutive_failures)
    }

    /// Whether the failure count is past the threshold.
    pub fn should_notify(&self) -> bool {
        self.consecutive_failures > self.threshold
    }

    pub fn current(&self) -> Duration {
        let extra = self.consecutive_failures.saturating_sub(self.threshold);
        let factor = 1u32.checked_shl(extra).unwrap_or(u32::MAX).min(self.max_factor);
        self.base.saturating_mul(factor)
    }
}

/// Periodically runs [`AuthStateMachine::health_check`] and keeps the
/// operator-facing artifacts (notice, status report) current.
pub struct HealthScheduler {
    machine: Arc<AuthStateMachine>,
    policy: IntervalPolicy,
    shutdown_grace: Duration,
}

impl HealthScheduler {
    pub fn new(machine: Arc<AuthStateMachine>, policy: IntervalPolicy, shutdown_grace: Duration) -> Self {
        Self { machine, policy, shutdown_grace }
    }

    /// Run one check and apply its result to the interval policy.
    pub async fn tick(&mut self) -> Result<AuthOutcome, Unrecoverable> {
        let result = self.machine.health_check().await;
        match &result {
            Ok(outcome) => {
                let cleared = self.policy.record_success();
                if cleared > 0 {
                    tracing::info!(failures = cleared, degraded = outcome.is_degraded(), "credential health restored");
                }
                self.machine.clear_notification();
            }
            Err(e) => {
                self.policy.record_failure();
                tracing::warn!(
                    code = e.kind.as_str(),
                    retryable = e.kind.is_retryable(),
                    failures = self.policy.consecutive_failures(),
                    next_check_secs = self.policy.current().as_secs(),
                    err = %e.reason,
                    "health check failed"
                );
                if self.policy.should_notify() {
                    self.machine.raise_notification(&e.reason);
                }
            }
        }
        let report = self.report(&result).await;
        self.machine.record_report(&report);
        result
    }

    async fn report(&self, result: &Result<AuthOutcome, Unrecoverable>) -> StatusReport {
        let now = epoch_secs();
        let message = match result {
            Ok(AuthOutcome::Ready(r)) => format!("credential valid for {} minutes", r.expires_at.saturating_sub(now) / 60),
            Ok(AuthOutcome::Degraded(_)) => "serving capability-limited grant".to_owned(),
            Err(e) => e.to_string(),
        };
        StatusReport {
            status: self.machine.health_status().await,
            message,
            timestamp: now,
            datetime: rfc3339(now),
            consecutive_failures: self.policy.consecutive_failures(),
            last_successful_auth: self.machine.session().await.last_successful_auth,
            capability: self.machine.capability().await,
            credential_expires_at: self.machine.credentials().await.map(|c| c.expires_at),
            next_check_secs: self.policy.current().as_secs(),
        }
    }

    /// Tick until `shutdown` fires.
    ///
    /// A check already in flight at shutdown may finish within the grace
    /// period. While the last check failed, a change to the primary
    /// credential file triggers an early check.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _watcher = watch_credential_dir(&self.machine.store().primary_path(), wake_tx);
        let grace = self.shutdown_grace;

        loop {
            // The check reads the file anyway.
            while wake_rx.try_recv().is_ok() {}
            {
                let tick = self.tick();
                tokio::pin!(tick);
                tokio::select! {
                    _ = &mut tick => {}
                    _ = shutdown.cancelled() => {
                        if tokio::time::timeout(grace, &mut tick).await.is_err() {
                            tracing::warn!(grace_ms = grace.as_millis() as u64, "in-flight health check abandoned at shutdown");
                        }
                        break;
                    }
                }
            }

            let sleep = tokio::time::sleep(self.policy.current());
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = &mut sleep => break,
                    Some(()) = wake_rx.recv() => {
                        if self.policy.consecutive_failures() > 0 {
                            tracing::info!("credential file changed, checking early");
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn rfc3339(epoch: u64) -> String {
    chrono::DateTime::from_timestamp(epoch as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn watch_credential_dir(path: &Path, wake_tx: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let file_name = path.file_name().map(|n| n.to_owned());
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        if event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
            let _ = wake_tx.try_send(());
        }
    })
    .ok()?;

    let watch_path = path.parent().unwrap_or(path);
    if let Err(e) = watcher.watch(watch_path, RecursiveMode::NonRecursive) {
        tracing::debug!(err = %e, path = %watch_path.display(), "credential file watch unavailable");
        return None;
    }
    Some(watcher)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
