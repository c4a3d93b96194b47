// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication state machine: owns the credential state, decides when to
//! refresh, and drives degraded-mode recovery.
//!
//! All refresh, recovery, and storage writes happen behind a single async
//! gate. Callers that queued behind an in-flight check reuse its outcome.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::credential::provider::{Probe, ProviderClient};
use crate::credential::recovery::{choose_device, decide, LimitedGrant, RecoveryStep, StepOutcome, Transition};
use crate::credential::refresh::{refresh_with_retries, RefreshError, RetryPolicy};
use crate::credential::store::{CredentialStore, StatusReport};
use crate::credential::{
    epoch_secs, AuthOutcome, BackupCredentialSet, Capability, CredentialSet, Freshness, HealthStatus, Ready,
    SessionMetadata,
};
use crate::error::{ErrorKind, Unrecoverable};

const EXHAUSTED_REASON: &str = "refresh and every recovery strategy failed; re-authorization required";

#[derive(Debug, Clone)]
pub struct MachineSettings {
    /// Refresh this long before expiry.
    pub refresh_margin: Duration,
    pub retry: RetryPolicy,
    /// After a transient refresh failure on a still-usable token, wait this
    /// long before callers trigger another attempt.
    pub refresh_cooldown: Duration,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::from_secs(600),
            retry: RetryPolicy::default(),
            refresh_cooldown: Duration::from_secs(60),
        }
    }
}

/// Coarse lifecycle phase. Valid / expiring / expired are derived from the
/// clock while `Tracking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Uninitialized,
    /// Tracking a user credential.
    Tracking,
    /// The user credential cannot be refreshed; a recovery strategy is in use.
    Degraded,
    /// Recovery exhausted; waiting for an external credential write.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Bootstrap,
    Ensure,
    Unauthorized,
    HealthCheck,
}

impl Request {
    /// Whether a caller may reuse the outcome of a check that completed while
    /// it was waiting on the gate.
    fn shares_inflight(self) -> bool {
        matches!(self, Self::Ensure | Self::Unauthorized)
    }
}

type Checked = Result<Ready, Unrecoverable>;

#[derive(Debug, Clone, Default)]
struct CredentialState {
    phase: Phase,
    credentials: Option<CredentialSet>,
    limited: Option<LimitedGrant>,
    session: SessionMetadata,
    /// Refresh tokens the provider rejected permanently.
    revoked: HashSet<String>,
    /// Primary file content as last read or written by this process.
    last_seen_primary: Option<CredentialSet>,
    /// Credential whose refresh token this process has seen the provider
    /// honor. Only this credential is ever written as the backup.
    known_good: Option<CredentialSet>,
    unpersisted_primary: bool,
    unpersisted_session: bool,
    failure_reason: Option<String>,
    /// After a transient refresh failure, callers are served the existing
    /// token without another attempt until this time.
    retry_after: Option<u64>,
    generation: u64,
    last_outcome: Option<Checked>,
}

impl CredentialState {
    /// Token currently handed to callers.
    fn serving_token(&self) -> Option<String> {
        match self.phase {
            Phase::Degraded => self.limited.as_ref().map(|g| g.access_token.clone()),
            _ => self.credentials.as_ref().map(|c| c.access_token.clone()),
        }
    }
}

/// Credential lifecycle manager for one user credential.
pub struct AuthStateMachine {
    store: CredentialStore,
    provider: ProviderClient,
    settings: MachineSettings,
    state: RwLock<CredentialState>,
    gate: Mutex<()>,
}

impl AuthStateMachine {
    pub fn new(store: CredentialStore, provider: ProviderClient, settings: MachineSettings) -> Self {
        Self {
            store,
            provider,
            settings,
            state: RwLock::new(CredentialState::default()),
            gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Full bootstrap from storage.
    pub async fn authenticate(&self) -> Result<AuthOutcome, Unrecoverable> {
        self.locked(Request::Bootstrap).await.map(AuthOutcome::from)
    }

    /// Return a usable token, refreshing or recovering first when needed.
    /// No I/O while the credential is outside the refresh margin.
    pub async fn ensure_valid(&self) -> Result<Ready, Unrecoverable> {
        if let Some(ready) = self.fast_path().await {
            return Ok(ready);
        }
        self.locked(Request::Ensure).await
    }

    /// The API rejected the current token: refresh now regardless of expiry.
    pub async fn handle_unauthorized(&self) -> Result<Ready, Unrecoverable> {
        self.locked(Request::Unauthorized).await
    }

    /// Scheduler tick: like [`Self::ensure_valid`], but probes a locally
    /// fresh token and re-runs recovery while degraded or failed.
    pub async fn health_check(&self) -> Result<AuthOutcome, Unrecoverable> {
        self.locked(Request::HealthCheck).await.map(AuthOutcome::from)
    }

    pub async fn health_status(&self) -> HealthStatus {
        let st = self.state.read().await;
        match st.phase {
            Phase::Failed => HealthStatus::Failed,
            Phase::Degraded => HealthStatus::Degraded,
            Phase::Uninitialized | Phase::Tracking => match &st.credentials {
                Some(c) => c.freshness(epoch_secs(), self.settings.refresh_margin).into(),
                None => HealthStatus::NoCredentials,
            },
        }
    }

    pub async fn capability(&self) -> Capability {
        let st = self.state.read().await;
        match (st.phase, &st.limited) {
            (Phase::Degraded, Some(_)) => Capability::Limited,
            _ => Capability::Full,
        }
    }

    pub async fn session(&self) -> SessionMetadata {
        self.state.read().await.session.clone()
    }

    /// The user credential currently tracked, if any.
    pub async fn credentials(&self) -> Option<CredentialSet> {
        self.state.read().await.credentials.clone()
    }

    /// Write the re-authorization notice unless one already exists.
    /// Returns whether a new notice was written.
    pub fn raise_notification(&self, reason: &str) -> bool {
        if self.store.notification_exists() {
            return false;
        }
        match self.store.write_notification(&notification_text(reason, &self.store.primary_path())) {
            Ok(()) => {
                tracing::warn!(path = %self.store.notification_path().display(), "re-authorization notice written");
                true
            }
            Err(e) => {
                tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "failed to write re-authorization notice");
                false
            }
        }
    }

    /// Remove the re-authorization notice. Returns whether one was removed.
    pub fn clear_notification(&self) -> bool {
        match self.store.clear_notification() {
            Ok(true) => {
                tracing::info!("authentication restored, re-authorization notice removed");
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "failed to remove re-authorization notice");
                false
            }
        }
    }

    pub fn record_report(&self, report: &StatusReport) {
        if let Err(e) = self.store.save_report(report) {
            tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "failed to write status report");
        }
    }

    async fn fast_path(&self) -> Option<Ready> {
        let st = self.state.read().await;
        let now = epoch_secs();
        let margin = self.settings.refresh_margin;
        match st.phase {
            Phase::Tracking => st
                .credentials
                .as_ref()
                .filter(|c| c.freshness(now, margin) == Freshness::Valid)
                .map(full_ready),
            Phase::Degraded => st.limited.as_ref().filter(|g| g.is_fresh(now, margin)).map(limited_ready),
            Phase::Uninitialized | Phase::Failed => None,
        }
    }

    /// Run one check behind the gate on a working copy of the state, then
    /// publish the copy and the outcome.
    ///
    /// An unauthorized caller never reuses an outcome that hands back the
    /// token it was just refused.
    async fn locked(&self, request: Request) -> Checked {
        let (seen, held) = {
            let st = self.state.read().await;
            (st.generation, st.serving_token())
        };
        let _gate = self.gate.lock().await;

        let mut st = self.state.read().await.clone();
        if request.shares_inflight() && st.generation != seen {
            if let Some(outcome) = st.last_outcome.clone() {
                let refused = request == Request::Unauthorized
                    && outcome.as_ref().is_ok_and(|r| held.as_deref() == Some(r.access_token.as_str()));
                if !refused {
                    tracing::debug!(generation = st.generation, "reusing outcome of concurrent check");
                    return outcome;
                }
                tracing::debug!(generation = st.generation, "concurrent check returned the rejected token, refreshing");
            }
        }

        let outcome = self.check(&mut st, request).await;
        if outcome.is_ok() && self.store.notification_exists() {
            self.clear_notification();
        }
        st.generation += 1;
        st.last_outcome = Some(outcome.clone());
        *self.state.write().await = st;
        outcome
    }

    async fn check(&self, st: &mut CredentialState, request: Request) -> Checked {
        if request == Request::Bootstrap {
            st.phase = Phase::Uninitialized;
        }
        self.sync_from_disk(st);

        let now = epoch_secs();
        match st.phase {
            Phase::Uninitialized | Phase::Tracking => self.track(st, request, now).await,
            Phase::Degraded => {
                if request != Request::HealthCheck && request != Request::Unauthorized {
                    if let Some(grant) = st.limited.as_ref().filter(|g| g.is_fresh(now, self.settings.refresh_margin)) {
                        return Ok(limited_ready(grant));
                    }
                }
                self.recover(st, request == Request::Unauthorized, now).await
            }
            Phase::Failed if request == Request::HealthCheck => self.recover(st, true, now).await,
            Phase::Failed => Err(Unrecoverable::exhausted(
                st.failure_reason.clone().unwrap_or_else(|| EXHAUSTED_REASON.to_owned()),
            )),
        }
    }

    /// Load state on first use; afterwards retry pending writes and adopt
    /// credentials written by another process.
    fn sync_from_disk(&self, st: &mut CredentialState) {
        if st.phase == Phase::Uninitialized {
            self.bootstrap(st);
            return;
        }
        if st.unpersisted_session {
            self.persist_session(st);
        }
        if st.unpersisted_primary {
            if let Some(creds) = st.credentials.clone() {
                self.set_primary(st, creds);
            }
            if st.unpersisted_primary {
                return;
            }
        }

        match self.store.load() {
            Ok(Some(disk)) if st.last_seen_primary.as_ref() != Some(&disk) => {
                tracing::info!(
                    expires_in = disk.expires_in(epoch_secs()),
                    phase = ?st.phase,
                    "adopting externally written credential"
                );
                st.last_seen_primary = Some(disk.clone());
                st.credentials = Some(disk);
                st.retry_after = None;
                if matches!(st.phase, Phase::Degraded | Phase::Failed) {
                    st.phase = Phase::Tracking;
                    st.limited = None;
                    st.failure_reason = None;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Some(creds) = st.credentials.clone() {
                    tracing::warn!(path = %self.store.primary_path().display(), "primary credential file missing, rewriting");
                    self.set_primary(st, creds);
                }
            }
            Err(e) => {
                tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "primary credential file unreadable");
                if let Some(creds) = st.credentials.clone() {
                    self.set_primary(st, creds);
                }
            }
        }
    }

    fn bootstrap(&self, st: &mut CredentialState) {
        match self.store.load_session() {
            Ok(session) => st.session = session.unwrap_or_default(),
            Err(e) => tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "session metadata unreadable"),
        }
        st.unpersisted_primary = false;
        st.unpersisted_session = false;
        st.failure_reason = None;
        match self.store.load() {
            Ok(Some(creds)) => {
                tracing::info!(expires_in = creds.expires_in(epoch_secs()), "loaded stored credential");
                st.last_seen_primary = Some(creds.clone());
                st.credentials = Some(creds);
                st.phase = Phase::Tracking;
            }
            Ok(None) => {
                tracing::info!(path = %self.store.primary_path().display(), "no stored credential");
                st.last_seen_primary = None;
                st.credentials = None;
                st.phase = Phase::Degraded;
            }
            Err(e) => {
                tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "stored credential unreadable");
                st.last_seen_primary = None;
                st.credentials = None;
                st.phase = Phase::Degraded;
            }
        }
    }

    async fn track(&self, st: &mut CredentialState, request: Request, now: u64) -> Checked {
        let Some(creds) = st.credentials.clone() else {
            st.phase = Phase::Degraded;
            return self.recover(st, false, now).await;
        };
        st.phase = Phase::Tracking;

        let freshness = creds.freshness(now, self.settings.refresh_margin);
        let mut rejected = false;
        match (request, freshness) {
            (Request::Unauthorized, Freshness::Valid) => {
                tracing::warn!(
                    code = ErrorKind::ProbeAmbiguous.as_str(),
                    expires_in = creds.expires_in(now),
                    "API rejected a locally valid token, forcing refresh"
                );
                rejected = true;
            }
            (Request::Unauthorized, _) => rejected = true,
            (Request::HealthCheck, Freshness::Valid) => match self.provider.probe(&creds.access_token).await {
                Probe::Accepted => return Ok(full_ready(&creds)),
                Probe::Rejected => {
                    tracing::warn!(
                        code = ErrorKind::ProbeAmbiguous.as_str(),
                        expires_in = creds.expires_in(now),
                        "provider rejected a locally valid token, forcing refresh"
                    );
                    rejected = true;
                }
                Probe::Unreachable(reason) => {
                    tracing::debug!(reason = %reason, "liveness probe inconclusive");
                    return Ok(full_ready(&creds));
                }
            },
            (_, Freshness::Valid) => return Ok(full_ready(&creds)),
            _ => {}
        }

        let usable = !rejected && freshness != Freshness::Expired;
        let refresh_token = match creds.refresh_token.clone() {
            Some(rt) if !st.revoked.contains(&rt) => rt,
            _ if usable => {
                tracing::debug!(expires_in = creds.expires_in(now), "credential cannot be refreshed, serving until expiry");
                return Ok(full_ready(&creds));
            }
            _ => {
                tracing::warn!("credential has no usable refresh token");
                return self.enter_degraded(st, request, now).await;
            }
        };

        if usable && request != Request::HealthCheck && st.retry_after.is_some_and(|t| now < t) {
            return Ok(full_ready(&creds));
        }

        let validated = st.known_good.as_ref() == Some(&creds);
        if validated {
            self.write_backup(&creds);
        } else {
            tracing::debug!("credential not yet validated, backup left unchanged");
        }
        match refresh_with_retries(&self.provider, &refresh_token, &self.settings.retry).await {
            Ok(token) => {
                // The refresh token just proved itself.
                if !validated {
                    self.write_backup(&creds);
                }
                let next = creds.rotated(&token, epoch_secs());
                tracing::info!(
                    expires_in = token.expires_in_secs(),
                    rotated = token.refresh_token.is_some(),
                    "credential refreshed"
                );
                Ok(self.adopt_user_credential(st, next))
            }
            Err(RefreshError::Permanent(reason)) => {
                tracing::warn!(
                    code = ErrorKind::PermanentGrant.as_str(),
                    err = %reason,
                    "refresh token rejected, entering degraded mode"
                );
                st.revoked.insert(refresh_token);
                st.session.record_failure();
                self.persist_session(st);
                self.enter_degraded(st, request, now).await
            }
            Err(e) => {
                tracing::warn!(
                    code = e.kind().as_str(),
                    err = %e.message(),
                    expires_in = creds.expires_in(now),
                    "refresh failed"
                );
                if usable {
                    st.retry_after = Some(now + self.settings.refresh_cooldown.as_secs());
                    Ok(full_ready(&creds))
                } else {
                    Err(Unrecoverable::unavailable(format!(
                        "credential unusable and refresh failed: {}",
                        e.message()
                    )))
                }
            }
        }
    }

    async fn enter_degraded(&self, st: &mut CredentialState, request: Request, now: u64) -> Checked {
        st.phase = Phase::Degraded;
        self.recover(st, request == Request::Unauthorized, now).await
    }

    /// Run the recovery steps in order until one succeeds.
    async fn recover(&self, st: &mut CredentialState, forced: bool, now: u64) -> Checked {
        let mut step = RecoveryStep::first();
        loop {
            let outcome = match step {
                RecoveryStep::BackupPromotion => self.try_backup(st, now).await,
                RecoveryStep::LimitedGrant => self.try_limited_grant(st, forced, now).await,
                RecoveryStep::SessionDiscovery => self.try_discovery(st, now).await,
            };
            match &outcome {
                StepOutcome::Failed(reason) => tracing::info!(step = %step, reason = %reason, "recovery step failed"),
                StepOutcome::Skipped(reason) => tracing::debug!(step = %step, reason = %reason, "recovery step skipped"),
                _ => {}
            }

            match decide(step, outcome) {
                Transition::Continue(next) => step = next,
                Transition::Promote(creds) => {
                    tracing::info!(expires_in = creds.expires_in(epoch_secs()), "backup credential promoted");
                    return Ok(self.adopt_user_credential(st, creds));
                }
                Transition::Limited(grant) => {
                    tracing::warn!(
                        expires_in = grant.expires_at.saturating_sub(epoch_secs()),
                        "serving capability-limited grant"
                    );
                    let ready = limited_ready(&grant);
                    st.phase = Phase::Degraded;
                    st.limited = Some(grant);
                    st.failure_reason = None;
                    return Ok(ready);
                }
                Transition::Sufficient { credentials, device_id } => {
                    tracing::info!(device_id = %device_id, "existing credential reaches a playback device");
                    st.session.device_id = Some(device_id);
                    self.persist_session(st);
                    if st.last_seen_primary.as_ref() != Some(&credentials) {
                        self.set_primary(st, credentials.clone());
                    }
                    st.credentials = Some(credentials.clone());
                    st.phase = Phase::Tracking;
                    st.limited = None;
                    st.failure_reason = None;
                    return Ok(full_ready(&credentials));
                }
                Transition::Exhausted => return Err(self.enter_failed(st)),
            }
        }
    }

    async fn try_backup(&self, st: &mut CredentialState, now: u64) -> StepOutcome {
        let backup = match self.store.load_backup() {
            Ok(Some(b)) => b.credentials,
            Ok(None) => return StepOutcome::Skipped("no backup credential".to_owned()),
            Err(e) => return StepOutcome::Failed(e.to_string()),
        };
        if !backup.is_expired(now) {
            match self.provider.probe(&backup.access_token).await {
                Probe::Accepted => return StepOutcome::Promoted(backup),
                Probe::Rejected => tracing::debug!("backup access token rejected"),
                Probe::Unreachable(reason) => tracing::debug!(reason = %reason, "backup probe inconclusive"),
            }
        }

        let refresh_token = match backup.refresh_token.clone() {
            Some(rt) if st.revoked.contains(&rt) => {
                return StepOutcome::Failed("backup refresh token was already rejected".to_owned())
            }
            Some(rt) => rt,
            None => return StepOutcome::Failed("backup has no refresh token".to_owned()),
        };
        match refresh_with_retries(&self.provider, &refresh_token, &self.settings.retry).await {
            Ok(token) => StepOutcome::Promoted(backup.rotated(&token, epoch_secs())),
            Err(RefreshError::Permanent(reason)) => {
                st.revoked.insert(refresh_token);
                StepOutcome::Failed(reason)
            }
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    async fn try_limited_grant(&self, st: &CredentialState, forced: bool, now: u64) -> StepOutcome {
        if !self.provider.has_client_secret() {
            return StepOutcome::Skipped("no client secret configured".to_owned());
        }
        if !forced {
            if let Some(grant) = st.limited.as_ref().filter(|g| g.is_fresh(now, self.settings.refresh_margin)) {
                return StepOutcome::Granted(grant.clone());
            }
        }
        match self.provider.client_credentials().await {
            Ok(token) => StepOutcome::Granted(LimitedGrant::from_token(&token, epoch_secs())),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    async fn try_discovery(&self, st: &CredentialState, now: u64) -> StepOutcome {
        let mut candidates: Vec<CredentialSet> = st.credentials.iter().cloned().collect();
        match self.store.load_backup() {
            Ok(Some(b)) if !candidates.iter().any(|c| c.access_token == b.credentials.access_token) => {
                candidates.push(b.credentials)
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(err = %e, "backup unreadable during discovery"),
        }
        candidates.retain(|c| !c.is_expired(now));
        if candidates.is_empty() {
            return StepOutcome::Skipped("no unexpired access token".to_owned());
        }

        for credentials in candidates {
            if self.provider.probe(&credentials.access_token).await != Probe::Accepted {
                continue;
            }
            match self.provider.devices(&credentials.access_token).await {
                Ok(devices) => {
                    if let Some(id) = choose_device(&devices) {
                        return StepOutcome::DeviceFound { device_id: id.to_owned(), credentials };
                    }
                }
                Err(e) => tracing::debug!(err = %e, "device listing failed"),
            }
        }
        StepOutcome::Failed("no usable token reaches a playback device".to_owned())
    }

    fn enter_failed(&self, st: &mut CredentialState) -> Unrecoverable {
        if st.phase != Phase::Failed {
            tracing::error!(code = ErrorKind::Unrecoverable.as_str(), "credential recovery exhausted");
        }
        st.phase = Phase::Failed;
        st.limited = None;
        st.failure_reason = Some(EXHAUSTED_REASON.to_owned());
        st.session.record_failure();
        self.persist_session(st);
        self.raise_notification(EXHAUSTED_REASON);
        Unrecoverable::exhausted(EXHAUSTED_REASON)
    }

    fn adopt_user_credential(&self, st: &mut CredentialState, creds: CredentialSet) -> Ready {
        let ready = full_ready(&creds);
        st.known_good = Some(creds.clone());
        self.set_primary(st, creds);
        st.phase = Phase::Tracking;
        st.limited = None;
        st.failure_reason = None;
        st.retry_after = None;
        st.session.record_success(epoch_secs());
        self.persist_session(st);
        ready
    }

    /// Persist the primary credential. On failure the in-memory copy stays
    /// authoritative and the write is retried on the next check.
    fn set_primary(&self, st: &mut CredentialState, creds: CredentialSet) {
        match self.store.save(&creds) {
            Ok(()) => {
                st.last_seen_primary = Some(creds.clone());
                st.unpersisted_primary = false;
            }
            Err(e) => {
                tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "credential not persisted, continuing in memory");
                st.unpersisted_primary = true;
            }
        }
        st.credentials = Some(creds);
    }

    fn persist_session(&self, st: &mut CredentialState) {
        match self.store.save_session(&st.session) {
            Ok(()) => st.unpersisted_session = false,
            Err(e) => {
                tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "session metadata not persisted");
                st.unpersisted_session = true;
            }
        }
    }

    /// Snapshot a validated credential around a refresh attempt.
    fn write_backup(&self, creds: &CredentialSet) {
        if let Ok(Some(existing)) = self.store.load_backup() {
            if &existing.credentials == creds {
                return;
            }
        }
        let backup = BackupCredentialSet { credentials: creds.clone(), backup_time: epoch_secs() };
        match self.store.save_backup(&backup) {
            Ok(()) => tracing::debug!("credential backed up"),
            Err(e) => tracing::warn!(code = ErrorKind::Storage.as_str(), err = %e, "credential backup failed"),
        }
    }
}

fn full_ready(creds: &CredentialSet) -> Ready {
    Ready { access_token: creds.access_token.clone(), expires_at: creds.expires_at, capability: Capability::Full }
}

fn limited_ready(grant: &LimitedGrant) -> Ready {
    Ready { access_token: grant.access_token.clone(), expires_at: grant.expires_at, capability: Capability::Limited }
}

/// Operator-facing text for the re-authorization notice.
pub fn notification_text(reason: &str, primary: &Path) -> String {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    format!(
        "CREDENTIAL RE-AUTHORIZATION REQUIRED\n\
         ====================================\n\
         Time: {now}\n\
         Reason: {reason}\n\
         \n\
         Automatic token refresh failed and no fallback credential works.\n\
         Playback control is unavailable until a new credential is written.\n\
         \n\
         To fix this:\n\
         1. Run the authorization flow on this device.\n\
         2. Make sure it writes a fresh {}\n\
         3. The next health check picks it up automatically.\n\
         \n\
         This file is deleted once authentication is restored.\n",
        primary.display()
    )
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
