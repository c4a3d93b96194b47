// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Degraded-mode recovery: an ordered list of steps and a pure transition
//! function. The state machine executes the steps; this module only decides
//! what each outcome means.

use std::time::Duration;

use crate::credential::provider::Device;
use crate::credential::{CredentialSet, Freshness, TokenResponse};

/// Recovery steps in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    /// Restore the last known-good credential snapshot.
    BackupPromotion,
    /// Obtain a client-credentials token without user scope.
    LimitedGrant,
    /// Accept a still-honored token if the user has a reachable device.
    SessionDiscovery,
}

impl RecoveryStep {
    pub const ORDER: [Self; 3] = [Self::BackupPromotion, Self::LimitedGrant, Self::SessionDiscovery];

    pub fn first() -> Self {
        Self::ORDER[0]
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::BackupPromotion => Some(Self::LimitedGrant),
            Self::LimitedGrant => Some(Self::SessionDiscovery),
            Self::SessionDiscovery => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackupPromotion => "backup_promotion",
            Self::LimitedGrant => "limited_grant",
            Self::SessionDiscovery => "session_discovery",
        }
    }
}

impl std::fmt::Display for RecoveryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-credentials token. Lives in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitedGrant {
    pub access_token: String,
    pub expires_at: u64,
}

impl LimitedGrant {
    pub fn from_token(token: &TokenResponse, now: u64) -> Self {
        Self { access_token: token.access_token.clone(), expires_at: now + token.expires_in_secs() }
    }

    /// Usable without a new grant: outside the refresh margin.
    pub fn is_fresh(&self, now: u64, margin: Duration) -> bool {
        Freshness::of(self.expires_at, now, margin) == Freshness::Valid
    }
}

/// What executing one step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The backup (possibly refreshed) is usable as the primary credential.
    Promoted(CredentialSet),
    /// A limited grant was obtained or reused.
    Granted(LimitedGrant),
    /// A probed credential can reach this device.
    DeviceFound { credentials: CredentialSet, device_id: String },
    /// The step ran and failed.
    Failed(String),
    /// The step's precondition was missing (no backup, no secret, no candidate).
    Skipped(String),
}

/// What the state machine should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Write the credential as primary and resume normal tracking.
    Promote(CredentialSet),
    /// Stay degraded, serving the limited grant.
    Limited(LimitedGrant),
    /// Adopt the credential and remember the device.
    Sufficient { credentials: CredentialSet, device_id: String },
    Continue(RecoveryStep),
    /// All steps failed.
    Exhausted,
}

/// Map a step's outcome to the next transition.
///
/// An outcome that the step cannot produce is treated as a failure of that step.
pub fn decide(step: RecoveryStep, outcome: StepOutcome) -> Transition {
    match (step, outcome) {
        (RecoveryStep::BackupPromotion, StepOutcome::Promoted(creds)) => Transition::Promote(creds),
        (RecoveryStep::LimitedGrant, StepOutcome::Granted(grant)) => Transition::Limited(grant),
        (RecoveryStep::SessionDiscovery, StepOutcome::DeviceFound { credentials, device_id }) => {
            Transition::Sufficient { credentials, device_id }
        }
        _ => match step.next() {
            Some(next) => Transition::Continue(next),
            None => Transition::Exhausted,
        },
    }
}

/// Pick the device to remember: the first active one, else the first listed.
/// Devices without an id cannot be targeted and are ignored.
pub fn choose_device(devices: &[Device]) -> Option<&str> {
    let addressable = || devices.iter().filter_map(|d| d.id.as_deref().map(|id| (id, d.is_active)));
    addressable().find(|(_, active)| *active).or_else(|| addressable().next()).map(|(id, _)| id)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
