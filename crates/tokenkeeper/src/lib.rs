// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokenkeeper: keeps a headless device's OAuth credential alive.
//!
//! Refreshes ahead of expiry, falls back through backup promotion, a
//! capability-limited grant, and session discovery when the refresh token is
//! rejected, and tells the operator when only re-authorization can help.

pub mod command;
pub mod config;
pub mod credential;
pub mod error;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

use std::sync::Once;

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
