// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::command::status::StatusArgs;
use crate::credential::machine::MachineSettings;
use crate::credential::provider::Endpoints;
use crate::credential::refresh::RetryPolicy;
use crate::credential::store::CredentialStore;
use crate::scheduler::IntervalPolicy;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// OAuth credential keeper for a headless playback controller.
#[derive(Debug, Parser)]
#[command(name = "tokenkeeper", version, about)]
pub struct Config {
    /// Directory holding the credential, backup, and session files.
    #[arg(long, env = "TOKENKEEPER_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// OAuth token endpoint.
    #[arg(long, env = "TOKENKEEPER_TOKEN_URL", default_value = SPOTIFY_TOKEN_URL)]
    pub token_url: String,

    /// Web API base URL used for liveness probes and device discovery.
    #[arg(long, env = "TOKENKEEPER_API_URL", default_value = SPOTIFY_API_URL)]
    pub api_url: String,

    /// OAuth client ID.
    #[arg(long, env = "TOKENKEEPER_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret. Enables HTTP Basic client auth and the
    /// client-credentials fallback.
    #[arg(long, env = "TOKENKEEPER_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Refresh this many seconds before expiry.
    #[arg(long, env = "TOKENKEEPER_REFRESH_MARGIN_SECS", default_value = "600")]
    pub refresh_margin_secs: u64,

    /// Base interval between health checks, in seconds.
    #[arg(long, env = "TOKENKEEPER_CHECK_INTERVAL_SECS", default_value = "300")]
    pub check_interval_secs: u64,

    /// Consecutive failures before backing off and writing the failure notice.
    #[arg(long, env = "TOKENKEEPER_FAILURE_THRESHOLD", default_value = "3")]
    pub failure_threshold: u32,

    /// Upper bound on the backed-off interval, as a multiple of the base.
    #[arg(long, env = "TOKENKEEPER_MAX_INTERVAL_FACTOR", default_value = "4")]
    pub max_interval_factor: u32,

    /// Refresh attempts per check on transient failures.
    #[arg(long, env = "TOKENKEEPER_RETRY_ATTEMPTS", default_value = "5")]
    pub retry_attempts: u32,

    /// Log format (json or text).
    #[arg(long, env = "TOKENKEEPER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TOKENKEEPER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,

    // -- Duration overrides (skip from CLI; set in Config::test()) --------
    #[clap(skip)]
    pub http_timeout_ms: Option<u64>,
    #[clap(skip)]
    pub retry_base_ms: Option<u64>,
    #[clap(skip)]
    pub retry_max_ms: Option<u64>,
    /// Pause after a transient refresh failure on a still-usable token.
    #[clap(skip)]
    pub refresh_cooldown_ms: Option<u64>,
    /// How long an in-flight check may finish after a shutdown signal.
    #[clap(skip)]
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Run one health check and exit (0 ready, 1 unrecoverable).
    Check,
    /// Keep the credential healthy until SIGINT/SIGTERM.
    Monitor,
    /// Print the credential health without changing anything.
    Status(StatusArgs),
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Only the read-only status command works without a client.
        if matches!(self.command, Command::Check | Command::Monitor) {
            match self.client_id.as_deref() {
                Some(id) if !id.trim().is_empty() => {}
                _ => anyhow::bail!("--client-id is required for check and monitor"),
            }
        }
        if self.client_secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
            anyhow::bail!("--client-secret must not be empty");
        }
        for (flag, url) in [("--token-url", &self.token_url), ("--api-url", &self.api_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{flag} must be an http(s) URL: {url}");
            }
        }
        if self.check_interval_secs == 0 {
            anyhow::bail!("--check-interval-secs must be positive");
        }
        if self.retry_attempts == 0 {
            anyhow::bail!("--retry-attempts must be at least 1");
        }
        if self.max_interval_factor == 0 {
            anyhow::bail!("--max-interval-factor must be at least 1");
        }
        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }

    // -- Tuning knobs (field override → env var → compiled default) --------

    duration_field!(http_timeout, http_timeout_ms, "TOKENKEEPER_HTTP_TIMEOUT_MS", 10_000);
    duration_field!(retry_base, retry_base_ms, "TOKENKEEPER_RETRY_BASE_MS", 1_000);
    duration_field!(retry_max, retry_max_ms, "TOKENKEEPER_RETRY_MAX_MS", 60_000);
    duration_field!(refresh_cooldown, refresh_cooldown_ms, "TOKENKEEPER_REFRESH_COOLDOWN_MS", 60_000);
    duration_field!(shutdown_grace, shutdown_grace_ms, "TOKENKEEPER_SHUTDOWN_GRACE_MS", 15_000);

    /// The state directory, falling back to the XDG default.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::credential::state_dir)
    }

    pub fn store(&self) -> CredentialStore {
        CredentialStore::new(self.state_dir())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            token_url: self.token_url.clone(),
            api_url: self.api_url.trim_end_matches('/').to_owned(),
            client_id: self.client_id.clone().unwrap_or_default(),
            client_secret: self.client_secret.clone(),
        }
    }

    pub fn machine_settings(&self) -> MachineSettings {
        MachineSettings {
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_delay: self.retry_base(),
                max_delay: self.retry_max(),
            },
            refresh_cooldown: self.refresh_cooldown(),
        }
    }

    pub fn interval_policy(&self) -> IntervalPolicy {
        IntervalPolicy::new(
            Duration::from_secs(self.check_interval_secs),
            self.failure_threshold,
            self.max_interval_factor,
        )
    }

    /// Build a minimal `Config` for tests (`check`, local endpoints, fast retries).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            state_dir: None,
            token_url: "http://127.0.0.1:1/api/token".into(),
            api_url: "http://127.0.0.1:1/v1".into(),
            client_id: Some("test-client".into()),
            client_secret: None,
            refresh_margin_secs: 600,
            check_interval_secs: 300,
            failure_threshold: 3,
            max_interval_factor: 4,
            retry_attempts: 2,
            log_format: "text".into(),
            log_level: "debug".into(),
            command: Command::Check,
            http_timeout_ms: Some(2_000),
            retry_base_ms: Some(1),
            retry_max_ms: Some(5),
            refresh_cooldown_ms: Some(60_000),
            shutdown_grace_ms: Some(500),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
