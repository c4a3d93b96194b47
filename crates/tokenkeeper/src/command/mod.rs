// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `check`, `monitor`, `status`.

pub mod check;
pub mod monitor;
pub mod status;

use std::sync::Arc;

use crate::config::{Command, Config};
use crate::credential::machine::AuthStateMachine;
use crate::credential::provider::ProviderClient;

/// Process exit code for an invalid configuration.
pub const EXIT_CONFIG: i32 = 2;

/// Dispatch the parsed subcommand. Returns a process exit code.
pub async fn run(config: &Config) -> anyhow::Result<i32> {
    match &config.command {
        Command::Check => check::run(config).await,
        Command::Monitor => monitor::run(config).await,
        Command::Status(args) => status::run(config, args).await,
    }
}

/// Build the state machine for the configured state directory and provider.
pub fn build_machine(config: &Config) -> anyhow::Result<Arc<AuthStateMachine>> {
    let provider = ProviderClient::new(config.endpoints(), config.http_timeout())?;
    Ok(Arc::new(AuthStateMachine::new(config.store(), provider, config.machine_settings())))
}
