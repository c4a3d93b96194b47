// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tokenkeeper monitor` keeps the credential healthy until signalled.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::scheduler::HealthScheduler;

/// Run the `tokenkeeper monitor` subcommand. Returns a process exit code.
pub async fn run(config: &Config) -> anyhow::Result<i32> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    run_until(config, shutdown).await
}

/// Run the health scheduler until `shutdown` fires.
pub async fn run_until(config: &Config, shutdown: CancellationToken) -> anyhow::Result<i32> {
    let state_dir = config.state_dir();
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| anyhow::anyhow!("cannot create state dir {}: {e}", state_dir.display()))?;

    let machine = super::build_machine(config)?;
    let policy = config.interval_policy();
    info!(
        state_dir = %state_dir.display(),
        interval_secs = policy.current().as_secs(),
        margin_secs = config.refresh_margin_secs,
        "monitoring credential"
    );

    HealthScheduler::new(machine, policy, config.shutdown_grace()).run(shutdown).await;
    info!("monitor stopped");
    Ok(0)
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
                shutdown.cancel();
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
                shutdown.cancel();
            }
        }
    });
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
