// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tokenkeeper check` runs one health check, for cron-style deployments.

use crate::config::Config;
use crate::credential::epoch_secs;
use crate::scheduler::HealthScheduler;

/// Run the `tokenkeeper check` subcommand. Returns a process exit code.
///
/// The failure count from the previous report carries over, so repeated
/// one-shot checks back off and raise the notice like `monitor` does.
pub async fn run(config: &Config) -> anyhow::Result<i32> {
    let machine = super::build_machine(config)?;
    let previous = match machine.store().load_report() {
        Ok(report) => report.map(|r| r.consecutive_failures).unwrap_or(0),
        Err(e) => {
            tracing::debug!(err = %e, "ignoring unreadable status report");
            0
        }
    };
    let policy = config.interval_policy().with_failures(previous);
    let mut scheduler = HealthScheduler::new(machine, policy, config.shutdown_grace());

    match scheduler.tick().await {
        Ok(outcome) => {
            let ready = outcome.ready();
            let kind = if outcome.is_degraded() { "degraded" } else { "ready" };
            println!("{kind}: access token valid for {}s", ready.expires_at.saturating_sub(epoch_secs()));
            Ok(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(1)
        }
    }
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
