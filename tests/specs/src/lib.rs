// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `tokenkeeper` binary as a subprocess against an in-process
//! mock provider and an isolated state directory.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokenkeeper::test_support::MockProvider;

/// Resolve the path to the compiled `tokenkeeper` binary.
///
/// `TOKENKEEPER_BIN` overrides the default `target/debug` location.
pub fn keeper_binary() -> PathBuf {
    if let Ok(path) = std::env::var("TOKENKEEPER_BIN") {
        return PathBuf::from(path);
    }
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("tokenkeeper")
}

/// Captured result of one short-lived invocation.
#[derive(Debug)]
pub struct Output {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// An isolated state directory plus the provider the binary talks to.
pub struct Keeper {
    state: tempfile::TempDir,
    token_url: String,
    api_url: String,
    client_secret: Option<String>,
}

impl Keeper {
    /// A keeper pointed at `mock`, with an empty state directory.
    pub fn new(mock: &MockProvider) -> anyhow::Result<Self> {
        Ok(Self {
            state: tempfile::tempdir()?,
            token_url: mock.token_url(),
            api_url: mock.api_url(),
            client_secret: None,
        })
    }

    /// Configure a client secret (enables the capability-limited fallback).
    pub fn with_client_secret(mut self, secret: &str) -> Self {
        self.client_secret = Some(secret.to_owned());
        self
    }

    pub fn state_dir(&self) -> &Path {
        self.state.path()
    }

    fn command(&self, args: &[&str]) -> anyhow::Result<tokio::process::Command> {
        let binary = keeper_binary();
        anyhow::ensure!(binary.exists(), "tokenkeeper binary not found at {}", binary.display());

        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("--state-dir")
            .arg(self.state.path())
            .args(["--token-url", self.token_url.as_str(), "--api-url", self.api_url.as_str()])
            .args(["--log-format", "text", "--log-level", "warn"])
            .env_remove("TOKENKEEPER_CLIENT_ID")
            .env_remove("TOKENKEEPER_CLIENT_SECRET")
            .env("TOKENKEEPER_RETRY_BASE_MS", "1")
            .env("TOKENKEEPER_RETRY_MAX_MS", "5")
            .env("TOKENKEEPER_SHUTDOWN_GRACE_MS", "2000")
            .kill_on_drop(true);
        if let Some(ref secret) = self.client_secret {
            cmd.args(["--client-secret", secret.as_str()]);
        }
        cmd.args(args);
        Ok(cmd)
    }

    /// Run one subcommand to completion.
    pub async fn run(&self, args: &[&str], timeout: Duration) -> anyhow::Result<Output> {
        let mut cmd = self.command(args)?;
        cmd.stdin(Stdio::null());
        let out = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| anyhow::anyhow!("tokenkeeper {args:?} did not exit within {timeout:?}"))??;
        Ok(Output {
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }

    /// Start a long-running subcommand (e.g. `monitor`). Killed on drop.
    pub fn spawn(&self, args: &[&str]) -> anyhow::Result<KeeperProcess> {
        let mut cmd = self.command(args)?;
        let child = cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;
        Ok(KeeperProcess { child })
    }
}

/// A running `tokenkeeper` process that is killed on drop.
pub struct KeeperProcess {
    child: tokio::process::Child,
}

impl KeeperProcess {
    /// Send SIGTERM through `kill(1)`.
    pub async fn terminate(&self) -> anyhow::Result<()> {
        let pid = self.child.id().ok_or_else(|| anyhow::anyhow!("process already exited"))?;
        let pid = pid.to_string();
        let status = tokio::process::Command::new("kill").args(["-TERM", pid.as_str()]).status().await?;
        anyhow::ensure!(status.success(), "kill -TERM {pid} failed");
        Ok(())
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<ExitStatus> {
        tokio::time::timeout(timeout, self.child.wait())
            .await
            .map_err(|_| anyhow::anyhow!("tokenkeeper did not exit within {timeout:?}"))?
            .map_err(Into::into)
    }
}

/// Poll `cond` every 20ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "condition not met within {timeout:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
