// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument handling of the built binary. Provider-backed flows live in
//! `tests/specs`.

use std::process::{Command, Output};

fn keeper(state: &std::path::Path, args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_tokenkeeper"))
        .arg("--state-dir")
        .arg(state)
        .args(args)
        .env_remove("TOKENKEEPER_CLIENT_ID")
        .env_remove("TOKENKEEPER_CLIENT_SECRET")
        .output()
}

#[test]
fn version_flag_exits_zero() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_tokenkeeper")).arg("--version").output()?;
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("tokenkeeper"));
    Ok(())
}

#[test]
fn invalid_configuration_exits_two() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = keeper(dir.path(), &["check"])?;
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--client-id"));

    let out = keeper(dir.path(), &["--token-url", "not-a-url", "status"])?;
    assert_eq!(out.status.code(), Some(2));
    Ok(())
}

#[test]
fn status_without_credentials_exits_one() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = keeper(dir.path(), &["status", "--json"])?;
    assert_eq!(out.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(json["status"], "no_credentials");
    assert_eq!(json["notification"], false);
    Ok(())
}
