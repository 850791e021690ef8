use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::exe::RunAndCheck;

/// Turns off mount-count and time based forced checks.
pub fn disable_periodic_checks(device_path: &Path) -> Result<(), Error> {
    Command::new("tune2fs")
        .arg("-c")
        .arg("-1")
        .arg("-i")
        .arg("0")
        .arg(device_path)
        .run_and_check()
        .context("Failed to execute tune2fs")
}
