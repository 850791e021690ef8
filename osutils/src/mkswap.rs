use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::exe::RunAndCheck;

pub fn run(device_path: &Path) -> Result<(), Error> {
    Command::new("mkswap")
        .arg("-f")
        .arg(device_path)
        .run_and_check()
        .context("Failed to execute mkswap")
}

pub fn swapon(device_path: &Path) -> Result<(), Error> {
    Command::new("swapon")
        .arg(device_path)
        .run_and_check()
        .context(format!("Failed to enable swap on '{}'", device_path.display()))
}

pub fn swapoff(device_path: &Path) -> Result<(), Error> {
    Command::new("swapoff")
        .arg(device_path)
        .run_and_check()
        .context(format!("Failed to disable swap on '{}'", device_path.display()))
}
