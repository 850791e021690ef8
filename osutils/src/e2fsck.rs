use std::{
    io,
    path::Path,
    process::{Command, Output},
};

use anyhow::{Context, Error};
use log::{info, warn};

use crate::exe::{OutputChecker, RunAndCheck};

/// Automatic repair mode of `e2fsck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    /// `-p`: fix only what is safe without a human.
    Preen,
    /// `-y`: answer yes to every question.
    AssumeYes,
}

impl RepairMode {
    fn flag(self) -> &'static str {
        match self {
            RepairMode::Preen => "-p",
            RepairMode::AssumeYes => "-y",
        }
    }
}

fn command(block_device_path: &Path, mode: RepairMode) -> Command {
    let mut cmd = Command::new("e2fsck");
    cmd.arg("-v").arg(mode.flag()).arg(block_device_path);
    cmd
}

/// Interprets the exit status of e2fsck. Bit 0 (errors corrected) and bit 1
/// (reboot required) still leave a usable filesystem, anything above is a
/// failure.
fn check_exit(result: Result<Output, io::Error>) -> Result<(), Error> {
    match result.exit_code() {
        Some(0) => Ok(()),
        Some(1) => {
            info!("Filesystem errors were corrected");
            Ok(())
        }
        Some(2) => {
            warn!("Filesystem errors were corrected, the system should be rebooted");
            Ok(())
        }
        _ => result.check(),
    }
}

/// Checks the ext filesystem on the block device.
pub fn run(block_device_path: &Path, mode: RepairMode) -> Result<(), Error> {
    let mut cmd = command(block_device_path, mode);
    info!("Running '{}'", cmd.render_command());
    check_exit(cmd.output()).context(format!(
        "Failed to execute e2fsck {} on '{}'",
        mode.flag(),
        block_device_path.display()
    ))
}
