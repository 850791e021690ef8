use std::{path::Path, process::Command};

use anyhow::{bail, Context, Error};
use log::info;

use crate::exe::RunAndCheck;

fn create_command<P: AsRef<Path>>(
    raid_path: &Path,
    level: u8,
    chunk_size_kb: u64,
    members: &[P],
) -> Command {
    let mut cmd = Command::new("mdadm");
    cmd.arg("--create")
        .arg(raid_path)
        .arg("--run")
        .arg(format!("--chunk={chunk_size_kb}"))
        .arg(format!("--level=raid{level}"))
        .arg(format!("--raid-devices={}", members.len()))
        .args(members.iter().map(|m| m.as_ref()));
    cmd
}

/// Creates a software RAID array from `members`.
pub fn create<P: AsRef<Path>>(
    raid_path: impl AsRef<Path>,
    level: u8,
    chunk_size_kb: u64,
    members: &[P],
) -> Result<(), Error> {
    let raid_path = raid_path.as_ref();
    if members.is_empty() {
        bail!("Cannot create RAID array '{}' without members", raid_path.display());
    }
    info!(
        "Creating RAID{level} array '{}' from {} members",
        raid_path.display(),
        members.len()
    );

    create_command(raid_path, level, chunk_size_kb, members)
        .run_and_check()
        .context("Failed to run mdadm create")
}

pub fn stop(raid_path: impl AsRef<Path>) -> Result<(), Error> {
    info!("Stopping RAID array '{}'", raid_path.as_ref().display());
    Command::new("mdadm")
        .arg("--stop")
        .arg(raid_path.as_ref())
        .run_and_check()
        .context(format!(
            "Failed to stop RAID array '{}'",
            raid_path.as_ref().display()
        ))
}

/// Erases the RAID superblock of a former array member.
pub fn zero_superblock(device_path: impl AsRef<Path>) -> Result<(), Error> {
    Command::new("mdadm")
        .arg("--zero-superblock")
        .arg(device_path.as_ref())
        .run_and_check()
        .context(format!(
            "Failed to zero RAID superblock on '{}'",
            device_path.as_ref().display()
        ))
}
