use std::{path::Path, process::Command};

use anyhow::{bail, Context, Error};
use log::info;
use sysdefs::filesystems::RealFilesystemType;

use crate::exe::RunAndCheck;

/// Tunables for `mkfs.ext2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtOptions {
    /// Percentage of blocks reserved for the super-user.
    pub reserved_blocks_percent: u8,
    /// Run a read-only bad block scan while formatting.
    pub check_bad_blocks: bool,
}

/// Creates a filesystem of type `filesystem` on `device_path`.
pub fn run(
    device_path: &Path,
    filesystem: RealFilesystemType,
    ext_options: ExtOptions,
) -> Result<(), Error> {
    match filesystem {
        RealFilesystemType::Ext2 => ext(device_path, false, ext_options),
        RealFilesystemType::Ext3 => ext(device_path, true, ext_options),
        RealFilesystemType::Btrfs => btrfs(device_path),
        other => bail!("Formatting '{}' is not supported", other.name()),
    }
}

fn ext(device_path: &Path, journal: bool, options: ExtOptions) -> Result<(), Error> {
    let mut cmd = Command::new("mkfs.ext2");
    cmd.arg("-q");
    if options.check_bad_blocks {
        info!(
            "Formatting '{}' with bad block search enabled, this may take a while",
            device_path.display()
        );
        cmd.arg("-c");
    }
    cmd.arg("-m").arg(options.reserved_blocks_percent.to_string());
    if journal {
        cmd.arg("-j");
    }
    cmd.arg(device_path)
        .run_and_check()
        .context("Failed to execute mkfs.ext2")
}

fn btrfs(device_path: &Path) -> Result<(), Error> {
    Command::new("mkfs.btrfs")
        .arg("-f")
        .arg(device_path)
        .run_and_check()
        .context("Failed to execute mkfs.btrfs")
}
