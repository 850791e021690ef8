use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::exe::RunAndCheck;

/// Enables quota groups on a mounted btrfs filesystem.
///
/// btrfs-progs older than 0.20 have no `quota` subcommand.
pub fn quota_enable(mount_point: &Path) -> Result<(), Error> {
    Command::new("btrfs")
        .arg("quota")
        .arg("enable")
        .arg(mount_point)
        .run_and_check()
        .context(format!(
            "Failed to enable btrfs quota on '{}'",
            mount_point.display()
        ))
}
