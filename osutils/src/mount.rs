use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use sysdefs::filesystems::MountFilesystemType;

use crate::exe::RunAndCheck;

/// Mounts `source` on `mount_dir` with `mount -t`.
pub fn mount(
    source: impl AsRef<Path>,
    mount_dir: impl AsRef<Path>,
    filesystem: MountFilesystemType,
) -> Result<(), Error> {
    Command::new("mount")
        .arg("-t")
        .arg(filesystem.name())
        .arg(source.as_ref())
        .arg(mount_dir.as_ref())
        .run_and_check()
        .context(format!(
            "Failed to mount {} to path {}",
            source.as_ref().display(),
            mount_dir.as_ref().display(),
        ))
}
