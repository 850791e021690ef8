use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::info;
use strum_macros::{Display, IntoStaticStr};

use crate::exe::RunAndCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum PartitionTableType {
    Msdos,
    Gpt,
}

fn single_lvm_partition_command(device: &Path, table: PartitionTableType) -> Command {
    let mut cmd = Command::new("parted");
    cmd.arg("--script")
        .arg("--align=optimal")
        .arg(device)
        .arg("mklabel")
        .arg(<&str>::from(table))
        .arg("mkpart")
        .arg("primary")
        .arg("ext2")
        .arg("0%")
        .arg("100%")
        .arg("set")
        .arg("1")
        .arg("lvm")
        .arg("on");
    cmd
}

/// Writes a fresh partition table of type `table` holding one primary
/// partition that spans the whole disk and carries the `lvm` flag.
pub fn single_lvm_partition(
    device: impl AsRef<Path>,
    table: PartitionTableType,
) -> Result<(), Error> {
    let device = device.as_ref();
    info!(
        "Writing {table} partition table with a single partition on '{}'",
        device.display()
    );

    single_lvm_partition_command(device, table)
        .run_and_check()
        .context(format!(
            "Failed to partition '{}' with a {table} table",
            device.display()
        ))
}
