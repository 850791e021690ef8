use std::path::{Path, PathBuf};

use anyhow::{anyhow, Error};
use log::{info, warn};

use osutils::{block_devices, parted::PartitionTableType};
use provisioner_api::{
    config::LayoutMode,
    error::{ProvisionError, StorageError},
};

use crate::engine::inventory::BlockDevice;

pub trait Partitioner {
    /// Replaces the partition table of `device` with one holding a single
    /// partition spanning the disk, and returns that partition's path.
    ///
    /// `preferred` is tried first. The other table types are tried in turn
    /// when writing the preferred one fails.
    fn create_single_partition(
        &self,
        device: &Path,
        preferred: PartitionTableType,
    ) -> Result<PathBuf, Error>;
}

/// Table types to try, in order, when `preferred` is requested.
pub fn table_fallback_order(preferred: PartitionTableType) -> [PartitionTableType; 2] {
    match preferred {
        PartitionTableType::Msdos => [PartitionTableType::Msdos, PartitionTableType::Gpt],
        PartitionTableType::Gpt => [PartitionTableType::Gpt, PartitionTableType::Msdos],
    }
}

/// Runs `write` for each table type in fallback order until one succeeds and
/// returns the path of the first partition of `device`.
pub fn write_with_fallback(
    device: &Path,
    preferred: PartitionTableType,
    mut write: impl FnMut(PartitionTableType) -> Result<(), Error>,
) -> Result<PathBuf, Error> {
    let mut last_error = None;
    for table in table_fallback_order(preferred) {
        match write(table) {
            Ok(()) => return Ok(block_devices::first_partition_path(device)),
            Err(e) => {
                warn!(
                    "Failed to write {table} partition table on '{}': {e:?}",
                    device.display()
                );
                last_error = Some(e);
            }
        }
    }

    let context = format!(
        "No partition table could be written on '{}'",
        device.display()
    );
    Err(match last_error {
        Some(e) => e.context(context),
        None => anyhow!(context),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedDevice {
    pub device: PathBuf,
    pub partition: PathBuf,
}

/// Partitions each usable device in order, skipping the ones that fail.
///
/// In raw-disk layouts every device is still wiped and partitioned, but only
/// the first partitioned one is kept. The rest are left to the workloads.
#[tracing::instrument(skip_all)]
pub fn partition_devices(
    devices: &[BlockDevice],
    layout: LayoutMode,
    partitioner: &impl Partitioner,
) -> Result<Vec<PartitionedDevice>, ProvisionError> {
    let mut used = Vec::new();
    for device in devices {
        match partitioner.create_single_partition(&device.path, PartitionTableType::Msdos) {
            Ok(partition) => {
                info!("Successfully initialized '{}'", device.path.display());
                used.push(PartitionedDevice {
                    device: device.path.clone(),
                    partition,
                });
            }
            Err(e) => warn!(
                "Unable to partition '{}', not using it: {e:?}",
                device.path.display()
            ),
        }
    }

    if layout == LayoutMode::SplitRootDataRaw && used.len() > 1 {
        for raw in used.drain(1..) {
            info!(
                "Running in raw disk mode, not using '{}'",
                raw.device.display()
            );
        }
    }

    if used.is_empty() {
        return Err(ProvisionError::new(StorageError::NoPartitionedDevices));
    }

    info!(
        "Block devices used for the volume group: {:?}",
        used.iter().map(|d| &d.device).collect::<Vec<_>>()
    );
    Ok(used)
}
