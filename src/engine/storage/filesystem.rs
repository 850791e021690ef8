use std::path::Path;

use anyhow::Error;
use log::info;

use osutils::{e2fsck::RepairMode, exe::BestEffort, mkfs::ExtOptions};
use provisioner_api::{
    config::{LogicalVolumeName, ModelOption, ModelOptions},
    constants::{DATA_RESERVED_BLOCKS_PERCENT, ROOT_RESERVED_BLOCKS_PERCENT},
    error::{ProvisionError, ReportError, StorageError},
};
use sysdefs::filesystems::RealFilesystemType;

use super::volume_group::{LogicalVolume, VolumeFormat};

pub trait FilesystemTools {
    fn make_swap(&self, device: &Path) -> Result<(), Error>;

    fn make_filesystem(
        &self,
        device: &Path,
        filesystem: RealFilesystemType,
        options: ExtOptions,
    ) -> Result<(), Error>;

    /// Turns off the time and mount-count based checks of an ext filesystem.
    fn disable_periodic_checks(&self, device: &Path) -> BestEffort;

    fn check_filesystem(&self, device: &Path, mode: RepairMode) -> Result<(), Error>;

    /// Enables quota support on the btrfs filesystem mounted at `mount_point`.
    fn enable_quota(&self, mount_point: &Path) -> BestEffort;
}

fn ext_options(volume: LogicalVolumeName, options: ModelOptions) -> ExtOptions {
    match volume {
        LogicalVolumeName::Root => ExtOptions {
            reserved_blocks_percent: ROOT_RESERVED_BLOCKS_PERCENT,
            check_bad_blocks: options.contains(ModelOption::BadHd),
        },
        _ => ExtOptions {
            reserved_blocks_percent: DATA_RESERVED_BLOCKS_PERCENT,
            check_bad_blocks: false,
        },
    }
}

/// Formats every logical volume according to its planned format.
#[tracing::instrument(skip_all)]
pub fn format_volumes(
    volumes: &[LogicalVolume],
    options: ModelOptions,
    tools: &impl FilesystemTools,
) -> Result<(), ProvisionError> {
    for volume in volumes {
        let device = volume.device_path();
        match volume.format {
            VolumeFormat::Swap => {
                info!("Initializing swap on '{}'", device.display());
                tools
                    .make_swap(&device)
                    .structured(StorageError::CreateSwap {
                        path: device.display().to_string(),
                    })?;
            }
            VolumeFormat::Filesystem(filesystem) => {
                let ext = ext_options(volume.name, options);
                if ext.check_bad_blocks {
                    info!(
                        "Checking '{}' for bad blocks while formatting, this will take a while",
                        device.display()
                    );
                }
                info!(
                    "Formatting '{}' as {}",
                    device.display(),
                    filesystem.name()
                );
                tools
                    .make_filesystem(&device, filesystem, ext)
                    .structured(StorageError::FormatVolume {
                        name: volume.name.to_string(),
                    })?;

                if filesystem.is_ext() {
                    tools.disable_periodic_checks(&device);
                }
            }
            VolumeFormat::Unformatted => {
                info!("Leaving '{}' unformatted", device.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use enumflags2::BitFlags;
    use provisioner_api::{
        config::{LayoutMode, VirtTechnology, VolumeSize, VolumeSizes},
        error::ErrorKind,
    };

    use crate::engine::{storage::volume_group::plan_layout, testutils::FakeHost};

    use super::*;

    fn plan(layout: LayoutMode, virt: VirtTechnology) -> Vec<LogicalVolume> {
        plan_layout(
            layout,
            &VolumeSizes {
                swap: VolumeSize::from_gib(1),
                root: VolumeSize::from_gib(10),
                data: Some(VolumeSize::from_gib(5)),
            },
            virt,
        )
    }

    #[test]
    fn test_format_container() {
        let host = FakeHost::default();
        format_volumes(
            &plan(LayoutMode::SplitRootData, VirtTechnology::Container),
            BitFlags::empty(),
            &host,
        )
        .unwrap();
        assert_eq!(
            host.commands(),
            vec![
                "mkswap /dev/fleet/swap",
                "mkfs ext3 /dev/fleet/root reserved=5",
                "tune2fs /dev/fleet/root",
                "mkfs btrfs /dev/fleet/data reserved=0",
            ]
        );
    }

    #[test]
    fn test_format_legacy_bad_blocks() {
        let host = FakeHost::default();
        format_volumes(
            &plan(LayoutMode::SplitRootData, VirtTechnology::Legacy),
            ModelOption::BadHd.into(),
            &host,
        )
        .unwrap();
        assert_eq!(
            host.commands(),
            vec![
                "mkswap /dev/fleet/swap",
                "mkfs ext3 /dev/fleet/root reserved=5 badblocks",
                "tune2fs /dev/fleet/root",
                "mkfs ext3 /dev/fleet/data reserved=0",
                "tune2fs /dev/fleet/data",
            ]
        );
    }

    #[test]
    fn test_one_partition_and_raw_disk() {
        let host = FakeHost::default();
        format_volumes(
            &plan(LayoutMode::OnePartition, VirtTechnology::Container),
            BitFlags::empty(),
            &host,
        )
        .unwrap();
        assert!(!host.commands().iter().any(|c| c.contains("data")));

        let host = FakeHost::default();
        format_volumes(
            &plan(LayoutMode::SplitRootDataRaw, VirtTechnology::Container),
            BitFlags::empty(),
            &host,
        )
        .unwrap();
        assert!(!host.commands().iter().any(|c| c.contains("rawdisk")));
    }

    #[test]
    fn test_tuning_failure_is_ignored() {
        let host = FakeHost::default().with_failing("tune2fs");
        format_volumes(
            &plan(LayoutMode::SplitRootData, VirtTechnology::Legacy),
            BitFlags::empty(),
            &host,
        )
        .unwrap();
    }

    #[test]
    fn test_format_failure_is_fatal() {
        let host = FakeHost::default().with_failing("mkfs");
        let error = format_volumes(
            &plan(LayoutMode::SplitRootData, VirtTechnology::Legacy),
            BitFlags::empty(),
            &host,
        )
        .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Storage(StorageError::FormatVolume {
                name: "root".into()
            })
        );
        assert!(!host.commands().iter().any(|c| c.contains("/dev/fleet/data")));
    }
}
