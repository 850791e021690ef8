use std::path::{Path, PathBuf};

use anyhow::{anyhow, Error};
use log::{debug, info};

use osutils::{exe::BestEffort, lvm::LvSize};
use provisioner_api::{
    config::{LayoutMode, LogicalVolumeName, SizeSpec, VirtTechnology, VolumeSizes},
    constants::{VOLUME_GROUP_EXTENT_SIZE_MB, VOLUME_GROUP_NAME},
    error::{ProvisionError, ReportError, StorageError},
};
use sysdefs::filesystems::RealFilesystemType;

pub trait VolumeManager {
    /// Deactivates and removes `vg_name` together with `logical_volumes`.
    /// Nothing to remove is not a failure.
    fn remove_existing(&self, vg_name: &str, logical_volumes: &[PathBuf]) -> BestEffort;

    /// Initializes `path` as a physical volume, clearing whatever it held.
    fn create_physical_volume(&self, path: &Path) -> Result<(), Error>;

    fn create_volume_group(
        &self,
        vg_name: &str,
        extent_size_mb: u64,
        physical_volumes: &[PathBuf],
    ) -> Result<(), Error>;

    fn create_logical_volume(&self, vg_name: &str, lv_name: &str, size: LvSize)
        -> Result<(), Error>;

    fn free_extents(&self, vg_name: &str) -> Result<u64, Error>;

    /// Makes an existing volume group's logical volumes available.
    fn activate_volume_group(&self, vg_name: &str) -> Result<(), Error>;
}

/// What ends up on a logical volume once it is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Swap,
    Filesystem(RealFilesystemType),
    /// Left to the workloads as a raw block device.
    Unformatted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalVolume {
    pub name: LogicalVolumeName,
    pub size: SizeSpec,
    pub format: VolumeFormat,
}

impl LogicalVolume {
    pub fn device_path(&self) -> PathBuf {
        PathBuf::from(self.name.device_path())
    }
}

/// Logical volumes to create, in creation order.
///
/// A `Remaining` volume takes every extent still free when it is created, so
/// the order of the returned list must be kept.
pub fn plan_layout(
    layout: LayoutMode,
    sizes: &VolumeSizes,
    virt: VirtTechnology,
) -> Vec<LogicalVolume> {
    let mut volumes = vec![LogicalVolume {
        name: LogicalVolumeName::Swap,
        size: SizeSpec::Absolute(sizes.swap.bytes()),
        format: VolumeFormat::Swap,
    }];

    volumes.push(LogicalVolume {
        name: LogicalVolumeName::Root,
        size: match layout {
            LayoutMode::OnePartition => SizeSpec::Remaining,
            _ => SizeSpec::Absolute(sizes.root.bytes()),
        },
        format: VolumeFormat::Filesystem(RealFilesystemType::Ext3),
    });

    let data = VolumeFormat::Filesystem(virt.data_filesystem());
    match (layout, sizes.data) {
        (LayoutMode::OnePartition, _) => {}
        (LayoutMode::SplitRootDataRaw, Some(data_size)) => {
            volumes.push(LogicalVolume {
                name: LogicalVolumeName::Data,
                size: SizeSpec::Absolute(data_size.bytes()),
                format: data,
            });
            volumes.push(LogicalVolume {
                name: LogicalVolumeName::RawDisk,
                size: SizeSpec::Remaining,
                format: VolumeFormat::Unformatted,
            });
        }
        _ => volumes.push(LogicalVolume {
            name: LogicalVolumeName::Data,
            size: SizeSpec::Remaining,
            format: data,
        }),
    }

    volumes
}

/// Removes the volume group left behind by a previous run, if any.
#[tracing::instrument(skip_all)]
pub fn teardown(tools: &impl VolumeManager) -> BestEffort {
    let previous: Vec<PathBuf> = [
        LogicalVolumeName::Swap,
        LogicalVolumeName::Root,
        LogicalVolumeName::Data,
        LogicalVolumeName::RawDisk,
    ]
    .into_iter()
    .map(|name| PathBuf::from(name.device_path()))
    .collect();

    info!("Removing previous volume group '{VOLUME_GROUP_NAME}'");
    tools.remove_existing(VOLUME_GROUP_NAME, &previous)
}

/// Creates one logical volume in `vg_name`.
///
/// A `Remaining` volume gets all extents free at this point and is refused
/// when none are left.
pub fn create_logical_volume(
    tools: &impl VolumeManager,
    vg_name: &str,
    volume: &LogicalVolume,
) -> Result<(), ProvisionError> {
    let name = volume.name.name();
    let size = match volume.size {
        SizeSpec::Absolute(bytes) => LvSize::Bytes(bytes),
        SizeSpec::Remaining => {
            let free = tools
                .free_extents(vg_name)
                .structured(StorageError::QueryFreeExtents {
                    name: vg_name.into(),
                })?;
            debug!("Volume group '{vg_name}' has {free} free extents");
            if free == 0 {
                return Err(anyhow!("Volume group '{vg_name}' has no free extents left"))
                    .structured(StorageError::CreateLogicalVolume { name: name.into() });
            }
            LvSize::Extents(free)
        }
    };

    tools
        .create_logical_volume(vg_name, name, size)
        .structured(StorageError::CreateLogicalVolume { name: name.into() })
}

/// Initializes the physical volumes, creates the volume group and carves the
/// logical volumes out of it in the given order.
///
/// Nothing is rolled back on failure. The teardown at the start of the next
/// run clears whatever was left.
#[tracing::instrument(skip_all)]
pub fn build_volume_group(
    physical_volumes: &[PathBuf],
    volumes: &[LogicalVolume],
    tools: &impl VolumeManager,
) -> Result<(), ProvisionError> {
    if physical_volumes.is_empty() {
        return Err(ProvisionError::new(StorageError::NoPhysicalVolumes {
            name: VOLUME_GROUP_NAME.into(),
        }));
    }

    for pv in physical_volumes {
        tools
            .create_physical_volume(pv)
            .structured(StorageError::CreatePhysicalVolume {
                path: pv.display().to_string(),
            })?;
    }

    tools
        .create_volume_group(
            VOLUME_GROUP_NAME,
            VOLUME_GROUP_EXTENT_SIZE_MB,
            physical_volumes,
        )
        .structured(StorageError::CreateVolumeGroup {
            name: VOLUME_GROUP_NAME.into(),
        })?;

    for volume in volumes {
        create_logical_volume(tools, VOLUME_GROUP_NAME, volume)?;
    }

    info!(
        "Created volume group '{VOLUME_GROUP_NAME}' with volumes {:?}",
        volumes.iter().map(|v| v.name.name()).collect::<Vec<_>>()
    );
    Ok(())
}
