use std::path::{Path, PathBuf};

use anyhow::Error;
use log::{info, warn};

use osutils::{e2fsck::RepairMode, exe::BestEffort};
use provisioner_api::{
    config::{InstallPaths, LayoutMode, LogicalVolumeName, VirtTechnology},
    constants::{DATA_MOUNT_DIRECTORY, PROC_MOUNT_DIRECTORY},
    error::{ProvisionError, ReportError, StorageError},
};
use sysdefs::filesystems::{MountFilesystemType, NodevFilesystemType, RealFilesystemType};

use super::filesystem::FilesystemTools;

pub trait MountTools {
    fn create_mount_point(&self, path: &Path) -> Result<(), Error>;

    fn mount(
        &self,
        source: &Path,
        target: &Path,
        filesystem: MountFilesystemType,
    ) -> Result<(), Error>;

    fn swap_on(&self, device: &Path) -> BestEffort;

    fn swap_off(&self, device: &Path) -> BestEffort;
}

/// Where the provisioned volumes ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedVolumes {
    pub root: PathBuf,
    pub data: Option<PathBuf>,
}

/// Runs an integrity check on an ext filesystem, retrying once with the more
/// aggressive repair mode.
fn check_and_repair(
    device: &Path,
    tools: &impl FilesystemTools,
) -> Result<(), ProvisionError> {
    match tools.check_filesystem(device, RepairMode::Preen) {
        Ok(()) => {
            tools.disable_periodic_checks(device);
            Ok(())
        }
        Err(e) => {
            warn!(
                "Filesystem check of '{}' failed, retrying with automatic repair: {e:?}",
                device.display()
            );
            tools
                .check_filesystem(device, RepairMode::AssumeYes)
                .structured(StorageError::RepairFilesystem {
                    path: device.display().to_string(),
                })
        }
    }
}

fn mount_at(
    source: &Path,
    target: &Path,
    filesystem: MountFilesystemType,
    tools: &impl MountTools,
) -> Result<(), ProvisionError> {
    tools
        .create_mount_point(target)
        .structured(StorageError::CreateMountPoint {
            path: target.display().to_string(),
        })?;
    info!(
        "Mounting '{}' at '{}' as {}",
        source.display(),
        target.display(),
        filesystem.name()
    );
    tools
        .mount(source, target, filesystem)
        .structured(StorageError::Mount {
            path: target.display().to_string(),
        })
}

/// Checks and mounts the root volume at `paths.sysimg`, mounts proc inside it
/// and turns swap on.
#[tracing::instrument(skip_all)]
pub fn mount_root<T>(paths: &InstallPaths, tools: &T) -> Result<PathBuf, ProvisionError>
where
    T: FilesystemTools + MountTools,
{
    let root = PathBuf::from(LogicalVolumeName::Root.device_path());
    check_and_repair(&root, tools)?;

    tools.swap_on(Path::new(&LogicalVolumeName::Swap.device_path()));

    mount_at(
        &root,
        &paths.sysimg,
        RealFilesystemType::Ext3.into(),
        tools,
    )?;
    mount_at(
        Path::new(NodevFilesystemType::Proc.name()),
        &paths.sysimg.join(PROC_MOUNT_DIRECTORY),
        NodevFilesystemType::Proc.into(),
        tools,
    )?;

    Ok(paths.sysimg.clone())
}

/// Checks and mounts the data volume under the mounted root, when the layout
/// has one. Returns where it was mounted.
#[tracing::instrument(skip_all)]
pub fn mount_data<T>(
    layout: LayoutMode,
    virt: VirtTechnology,
    paths: &InstallPaths,
    tools: &T,
) -> Result<Option<PathBuf>, ProvisionError>
where
    T: FilesystemTools + MountTools,
{
    if !layout.has_data_volume() {
        return Ok(None);
    }

    let data = PathBuf::from(LogicalVolumeName::Data.device_path());
    let filesystem = virt.data_filesystem();
    if filesystem.is_ext() {
        check_and_repair(&data, tools)?;
    }

    let target = paths.sysimg.join(DATA_MOUNT_DIRECTORY);
    mount_at(&data, &target, filesystem.into(), tools)?;
    if filesystem.is_copy_on_write() {
        tools.enable_quota(&target);
    }
    Ok(Some(target))
}

/// Mounts the root volume, then the data volume.
pub fn mount_volumes<T>(
    layout: LayoutMode,
    virt: VirtTechnology,
    paths: &InstallPaths,
    tools: &T,
) -> Result<MountedVolumes, ProvisionError>
where
    T: FilesystemTools + MountTools,
{
    let root = mount_root(paths, tools)?;
    let data = mount_data(layout, virt, paths, tools)?;
    Ok(MountedVolumes { root, data })
}

#[cfg(test)]
mod tests {
    use provisioner_api::error::ErrorKind;

    use crate::engine::testutils::FakeHost;

    use super::*;

    fn paths() -> InstallPaths {
        InstallPaths {
            sysimg: "/mnt/sysimg".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_mount_container() {
        let host = FakeHost::default();
        let mounted = mount_volumes(
            LayoutMode::SplitRootData,
            VirtTechnology::Container,
            &paths(),
            &host,
        )
        .unwrap();
        assert_eq!(
            mounted,
            MountedVolumes {
                root: "/mnt/sysimg".into(),
                data: Some("/mnt/sysimg/data".into()),
            }
        );
        assert_eq!(
            host.commands(),
            vec![
                "e2fsck -p /dev/fleet/root",
                "tune2fs /dev/fleet/root",
                "swapon /dev/fleet/swap",
                "mkdir /mnt/sysimg",
                "mount ext3 /dev/fleet/root /mnt/sysimg",
                "mkdir /mnt/sysimg/proc",
                "mount proc proc /mnt/sysimg/proc",
                "mkdir /mnt/sysimg/data",
                "mount btrfs /dev/fleet/data /mnt/sysimg/data",
                "btrfs quota enable /mnt/sysimg/data",
            ]
        );
    }

    #[test]
    fn test_mount_legacy_checks_data() {
        let host = FakeHost::default();
        mount_volumes(
            LayoutMode::SplitRootData,
            VirtTechnology::Legacy,
            &paths(),
            &host,
        )
        .unwrap();
        let commands = host.commands();
        let position = |command: &str| commands.iter().position(|c| c == command);
        assert!(
            position("mount ext3 /dev/fleet/root /mnt/sysimg")
                < position("e2fsck -p /dev/fleet/data")
        );
        assert!(commands.contains(&"e2fsck -p /dev/fleet/data".to_string()));
        assert!(commands.contains(&"mount ext3 /dev/fleet/data /mnt/sysimg/data".to_string()));
        assert!(!commands.iter().any(|c| c.starts_with("btrfs")));
    }

    #[test]
    fn test_mount_one_partition() {
        let host = FakeHost::default();
        let mounted = mount_volumes(
            LayoutMode::OnePartition,
            VirtTechnology::Container,
            &paths(),
            &host,
        )
        .unwrap();
        assert_eq!(mounted.data, None);
        assert!(!host.commands().iter().any(|c| c.contains("data")));
    }

    #[test]
    fn test_repair_retry() {
        let host = FakeHost::default().with_failing("e2fsck -p");
        mount_volumes(
            LayoutMode::OnePartition,
            VirtTechnology::Legacy,
            &paths(),
            &host,
        )
        .unwrap();
        let commands = host.commands();
        assert_eq!(commands[0], "e2fsck -p /dev/fleet/root");
        assert_eq!(commands[1], "e2fsck -y /dev/fleet/root");
        assert!(!commands.contains(&"tune2fs /dev/fleet/root".to_string()));
    }

    #[test]
    fn test_repair_failure_is_fatal() {
        let host = FakeHost::default().with_failing("e2fsck");
        let error = mount_volumes(
            LayoutMode::SplitRootData,
            VirtTechnology::Legacy,
            &paths(),
            &host,
        )
        .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Storage(StorageError::RepairFilesystem {
                path: "/dev/fleet/root".into()
            })
        );
        assert!(!host.commands().iter().any(|c| c.starts_with("mount")));
    }

    #[test]
    fn test_mount_root_leaves_data_alone() {
        let host = FakeHost::default();
        let root = mount_root(&paths(), &host).unwrap();
        assert_eq!(root, PathBuf::from("/mnt/sysimg"));
        assert!(!host.commands().iter().any(|c| c.contains("data")));

        let data = mount_data(
            LayoutMode::SplitRootData,
            VirtTechnology::Legacy,
            &paths(),
            &host,
        )
        .unwrap();
        assert_eq!(data, Some(PathBuf::from("/mnt/sysimg/data")));
        assert_eq!(
            host.commands()[7..],
            [
                "e2fsck -p /dev/fleet/data",
                "tune2fs /dev/fleet/data",
                "mkdir /mnt/sysimg/data",
                "mount ext3 /dev/fleet/data /mnt/sysimg/data",
            ]
        );
    }

    #[test]
    fn test_optional_steps_do_not_fail() {
        let host = FakeHost::default()
            .with_failing("swapon")
            .with_failing("btrfs");
        mount_volumes(
            LayoutMode::SplitRootData,
            VirtTechnology::Container,
            &paths(),
            &host,
        )
        .unwrap();
    }
}
