use std::path::{Path, PathBuf};

use anyhow::Error;
use log::debug;

use osutils::{
    block_devices, btrfs,
    e2fsck::{self, RepairMode},
    exe::BestEffort,
    files, lvm,
    lvm::LvSize,
    mdadm, mkfs,
    mkfs::ExtOptions,
    mkswap, mount,
    parted::{self, PartitionTableType},
    tune2fs,
};
use sysdefs::filesystems::{MountFilesystemType, RealFilesystemType};

use super::{
    filesystem::FilesystemTools,
    mount::MountTools,
    partitioning::{write_with_fallback, Partitioner},
    raid::{RaidLevel, RaidTools},
    volume_group::VolumeManager,
};

/// Storage tools acting on the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostTools;

impl Partitioner for HostTools {
    fn create_single_partition(
        &self,
        device: &Path,
        preferred: PartitionTableType,
    ) -> Result<PathBuf, Error> {
        block_devices::zero_first_sector(device)?;
        write_with_fallback(device, preferred, |table| {
            parted::single_lvm_partition(device, table)
        })
    }
}

impl RaidTools for HostTools {
    fn stop_array(&self, array: &Path) -> BestEffort {
        BestEffort::attempt("mdadm stop", || mdadm::stop(array))
    }

    fn zero_superblock(&self, member: &Path) -> BestEffort {
        BestEffort::attempt("mdadm zero superblock", || mdadm::zero_superblock(member))
    }

    fn create_array(
        &self,
        array: &Path,
        level: RaidLevel,
        chunk_size_kb: u64,
        members: &[PathBuf],
    ) -> Result<(), Error> {
        mdadm::create(array, level.number(), chunk_size_kb, members)
    }
}

impl VolumeManager for HostTools {
    fn remove_existing(&self, vg_name: &str, logical_volumes: &[PathBuf]) -> BestEffort {
        let scanned = BestEffort::attempt("vgscan", lvm::vgscan);
        BestEffort::attempt("vgchange -ay", || lvm::vgchange(true));
        for lv in logical_volumes {
            if lvm::lvremove(lv).is_err() {
                debug!("No logical volume '{}' to remove", lv.display());
            }
        }
        BestEffort::attempt("vgchange -an", || lvm::vgchange(false));
        if lvm::vgremove(vg_name).is_err() {
            debug!("No volume group '{vg_name}' to remove");
        }
        BestEffort::attempt("vgscan", lvm::vgscan);
        scanned
    }

    fn create_physical_volume(&self, path: &Path) -> Result<(), Error> {
        block_devices::zero_first_sector(path)?;
        lvm::pvcreate(path)
    }

    fn create_volume_group(
        &self,
        vg_name: &str,
        extent_size_mb: u64,
        physical_volumes: &[PathBuf],
    ) -> Result<(), Error> {
        lvm::vgcreate(vg_name, extent_size_mb, physical_volumes)
    }

    fn create_logical_volume(
        &self,
        vg_name: &str,
        lv_name: &str,
        size: LvSize,
    ) -> Result<(), Error> {
        lvm::lvcreate(vg_name, lv_name, size)
    }

    fn free_extents(&self, vg_name: &str) -> Result<u64, Error> {
        lvm::free_extents(vg_name)
    }

    fn activate_volume_group(&self, vg_name: &str) -> Result<(), Error> {
        lvm::vgscan()?;
        lvm::vgchange_activate(vg_name)
    }
}

impl FilesystemTools for HostTools {
    fn make_swap(&self, device: &Path) -> Result<(), Error> {
        mkswap::run(device)
    }

    fn make_filesystem(
        &self,
        device: &Path,
        filesystem: RealFilesystemType,
        options: ExtOptions,
    ) -> Result<(), Error> {
        mkfs::run(device, filesystem, options)
    }

    fn disable_periodic_checks(&self, device: &Path) -> BestEffort {
        BestEffort::attempt("tune2fs", || tune2fs::disable_periodic_checks(device))
    }

    fn check_filesystem(&self, device: &Path, mode: RepairMode) -> Result<(), Error> {
        e2fsck::run(device, mode)
    }

    fn enable_quota(&self, mount_point: &Path) -> BestEffort {
        BestEffort::attempt("btrfs quota enable", || btrfs::quota_enable(mount_point))
    }
}

impl MountTools for HostTools {
    fn create_mount_point(&self, path: &Path) -> Result<(), Error> {
        files::create_dirs(path)
    }

    fn mount(
        &self,
        source: &Path,
        target: &Path,
        filesystem: MountFilesystemType,
    ) -> Result<(), Error> {
        mount::mount(source, target, filesystem)
    }

    fn swap_on(&self, device: &Path) -> BestEffort {
        BestEffort::attempt("swapon", || mkswap::swapon(device))
    }

    fn swap_off(&self, device: &Path) -> BestEffort {
        BestEffort::attempt("swapoff", || mkswap::swapoff(device))
    }
}
