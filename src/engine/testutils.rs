//! In-memory stand-ins for the host and the registry.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Error};

use osutils::{
    e2fsck::RepairMode, exe::BestEffort, lvm::LvSize, mkfs::ExtOptions,
    parted::PartitionTableType,
};
use provisioner_api::{
    config::{
        DiskPolicy, InstallConfiguration, InstallPaths, NodeFamily, VirtTechnology, VolumeSize,
        VolumeSizes,
    },
    constants::VOLUME_GROUP_EXTENT_SIZE_MB,
};
use sysdefs::filesystems::{MountFilesystemType, RealFilesystemType};

use crate::registry::{Audience, NodeTag, NotifyMessage, Registry};

use super::{
    inventory::{BlockDevice, HardwareInventory},
    storage::{
        filesystem::FilesystemTools,
        mount::MountTools,
        partitioning::{write_with_fallback, Partitioner},
        raid::{RaidLevel, RaidTools},
        volume_group::VolumeManager,
    },
};

/// Size of every physical volume on the fake host.
const DEFAULT_PV_SIZE_BYTES: u64 = 20 << 30;

pub fn device(path: &str, size_gb: f64, readonly: bool) -> BlockDevice {
    BlockDevice {
        path: path.into(),
        major_minor: "8:0".into(),
        size_gb,
        readonly,
        removable: false,
    }
}

pub fn sample_config() -> InstallConfiguration {
    InstallConfiguration {
        node_id: 42,
        node_model: "Dell R630".into(),
        node_family: NodeFamily::from_str("fleet-f22-x86_64").unwrap(),
        virt: VirtTechnology::Container,
        policy: DiskPolicy {
            min_disk_size_gb: 8,
            total_min_disk_size_gb: 16,
            min_memory_kb: 2 << 20,
            skip_checks: false,
        },
        volumes: VolumeSizes {
            swap: VolumeSize::from_gib(1),
            root: VolumeSize::from_gib(10),
            data: None,
        },
        one_partition: false,
        paths: InstallPaths::default(),
        registry: None,
    }
}

pub struct FakeInventory {
    pub memory_kb: u64,
    pub devices: Vec<BlockDevice>,
}

impl HardwareInventory for FakeInventory {
    fn total_memory_kb(&self) -> Result<u64, Error> {
        Ok(self.memory_kb)
    }

    fn block_devices(&self) -> Result<Vec<BlockDevice>, Error> {
        Ok(self.devices.clone())
    }
}

#[derive(Default)]
pub struct RecordingRegistry {
    fail: bool,
    tags: Vec<NodeTag>,
    notifications: RefCell<Vec<(NotifyMessage, Audience)>>,
}

impl RecordingRegistry {
    /// A registry that cannot be reached.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: Vec<NodeTag>) -> Self {
        self.tags = tags;
        self
    }

    /// Every notification attempted, delivered or not.
    pub fn notifications(&self) -> Vec<(NotifyMessage, Audience)> {
        self.notifications.borrow().clone()
    }
}

impl Registry for RecordingRegistry {
    fn notify(&self, message: NotifyMessage, audience: Audience) -> Result<bool, Error> {
        self.notifications.borrow_mut().push((message, audience));
        if self.fail {
            bail!("Registry unreachable");
        }
        Ok(true)
    }

    fn node_tags(&self, _node_id: u64) -> Result<Vec<NodeTag>, Error> {
        if self.fail {
            bail!("Registry unreachable");
        }
        Ok(self.tags.clone())
    }
}

struct FakeVolumeGroup {
    name: String,
    total_extents: u64,
    logical_volumes: Vec<(String, u64)>,
}

impl FakeVolumeGroup {
    fn free_extents(&self) -> u64 {
        self.total_extents - self.logical_volumes.iter().map(|(_, e)| e).sum::<u64>()
    }
}

#[derive(Default)]
struct FakeState {
    commands: Vec<String>,
    volume_group: Option<FakeVolumeGroup>,
}

/// Host that records every command and keeps track of volume group extents.
#[derive(Default)]
pub struct FakeHost {
    state: RefCell<FakeState>,
    failing: Vec<String>,
    unpartitionable: Vec<PathBuf>,
}

impl FakeHost {
    /// Makes every command starting with `prefix` fail.
    pub fn with_failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.into());
        self
    }

    pub fn with_failing_raid(self) -> Self {
        self.with_failing("mdadm create")
    }

    pub fn with_unpartitionable(mut self, device: impl Into<PathBuf>) -> Self {
        self.unpartitionable.push(device.into());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// Logical volumes of the volume group with their size in extents, in
    /// creation order.
    pub fn logical_volumes(&self) -> Vec<(String, u64)> {
        self.state
            .borrow()
            .volume_group
            .as_ref()
            .map(|vg| vg.logical_volumes.clone())
            .unwrap_or_default()
    }

    pub fn logical_volume_extents(&self, name: &str) -> Option<u64> {
        self.logical_volumes()
            .into_iter()
            .find(|(lv, _)| lv == name)
            .map(|(_, extents)| extents)
    }

    fn run(&self, command: String) -> Result<(), Error> {
        let fails = self.failing.iter().any(|p| command.starts_with(p.as_str()));
        self.state.borrow_mut().commands.push(command.clone());
        if fails {
            bail!("Simulated failure of '{command}'");
        }
        Ok(())
    }

    fn best_effort(&self, step: &str, command: String) -> BestEffort {
        BestEffort::from_result(step, self.run(command))
    }
}

impl Partitioner for FakeHost {
    fn create_single_partition(
        &self,
        device: &Path,
        preferred: PartitionTableType,
    ) -> Result<PathBuf, Error> {
        write_with_fallback(device, preferred, |table| {
            self.run(format!("partition {} {table}", device.display()))?;
            if self.unpartitionable.iter().any(|d| d == device) {
                bail!("Cannot partition '{}'", device.display());
            }
            Ok(())
        })
    }
}

impl RaidTools for FakeHost {
    fn stop_array(&self, array: &Path) -> BestEffort {
        self.best_effort("mdadm stop", format!("mdadm stop {}", array.display()))
    }

    fn zero_superblock(&self, member: &Path) -> BestEffort {
        self.best_effort("mdadm zero", format!("mdadm zero {}", member.display()))
    }

    fn create_array(
        &self,
        array: &Path,
        level: RaidLevel,
        chunk_size_kb: u64,
        members: &[PathBuf],
    ) -> Result<(), Error> {
        let members: Vec<String> = members.iter().map(|m| m.display().to_string()).collect();
        self.run(format!(
            "mdadm create {} {level} chunk={chunk_size_kb} {}",
            array.display(),
            members.join(" ")
        ))
    }
}

impl VolumeManager for FakeHost {
    fn remove_existing(&self, vg_name: &str, _logical_volumes: &[PathBuf]) -> BestEffort {
        let result = self.run(format!("vgremove {vg_name}"));
        if result.is_ok() {
            let mut state = self.state.borrow_mut();
            if state.volume_group.as_ref().is_some_and(|vg| vg.name == vg_name) {
                state.volume_group = None;
            }
        }
        BestEffort::from_result("vgremove", result)
    }

    fn create_physical_volume(&self, path: &Path) -> Result<(), Error> {
        self.run(format!("pvcreate {}", path.display()))
    }

    fn create_volume_group(
        &self,
        vg_name: &str,
        extent_size_mb: u64,
        physical_volumes: &[PathBuf],
    ) -> Result<(), Error> {
        let pvs: Vec<String> = physical_volumes
            .iter()
            .map(|pv| pv.display().to_string())
            .collect();
        self.run(format!("vgcreate {vg_name} {}", pvs.join(" ")))?;

        let mut state = self.state.borrow_mut();
        if state.volume_group.is_some() {
            bail!("Volume group '{vg_name}' already exists");
        }
        let total_bytes = DEFAULT_PV_SIZE_BYTES * physical_volumes.len() as u64;
        state.volume_group = Some(FakeVolumeGroup {
            name: vg_name.into(),
            total_extents: total_bytes / (extent_size_mb << 20),
            logical_volumes: Vec::new(),
        });
        Ok(())
    }

    fn create_logical_volume(
        &self,
        vg_name: &str,
        lv_name: &str,
        size: LvSize,
    ) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let vg = state
            .volume_group
            .as_ref()
            .filter(|vg| vg.name == vg_name)
            .context(format!("Volume group '{vg_name}' not found"))?;
        let extents = match size {
            LvSize::Bytes(bytes) => bytes.div_ceil(VOLUME_GROUP_EXTENT_SIZE_MB << 20),
            LvSize::Extents(extents) => extents,
        };
        let free = vg.free_extents();
        drop(state);

        self.run(format!("lvcreate {vg_name} {lv_name} {extents}"))?;
        if extents == 0 || extents > free {
            bail!("Insufficient free extents for '{lv_name}': {extents} requested, {free} free");
        }

        let mut state = self.state.borrow_mut();
        if let Some(vg) = state.volume_group.as_mut() {
            vg.logical_volumes.push((lv_name.into(), extents));
        }
        Ok(())
    }

    fn free_extents(&self, vg_name: &str) -> Result<u64, Error> {
        self.state
            .borrow()
            .volume_group
            .as_ref()
            .filter(|vg| vg.name == vg_name)
            .map(FakeVolumeGroup::free_extents)
            .context(format!("Volume group '{vg_name}' not found"))
    }

    fn activate_volume_group(&self, vg_name: &str) -> Result<(), Error> {
        self.run(format!("vgactivate {vg_name}"))
    }
}

impl FilesystemTools for FakeHost {
    fn make_swap(&self, device: &Path) -> Result<(), Error> {
        self.run(format!("mkswap {}", device.display()))
    }

    fn make_filesystem(
        &self,
        device: &Path,
        filesystem: RealFilesystemType,
        options: ExtOptions,
    ) -> Result<(), Error> {
        self.run(format!(
            "mkfs {} {} reserved={}{}",
            filesystem.name(),
            device.display(),
            options.reserved_blocks_percent,
            if options.check_bad_blocks {
                " badblocks"
            } else {
                ""
            }
        ))
    }

    fn disable_periodic_checks(&self, device: &Path) -> BestEffort {
        self.best_effort("tune2fs", format!("tune2fs {}", device.display()))
    }

    fn check_filesystem(&self, device: &Path, mode: RepairMode) -> Result<(), Error> {
        let flag = match mode {
            RepairMode::Preen => "-p",
            RepairMode::AssumeYes => "-y",
        };
        self.run(format!("e2fsck {flag} {}", device.display()))
    }

    fn enable_quota(&self, mount_point: &Path) -> BestEffort {
        self.best_effort(
            "btrfs quota enable",
            format!("btrfs quota enable {}", mount_point.display()),
        )
    }
}

impl MountTools for FakeHost {
    fn create_mount_point(&self, path: &Path) -> Result<(), Error> {
        self.run(format!("mkdir {}", path.display()))
    }

    fn mount(
        &self,
        source: &Path,
        target: &Path,
        filesystem: MountFilesystemType,
    ) -> Result<(), Error> {
        self.run(format!(
            "mount {} {} {}",
            filesystem.name(),
            source.display(),
            target.display()
        ))
    }

    fn swap_on(&self, device: &Path) -> BestEffort {
        self.best_effort("swapon", format!("swapon {}", device.display()))
    }

    fn swap_off(&self, device: &Path) -> BestEffort {
        self.best_effort("swapoff", format!("swapoff {}", device.display()))
    }
}
