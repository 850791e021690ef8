use std::path::PathBuf;

use anyhow::{Context, Error};
use log::debug;
use procfs::{Current, Meminfo};

use osutils::block_devices::{self, SysfsBlockDevice, SYS_BLOCK_PATH};

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// A block device found on the host. Discovered fresh on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDevice {
    pub path: PathBuf,
    pub major_minor: String,
    pub size_gb: f64,
    pub readonly: bool,
    pub removable: bool,
}

impl From<SysfsBlockDevice> for BlockDevice {
    fn from(device: SysfsBlockDevice) -> Self {
        BlockDevice {
            path: device.path,
            major_minor: device.major_minor,
            size_gb: device.size_bytes as f64 / BYTES_PER_GB,
            readonly: device.readonly,
            removable: device.removable,
        }
    }
}

/// Read-only view of the host hardware.
pub trait HardwareInventory {
    fn total_memory_kb(&self) -> Result<u64, Error>;

    /// All block devices, sorted by path.
    fn block_devices(&self) -> Result<Vec<BlockDevice>, Error>;
}

/// Inventory backed by procfs and sysfs.
pub struct HostInventory {
    sys_block: PathBuf,
}

impl Default for HostInventory {
    fn default() -> Self {
        Self {
            sys_block: PathBuf::from(SYS_BLOCK_PATH),
        }
    }
}

impl HardwareInventory for HostInventory {
    fn total_memory_kb(&self) -> Result<u64, Error> {
        let meminfo = Meminfo::current().context("Failed to read /proc/meminfo")?;
        Ok(meminfo.mem_total / 1024)
    }

    fn block_devices(&self) -> Result<Vec<BlockDevice>, Error> {
        let devices: Vec<BlockDevice> = block_devices::list(&self.sys_block)?
            .into_iter()
            .map(BlockDevice::from)
            .collect();
        debug!("Detected block devices: {devices:?}");
        Ok(devices)
    }
}
