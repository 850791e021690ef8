use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Error};
use log::{debug, warn};

use crate::exe::RunAndCheck;

/// Default location of the block device class in sysfs.
pub const SYS_BLOCK_PATH: &str = "/sys/block";

/// `size` in sysfs is always counted in 512-byte sectors.
const SYSFS_SECTOR_SIZE: u64 = 512;

/// Kernel name prefixes of devices that are never install targets.
const IGNORED_DEVICE_PREFIXES: &[&str] = &["ram", "loop"];

/// A block device as reported by sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsBlockDevice {
    /// Device node, e.g. `/dev/sda` or `/dev/cciss/c0d0`.
    pub path: PathBuf,
    /// `major:minor`
    pub major_minor: String,
    pub size_bytes: u64,
    pub readonly: bool,
    pub removable: bool,
}

/// Lists block devices under `sys_block`, sorted by device path.
///
/// Devices whose attributes cannot be read are logged and skipped.
pub fn list(sys_block: impl AsRef<Path>) -> Result<Vec<SysfsBlockDevice>, Error> {
    let pattern = sys_block.as_ref().join("*");
    let pattern = pattern
        .to_str()
        .context(format!("Non UTF-8 sysfs path '{}'", pattern.display()))?;

    let mut devices = Vec::new();
    for entry in glob::glob(pattern).context("Invalid sysfs glob pattern")? {
        let entry = entry.context("Failed to read sysfs block entry")?;
        let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if IGNORED_DEVICE_PREFIXES.iter().any(|p| name.starts_with(p)) {
            debug!("Ignoring block device '{name}'");
            continue;
        }

        match read_device(&entry, name) {
            Ok(device) => devices.push(device),
            Err(e) => warn!("Skipping block device '{name}': {e:?}"),
        }
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

fn read_device(sysfs_dir: &Path, name: &str) -> Result<SysfsBlockDevice, Error> {
    let read = |attr: &str| -> Result<String, Error> {
        let path = sysfs_dir.join(attr);
        fs::read_to_string(&path)
            .map(|s| s.trim().to_owned())
            .context(format!("Failed to read '{}'", path.display()))
    };
    let read_flag = |attr: &str| -> Result<bool, Error> {
        let value = read(attr)?;
        Ok(value
            .parse::<u8>()
            .context(format!("Attribute '{attr}' has non-numeric value '{value}'"))?
            != 0)
    };

    let sectors: u64 = read("size")?
        .parse()
        .context("Attribute 'size' is not a number")?;

    Ok(SysfsBlockDevice {
        path: device_path_from_kernel_name(name),
        major_minor: read("dev")?,
        size_bytes: sectors * SYSFS_SECTOR_SIZE,
        readonly: read_flag("ro")?,
        removable: read_flag("removable")?,
    })
}

/// Maps a sysfs kernel name to its device node. Sysfs spells `/` as `!`.
pub fn device_path_from_kernel_name(name: &str) -> PathBuf {
    Path::new("/dev").join(name.replace('!', "/"))
}

/// Path of the first partition on `device`.
///
/// Devices whose names end in a digit (nvme, mmcblk) and devices under
/// `/dev/cciss` separate the partition number with a `p`.
pub fn first_partition_path(device: impl AsRef<Path>) -> PathBuf {
    let device = device.as_ref();
    let as_str = device.to_string_lossy();
    let separator = if device.starts_with("/dev/cciss")
        || as_str.ends_with(|c: char| c.is_ascii_digit())
    {
        "p"
    } else {
        ""
    };
    PathBuf::from(format!("{as_str}{separator}1"))
}

/// Overwrites the first sector of `device` with zeros, destroying any
/// partition table or volume signature stored there.
pub fn zero_first_sector(device: impl AsRef<Path>) -> Result<(), Error> {
    Command::new("dd")
        .arg("if=/dev/zero")
        .arg(format!("of={}", device.as_ref().display()))
        .arg("bs=512")
        .arg("count=1")
        .run_and_check()
        .context(format!(
            "Failed to zero first sector of '{}'",
            device.as_ref().display()
        ))
}
