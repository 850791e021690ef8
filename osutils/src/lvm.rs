//! Wrappers around the LVM2 command line tools.

use std::{path::Path, process::Command};

use anyhow::{bail, Context, Error};
use log::{debug, info};

use crate::exe::RunAndCheck;

/// Field of `vgdisplay -c` holding the number of free physical extents.
const VGDISPLAY_FREE_EXTENTS_FIELD: usize = 15;

/// Size argument for `lvcreate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LvSize {
    /// `-L <bytes>b`
    Bytes(u64),
    /// `-l <extents>`
    Extents(u64),
}

/// Scans all disks for volume groups.
pub fn vgscan() -> Result<(), Error> {
    Command::new("vgscan")
        .run_and_check()
        .context("Failed to scan for volume groups")
}

/// Activates (`true`) or deactivates every known volume group.
pub fn vgchange(activate: bool) -> Result<(), Error> {
    Command::new("vgchange")
        .arg(if activate { "-ay" } else { "-an" })
        .run_and_check()
        .context(format!(
            "Failed to {} volume groups",
            if activate { "activate" } else { "deactivate" }
        ))
}

/// Activates a single volume group.
pub fn vgchange_activate(vg_name: &str) -> Result<(), Error> {
    Command::new("vgchange")
        .arg("-ay")
        .arg(vg_name)
        .run_and_check()
        .context(format!("Failed to activate volume group '{vg_name}'"))
}

pub fn lvremove(lv_path: impl AsRef<Path>) -> Result<(), Error> {
    Command::new("lvremove")
        .arg("-f")
        .arg(lv_path.as_ref())
        .run_and_check()
        .context(format!(
            "Failed to remove logical volume '{}'",
            lv_path.as_ref().display()
        ))
}

pub fn vgremove(vg_name: &str) -> Result<(), Error> {
    Command::new("vgremove")
        .arg("-f")
        .arg(vg_name)
        .run_and_check()
        .context(format!("Failed to remove volume group '{vg_name}'"))
}

/// Initializes a partition as a physical volume, overwriting any signature found on it.
pub fn pvcreate(device_path: impl AsRef<Path>) -> Result<(), Error> {
    info!("Creating physical volume on '{}'", device_path.as_ref().display());
    Command::new("pvcreate")
        .arg("-ffy")
        .arg(device_path.as_ref())
        .run_and_check()
        .context(format!(
            "Failed to create physical volume on '{}'",
            device_path.as_ref().display()
        ))
}

pub fn vgcreate<P: AsRef<Path>>(
    vg_name: &str,
    extent_size_mb: u64,
    physical_volumes: &[P],
) -> Result<(), Error> {
    if physical_volumes.is_empty() {
        bail!("Cannot create volume group '{vg_name}' without physical volumes");
    }

    info!("Creating volume group '{vg_name}'");
    Command::new("vgcreate")
        .arg(format!("-s{extent_size_mb}M"))
        .arg(vg_name)
        .args(physical_volumes.iter().map(|pv| pv.as_ref()))
        .run_and_check()
        .context(format!("Failed to create volume group '{vg_name}'"))
}

pub fn lvcreate(vg_name: &str, lv_name: &str, size: LvSize) -> Result<(), Error> {
    info!("Creating logical volume '{lv_name}' of {size:?} in '{vg_name}'");
    let mut cmd = Command::new("lvcreate");
    match size {
        LvSize::Bytes(bytes) => cmd.arg(format!("-L{bytes}b")),
        LvSize::Extents(extents) => cmd.arg(format!("-l{extents}")),
    };
    cmd.arg(format!("-n{lv_name}"))
        .arg(vg_name)
        .run_and_check()
        .context(format!("Failed to create logical volume '{lv_name}'"))
}

/// Returns the number of unallocated extents in the volume group.
pub fn free_extents(vg_name: &str) -> Result<u64, Error> {
    let output = Command::new("vgdisplay")
        .arg("-c")
        .arg(vg_name)
        .output_and_check()
        .context(format!("Failed to query volume group '{vg_name}'"))?;
    parse_free_extents(&output)
        .context(format!("Failed to parse vgdisplay output for '{vg_name}'"))
}

fn parse_free_extents(vgdisplay_output: &str) -> Result<u64, Error> {
    let line = vgdisplay_output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .context("vgdisplay produced no output")?;
    debug!("vgdisplay: {line}");

    let field = line
        .split(':')
        .nth(VGDISPLAY_FREE_EXTENTS_FIELD)
        .context(format!("vgdisplay output has too few fields: '{line}'"))?;
    field
        .parse()
        .context(format!("Free extent count '{field}' is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_free_extents() {
        let output = "  fleet:r/w:772:-1:0:2:2:-1:0:1:1:20938752:32768:639:96:543:Xq2bXw-3Gk1-Aqd8\n";
        assert_eq!(parse_free_extents(output).unwrap(), 543);

        let output = "\n  fleet:r/w:772:-1:0:3:3:-1:0:1:1:20938752:32768:639:639:0:uuid\n";
        assert_eq!(parse_free_extents(output).unwrap(), 0);
    }

    #[test]
    fn test_parse_free_extents_errors() {
        parse_free_extents("").unwrap_err();
        parse_free_extents("fleet:r/w:772").unwrap_err();
        parse_free_extents("a:b:c:d:e:f:g:h:i:j:k:l:m:n:o:many:q").unwrap_err();
    }

    #[test]
    fn test_vgcreate_requires_volumes() {
        let error = vgcreate::<&str>("fleet", 32, &[]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Cannot create volume group 'fleet' without physical volumes"
        );
    }
}
