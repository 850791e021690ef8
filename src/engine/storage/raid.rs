use std::path::{Path, PathBuf};

use anyhow::Error;
use log::{error, info};
use strum_macros::Display;

use osutils::exe::BestEffort;
use provisioner_api::constants::{RAID_CHUNK_SIZE_KB, RAID_DEVICE_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RaidLevel {
    /// Mirroring across exactly two members.
    #[strum(to_string = "raid1")]
    Raid1,
    /// Striping with parity across three or more members.
    #[strum(to_string = "raid5")]
    Raid5,
}

impl RaidLevel {
    /// Level used for an array of `members` devices. Arrays need at least two.
    pub fn for_member_count(members: usize) -> Option<Self> {
        match members {
            0 | 1 => None,
            2 => Some(RaidLevel::Raid1),
            _ => Some(RaidLevel::Raid5),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            RaidLevel::Raid1 => 1,
            RaidLevel::Raid5 => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidArray {
    pub device_path: PathBuf,
    pub level: RaidLevel,
    pub members: Vec<PathBuf>,
}

pub trait RaidTools {
    fn stop_array(&self, array: &Path) -> BestEffort;

    fn zero_superblock(&self, member: &Path) -> BestEffort;

    fn create_array(
        &self,
        array: &Path,
        level: RaidLevel,
        chunk_size_kb: u64,
        members: &[PathBuf],
    ) -> Result<(), Error>;
}

/// Combines the first partitions of the usable devices into one array.
///
/// Returns `None` when RAID is not enabled or the array could not be built, in
/// which case the partitions are used directly.
#[tracing::instrument(skip_all)]
pub fn assemble(
    partitions: &[PathBuf],
    enabled: bool,
    tools: &impl RaidTools,
) -> Option<RaidArray> {
    if !enabled {
        return None;
    }

    info!("Software RAID enabled");
    let array = Path::new(RAID_DEVICE_PATH);
    tools.stop_array(array);
    for member in partitions {
        tools.zero_superblock(member);
    }

    let Some(level) = RaidLevel::for_member_count(partitions.len()) else {
        error!(
            "Not enough disks for RAID, found: {:?}. Using the partitions directly",
            partitions
        );
        return None;
    };

    match tools.create_array(array, level, RAID_CHUNK_SIZE_KB, partitions) {
        Ok(()) => {
            info!(
                "Created {level} array '{}' from {} members",
                array.display(),
                partitions.len()
            );
            Some(RaidArray {
                device_path: array.to_path_buf(),
                level,
                members: partitions.to_vec(),
            })
        }
        Err(e) => {
            error!("Failed to create RAID array, using the partitions directly: {e:?}");
            None
        }
    }
}
