pub mod filesystem;
pub mod filter;
pub mod host;
pub mod mount;
pub mod partitioning;
pub mod raid;
pub mod volume_group;

use filesystem::FilesystemTools;
use mount::MountTools;
use partitioning::Partitioner;
use raid::RaidTools;
use volume_group::VolumeManager;

pub use host::HostTools;

/// Every host tool the storage stages need.
pub trait StorageTools: Partitioner + RaidTools + VolumeManager + FilesystemTools + MountTools {}

impl<T> StorageTools for T where
    T: Partitioner + RaidTools + VolumeManager + FilesystemTools + MountTools
{
}
