pub mod block_devices;
pub mod btrfs;
pub mod e2fsck;
pub mod exe;
pub mod files;
pub mod lvm;
pub mod mdadm;
pub mod mkfs;
pub mod mkswap;
pub mod mount;
pub mod parted;
pub mod tune2fs;

pub(crate) mod crate_private {
    pub trait Sealed {}
}
