use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// Filesystems backed by a block device that the installer creates or mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RealFilesystemType {
    Btrfs,
    Ext2,
    Ext3,
    Ext4,
}

impl RealFilesystemType {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether e2fsprogs (e2fsck, tune2fs) can operate on this filesystem.
    pub fn is_ext(self) -> bool {
        matches!(
            self,
            RealFilesystemType::Ext2 | RealFilesystemType::Ext3 | RealFilesystemType::Ext4
        )
    }

    /// Whether the filesystem supports copy-on-write snapshots.
    pub fn is_copy_on_write(self) -> bool {
        matches!(self, RealFilesystemType::Btrfs)
    }
}

/// Pseudo filesystems that do NOT use a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodevFilesystemType {
    Devtmpfs,
    Proc,
    Sysfs,
}

impl NodevFilesystemType {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Anything that can be handed to `mount -t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFilesystemType {
    Real(RealFilesystemType),
    Nodev(NodevFilesystemType),
}

impl MountFilesystemType {
    pub fn name(self) -> &'static str {
        match self {
            MountFilesystemType::Real(fs) => fs.name(),
            MountFilesystemType::Nodev(fs) => fs.name(),
        }
    }
}

impl From<RealFilesystemType> for MountFilesystemType {
    fn from(fs: RealFilesystemType) -> Self {
        MountFilesystemType::Real(fs)
    }
}

impl From<NodevFilesystemType> for MountFilesystemType {
    fn from(fs: NodevFilesystemType) -> Self {
        MountFilesystemType::Nodev(fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(RealFilesystemType::Btrfs.name(), "btrfs");
        assert_eq!(RealFilesystemType::Ext3.name(), "ext3");
        assert_eq!(NodevFilesystemType::Proc.name(), "proc");

        assert_eq!(
            MountFilesystemType::from(RealFilesystemType::Ext3).name(),
            "ext3"
        );
        assert_eq!(
            MountFilesystemType::from(NodevFilesystemType::Proc).name(),
            "proc"
        );
    }

    #[test]
    fn test_properties() {
        assert!(RealFilesystemType::Ext2.is_ext());
        assert!(RealFilesystemType::Ext3.is_ext());
        assert!(!RealFilesystemType::Btrfs.is_ext());

        assert!(RealFilesystemType::Btrfs.is_copy_on_write());
        assert!(!RealFilesystemType::Ext4.is_copy_on_write());
    }

    #[test]
    fn test_deserialize() {
        let fs: RealFilesystemType = serde_json::from_str(r#""btrfs""#).unwrap();
        assert_eq!(fs, RealFilesystemType::Btrfs);
        serde_json::from_str::<RealFilesystemType>(r#""ntfs""#).unwrap_err();
    }
}
