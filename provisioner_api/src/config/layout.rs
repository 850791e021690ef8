use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use sysdefs::filesystems::RealFilesystemType;

use crate::constants::VOLUME_GROUP_DEVICE_DIR;

use super::{
    error::InvalidConfigurationError,
    model::{ModelOption, ModelOptions},
};

/// Virtualization backend the node will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum VirtTechnology {
    /// Linux containers.
    #[strum(to_string = "lxc", serialize = "container")]
    Container,

    /// Hypervisor-based virtual servers.
    #[strum(to_string = "vs", serialize = "hypervisor-based", serialize = "vserver")]
    Legacy,
}

impl VirtTechnology {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Filesystem placed on the data volume.
    pub fn data_filesystem(self) -> RealFilesystemType {
        match self {
            VirtTechnology::Container => RealFilesystemType::Btrfs,
            VirtTechnology::Legacy => RealFilesystemType::Ext3,
        }
    }
}

impl Serialize for VirtTechnology {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for VirtTechnology {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VirtTechnology::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl VirtTechnology {
    pub fn parse(value: &str) -> Result<Self, InvalidConfigurationError> {
        VirtTechnology::from_str(value.trim()).map_err(|_| {
            InvalidConfigurationError::UnknownVirtTechnology {
                value: value.trim().into(),
            }
        })
    }
}

/// Shape of the logical volume layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LayoutMode {
    /// Swap plus a root volume taking all remaining space.
    OnePartition,
    /// Swap, root, and a data volume taking the rest.
    SplitRootData,
    /// Like `SplitRootData`, with only the first device in the volume group.
    SplitRootDataRaw,
}

impl LayoutMode {
    pub fn select(one_partition: bool, options: ModelOptions) -> Self {
        if one_partition {
            LayoutMode::OnePartition
        } else if options.contains(ModelOption::RawDisk) {
            LayoutMode::SplitRootDataRaw
        } else {
            LayoutMode::SplitRootData
        }
    }

    pub fn has_data_volume(self) -> bool {
        self != LayoutMode::OnePartition
    }
}

/// Names of the logical volumes the installer creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum LogicalVolumeName {
    Swap,
    Root,
    Data,
    RawDisk,
}

impl LogicalVolumeName {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Device node of the volume once the volume group is active.
    pub fn device_path(self) -> String {
        format!("{}/{}", VOLUME_GROUP_DEVICE_DIR, self.name())
    }
}

/// How much of the volume group a logical volume takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    /// Exactly this many bytes.
    Absolute(u64),
    /// Every extent still free when the volume is created.
    Remaining,
}
