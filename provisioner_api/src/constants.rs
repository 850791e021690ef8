use const_format::formatcp;

// Volume group layout

/// Name of the single volume group the installer manages.
pub const VOLUME_GROUP_NAME: &str = "fleet";

/// Extent size of the volume group, in MiB.
pub const VOLUME_GROUP_EXTENT_SIZE_MB: u64 = 32;

/// Device directory of the managed volume group.
pub const VOLUME_GROUP_DEVICE_DIR: &str = formatcp!("/dev/{VOLUME_GROUP_NAME}");

/// Device paths starting with one of these prefixes belong to a volume manager
/// object and are never offered as install targets.
pub const RESERVED_DEVICE_PREFIXES: [&str; 2] = [VOLUME_GROUP_DEVICE_DIR, "/dev/dm-"];

// Software RAID

/// Well-known path of the software RAID array.
pub const RAID_DEVICE_PATH: &str = "/dev/md0";

/// Chunk size handed to mdadm, in KiB.
pub const RAID_CHUNK_SIZE_KB: u64 = 128;

/// Fleet tag that enables software RAID for a node.
pub const RAID_ENABLED_TAG: &str = "raid_enabled";

// Filesystem tuning

/// Percentage of blocks reserved for the super-user on the root filesystem.
pub const ROOT_RESERVED_BLOCKS_PERCENT: u8 = 5;

/// Percentage of blocks reserved for the super-user on a legacy data filesystem.
pub const DATA_RESERVED_BLOCKS_PERCENT: u8 = 0;

// Paths

/// Default location of the install configuration.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/provisioner/config.yaml";

/// Default mount point of the node root filesystem during installation.
pub const SYSIMG_PATH_DEFAULT: &str = "/tmp/mnt/sysimg";

/// Default configuration directory, relative to the node root.
pub const CONF_DIR_DEFAULT: &str = "etc/fleet";

/// Directory, relative to the node root, where the data volume is mounted.
pub const DATA_MOUNT_DIRECTORY: &str = "data";

/// Directory, relative to the node root, where proc is mounted.
pub const PROC_MOUNT_DIRECTORY: &str = "proc";

/// File inside the configuration directory holding the virtualization
/// technology of the install.
pub const VIRT_FILE_NAME: &str = "virt";

/// Append-only marker file at the top of the node root.
pub const INSTALL_STAMP_FILE: &str = "install-stamp.txt";

/// Prefix of the stamp line carrying the node family. Upgrades parse it, so it
/// must not change.
pub const INSTALL_STAMP_NODE_FAMILY_PREFIX: &str = "Using nodefamily ";

/// Top-level areas of the node root that are erased before an upgrade.
pub const UPGRADE_CLEANUP_AREAS: [&str; 4] = ["usr/lib", "var", "etc", "boot"];

/// Background log written during install and upgrade runs.
pub const BACKGROUND_LOG_PATH: &str = "/var/log/provisioner-background.log";

/// Trace events written during install and upgrade runs.
pub const TRACE_LOG_PATH: &str = "/var/log/provisioner-trace.jsonl";
