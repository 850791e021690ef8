use serde::{Deserialize, Serialize};

use crate::is_default;

use super::error::InvalidConfigurationError;

/// Hardware thresholds a node must meet before its disks are touched.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiskPolicy {
    /// Devices smaller than this many GB are never used.
    pub min_disk_size_gb: u64,

    /// Minimum combined size, in GB, of all usable devices.
    pub total_min_disk_size_gb: u64,

    /// Minimum physical memory in KiB.
    pub min_memory_kb: u64,

    /// Turn threshold violations into warnings.
    #[serde(default, skip_serializing_if = "is_default")]
    pub skip_checks: bool,
}

impl DiskPolicy {
    pub(super) fn validate(&self) -> Result<(), InvalidConfigurationError> {
        if self.total_min_disk_size_gb < self.min_disk_size_gb {
            return Err(InvalidConfigurationError::TotalBelowPerDiskMinimum {
                total: self.total_min_disk_size_gb,
                min: self.min_disk_size_gb,
            });
        }
        Ok(())
    }

    /// Returns a copy of the policy with checks overridden.
    pub fn with_checks_skipped(self) -> Self {
        DiskPolicy {
            skip_checks: true,
            ..self
        }
    }
}
