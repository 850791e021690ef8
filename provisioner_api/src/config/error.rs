//! Validation errors for the install configuration.

use serde::{Deserialize, Serialize};

/// Identifies errors detected during static validation of the install configuration, i.e. errors
/// that can be detected without touching the host.
#[derive(thiserror::Error, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidConfigurationError {
    #[error("Node family must not be empty")]
    EmptyNodeFamily,

    #[error("Node family '{value}' must have the form '<distro>-<release>-<arch>'")]
    MalformedNodeFamily { value: String },

    #[error("Node family '{value}' has unknown architecture '{arch}'")]
    UnknownArchitecture { value: String, arch: String },

    #[error("Virtualization technology '{value}' is not supported")]
    UnknownVirtTechnology { value: String },

    #[error("Requested size of volume '{volume}' must be greater than zero")]
    ZeroVolumeSize { volume: String },

    #[error(
        "Total minimum disk size ({total} GB) must not be smaller than the per-disk minimum ({min} GB)"
    )]
    TotalBelowPerDiskMinimum { total: u64, min: u64 },

    #[error("Registry URL '{url}' has unsupported scheme '{scheme}'")]
    InvalidRegistryScheme { url: String, scheme: String },
}
