use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    constants::{CONF_DIR_DEFAULT, SYSIMG_PATH_DEFAULT},
    error::{InitializationError, InvalidInputError, ProvisionError, ReportError},
    is_default,
};

mod error;
mod layout;
mod model;
mod node;
mod policy;
mod size;

pub use error::InvalidConfigurationError;
pub use layout::{LayoutMode, LogicalVolumeName, SizeSpec, VirtTechnology};
pub use model::{parse_model_options, ModelOption, ModelOptions};
pub use node::NodeFamily;
pub use policy::DiskPolicy;
pub use size::{ParseVolumeSizeError, VolumeSize};

/// Everything the installer needs to know about the node it runs on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstallConfiguration {
    /// Registry identity of the node.
    pub node_id: u64,

    /// Model string, optionally carrying `/`-separated hardware options.
    #[serde(default, skip_serializing_if = "is_default")]
    pub node_model: String,

    pub node_family: NodeFamily,

    pub virt: VirtTechnology,

    pub policy: DiskPolicy,

    pub volumes: VolumeSizes,

    /// Put everything but swap on a single root volume.
    #[serde(default, skip_serializing_if = "is_default")]
    pub one_partition: bool,

    #[serde(default, skip_serializing_if = "is_default")]
    pub paths: InstallPaths,

    /// Fleet registry used for notifications and node tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,
}

/// Requested logical volume sizes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VolumeSizes {
    pub swap: VolumeSize,

    pub root: VolumeSize,

    /// Fixed data volume size. Only honored in raw-disk layouts, where the
    /// rest of the volume group becomes the `rawdisk` volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<VolumeSize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstallPaths {
    /// Where the new root filesystem is mounted.
    #[serde(default = "default_sysimg")]
    pub sysimg: PathBuf,

    /// Configuration directory, relative to the mounted root.
    #[serde(default = "default_conf_dir")]
    pub conf_dir: PathBuf,
}

fn default_sysimg() -> PathBuf {
    PathBuf::from(SYSIMG_PATH_DEFAULT)
}

fn default_conf_dir() -> PathBuf {
    PathBuf::from(CONF_DIR_DEFAULT)
}

impl Default for InstallPaths {
    fn default() -> Self {
        InstallPaths {
            sysimg: default_sysimg(),
            conf_dir: default_conf_dir(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryConfig {
    pub url: Url,
}

impl InstallConfiguration {
    /// Loads and validates the configuration at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();
        info!("Loading install configuration from '{}'", path.display());
        let contents = fs::read_to_string(path).structured(
            InitializationError::LoadConfiguration {
                path: path.display().to_string(),
            },
        )?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ProvisionError> {
        let config: InstallConfiguration = serde_yaml::from_str(contents)
            .structured(InitializationError::ParseConfiguration)?;
        config
            .validate()
            .map_err(|e| ProvisionError::new(InvalidInputError::from(e)))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        if self.volumes.swap.is_zero() {
            return Err(InvalidConfigurationError::ZeroVolumeSize {
                volume: LogicalVolumeName::Swap.name().into(),
            });
        }
        if self.volumes.root.is_zero() {
            return Err(InvalidConfigurationError::ZeroVolumeSize {
                volume: LogicalVolumeName::Root.name().into(),
            });
        }
        if self.volumes.data.is_some_and(|size| size.is_zero()) {
            return Err(InvalidConfigurationError::ZeroVolumeSize {
                volume: LogicalVolumeName::Data.name().into(),
            });
        }

        if let Some(registry) = &self.registry {
            let scheme = registry.url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(InvalidConfigurationError::InvalidRegistryScheme {
                    url: registry.url.to_string(),
                    scheme: scheme.into(),
                });
            }
        }

        self.policy.validate()
    }

    pub fn model_options(&self) -> ModelOptions {
        parse_model_options(&self.node_model)
    }

    /// Policy in force for this run. Models flagged `minhw` skip the checks.
    pub fn effective_policy(&self) -> DiskPolicy {
        if self.model_options().contains(ModelOption::MinHw) {
            self.policy.with_checks_skipped()
        } else {
            self.policy
        }
    }

    pub fn layout_mode(&self) -> LayoutMode {
        LayoutMode::select(self.one_partition, self.model_options())
    }
}
