use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sysdefs::arch::SystemArchitecture;

use super::error::InvalidConfigurationError;

/// Identifies the bootstrap image a node runs: `<distro>-<release>-<arch>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFamily {
    pub distro: String,
    pub release: String,
    pub arch: SystemArchitecture,
}

impl FromStr for NodeFamily {
    type Err = InvalidConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(InvalidConfigurationError::EmptyNodeFamily);
        }

        let parts: Vec<&str> = value.split('-').collect();
        let [distro, release, arch] = parts.as_slice() else {
            return Err(InvalidConfigurationError::MalformedNodeFamily {
                value: value.into(),
            });
        };
        if distro.is_empty() || release.is_empty() {
            return Err(InvalidConfigurationError::MalformedNodeFamily {
                value: value.into(),
            });
        }

        let arch = SystemArchitecture::from_str(arch).map_err(|_| {
            InvalidConfigurationError::UnknownArchitecture {
                value: value.into(),
                arch: arch.to_string(),
            }
        })?;

        Ok(NodeFamily {
            distro: distro.to_string(),
            release: release.to_string(),
            arch,
        })
    }
}

impl Display for NodeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.distro, self.release, self.arch.name())
    }
}

impl Serialize for NodeFamily {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeFamily {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodeFamily::from_str(&s).map_err(serde::de::Error::custom)
    }
}
