use std::{fmt, str::FromStr};

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::IntoStaticStr;

/// CPU architecture component of a node family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum SystemArchitecture {
    /// 32-bit x86
    #[strum(serialize = "i386")]
    I386,

    /// 64-bit x86
    #[strum(serialize = "x86_64")]
    X86_64,

    /// 64-bit ARM
    #[strum(serialize = "aarch64")]
    Aarch64,
}

impl SystemArchitecture {
    /// Get the current system architecture
    pub const fn current() -> Self {
        #[cfg(target_arch = "x86")]
        {
            SystemArchitecture::I386
        }

        #[cfg(target_arch = "x86_64")]
        {
            SystemArchitecture::X86_64
        }

        #[cfg(target_arch = "aarch64")]
        {
            SystemArchitecture::Aarch64
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownArchitecture(pub String);

impl fmt::Display for UnknownArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown system architecture '{}'", self.0)
    }
}

impl std::error::Error for UnknownArchitecture {}

impl FromStr for SystemArchitecture {
    type Err = UnknownArchitecture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match &*s.trim().to_lowercase() {
            "i386" | "i686" | "x86" => SystemArchitecture::I386,
            "x64" | "amd64" | "x86_64" => SystemArchitecture::X86_64,
            "arm64" | "aarch64" => SystemArchitecture::Aarch64,
            arch => return Err(UnknownArchitecture(arch.to_string())),
        })
    }
}

impl fmt::Display for SystemArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SystemArchitecture {
    fn deserialize<D>(deserializer: D) -> Result<SystemArchitecture, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Serialize for SystemArchitecture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
