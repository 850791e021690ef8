use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::config::InvalidConfigurationError;

/// The installer failed to initialize.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationError {
    #[error("Failed to load install configuration from '{path}'")]
    LoadConfiguration { path: String },
    #[error("Failed to parse install configuration")]
    ParseConfiguration,
    #[error("Failed to read total physical memory")]
    ReadMemory,
    #[error("Failed to enumerate block devices")]
    EnumerateBlockDevices,
    #[error("Failed to set up the fleet registry client")]
    RegistryClient,
    #[error("The installer must run as root")]
    CheckRootPrivileges,
}

/// User provided input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Failed to read input file '{path}'")]
    ReadInputFile { path: String },
    #[error("Invalid install configuration: {0}")]
    InvalidConfiguration(#[from] InvalidConfigurationError),
}

/// A required storage step failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageError {
    #[error("No block device could be partitioned")]
    NoPartitionedDevices,
    #[error("Failed to create physical volume on '{path}'")]
    CreatePhysicalVolume { path: String },
    #[error("Cannot create volume group '{name}' without physical volumes")]
    NoPhysicalVolumes { name: String },
    #[error("Failed to create volume group '{name}'")]
    CreateVolumeGroup { name: String },
    #[error("Failed to create logical volume '{name}'")]
    CreateLogicalVolume { name: String },
    #[error("Failed to query free extents of volume group '{name}'")]
    QueryFreeExtents { name: String },
    #[error("Failed to initialize swap on '{path}'")]
    CreateSwap { path: String },
    #[error("Failed to format logical volume '{name}'")]
    FormatVolume { name: String },
    #[error("Failed to activate volume group '{name}'")]
    ActivateVolumeGroup { name: String },
    #[error("Filesystem on '{path}' could not be repaired")]
    RepairFilesystem { path: String },
    #[error("Failed to create mount point '{path}'")]
    CreateMountPoint { path: String },
    #[error("Failed to mount '{path}'")]
    Mount { path: String },
    #[error("Failed to record install stamp")]
    RecordInstallStamp,
}

/// The previous install cannot be upgraded in place.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeError {
    #[error("Could not retrieve data about previous installation, cannot upgrade")]
    ReadPriorInstall,
    #[error("Can only upgrade nodes running container virtualization, found '{found}'")]
    UnsupportedVirtTechnology { found: String },
    #[error("Cannot upgrade from arch={installed} to arch={target}")]
    ArchitectureMismatch { installed: String, target: String },
    #[error("Failed to erase '{area}' before upgrade")]
    Cleanup { area: String },
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Invalid engine state transition from '{from}' to '{to}'")]
    StateTransition { from: String, to: String },
    #[error("Installer panicked: {0}")]
    Panic(String),
}

/// Each variant of `ErrorKind` corresponds to a different category of error. The categories are
/// meant for routing an alert to whoever can act on it.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The installer failed to initialize.
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// The installer was given invalid input.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// A required storage step failed. The node is left without a usable layout
    /// and the next run starts over from the volume group teardown.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The previous installation is incompatible with an in-place upgrade.
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    /// A bug in the installer.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct ProvisionErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

/// Fatal error. Once one is raised no further pipeline step runs.
pub struct ProvisionError(Box<ProvisionErrorInner>);
impl ProvisionError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        ProvisionError(Box::new(ProvisionErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn internal(message: &'static str) -> Self {
        Self::new(InternalError::Internal(message))
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured ProvisionError.
    fn structured(self, kind: K) -> Result<T, ProvisionError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, ProvisionError> {
        match self {
            Some(t) => Ok(t),
            None => Err(ProvisionError(Box::new(ProvisionErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, ProvisionError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(ProvisionError(Box::new(ProvisionErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait ProvisionResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, ProvisionError>;
}
impl<T> ProvisionResultExt<T> for Result<T, ProvisionError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, ProvisionError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl Serialize for ProvisionError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("provision-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Initialization(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Storage(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Upgrade(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for ProvisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}
