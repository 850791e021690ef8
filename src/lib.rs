use std::path::Path;

use chrono::Utc;
use log::{debug, info};
use nix::unistd::Uid;
use serde::Serialize;

use provisioner_api::{
    config::InstallConfiguration,
    error::{InitializationError, ProvisionError, ReportError},
};

pub mod cli;
mod engine;
mod logging;
mod registry;

use engine::{inventory::HostInventory, storage::HostTools, Engine, EngineContext};
use registry::{HttpRegistry, OfflineRegistry, Registry};

pub use engine::{Completion, Shortfall};
pub use logging::{background_log::BackgroundLog, multilog::MultiLogger, trace::init_trace_file};

/// Provisioner version as provided by environment variables at build time
pub const PROVISIONER_VERSION: &str = match option_env!("PROVISIONER_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Result of a `check` run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    #[serde(skip)]
    pub completion: Completion,
    pub usable_devices: Vec<String>,
    pub total_size_gb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<String>,
}

pub struct Provisioner {
    config: InstallConfiguration,
    registry: Box<dyn Registry>,
}

impl Provisioner {
    pub fn new(config_path: &Path) -> Result<Self, ProvisionError> {
        Self::from_configuration(InstallConfiguration::from_file(config_path)?)
    }

    pub fn from_configuration(config: InstallConfiguration) -> Result<Self, ProvisionError> {
        let registry: Box<dyn Registry> = match &config.registry {
            Some(registry) => Box::new(
                HttpRegistry::new(registry.url.clone(), config.node_id)
                    .structured(InitializationError::RegistryClient)?,
            ),
            None => {
                debug!("No registry configured, notifications will not be sent");
                Box::new(OfflineRegistry)
            }
        };

        Ok(Self { config, registry })
    }

    fn ensure_root() -> Result<(), ProvisionError> {
        if !Uid::effective().is_root() {
            return Err(ProvisionError::new(InitializationError::CheckRootPrivileges));
        }
        Ok(())
    }

    /// Provisions the node's storage from scratch.
    pub fn install(&self) -> Result<Completion, ProvisionError> {
        Self::ensure_root()?;
        info!("Installing node {} ({})", self.config.node_id, self.config.node_family);
        let inventory = HostInventory::default();
        let mut ctx = EngineContext::new(self.config.clone());
        Engine::new(&inventory, self.registry.as_ref(), &HostTools).install(&mut ctx)
    }

    /// Prepares the node's existing storage for an upgrade.
    pub fn upgrade(&self) -> Result<Completion, ProvisionError> {
        Self::ensure_root()?;
        info!("Upgrading node {} to {}", self.config.node_id, self.config.node_family);
        let inventory = HostInventory::default();
        let mut ctx = EngineContext::new(self.config.clone());
        Engine::new(&inventory, self.registry.as_ref(), &HostTools).upgrade(&mut ctx)
    }

    /// Reports whether the node meets the hardware requirements.
    pub fn check(&self) -> Result<CheckReport, ProvisionError> {
        let inventory = HostInventory::default();
        let mut ctx = EngineContext::new(self.config.clone());
        let completion =
            Engine::new(&inventory, self.registry.as_ref(), &HostTools).check(&mut ctx)?;

        Ok(CheckReport {
            usable_devices: ctx
                .usable_devices
                .iter()
                .map(|d| d.path.display().to_string())
                .collect(),
            total_size_gb: ctx.total_size_gb,
            shortfall: match &completion {
                Completion::Done => None,
                Completion::Unprovisioned(shortfall) => Some(shortfall.to_string()),
            },
            completion,
        })
    }

    /// Records the install on the mounted node root.
    pub fn record_stamp(&self, version: &str) -> Result<(), ProvisionError> {
        engine::stamp::record_install_stamp(
            &self.config.paths,
            &self.config.node_family,
            self.config.virt,
            version,
            Utc::now(),
        )
    }
}

/// Loads and validates the configuration at `path`.
pub fn validate_config_file(path: &Path) -> Result<(), ProvisionError> {
    InstallConfiguration::from_file(path)?;
    info!("Configuration at '{}' is valid", path.display());
    Ok(())
}
