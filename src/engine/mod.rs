use std::{fmt, path::Path};

use log::{info, warn};

use provisioner_api::{
    config::LogicalVolumeName,
    constants::VOLUME_GROUP_NAME,
    error::{InitializationError, ProvisionError, ReportError, StorageError},
};

use crate::registry::{self, NotifyMessage, OfflineRegistry, Recipient, Registry};

pub mod context;
pub mod inventory;
pub mod requirements;
pub mod stamp;
pub mod storage;
pub mod upgrade;

#[cfg(test)]
pub(crate) mod testutils;

pub use context::{EngineContext, EngineState};

use inventory::HardwareInventory;
use storage::{filesystem, filter, mount, partitioning, raid, volume_group, StorageTools};

/// A resource the node lacks. Leaves the node unprovisioned without failing
/// the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Shortfall {
    InsufficientMemory { found_kb: u64, required_kb: u64 },
    NoBlockDevices,
    NoUsableDevices,
    InsufficientDisk { total_gb: f64, required_gb: u64 },
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::InsufficientMemory {
                found_kb,
                required_kb,
            } => write!(
                f,
                "insufficient memory: found {found_kb} kb, required {required_kb} kb"
            ),
            Shortfall::NoBlockDevices => write!(f, "no block devices detected"),
            Shortfall::NoUsableDevices => write!(f, "no suitable block devices found"),
            Shortfall::InsufficientDisk {
                total_gb,
                required_gb,
            } => write!(
                f,
                "insufficient disk space: found {total_gb:.2} GB, required {required_gb} GB"
            ),
        }
    }
}

/// Outcome of a gating stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Proceed,
    Halt(Shortfall),
}

/// How a run that did not fail ended.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Done,
    /// The node lacks a resource. Contacts were notified when possible.
    Unprovisioned(Shortfall),
}

/// Tells the node's technical contacts about a hardware problem. Delivery
/// failures are logged and otherwise ignored.
pub(crate) fn notify_techs(registry: &dyn Registry, message: NotifyMessage) {
    match registry.notify(message, Recipient::Techs.into()) {
        Ok(true) => info!("Notified contacts"),
        Ok(false) => warn!("Unable to notify site contacts of problem"),
        Err(e) => warn!("Unable to notify site contacts of problem: {e:?}"),
    }
}

macro_rules! halt_on_shortfall {
    ($verdict:expr) => {
        if let Verdict::Halt(shortfall) = $verdict {
            return Ok(Completion::Unprovisioned(shortfall));
        }
    };
}

/// Runs the storage pipeline against a host.
pub struct Engine<'a, T> {
    inventory: &'a dyn HardwareInventory,
    registry: &'a dyn Registry,
    tools: &'a T,
}

impl<'a, T: StorageTools> Engine<'a, T> {
    pub fn new(
        inventory: &'a dyn HardwareInventory,
        registry: &'a dyn Registry,
        tools: &'a T,
    ) -> Self {
        Self {
            inventory,
            registry,
            tools,
        }
    }

    /// Partitions, formats and mounts the node's disks from scratch.
    #[tracing::instrument(skip_all)]
    pub fn install(&self, ctx: &mut EngineContext) -> Result<Completion, ProvisionError> {
        let result = self.run_install(ctx);
        Self::finish(ctx, result)
    }

    /// Reuses the existing volumes, keeping the workload data.
    #[tracing::instrument(skip_all)]
    pub fn upgrade(&self, ctx: &mut EngineContext) -> Result<Completion, ProvisionError> {
        let result = self.run_upgrade(ctx);
        Self::finish(ctx, result)
    }

    /// Runs the gating stages only. Never touches the disks and never notifies
    /// anyone.
    #[tracing::instrument(skip_all)]
    pub fn check(&self, ctx: &mut EngineContext) -> Result<Completion, ProvisionError> {
        let silent = OfflineRegistry;
        let result = (|| -> Result<Completion, ProvisionError> {
            halt_on_shortfall!(self.gate(ctx, &silent)?);
            halt_on_shortfall!(self.filter(ctx, &silent)?);
            Ok(Completion::Done)
        })();
        if !matches!(result, Ok(Completion::Done)) {
            ctx.abort();
        }
        result
    }

    fn finish(
        ctx: &mut EngineContext,
        result: Result<Completion, ProvisionError>,
    ) -> Result<Completion, ProvisionError> {
        match &result {
            Ok(Completion::Done) => {}
            Ok(Completion::Unprovisioned(shortfall)) => {
                warn!("Leaving node unprovisioned: {shortfall}");
                ctx.abort();
            }
            Err(_) => ctx.abort(),
        }
        result
    }

    fn gate(
        &self,
        ctx: &mut EngineContext,
        registry: &dyn Registry,
    ) -> Result<Verdict, ProvisionError> {
        let total_kb = self
            .inventory
            .total_memory_kb()
            .structured(InitializationError::ReadMemory)?;
        ctx.total_memory_kb = Some(total_kb);

        let verdict = requirements::check_memory(total_kb, &ctx.policy, registry);
        if verdict == Verdict::Proceed {
            ctx.transition(EngineState::Gated)?;
        }
        Ok(verdict)
    }

    fn filter(
        &self,
        ctx: &mut EngineContext,
        registry: &dyn Registry,
    ) -> Result<Verdict, ProvisionError> {
        ctx.inventory = self
            .inventory
            .block_devices()
            .structured(InitializationError::EnumerateBlockDevices)?;

        let (verdict, outcome) = filter::check_disks(&ctx.inventory, &ctx.policy, registry);
        ctx.usable_devices = outcome.usable;
        ctx.total_size_gb = outcome.total_size_gb;
        if verdict == Verdict::Proceed {
            ctx.transition(EngineState::Filtered)?;
        }
        Ok(verdict)
    }

    fn raid_enabled(&self, node_id: u64) -> bool {
        match self.registry.node_tags(node_id) {
            Ok(tags) => registry::raid_enabled(&tags),
            Err(e) => {
                warn!("Failed to fetch node tags, not using software RAID: {e:?}");
                false
            }
        }
    }

    fn run_install(&self, ctx: &mut EngineContext) -> Result<Completion, ProvisionError> {
        halt_on_shortfall!(self.gate(ctx, self.registry)?);
        halt_on_shortfall!(self.filter(ctx, self.registry)?);

        self.tools
            .swap_off(Path::new(&LogicalVolumeName::Swap.device_path()));
        volume_group::teardown(self.tools);

        let partitions: Vec<_> =
            partitioning::partition_devices(&ctx.usable_devices, ctx.layout, self.tools)?
                .into_iter()
                .map(|device| device.partition)
                .collect();

        let enabled = self.raid_enabled(ctx.config.node_id);
        match raid::assemble(&partitions, enabled, self.tools) {
            Some(array) => {
                ctx.physical_volumes = vec![array.device_path.clone()];
                ctx.raid_array = Some(array);
                ctx.transition(EngineState::Raided)?;
            }
            None => ctx.physical_volumes = partitions,
        }

        ctx.logical_volumes =
            volume_group::plan_layout(ctx.layout, &ctx.config.volumes, ctx.config.virt);
        volume_group::build_volume_group(&ctx.physical_volumes, &ctx.logical_volumes, self.tools)?;
        ctx.transition(EngineState::LayoutBuilt)?;

        filesystem::format_volumes(&ctx.logical_volumes, ctx.options, self.tools)?;
        ctx.transition(EngineState::Formatted)?;

        ctx.mounted = Some(mount::mount_volumes(
            ctx.layout,
            ctx.config.virt,
            &ctx.config.paths,
            self.tools,
        )?);
        ctx.transition(EngineState::Done)?;

        info!(
            "Storage ready, root mounted at '{}'",
            ctx.config.paths.sysimg.display()
        );
        Ok(Completion::Done)
    }

    fn run_upgrade(&self, ctx: &mut EngineContext) -> Result<Completion, ProvisionError> {
        halt_on_shortfall!(self.gate(ctx, self.registry)?);

        self.tools
            .activate_volume_group(VOLUME_GROUP_NAME)
            .structured(StorageError::ActivateVolumeGroup {
                name: VOLUME_GROUP_NAME.into(),
            })?;
        // The data volume is only touched once the previous install is known
        // to be compatible.
        let root = mount::mount_root(&ctx.config.paths, self.tools)?;
        let prior = stamp::read_prior_install(&ctx.config.paths)?;
        upgrade::validate_prior_install(&prior, &ctx.config.node_family)?;
        ctx.transition(EngineState::StampValidated)?;

        let data = mount::mount_data(ctx.layout, ctx.config.virt, &ctx.config.paths, self.tools)?;
        ctx.mounted = Some(mount::MountedVolumes { root, data });

        upgrade::erase_non_workload_areas(&ctx.config.paths.sysimg)?;
        ctx.transition(EngineState::Reconciled)?;

        ctx.transition(EngineState::Done)?;
        info!("Previous install ready to be upgraded");
        Ok(Completion::Done)
    }
}
