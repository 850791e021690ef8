use std::path::PathBuf;

use log::{debug, warn};
use strum_macros::Display;

use provisioner_api::{
    config::{DiskPolicy, InstallConfiguration, LayoutMode, ModelOptions},
    error::{InternalError, ProvisionError},
};

use super::{
    inventory::BlockDevice,
    storage::{mount::MountedVolumes, raid::RaidArray, volume_group::LogicalVolume},
};

/// Where a run is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EngineState {
    Start,
    Gated,
    Filtered,
    Raided,
    LayoutBuilt,
    Formatted,
    StampValidated,
    Reconciled,
    Done,
    Aborted,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Done | EngineState::Aborted)
    }

    fn can_transition_to(self, next: EngineState) -> bool {
        use EngineState::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Start, Gated)
            // Install
            | (Gated, Filtered)
            | (Filtered, Raided)
            | (Filtered, LayoutBuilt)
            | (Raided, LayoutBuilt)
            | (LayoutBuilt, Formatted)
            | (Formatted, Done)
            // Upgrade
            | (Gated, StampValidated)
            | (StampValidated, Reconciled)
            | (Reconciled, Done) => true,
            _ => false,
        }
    }
}

/// Inputs of a run and the typed outputs of every stage reached so far.
pub struct EngineContext {
    pub config: InstallConfiguration,

    /// Policy in force for the run, after per-model overrides.
    pub policy: DiskPolicy,

    pub options: ModelOptions,

    pub layout: LayoutMode,

    pub total_memory_kb: Option<u64>,

    /// Every block device found on the host.
    pub inventory: Vec<BlockDevice>,

    /// Devices that passed filtering, in path order.
    pub usable_devices: Vec<BlockDevice>,

    pub total_size_gb: f64,

    /// Physical volumes of the volume group: the RAID array when one was
    /// built, the first partition of each used device otherwise.
    pub physical_volumes: Vec<PathBuf>,

    pub raid_array: Option<RaidArray>,

    pub logical_volumes: Vec<LogicalVolume>,

    pub mounted: Option<MountedVolumes>,

    state: EngineState,
}

impl EngineContext {
    pub fn new(config: InstallConfiguration) -> Self {
        Self {
            policy: config.effective_policy(),
            options: config.model_options(),
            layout: config.layout_mode(),
            config,
            total_memory_kb: None,
            inventory: Vec::new(),
            usable_devices: Vec::new(),
            total_size_gb: 0.0,
            physical_volumes: Vec::new(),
            raid_array: None,
            logical_volumes: Vec::new(),
            mounted: None,
            state: EngineState::Start,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Moves the run to `next`, refusing transitions the pipeline never makes.
    pub fn transition(&mut self, next: EngineState) -> Result<(), ProvisionError> {
        if !self.state.can_transition_to(next) {
            return Err(ProvisionError::new(InternalError::StateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }));
        }
        debug!("Engine state: {} -> {next}", self.state);
        self.state = next;
        Ok(())
    }

    /// Marks the run as aborted. Does nothing once the run has ended.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        warn!("Aborting in state {}", self.state);
        self.state = EngineState::Aborted;
    }
}
