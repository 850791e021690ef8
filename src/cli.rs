use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use provisioner_api::constants::DEFAULT_CONFIG_PATH;

use crate::PROVISIONER_VERSION;

#[derive(Parser, Debug)]
#[clap(version = PROVISIONER_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Debug)]
    pub verbosity: LevelFilter,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Partition, format and mount the node's disks from scratch
    Install {
        /// The install configuration
        #[clap(index = 1, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Path to save an eventual fatal error
        #[clap(short, long)]
        error: Option<PathBuf>,
    },

    /// Reuse the existing volumes for an upgrade, keeping workload data
    Upgrade {
        /// The install configuration
        #[clap(index = 1, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Path to save an eventual fatal error
        #[clap(short, long)]
        error: Option<PathBuf>,
    },

    /// Check the hardware requirements without touching any disk
    Check {
        /// The install configuration
        #[clap(index = 1, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Validate the provided install configuration
    Validate {
        /// Path to an install configuration file
        #[clap(index = 1, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Record a finished install on the mounted node root
    #[clap(name = "record-stamp")]
    RecordStamp {
        /// The install configuration
        #[clap(index = 1, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Version to record, defaults to the provisioner's own
        #[clap(long)]
        version: Option<String>,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Install { .. } => "install",
            Commands::Upgrade { .. } => "upgrade",
            Commands::Check { .. } => "check",
            Commands::Validate { .. } => "validate",
            Commands::RecordStamp { .. } => "record-stamp",
        }
    }

    /// Whether the command changes the node's disks.
    pub fn modifies_storage(&self) -> bool {
        matches!(self, Commands::Install { .. } | Commands::Upgrade { .. })
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}
