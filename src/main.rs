use std::{panic, path::Path, process::ExitCode};

use anyhow::{Context, Error};
use clap::Parser;
use log::{error, info, LevelFilter};

use provisioner::{
    cli::{Cli, Commands},
    init_trace_file, validate_config_file, BackgroundLog, Completion, MultiLogger, Provisioner,
    PROVISIONER_VERSION,
};
use provisioner_api::{
    constants::{BACKGROUND_LOG_PATH, TRACE_LOG_PATH},
    error::{InternalError, InvalidInputError, ProvisionError, ProvisionResultExt},
};

fn load_provisioner(config: &Path) -> Result<Provisioner, ProvisionError> {
    if !config.exists() {
        return Err(ProvisionError::new(InvalidInputError::ReadInputFile {
            path: config.to_string_lossy().to_string(),
        }))
        .message("Config file does not exist");
    }
    Provisioner::new(config).message("Failed to initialize the provisioner")
}

fn run_provisioner(args: &Cli) -> Result<Completion, ProvisionError> {
    // Log version ASAP
    info!("Provisioner version: {PROVISIONER_VERSION}");

    // Catch exit fast commands
    match &args.command {
        Commands::Validate { config } => {
            return validate_config_file(config).map(|()| Completion::Done);
        }

        Commands::Check { config } => {
            let report = load_provisioner(config)?.check()?;
            match serde_yaml::to_string(&report) {
                Ok(yaml) => print!("{yaml}"),
                Err(e) => error!("Failed to serialize check report: {e}"),
            }
            return Ok(report.completion);
        }

        Commands::RecordStamp { config, version } => {
            return load_provisioner(config)?
                .record_stamp(version.as_deref().unwrap_or(PROVISIONER_VERSION))
                .map(|()| Completion::Done);
        }

        _ => (),
    }

    let res = panic::catch_unwind(move || match &args.command {
        Commands::Install { config, error } | Commands::Upgrade { config, error } => {
            let provisioner = load_provisioner(config)?;

            tracing::info!(metric_name = "provisioner_start", command = args.command.name());

            let res = match args.command {
                Commands::Install { .. } => provisioner.install(),
                Commands::Upgrade { .. } => provisioner.upgrade(),
                _ => Err(ProvisionError::internal("Invalid command")),
            };

            // return error if requested
            if let (Some(error_path), Err(e)) = (error.as_ref(), &res) {
                let yaml = serde_yaml::to_string(&e).unwrap_or_default();
                if let Err(e2) = std::fs::write(error_path, yaml) {
                    error!("Failed to write error to file: {e2}");
                }
            }

            res.message(format!("Failed to execute '{}' command", args.command))
        }
        _ => Err(ProvisionError::internal("Invalid command")),
    });

    match res {
        Err(e) => Err(ProvisionError::new(InternalError::Panic(format!("{e:?}")))),
        Ok(r) => r,
    }
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    let mut multilogger = MultiLogger::new()
        // Add regular env_logger to output to stderr
        .with_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(args.verbosity)
                .build(),
        ))
        // Set the global filter for reqwest to debug
        .with_global_filter("reqwest", LevelFilter::Debug);

    // Keep a persistent record of runs that touch the disks
    if args.command.modifies_storage() {
        multilogger.add_logger(BackgroundLog::new(BACKGROUND_LOG_PATH).into_logger());
    }

    multilogger.init().context("Logger already registered")
}

fn setup_tracing(args: &Cli) -> Result<(), Error> {
    if args.command.modifies_storage() {
        init_trace_file(TRACE_LOG_PATH)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the loggers
    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = setup_tracing(&args) {
        error!("Failed to initialize tracing: {e:?}");
        return ExitCode::from(1);
    }

    match run_provisioner(&args) {
        Ok(Completion::Done) => ExitCode::SUCCESS,
        Ok(Completion::Unprovisioned(shortfall)) => {
            error!("Node left unprovisioned: {shortfall}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Provisioner failed: {e:?}");
            ExitCode::from(1)
        }
    }
}
