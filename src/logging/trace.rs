use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::{Context, Error};
use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, layer::SubscriberExt, Layer};

use osutils::files;

/// Installs a global subscriber that writes span open/close events as JSON
/// lines to `target`, giving per-step timings of the run.
pub fn init_trace_file(target: impl AsRef<Path>) -> Result<(), Error> {
    let target = target.as_ref();
    if let Some(parent) = target.parent() {
        files::create_dirs(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(target)
        .context(format!("Failed to open trace file '{}'", target.display()))?;

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::INFO);

    tracing::subscriber::set_global_default(tracing_subscriber::Registry::default().with(layer))
        .context("Failed to set global default subscriber")
}
