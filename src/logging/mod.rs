use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod background_log;
pub mod multilog;
pub mod trace;

/// One line of the background log.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl From<&log::Record<'_>> for LogEntry {
    fn from(value: &log::Record) -> Self {
        Self {
            timestamp: Utc::now(),
            level: value.level().into(),
            message: value.args().to_string(),
            target: value.target().to_string(),
            module: value.module_path().unwrap_or_default().to_string(),
            line: value.line().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry() {
        let before = Utc::now();
        let entry = LogEntry::from(
            &log::Record::builder()
                .args(format_args!("Creating volume group 'fleet'"))
                .level(log::Level::Info)
                .target("provisioner::engine")
                .module_path(Some("provisioner::engine::storage::volume_group"))
                .line(Some(7))
                .build(),
        );

        assert!(entry.timestamp >= before);
        assert_eq!(entry.level, Level::Info);
        assert_eq!(entry.message, "Creating volume group 'fleet'");
        assert_eq!(entry.target, "provisioner::engine");
        assert_eq!(entry.module, "provisioner::engine::storage::volume_group");
        assert_eq!(entry.line, 7);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "info");
    }
}
