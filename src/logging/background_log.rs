use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Mutex,
};

use log::{LevelFilter, Log, Record};

use osutils::files;

use super::LogEntry;

/// Appends every record as a JSON line to a file that outlives the run.
pub struct BackgroundLog {
    target: Option<Mutex<File>>,
    max_level: LevelFilter,
}

impl BackgroundLog {
    pub fn new(target: impl AsRef<Path>) -> Self {
        let file = Self::open(target.as_ref())
            .map_err(|err| {
                eprintln!("Logging setup error: failed to open background log file: {err:?}")
            })
            .ok();

        Self {
            max_level: LevelFilter::Trace,
            target: file.map(Mutex::new),
        }
    }

    fn open(target: &Path) -> Result<File, anyhow::Error> {
        if let Some(parent) = target.parent() {
            files::create_dirs(parent)?;
        }
        Ok(OpenOptions::new().create(true).append(true).open(target)?)
    }

    pub fn with_max_level(self, max_level: LevelFilter) -> Self {
        Self { max_level, ..self }
    }

    pub fn into_logger(self) -> Box<dyn Log> {
        Box::new(self)
    }

    fn write_entry(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + '_>> {
        if let Some(file) = self.target.as_ref() {
            let mut serialized = serde_json::to_string(&LogEntry::from(record))?;
            serialized.push('\n');

            let mut file_lock = file.lock()?;
            file_lock.write_all(serialized.as_bytes())?;
            file_lock.flush()?;
        }

        Ok(())
    }
}

impl Log for BackgroundLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.target.is_some() && metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        // Losing a line is preferable to failing the run.
        let _ = self.write_entry(record);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use std::fs;

    use log::Level;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_filter() {
        let test_dir = tempdir().unwrap();
        let logger = BackgroundLog::new(test_dir.path().join("bg.log"))
            .with_max_level(LevelFilter::Info)
            .into_logger();

        assert!(logger.enabled(&log::Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&log::Metadata::builder().level(Level::Debug).build()));
    }

    #[test]
    fn test_disabled() {
        let test_dir = tempdir().unwrap();
        // A directory cannot be opened for appending.
        let log = BackgroundLog::new(test_dir.path());
        assert!(log.target.is_none());
        assert!(!log
            .into_logger()
            .enabled(&log::Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn test_appends_across_runs() {
        let test_dir = tempdir().unwrap();
        let target = test_dir.path().join("var/log/bg.log");

        for message in ["first run", "second run"] {
            let logger = BackgroundLog::new(&target).into_logger();
            logger.log(
                &log::Record::builder()
                    .args(format_args!("{message}"))
                    .level(Level::Warn)
                    .target("provisioner")
                    .line(Some(42))
                    .build(),
            );
        }

        let content = fs::read_to_string(&target).unwrap();
        let entries: Vec<LogEntry> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first run");
        assert_eq!(entries[1].message, "second run");
        assert_eq!(entries[1].level, Level::Warn.into());
        assert_eq!(entries[1].line, 42);
    }
}
