//! Install stamp kept on the node root.
//!
//! The stamp file is append-only: every successful install adds an entry and
//! the most recent entry wins when it is read back during an upgrade.

use std::{fs, path::PathBuf, str::FromStr};

use anyhow::{Context, Error};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info};

use osutils::files;
use provisioner_api::{
    config::{InstallPaths, NodeFamily, VirtTechnology},
    constants::{INSTALL_STAMP_FILE, INSTALL_STAMP_NODE_FAMILY_PREFIX, VIRT_FILE_NAME},
    error::{ProvisionError, ReportError, StorageError, UpgradeError},
};

const INSTALLED_BY_PREFIX: &str = "Hard drive installed by provisioner ";
const EXTRACTION_PREFIX: &str = "Finished extraction on ";
const TIMESTAMP_FORMAT: &str = "%Y-%b-%d @ %H:%M UTC";

/// What a previous install left behind on the node root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorInstall {
    pub node_family: NodeFamily,
    /// Virtualization technology as recorded, not interpreted.
    pub virt: String,
    pub installed_at: Option<DateTime<Utc>>,
}

pub fn stamp_path(paths: &InstallPaths) -> PathBuf {
    paths.sysimg.join(INSTALL_STAMP_FILE)
}

pub fn virt_path(paths: &InstallPaths) -> PathBuf {
    paths.sysimg.join(&paths.conf_dir).join(VIRT_FILE_NAME)
}

fn stamp_entry(version: &str, node_family: &NodeFamily, now: DateTime<Utc>) -> String {
    format!(
        "{INSTALLED_BY_PREFIX}{version}\n{EXTRACTION_PREFIX}{}\n{INSTALL_STAMP_NODE_FAMILY_PREFIX}{node_family}\n",
        now.format(TIMESTAMP_FORMAT)
    )
}

/// Appends an entry to the stamp file and records the virtualization
/// technology of the install.
#[tracing::instrument(skip_all)]
pub fn record_install_stamp(
    paths: &InstallPaths,
    node_family: &NodeFamily,
    virt: VirtTechnology,
    version: &str,
    now: DateTime<Utc>,
) -> Result<(), ProvisionError> {
    let virt_file = virt_path(paths);
    if let Some(parent) = virt_file.parent() {
        files::create_dirs(parent).structured(StorageError::RecordInstallStamp)?;
    }
    fs::write(&virt_file, format!("{}\n", virt.name()))
        .context(format!("Failed to write '{}'", virt_file.display()))
        .structured(StorageError::RecordInstallStamp)?;

    files::append_file(stamp_path(paths), &stamp_entry(version, node_family, now))
        .structured(StorageError::RecordInstallStamp)?;

    info!(
        "Recorded install of {node_family} ({}) in '{}'",
        virt.name(),
        stamp_path(paths).display()
    );
    Ok(())
}

fn last_value<'a>(contents: &'a str, prefix: &str) -> Option<&'a str> {
    contents
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(prefix))
        .map(str::trim)
}

fn parse_stamp(contents: &str) -> Result<(NodeFamily, Option<DateTime<Utc>>), Error> {
    let family = last_value(contents, INSTALL_STAMP_NODE_FAMILY_PREFIX)
        .context("Install stamp has no node family entry")?;
    let node_family = NodeFamily::from_str(family)
        .context(format!("Invalid node family '{family}' in install stamp"))?;

    let installed_at = last_value(contents, EXTRACTION_PREFIX).and_then(|value| {
        match NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
            Ok(naive) => Some(naive.and_utc()),
            Err(e) => {
                debug!("Ignoring unparsable install time '{value}': {e}");
                None
            }
        }
    });

    Ok((node_family, installed_at))
}

/// Reads back the most recent install recorded on the node root.
#[tracing::instrument(skip_all)]
pub fn read_prior_install(paths: &InstallPaths) -> Result<PriorInstall, ProvisionError> {
    let contents = fs::read_to_string(stamp_path(paths))
        .context(format!(
            "Failed to read install stamp '{}'",
            stamp_path(paths).display()
        ))
        .structured(UpgradeError::ReadPriorInstall)?;
    let (node_family, installed_at) =
        parse_stamp(&contents).structured(UpgradeError::ReadPriorInstall)?;

    let virt = files::read_file_trim(&virt_path(paths)).structured(UpgradeError::ReadPriorInstall)?;

    debug!("Previous install: {node_family} ({virt}), installed at {installed_at:?}");
    Ok(PriorInstall {
        node_family,
        virt,
        installed_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use indoc::indoc;
    use provisioner_api::error::ErrorKind;
    use sysdefs::arch::SystemArchitecture;

    use super::*;

    fn paths(root: &tempfile::TempDir) -> InstallPaths {
        InstallPaths {
            sysimg: root.path().to_path_buf(),
            conf_dir: "etc/fleet".into(),
        }
    }

    fn family(value: &str) -> NodeFamily {
        NodeFamily::from_str(value).unwrap()
    }

    #[test]
    fn test_stamp_entry() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(
            stamp_entry("1.2.0", &family("fleet-f22-x86_64"), now),
            indoc! {"
                Hard drive installed by provisioner 1.2.0
                Finished extraction on 2024-Mar-09 @ 14:05 UTC
                Using nodefamily fleet-f22-x86_64
            "}
        );
    }

    #[test]
    fn test_last_entry_wins() {
        let contents = indoc! {"
            Hard drive installed by provisioner 1.0.0
            Finished extraction on 2020-Jan-01 @ 00:00 UTC
            Using nodefamily fleet-f18-i386
            Hard drive installed by provisioner 1.1.0
            Finished extraction on 2023-Jun-30 @ 23:59 UTC
            Using nodefamily fleet-f22-x86_64
        "};
        let (node_family, installed_at) = parse_stamp(contents).unwrap();
        assert_eq!(node_family, family("fleet-f22-x86_64"));
        assert_eq!(
            installed_at,
            Some(Utc.with_ymd_and_hms(2023, 6, 30, 23, 59, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_stamp_errors() {
        parse_stamp("Hard drive installed by provisioner 1.0.0\n").unwrap_err();
        parse_stamp("Using nodefamily fleet-f22\n").unwrap_err();

        // A bad timestamp is not fatal
        let (_, installed_at) =
            parse_stamp("Finished extraction on yesterday\nUsing nodefamily a-b-aarch64\n")
                .unwrap();
        assert_eq!(installed_at, None);
    }

    #[test]
    fn test_record_and_read_back() {
        let root = tempfile::tempdir().unwrap();
        let paths = paths(&root);
        let first = Utc.with_ymd_and_hms(2022, 1, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 2, 2, 9, 30, 0).unwrap();

        record_install_stamp(
            &paths,
            &family("fleet-f20-i386"),
            VirtTechnology::Legacy,
            "0.9.0",
            first,
        )
        .unwrap();
        record_install_stamp(
            &paths,
            &family("fleet-f22-x86_64"),
            VirtTechnology::Container,
            "1.0.0",
            second,
        )
        .unwrap();

        let stamp = fs::read_to_string(stamp_path(&paths)).unwrap();
        assert_eq!(stamp.lines().count(), 6);

        let prior = read_prior_install(&paths).unwrap();
        assert_eq!(
            prior,
            PriorInstall {
                node_family: NodeFamily {
                    distro: "fleet".into(),
                    release: "f22".into(),
                    arch: SystemArchitecture::X86_64,
                },
                virt: "lxc".into(),
                installed_at: Some(second),
            }
        );
    }

    #[test]
    fn test_read_missing_files() {
        let root = tempfile::tempdir().unwrap();
        let paths = paths(&root);
        let error = read_prior_install(&paths).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Upgrade(UpgradeError::ReadPriorInstall)
        );

        // Stamp without virt file
        fs::write(stamp_path(&paths), "Using nodefamily fleet-f22-x86_64\n").unwrap();
        let error = read_prior_install(&paths).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Upgrade(UpgradeError::ReadPriorInstall)
        );
    }
}
