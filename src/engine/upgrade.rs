use std::path::Path;

use log::{info, warn};

use osutils::files;
use provisioner_api::{
    config::{NodeFamily, VirtTechnology},
    constants::UPGRADE_CLEANUP_AREAS,
    error::{ProvisionError, ReportError, UpgradeError},
};

use super::stamp::PriorInstall;

/// Checks that the previous install can be upgraded in place to `target`.
///
/// Only container installs of the same architecture qualify. A different
/// distribution is allowed but logged.
pub fn validate_prior_install(
    prior: &PriorInstall,
    target: &NodeFamily,
) -> Result<(), ProvisionError> {
    match VirtTechnology::parse(&prior.virt) {
        Ok(VirtTechnology::Container) => {}
        _ => {
            return Err(ProvisionError::new(
                UpgradeError::UnsupportedVirtTechnology {
                    found: prior.virt.clone(),
                },
            ))
        }
    }

    if prior.node_family.arch != target.arch {
        return Err(ProvisionError::new(UpgradeError::ArchitectureMismatch {
            installed: prior.node_family.arch.name().into(),
            target: target.arch.name().into(),
        }));
    }

    if prior.node_family.distro != target.distro {
        warn!(
            "Upgrading across distributions, from '{}' to '{}'. Make sure they are compatible",
            prior.node_family.distro, target.distro
        );
    }

    info!("Upgrading from {} to {target}", prior.node_family);
    Ok(())
}

/// Erases the non-workload areas of the previous root mounted at `sysimg`.
///
/// The data volume mounted below `sysimg` is left alone.
#[tracing::instrument(skip_all)]
pub fn erase_non_workload_areas(sysimg: &Path) -> Result<(), ProvisionError> {
    for area in UPGRADE_CLEANUP_AREAS {
        let path = sysimg.join(area);
        info!("Removing '{}'", path.display());
        files::remove_all(&path).structured(UpgradeError::Cleanup { area: area.into() })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, str::FromStr};

    use provisioner_api::error::ErrorKind;

    use super::*;

    fn prior(family: &str, virt: &str) -> PriorInstall {
        PriorInstall {
            node_family: NodeFamily::from_str(family).unwrap(),
            virt: virt.into(),
            installed_at: None,
        }
    }

    fn target() -> NodeFamily {
        NodeFamily::from_str("fleet-f22-x86_64").unwrap()
    }

    #[test]
    fn test_container_same_arch_accepted() {
        validate_prior_install(&prior("fleet-f20-x86_64", "container"), &target()).unwrap();
        validate_prior_install(&prior("fleet-f20-x86_64", "lxc"), &target()).unwrap();
        // Different distro only warns
        validate_prior_install(&prior("other-f20-x86_64", "lxc"), &target()).unwrap();
    }

    #[test]
    fn test_hypervisor_based_rejected() {
        let error =
            validate_prior_install(&prior("fleet-f22-x86_64", "hypervisor-based"), &target())
                .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Upgrade(UpgradeError::UnsupportedVirtTechnology {
                found: "hypervisor-based".into()
            })
        );

        let error =
            validate_prior_install(&prior("fleet-f22-x86_64", "kvm"), &target()).unwrap_err();
        assert!(matches!(
            error.kind(),
            ErrorKind::Upgrade(UpgradeError::UnsupportedVirtTechnology { .. })
        ));
    }

    #[test]
    fn test_arch_mismatch_rejected() {
        let error =
            validate_prior_install(&prior("fleet-f22-i386", "lxc"), &target()).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Upgrade(UpgradeError::ArchitectureMismatch {
                installed: "i386".into(),
                target: "x86_64".into()
            })
        );
        assert_eq!(
            error.kind().to_string(),
            "Cannot upgrade from arch=i386 to arch=x86_64"
        );
    }

    #[test]
    fn test_erase_keeps_data() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["usr/lib/modules", "usr/bin", "var/log", "etc/fleet", "boot", "data/slices"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        fs::write(root.path().join("data/slices/vm0"), "workload").unwrap();
        fs::write(root.path().join("etc/fleet/virt"), "lxc").unwrap();

        erase_non_workload_areas(root.path()).unwrap();

        assert!(!root.path().join("usr/lib").exists());
        assert!(!root.path().join("var").exists());
        assert!(!root.path().join("etc").exists());
        assert!(!root.path().join("boot").exists());
        assert!(root.path().join("usr/bin").exists());
        assert_eq!(
            fs::read_to_string(root.path().join("data/slices/vm0")).unwrap(),
            "workload"
        );

        // Running again on an already cleaned root is fine
        erase_non_workload_areas(root.path()).unwrap();
    }
}
