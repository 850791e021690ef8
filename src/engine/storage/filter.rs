use std::path::PathBuf;

use log::{info, warn};
use strum_macros::Display;

use provisioner_api::{config::DiskPolicy, constants::RESERVED_DEVICE_PREFIXES};

use crate::{
    engine::{inventory::BlockDevice, notify_techs, Shortfall, Verdict},
    registry::{NotifyMessage, Registry},
};

/// Why a device is not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Exclusion {
    #[strum(to_string = "belongs to a volume manager")]
    ReservedPath,
    #[strum(to_string = "is too small")]
    TooSmall,
    #[strum(to_string = "is readonly")]
    Readonly,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    /// Usable devices in ascending path order.
    pub usable: Vec<BlockDevice>,
    /// Combined size of `usable`, in GB.
    pub total_size_gb: f64,
    pub excluded: Vec<(PathBuf, Exclusion)>,
}

fn exclusion(device: &BlockDevice, policy: &DiskPolicy) -> Option<Exclusion> {
    let path = device.path.to_string_lossy();
    if RESERVED_DEVICE_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        Some(Exclusion::ReservedPath)
    } else if device.size_gb < policy.min_disk_size_gb as f64 {
        Some(Exclusion::TooSmall)
    } else if device.readonly {
        Some(Exclusion::Readonly)
    } else {
        None
    }
}

/// Splits `devices` into usable and excluded ones.
///
/// Every exclusion is settled before any size is summed, so `total_size_gb`
/// is exactly the sum over `usable`.
pub fn filter_devices(devices: &[BlockDevice], policy: &DiskPolicy) -> FilterOutcome {
    let mut sorted = devices.to_vec();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut outcome = FilterOutcome::default();
    for device in sorted {
        match exclusion(&device, policy) {
            Some(reason) => {
                info!(
                    "Not using '{}' ({:.2} GB): device {reason}",
                    device.path.display(),
                    device.size_gb
                );
                outcome.excluded.push((device.path, reason));
            }
            None => outcome.usable.push(device),
        }
    }

    outcome.total_size_gb = outcome.usable.iter().map(|d| d.size_gb).sum();
    outcome
}

/// Filters the devices and checks them against the disk thresholds.
#[tracing::instrument(skip_all)]
pub fn check_disks(
    devices: &[BlockDevice],
    policy: &DiskPolicy,
    registry: &dyn Registry,
) -> (Verdict, FilterOutcome) {
    if devices.is_empty() {
        warn!("No block devices detected");
        notify_techs(registry, NotifyMessage::InsufficientDisk);
        return (
            Verdict::Halt(Shortfall::NoBlockDevices),
            FilterOutcome::default(),
        );
    }

    let outcome = filter_devices(devices, policy);
    if outcome.usable.is_empty() {
        warn!("No suitable block devices found for install");
        notify_techs(registry, NotifyMessage::InsufficientDisk);
        return (Verdict::Halt(Shortfall::NoUsableDevices), outcome);
    }

    info!(
        "Usable block devices: {:?}",
        outcome.usable.iter().map(|d| &d.path).collect::<Vec<_>>()
    );

    if outcome.total_size_gb < policy.total_min_disk_size_gb as f64 {
        if policy.skip_checks {
            warn!(
                "Total usable disk size {:.2} GB is below the required {} GB, but running anyway",
                outcome.total_size_gb, policy.total_min_disk_size_gb
            );
        } else {
            warn!(
                "Total usable disk size {:.2} GB is below the required {} GB",
                outcome.total_size_gb, policy.total_min_disk_size_gb
            );
            notify_techs(registry, NotifyMessage::InsufficientDisk);
            let shortfall = Shortfall::InsufficientDisk {
                total_gb: outcome.total_size_gb,
                required_gb: policy.total_min_disk_size_gb,
            };
            return (Verdict::Halt(shortfall), outcome);
        }
    }

    info!(
        "Total size for all usable block devices: {:.2} GB",
        outcome.total_size_gb
    );
    (Verdict::Proceed, outcome)
}
