use log::{info, warn};

use provisioner_api::config::DiskPolicy;

use crate::registry::{NotifyMessage, Registry};

use super::{notify_techs, Shortfall, Verdict};

/// Decides whether the node has enough memory to be installed.
///
/// On a shortfall the technical contacts are notified unless the policy skips
/// checks. The verdict never depends on whether the notification went out.
#[tracing::instrument(skip_all)]
pub fn check_memory(total_kb: u64, policy: &DiskPolicy, registry: &dyn Registry) -> Verdict {
    if total_kb >= policy.min_memory_kb {
        info!("Looks like we have enough memory: {total_kb} kb");
        return Verdict::Proceed;
    }

    if policy.skip_checks {
        warn!(
            "Memory requirements not met, but running anyway: {total_kb} kb of required {} kb",
            policy.min_memory_kb
        );
        return Verdict::Proceed;
    }

    warn!(
        "Insufficient memory to run node: {total_kb} kb, required memory: {} kb",
        policy.min_memory_kb
    );
    notify_techs(registry, NotifyMessage::InsufficientMemory);
    Verdict::Halt(Shortfall::InsufficientMemory {
        found_kb: total_kb,
        required_kb: policy.min_memory_kb,
    })
}
