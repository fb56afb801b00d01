use tracing::{debug, info};

use super::probe::{CapabilityProbe, DeviceProfile, DeviceTier};

const DESKTOP_HIGH_CAP: usize = 8;
const MOBILE_HIGH_CAP: usize = 3;
const MEDIUM_CAP: usize = 2;

/// Picks pool sizes the device can survive.
///
/// Decoded bitmaps are `width * height * 4` bytes; on low-memory phones a
/// few concurrent decodes are enough to get the process killed, so caps are
/// chosen per [`DeviceTier`].
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyGovernor {
    profile: DeviceProfile,
    max: usize,
}

impl ConcurrencyGovernor {
    pub fn new(probe: &dyn CapabilityProbe) -> Self {
        Self::from_profile(probe.profile())
    }

    pub fn from_profile(profile: DeviceProfile) -> Self {
        // One core stays free for the coordinating thread.
        let cores = profile.hardware_concurrency.saturating_sub(1).max(1);
        let max = match profile.tier {
            DeviceTier::Low => 1,
            DeviceTier::Medium => MEDIUM_CAP.min(cores),
            DeviceTier::High if profile.mobile => MOBILE_HIGH_CAP.min(cores),
            DeviceTier::High => DESKTOP_HIGH_CAP.min(cores),
        };

        info!(
            "Concurrency: tier={:?}, mobile={}, cores={}, max parallelism={}",
            profile.tier, profile.mobile, profile.hardware_concurrency, max
        );
        Self { profile, max }
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn max_parallelism(&self) -> usize {
        self.max
    }

    /// Mobile devices start below their cap; desktops start at it.
    pub fn default_parallelism(&self) -> usize {
        if self.profile.mobile {
            let preferred = if self.profile.tier == DeviceTier::High { 3 } else { 2 };
            preferred.min(self.max)
        } else {
            self.max
        }
    }

    /// Resolves a user request into a usable pool size.
    ///
    /// `None` and `0` mean "use the default"; anything else is clamped to
    /// `1..=max_parallelism()`.
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        let resolved = match requested {
            None | Some(0) => self.default_parallelism(),
            Some(n) => n.clamp(1, self.max),
        };
        if let Some(n) = requested {
            if n != resolved {
                debug!("Requested parallelism {} resolved to {}", n, resolved);
            }
        }
        resolved
    }
}
