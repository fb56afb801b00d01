//! Device capability detection.
//!
//! A [`CapabilityProbe`] gathers raw [`DeviceSignals`]; [`DeviceProfile::from_signals`]
//! buckets them into a [`DeviceTier`]. Swapping the probe is how tests and
//! embedding hosts describe a device.

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobilePlatform {
    Ios,
    Android,
    Other,
}

/// Hints available on mobile devices when there is no memory signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileSignals {
    pub platform: MobilePlatform,
    pub os_major_version: Option<u32>,
    /// Logical screen width in CSS pixels
    pub screen_width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSignals {
    pub hardware_concurrency: usize,
    /// Total device memory in GiB, when the platform reports it
    pub device_memory_gb: Option<f64>,
    /// `None` on desktop or when the device type is unknown
    pub mobile: Option<MobileSignals>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub tier: DeviceTier,
    pub mobile: bool,
    pub hardware_concurrency: usize,
}

impl DeviceProfile {
    pub fn from_signals(signals: &DeviceSignals) -> Self {
        let tier = match (signals.device_memory_gb, signals.mobile) {
            (Some(gb), _) => tier_from_memory(gb),
            (None, Some(mobile)) => tier_from_mobile_hints(&mobile),
            (None, None) => DeviceTier::High,
        };

        Self {
            tier,
            mobile: signals.mobile.is_some(),
            hardware_concurrency: signals.hardware_concurrency.max(1),
        }
    }
}

fn tier_from_memory(gb: f64) -> DeviceTier {
    if gb <= 2.0 {
        DeviceTier::Low
    } else if gb <= 4.0 {
        DeviceTier::Medium
    } else {
        DeviceTier::High
    }
}

// Older OS releases and narrow screens track low-memory hardware closely.
fn tier_from_mobile_hints(mobile: &MobileSignals) -> DeviceTier {
    let old_os = match (mobile.platform, mobile.os_major_version) {
        (MobilePlatform::Ios, Some(v)) => v < 15,
        (MobilePlatform::Android, Some(v)) => v < 10,
        _ => false,
    };
    if old_os {
        return DeviceTier::Low;
    }

    // Phones are never assumed to be high tier without a memory signal.
    match mobile.screen_width {
        Some(w) if w < 375 => DeviceTier::Low,
        _ => DeviceTier::Medium,
    }
}

pub trait CapabilityProbe: Send + Sync {
    fn signals(&self) -> DeviceSignals;

    fn profile(&self) -> DeviceProfile {
        DeviceProfile::from_signals(&self.signals())
    }
}

/// Reads the host's core count and total memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl CapabilityProbe for SystemProbe {
    fn signals(&self) -> DeviceSignals {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        let device_memory_gb = (total > 0).then(|| total as f64 / GIB);

        let mobile = if cfg!(target_os = "android") {
            Some(MobileSignals { platform: MobilePlatform::Android, os_major_version: None, screen_width: None })
        } else if cfg!(target_os = "ios") {
            Some(MobileSignals { platform: MobilePlatform::Ios, os_major_version: None, screen_width: None })
        } else {
            None
        };

        let signals = DeviceSignals {
            hardware_concurrency: num_cpus::get(),
            device_memory_gb,
            mobile,
        };
        debug!("Detected device signals: {:?}", signals);
        signals
    }
}

/// Reports a fixed set of signals.
#[derive(Debug, Clone, Copy)]
pub struct SignalProbe(pub DeviceSignals);

impl SignalProbe {
    pub fn desktop(hardware_concurrency: usize) -> Self {
        Self(DeviceSignals { hardware_concurrency, device_memory_gb: None, mobile: None })
    }
}

impl CapabilityProbe for SignalProbe {
    fn signals(&self) -> DeviceSignals {
        self.0
    }
}
