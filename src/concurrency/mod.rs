//! Parallelism bounds derived from device capabilities.

mod governor;
mod probe;

pub use governor::ConcurrencyGovernor;
pub use probe::{
    CapabilityProbe,
    DeviceProfile,
    DeviceSignals,
    DeviceTier,
    MobilePlatform,
    MobileSignals,
    SignalProbe,
    SystemProbe,
};
