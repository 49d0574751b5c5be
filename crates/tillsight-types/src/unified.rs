//! [`UnifiedStatus`] – the merged snapshot of every monitored subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Capability;
use crate::status::{
    BatteryStatus, BiometricsStatus, BluetoothStatus, CameraStatus, DeviceInfoStatus,
    LocationStatus, NetworkStatus, PrintStatus, ScreenStatus, SubsystemStatus,
};

/// One status per capability, a timestamp, and the initialization errors
/// collected by the last full probe.
///
/// Every capability field is always present; a failed probe contributes its
/// fallback value instead of leaving a hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedStatus {
    pub network: NetworkStatus,
    pub bluetooth: BluetoothStatus,
    pub camera: CameraStatus,
    pub location: LocationStatus,
    pub biometrics: BiometricsStatus,
    pub battery: BatteryStatus,
    pub print: PrintStatus,
    pub screen: ScreenStatus,
    pub device_info: DeviceInfoStatus,
    pub last_updated: DateTime<Utc>,
    /// One entry per provider that failed during the last full initialize.
    pub initialization_errors: Vec<String>,
}

impl UnifiedStatus {
    /// A snapshot in which every capability reports its fallback value.
    ///
    /// Used when the aggregation itself failed; `reason` becomes both each
    /// subsystem's `last_error` and the single initialization error.
    pub fn fallback(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            network: NetworkStatus::fallback(reason.clone()),
            bluetooth: BluetoothStatus::fallback(reason.clone()),
            camera: CameraStatus::fallback(reason.clone()),
            location: LocationStatus::fallback(reason.clone()),
            biometrics: BiometricsStatus::fallback(reason.clone()),
            battery: BatteryStatus::fallback(reason.clone()),
            print: PrintStatus::fallback(reason.clone()),
            screen: ScreenStatus::fallback(reason.clone()),
            device_info: DeviceInfoStatus::fallback(reason.clone()),
            last_updated: Utc::now(),
            initialization_errors: vec![reason],
        }
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        match capability {
            Capability::Network => self.network.is_available(),
            Capability::Bluetooth => self.bluetooth.is_available(),
            Capability::Camera => self.camera.is_available(),
            Capability::Location => self.location.is_available(),
            Capability::Biometrics => self.biometrics.is_available(),
            Capability::Battery => self.battery.is_available(),
            Capability::Print => self.print.is_available(),
            Capability::Screen => self.screen.is_available(),
            Capability::DeviceInfo => self.device_info.is_available(),
        }
    }

    pub fn last_error(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Network => self.network.last_error(),
            Capability::Bluetooth => self.bluetooth.last_error(),
            Capability::Camera => self.camera.last_error(),
            Capability::Location => self.location.last_error(),
            Capability::Biometrics => self.biometrics.last_error(),
            Capability::Battery => self.battery.last_error(),
            Capability::Print => self.print.last_error(),
            Capability::Screen => self.screen.last_error(),
            Capability::DeviceInfo => self.device_info.last_error(),
        }
    }

    /// Single-line log summary for one capability.
    pub fn summary_line(&self, capability: Capability) -> String {
        match capability {
            Capability::Network => self.network.format_for_logging(),
            Capability::Bluetooth => self.bluetooth.format_for_logging(),
            Capability::Camera => self.camera.format_for_logging(),
            Capability::Location => self.location.format_for_logging(),
            Capability::Biometrics => self.biometrics.format_for_logging(),
            Capability::Battery => self.battery.format_for_logging(),
            Capability::Print => self.print.format_for_logging(),
            Capability::Screen => self.screen.format_for_logging(),
            Capability::DeviceInfo => self.device_info.format_for_logging(),
        }
    }

    /// Capabilities whose availability differs from `previous`.
    pub fn changed_capabilities(&self, previous: &UnifiedStatus) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|cap| self.is_available(*cap) != previous.is_available(*cap))
            .collect()
    }

    /// Number of capabilities currently available.
    pub fn available_count(&self) -> usize {
        Capability::ALL
            .into_iter()
            .filter(|cap| self.is_available(*cap))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_populates_every_capability() {
        let status = UnifiedStatus::fallback("aggregation failed");
        for cap in Capability::ALL {
            assert!(!status.is_available(cap), "{cap} should be unavailable");
            assert_eq!(status.last_error(cap), Some("aggregation failed"));
        }
        assert_eq!(status.initialization_errors, vec!["aggregation failed"]);
        assert_eq!(status.available_count(), 0);
    }

    #[test]
    fn changed_capabilities_reports_flips() {
        let before = UnifiedStatus::fallback("boot");
        let mut after = before.clone();
        after.network.is_available = true;
        after.print.is_available = true;
        assert_eq!(
            after.changed_capabilities(&before),
            vec![Capability::Network, Capability::Print]
        );
        assert!(before.changed_capabilities(&before).is_empty());
    }

    #[test]
    fn json_roundtrip_preserves_snapshot() {
        let status = UnifiedStatus::fallback("boot");
        let json = serde_json::to_string(&status).unwrap();
        let back: UnifiedStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
