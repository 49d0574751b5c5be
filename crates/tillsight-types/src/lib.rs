//! `tillsight-types` – shared data model for the terminal status engine.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - [`Capability`] – the closed set of monitored terminal subsystems.
//! - [`status`] – one status type per capability plus the [`SubsystemStatus`]
//!   trait that gives them a common shape.
//! - [`unified`] – [`UnifiedStatus`], the merged snapshot.
//! - [`alert`] – [`Alert`] events raised by the battery alert engine.
//! - [`event`] – [`Event`] envelopes carried on the status bus.
//! - [`health`] – [`HealthReport`], the derived health verdict.
//! - [`ProbeError`] – the failure taxonomy for capability probes.

pub mod alert;
pub mod event;
pub mod health;
pub mod status;
pub mod unified;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use alert::{Alert, AlertKind, AlertSeverity};
pub use event::{Event, EventPayload};
pub use health::HealthReport;
pub use status::{
    BatteryState, BatteryStatus, BiometricKind, BiometricsStatus, BluetoothStatus, CameraStatus,
    ConnectionType, DeviceInfoStatus, LocationStatus, NetworkStatus, Orientation, PrintStatus,
    ScreenStatus, SubsystemStatus,
};
pub use unified::UnifiedStatus;

/// A terminal subsystem whose condition is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Network,
    Bluetooth,
    Camera,
    Location,
    Biometrics,
    Battery,
    Print,
    Screen,
    DeviceInfo,
}

impl Capability {
    /// Every capability, in status-table order.
    pub const ALL: [Capability; 9] = [
        Capability::Network,
        Capability::Bluetooth,
        Capability::Camera,
        Capability::Location,
        Capability::Biometrics,
        Capability::Battery,
        Capability::Print,
        Capability::Screen,
        Capability::DeviceInfo,
    ];

    /// Machine name, e.g. `"device_info"`.
    pub fn name(self) -> &'static str {
        match self {
            Capability::Network => "network",
            Capability::Bluetooth => "bluetooth",
            Capability::Camera => "camera",
            Capability::Location => "location",
            Capability::Biometrics => "biometrics",
            Capability::Battery => "battery",
            Capability::Print => "print",
            Capability::Screen => "screen",
            Capability::DeviceInfo => "device_info",
        }
    }

    /// Human label used in status tables, e.g. `"Device Info"`.
    pub fn label(self) -> &'static str {
        match self {
            Capability::Network => "Network",
            Capability::Bluetooth => "Bluetooth",
            Capability::Camera => "Camera",
            Capability::Location => "Location",
            Capability::Biometrics => "Biometrics",
            Capability::Battery => "Battery",
            Capability::Print => "Print",
            Capability::Screen => "Screen",
            Capability::DeviceInfo => "Device Info",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known [`Capability`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability '{0}'")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Capability::ALL
            .into_iter()
            .find(|cap| cap.name() == wanted || (wanted == "deviceinfo" && *cap == Capability::DeviceInfo))
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// Failure taxonomy for a single capability probe.
///
/// Probe errors never escape the provider boundary: the status probe adapter
/// converts each one into a fallback status whose `last_error` carries the
/// rendered message.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProbeError {
    #[error("{capability} unavailable: {reason}")]
    Unavailable { capability: Capability, reason: String },

    #[error("{capability} permission denied")]
    PermissionDenied { capability: Capability },

    #[error("{capability} transient failure: {reason}")]
    TransientFailure { capability: Capability, reason: String },

    #[error("{capability} probe timed out after {after:?}")]
    Timeout { capability: Capability, after: Duration },

    #[error("{capability} probe panicked")]
    Panicked { capability: Capability },
}

impl ProbeError {
    /// The capability whose probe failed.
    pub fn capability(&self) -> Capability {
        match self {
            ProbeError::Unavailable { capability, .. }
            | ProbeError::PermissionDenied { capability }
            | ProbeError::TransientFailure { capability, .. }
            | ProbeError::Timeout { capability, .. }
            | ProbeError::Panicked { capability } => *capability,
        }
    }

    /// `true` for failures expected to clear on the next refresh.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeError::TransientFailure { .. } | ProbeError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_parses_from_name_and_aliases() {
        assert_eq!("network".parse::<Capability>(), Ok(Capability::Network));
        assert_eq!("Device-Info".parse::<Capability>(), Ok(Capability::DeviceInfo));
        assert_eq!("deviceinfo".parse::<Capability>(), Ok(Capability::DeviceInfo));
        assert!("radar".parse::<Capability>().is_err());
    }

    #[test]
    fn capability_serializes_snake_case() {
        let json = serde_json::to_string(&Capability::DeviceInfo).unwrap();
        assert_eq!(json, "\"device_info\"");
    }

    #[test]
    fn probe_error_display_names_capability() {
        let err = ProbeError::PermissionDenied {
            capability: Capability::Camera,
        };
        assert_eq!(err.to_string(), "camera permission denied");
        assert_eq!(err.capability(), Capability::Camera);
        assert!(!err.is_transient());

        let err = ProbeError::Timeout {
            capability: Capability::Location,
            after: Duration::from_secs(2),
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.is_transient());
    }
}
