//! [`Alert`] – an immutable, timestamped battery event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowBattery,
    CriticalBattery,
    LowPowerMode,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::LowBattery => "low_battery",
            AlertKind::CriticalBattery => "critical_battery",
            AlertKind::LowPowerMode => "low_power_mode",
        }
    }

    pub fn severity(self) -> AlertSeverity {
        match self {
            AlertKind::CriticalBattery => AlertSeverity::Critical,
            AlertKind::LowBattery | AlertKind::LowPowerMode => AlertSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// Emitted on a transition into a threshold condition.  Delivered once to
/// every registered listener and not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// Battery level observed when the alert fired, if known.
    pub level: Option<f32>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, level: Option<f32>, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&AlertKind::CriticalBattery).unwrap();
        assert_eq!(json, "\"critical_battery\"");
        assert_eq!(AlertKind::LowBattery.as_str(), "low_battery");
    }

    #[test]
    fn critical_outranks_warning() {
        assert!(AlertKind::CriticalBattery.severity() > AlertKind::LowBattery.severity());
        assert_eq!(AlertKind::LowPowerMode.severity(), AlertSeverity::Warning);
    }
}
