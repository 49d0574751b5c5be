//! [`HealthChecker`] – derives a [`HealthReport`] from a [`UnifiedStatus`].
//!
//! Each registered [`HealthRule`] inspects the snapshot and may report one
//! warning: a soft degradation that leaves the terminal usable (no network,
//! low battery, no printer, …).  Initialization errors are reported as
//! errors.
//!
//! The terminal is unhealthy when any error is present or when
//! [`HealthThresholds::unhealthy_warning_count`] or more warnings are active
//! at once.  Evaluation is pure: the same snapshot always yields the same
//! report.

use serde::{Deserialize, Serialize};
use tillsight_types::{HealthReport, UnifiedStatus};
use tracing::debug;

/// Tunables for the built-in rules and the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    /// Battery levels strictly below this raise a warning.
    pub low_battery_level: f32,
    /// This many simultaneous warnings make the terminal unhealthy.
    pub unhealthy_warning_count: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            low_battery_level: 0.15,
            unhealthy_warning_count: 3,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single soft-degradation signal.
pub trait HealthRule: Send + Sync {
    fn name(&self) -> &str;

    /// Return the warning message when the degradation is present.
    fn check(&self, status: &UnifiedStatus) -> Option<String>;
}

// ────────────────────────────────────────────────────────────────────────────
// HealthChecker
// ────────────────────────────────────────────────────────────────────────────

/// Rule engine producing [`HealthReport`]s.
///
/// # Example
///
/// ```
/// use tillsight_kernel::health::{HealthChecker, HealthThresholds};
/// use tillsight_types::UnifiedStatus;
///
/// let checker = HealthChecker::with_defaults(HealthThresholds::default());
/// let report = checker.evaluate(&UnifiedStatus::fallback("boot failed"));
/// assert!(!report.healthy);
/// assert_eq!(report.errors.len(), 1);
/// ```
#[derive(Default)]
pub struct HealthChecker {
    thresholds: HealthThresholds,
    rules: Vec<Box<dyn HealthRule>>,
}

impl HealthChecker {
    /// A checker with no rules; only initialization errors count.
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            rules: Vec::new(),
        }
    }

    /// A checker with every built-in rule registered.
    pub fn with_defaults(thresholds: HealthThresholds) -> Self {
        let mut checker = Self::new(thresholds);
        checker.add_rule(Box::new(NoNetworkRule));
        checker.add_rule(Box::new(LowBatteryRule {
            threshold: thresholds.low_battery_level,
        }));
        checker.add_rule(Box::new(LowPowerModeRule));
        checker.add_rule(Box::new(NoPrinterRule));
        checker.add_rule(Box::new(BluetoothUnavailableRule));
        checker.add_rule(Box::new(CameraUnavailableRule));
        checker.add_rule(Box::new(LocationUnavailableRule));
        checker
    }

    /// Register a rule.  Warnings are reported in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn HealthRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn evaluate(&self, status: &UnifiedStatus) -> HealthReport {
        let warnings: Vec<String> = self
            .rules
            .iter()
            .filter_map(|rule| rule.check(status))
            .collect();
        let errors: Vec<String> = status
            .initialization_errors
            .iter()
            .map(|e| format!("Initialization error: {e}"))
            .collect();
        let healthy =
            errors.is_empty() && warnings.len() < self.thresholds.unhealthy_warning_count;
        debug!(healthy, warnings = warnings.len(), errors = errors.len(), "health evaluated");
        HealthReport {
            healthy,
            warnings,
            errors,
        }
    }

    /// Like [`evaluate`][Self::evaluate], but reports an uninitialized
    /// monitor as unhealthy instead of requiring a snapshot.
    pub fn evaluate_current(&self, status: Option<&UnifiedStatus>) -> HealthReport {
        match status {
            Some(status) => self.evaluate(status),
            None => HealthReport {
                healthy: false,
                warnings: Vec::new(),
                errors: vec!["Status not initialized".to_string()],
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

pub struct NoNetworkRule;

impl HealthRule for NoNetworkRule {
    fn name(&self) -> &str {
        "no_network"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        (!status.network.is_connected).then(|| "No network connection".to_string())
    }
}

/// Warns when the battery level is known and below `threshold`.
pub struct LowBatteryRule {
    pub threshold: f32,
}

impl HealthRule for LowBatteryRule {
    fn name(&self) -> &str {
        "low_battery"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        let level = status.battery.level?;
        (level < self.threshold).then(|| {
            format!(
                "Low battery ({}%)",
                status.battery.percent().unwrap_or_default()
            )
        })
    }
}

pub struct LowPowerModeRule;

impl HealthRule for LowPowerModeRule {
    fn name(&self) -> &str {
        "low_power_mode"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        status
            .battery
            .low_power_mode
            .then(|| "Low power mode enabled".to_string())
    }
}

pub struct NoPrinterRule;

impl HealthRule for NoPrinterRule {
    fn name(&self) -> &str {
        "no_printer"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        (!status.print.is_available).then(|| "No receipt printer available".to_string())
    }
}

pub struct BluetoothUnavailableRule;

impl HealthRule for BluetoothUnavailableRule {
    fn name(&self) -> &str {
        "bluetooth_unavailable"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        let bt = &status.bluetooth;
        (!(bt.is_available && bt.is_enabled)).then(|| "Bluetooth unavailable".to_string())
    }
}

pub struct CameraUnavailableRule;

impl HealthRule for CameraUnavailableRule {
    fn name(&self) -> &str {
        "camera_unavailable"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        (!status.camera.is_available).then(|| "Camera unavailable".to_string())
    }
}

pub struct LocationUnavailableRule;

impl HealthRule for LocationUnavailableRule {
    fn name(&self) -> &str {
        "location_unavailable"
    }

    fn check(&self, status: &UnifiedStatus) -> Option<String> {
        let loc = &status.location;
        (!(loc.is_available && loc.services_enabled))
            .then(|| "Location services unavailable".to_string())
    }
}
