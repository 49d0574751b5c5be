//! `tillsight-kernel` – health rules.
//!
//! The kernel does not probe anything; it judges.  [`HealthChecker`] runs a
//! set of [`HealthRule`]s over a [`UnifiedStatus`][tillsight_types::UnifiedStatus]
//! and decides whether the terminal is healthy.
//!
//! # Modules
//!
//! - [`health`] – [`HealthChecker`], [`HealthThresholds`], the
//!   [`HealthRule`] trait and the built-in rules.

pub mod health;

pub use health::{
    BluetoothUnavailableRule, CameraUnavailableRule, HealthChecker, HealthRule,
    HealthThresholds, LocationUnavailableRule, LowBatteryRule, LowPowerModeRule, NoNetworkRule,
    NoPrinterRule,
};
