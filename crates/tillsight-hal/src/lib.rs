//! `tillsight-hal` – capability providers and everything that talks to them.
//!
//! # Modules
//!
//! - [`provider`] – the provider contract: [`CapabilityProvider`] for the
//!   asynchronously probed subsystems, [`ScreenProvider`] for the synchronous
//!   screen, and [`BatteryProvider`] with its push-event stream.
//! - [`probe`] – the status probe adapter that turns every provider failure
//!   into a fully-populated fallback status.
//! - [`providers`] – [`ProviderSet`], the injected bundle of providers.
//! - [`device`] – [`DeviceCapabilities`], the Bluetooth/camera/location
//!   facade.
//! - [`alerts`] – [`BatteryAlertEngine`], edge-triggered battery alerting.
//! - [`host`] – providers bound to the local machine.
//! - [`sim`] – [`SimProviders`], a scriptable simulated terminal.

pub mod alerts;
pub mod device;
pub mod host;
pub mod probe;
pub mod provider;
pub mod providers;
pub mod sim;

pub use alerts::{AlertThresholds, BatteryAlertEngine, BatteryAttachment};
pub use device::{DeviceCapabilities, DeviceCapabilityStatus};
pub use probe::{ProbeOutcome, probe_raw, probe_screen, probe_status, settle};
pub use provider::{
    BatteryEvent, BatteryEventKind, BatteryProvider, CapabilityProvider, ScreenProvider,
};
pub use providers::ProviderSet;
pub use sim::{SimHandle, SimProviders, SimState};
