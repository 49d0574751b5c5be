//! [`SimProviders`] – in-process simulated terminal for tests and demos.
//!
//! Builds a [`ProviderSet`] whose every provider is backed by a shared,
//! scriptable [`SimState`].  The returned [`SimHandle`] drives the simulated
//! hardware: change any status field, inject faults, add latency, push
//! battery events, and read per-capability probe counts.
//!
//! # Fault injection
//!
//! | Fault | Probe behaviour |
//! |---|---|
//! | [`SimHandle::fail`] | Returns the given [`ProbeError`]. |
//! | [`SimHandle::hang`] | Never resolves (the screen, being synchronous, reports a zero-length timeout instead). |
//! | [`SimHandle::panic_on_probe`] | Panics inside the provider. |
//!
//! # Example
//!
//! ```rust
//! use tillsight_hal::sim::SimProviders;
//! use tillsight_types::{Capability, ProbeError};
//!
//! let (providers, handle) = SimProviders::builder()
//!     .with_battery_level(0.42)
//!     .with_failure(Capability::Print, ProbeError::Unavailable {
//!         capability: Capability::Print,
//!         reason: "no printer paired".into(),
//!     })
//!     .build();
//!
//! handle.set_connected(false);
//! # let _ = providers;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tillsight_middleware::{Listener, ListenerRegistry, Subscription};
use tillsight_types::{
    BatteryState, BatteryStatus, BiometricKind, BiometricsStatus, BluetoothStatus, CameraStatus,
    Capability, ConnectionType, DeviceInfoStatus, LocationStatus, NetworkStatus, Orientation,
    PrintStatus, ProbeError, ScreenStatus,
};
use tracing::debug;

use crate::provider::{
    BatteryEvent, BatteryEventKind, BatteryProvider, CapabilityProvider, ScreenProvider,
};
use crate::providers::ProviderSet;

// ─────────────────────────────────────────────────────────────────────────────
// Simulated device state
// ─────────────────────────────────────────────────────────────────────────────

/// The values the simulated providers report.  Defaults describe a healthy
/// countertop terminal on Wi-Fi with a receipt printer attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub network: NetworkStatus,
    pub bluetooth: BluetoothStatus,
    pub camera: CameraStatus,
    pub location: LocationStatus,
    pub biometrics: BiometricsStatus,
    pub battery: BatteryStatus,
    pub print: PrintStatus,
    pub screen: ScreenStatus,
    pub device_info: DeviceInfoStatus,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            network: NetworkStatus {
                is_available: true,
                is_connected: true,
                connection_type: ConnectionType::Wifi,
                is_internet_reachable: Some(true),
                ip_address: Some("192.168.1.20".to_string()),
                last_error: None,
            },
            bluetooth: BluetoothStatus {
                is_available: true,
                is_enabled: true,
                has_permission: true,
                paired_devices: 1,
                last_error: None,
            },
            camera: CameraStatus {
                is_available: true,
                has_permission: true,
                has_front_camera: true,
                has_back_camera: true,
                last_error: None,
            },
            location: LocationStatus {
                is_available: true,
                has_permission: true,
                services_enabled: true,
                accuracy_m: Some(12.0),
                last_error: None,
            },
            biometrics: BiometricsStatus {
                is_available: true,
                is_enrolled: true,
                supported_kinds: vec![BiometricKind::Fingerprint],
                last_error: None,
            },
            battery: BatteryStatus {
                is_available: true,
                level: Some(0.82),
                state: BatteryState::Unplugged,
                low_power_mode: false,
                last_error: None,
            },
            print: PrintStatus {
                is_available: true,
                selected_printer: Some("Star TSP143".to_string()),
                last_error: None,
            },
            screen: ScreenStatus {
                is_available: true,
                width: 1280,
                height: 800,
                scale: 2.0,
                font_scale: 1.0,
                orientation: Orientation::Landscape,
                last_error: None,
            },
            device_info: DeviceInfoStatus {
                is_available: true,
                brand: "Sunmi".to_string(),
                model: "T2s".to_string(),
                os_name: "Android".to_string(),
                os_version: "11".to_string(),
                is_physical_device: true,
                total_memory_bytes: Some(4 * 1024 * 1024 * 1024),
                last_error: None,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Fault {
    Error(ProbeError),
    Hang,
    Panic,
}

#[derive(Default)]
struct Control {
    faults: HashMap<Capability, Fault>,
    latency: HashMap<Capability, Duration>,
    probe_counts: HashMap<Capability, usize>,
}

struct Shared {
    state: Mutex<SimState>,
    control: Mutex<Control>,
    level_events: ListenerRegistry<BatteryEvent>,
    charging_events: ListenerRegistry<BatteryEvent>,
    low_power_events: ListenerRegistry<BatteryEvent>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the probe and look up its scripted fault and latency.
    fn enter(&self, capability: Capability) -> (Option<Fault>, Option<Duration>) {
        let mut control = self.control();
        *control.probe_counts.entry(capability).or_default() += 1;
        (
            control.faults.get(&capability).cloned(),
            control.latency.get(&capability).copied(),
        )
    }

    async fn begin(&self, capability: Capability) -> Result<(), ProbeError> {
        let (fault, latency) = self.enter(capability);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        match fault {
            None => Ok(()),
            Some(Fault::Error(e)) => Err(e),
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::Panic) => panic!("simulated {capability} probe panic"),
        }
    }

    fn begin_sync(&self, capability: Capability) -> Result<(), ProbeError> {
        match self.enter(capability).0 {
            None => Ok(()),
            Some(Fault::Error(e)) => Err(e),
            Some(Fault::Hang) => Err(ProbeError::Timeout {
                capability,
                after: Duration::ZERO,
            }),
            Some(Fault::Panic) => panic!("simulated {capability} probe panic"),
        }
    }

    fn battery_registry(&self, kind: BatteryEventKind) -> &ListenerRegistry<BatteryEvent> {
        match kind {
            BatteryEventKind::Level => &self.level_events,
            BatteryEventKind::ChargingState => &self.charging_events,
            BatteryEventKind::LowPowerMode => &self.low_power_events,
        }
    }

    fn push(&self, event: BatteryEvent) {
        debug!(?event, "simulated battery event");
        self.battery_registry(event.kind()).notify(&event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated providers
// ─────────────────────────────────────────────────────────────────────────────

struct SimNetwork(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimNetwork {
    type Status = NetworkStatus;

    async fn probe(&self) -> Result<NetworkStatus, ProbeError> {
        self.0.begin(Capability::Network).await?;
        Ok(self.0.state().network.clone())
    }
}

struct SimBluetooth(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimBluetooth {
    type Status = BluetoothStatus;

    async fn probe(&self) -> Result<BluetoothStatus, ProbeError> {
        self.0.begin(Capability::Bluetooth).await?;
        Ok(self.0.state().bluetooth.clone())
    }
}

struct SimCamera(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimCamera {
    type Status = CameraStatus;

    async fn probe(&self) -> Result<CameraStatus, ProbeError> {
        self.0.begin(Capability::Camera).await?;
        Ok(self.0.state().camera.clone())
    }
}

struct SimLocation(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimLocation {
    type Status = LocationStatus;

    async fn probe(&self) -> Result<LocationStatus, ProbeError> {
        self.0.begin(Capability::Location).await?;
        Ok(self.0.state().location.clone())
    }
}

struct SimBiometrics(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimBiometrics {
    type Status = BiometricsStatus;

    async fn probe(&self) -> Result<BiometricsStatus, ProbeError> {
        self.0.begin(Capability::Biometrics).await?;
        Ok(self.0.state().biometrics.clone())
    }
}

struct SimBattery(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimBattery {
    type Status = BatteryStatus;

    async fn probe(&self) -> Result<BatteryStatus, ProbeError> {
        self.0.begin(Capability::Battery).await?;
        Ok(self.0.state().battery.clone())
    }
}

impl BatteryProvider for SimBattery {
    fn subscribe(
        &self,
        kind: BatteryEventKind,
        callback: Listener<BatteryEvent>,
    ) -> Subscription<BatteryEvent> {
        self.0.battery_registry(kind).add_listener(callback)
    }
}

struct SimPrint(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimPrint {
    type Status = PrintStatus;

    async fn probe(&self) -> Result<PrintStatus, ProbeError> {
        self.0.begin(Capability::Print).await?;
        Ok(self.0.state().print.clone())
    }
}

struct SimScreen(Arc<Shared>);

impl ScreenProvider for SimScreen {
    fn probe(&self) -> Result<ScreenStatus, ProbeError> {
        self.0.begin_sync(Capability::Screen)?;
        Ok(self.0.state().screen.clone())
    }
}

struct SimDeviceInfo(Arc<Shared>);

#[async_trait]
impl CapabilityProvider for SimDeviceInfo {
    type Status = DeviceInfoStatus;

    async fn probe(&self) -> Result<DeviceInfoStatus, ProbeError> {
        self.0.begin(Capability::DeviceInfo).await?;
        Ok(self.0.state().device_info.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for a simulated [`ProviderSet`].
#[derive(Default)]
pub struct SimProviders {
    state: SimState,
    control: Control,
}

impl SimProviders {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Start from a fully custom device state.
    pub fn with_state(mut self, state: SimState) -> Self {
        self.state = state;
        self
    }

    pub fn with_battery_level(mut self, level: f32) -> Self {
        self.state.battery.level = Some(level);
        self
    }

    pub fn with_failure(mut self, capability: Capability, error: ProbeError) -> Self {
        self.control.faults.insert(capability, Fault::Error(error));
        self
    }

    pub fn with_hang(mut self, capability: Capability) -> Self {
        self.control.faults.insert(capability, Fault::Hang);
        self
    }

    pub fn with_panic(mut self, capability: Capability) -> Self {
        self.control.faults.insert(capability, Fault::Panic);
        self
    }

    pub fn with_latency(mut self, capability: Capability, latency: Duration) -> Self {
        self.control.latency.insert(capability, latency);
        self
    }

    /// Consume the builder and return the providers plus the handle that
    /// drives them.
    pub fn build(self) -> (ProviderSet, SimHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(self.state),
            control: Mutex::new(self.control),
            level_events: ListenerRegistry::new(),
            charging_events: ListenerRegistry::new(),
            low_power_events: ListenerRegistry::new(),
        });

        let providers = ProviderSet {
            network: Arc::new(SimNetwork(Arc::clone(&shared))),
            bluetooth: Arc::new(SimBluetooth(Arc::clone(&shared))),
            camera: Arc::new(SimCamera(Arc::clone(&shared))),
            location: Arc::new(SimLocation(Arc::clone(&shared))),
            biometrics: Arc::new(SimBiometrics(Arc::clone(&shared))),
            battery: Arc::new(SimBattery(Arc::clone(&shared))),
            print: Arc::new(SimPrint(Arc::clone(&shared))),
            screen: Arc::new(SimScreen(Arc::clone(&shared))),
            device_info: Arc::new(SimDeviceInfo(Arc::clone(&shared))),
        };

        (providers, SimHandle { shared })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Drives the simulated hardware behind a [`ProviderSet`] built by
/// [`SimProviders`].  Cloning is cheap.
#[derive(Clone)]
pub struct SimHandle {
    shared: Arc<Shared>,
}

impl SimHandle {
    /// Mutate the reported state directly.  No battery events are pushed.
    pub fn update(&self, f: impl FnOnce(&mut SimState)) {
        f(&mut self.shared.state());
    }

    pub fn snapshot(&self) -> SimState {
        self.shared.state().clone()
    }

    /// Connect to Wi-Fi or drop offline.
    pub fn set_connected(&self, connected: bool) {
        self.update(|state| {
            state.network.is_connected = connected;
            state.network.is_internet_reachable = Some(connected);
            if connected {
                state.network.connection_type = ConnectionType::Wifi;
                state.network.ip_address = Some("192.168.1.20".to_string());
            } else {
                state.network.connection_type = ConnectionType::None;
                state.network.ip_address = None;
            }
        });
    }

    /// Set the battery level and push a level event if it changed.
    pub fn set_battery_level(&self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        let changed = {
            let mut state = self.shared.state();
            let changed = state.battery.level != Some(level);
            state.battery.level = Some(level);
            changed
        };
        if changed {
            self.shared.push(BatteryEvent::LevelChanged(level));
        }
    }

    pub fn set_battery_state(&self, battery_state: BatteryState) {
        let changed = {
            let mut state = self.shared.state();
            let changed = state.battery.state != battery_state;
            state.battery.state = battery_state;
            changed
        };
        if changed {
            self.shared.push(BatteryEvent::ChargingStateChanged(battery_state));
        }
    }

    pub fn set_low_power_mode(&self, enabled: bool) {
        let changed = {
            let mut state = self.shared.state();
            let changed = state.battery.low_power_mode != enabled;
            state.battery.low_power_mode = enabled;
            changed
        };
        if changed {
            self.shared.push(BatteryEvent::LowPowerModeChanged(enabled));
        }
    }

    /// Make every subsequent probe of `capability` return `error`.
    pub fn fail(&self, capability: Capability, error: ProbeError) {
        self.shared
            .control()
            .faults
            .insert(capability, Fault::Error(error));
    }

    pub fn hang(&self, capability: Capability) {
        self.shared.control().faults.insert(capability, Fault::Hang);
    }

    pub fn panic_on_probe(&self, capability: Capability) {
        self.shared.control().faults.insert(capability, Fault::Panic);
    }

    /// Clear any fault scripted for `capability`.
    pub fn heal(&self, capability: Capability) {
        self.shared.control().faults.remove(&capability);
    }

    /// Number of times `capability` has been probed.
    pub fn probe_count(&self, capability: Capability) -> usize {
        self.shared
            .control()
            .probe_counts
            .get(&capability)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_probe_counts(&self) {
        self.shared.control().probe_counts.clear();
    }

    /// Capabilities that currently have a fault scripted.
    pub fn faulted(&self) -> Vec<Capability> {
        let control = self.shared.control();
        let mut caps: Vec<Capability> = control.faults.keys().copied().collect();
        caps.sort();
        caps
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn sim_reports_default_state() {
        let (providers, handle) = SimProviders::builder().build();
        let network = providers.network.probe().await.unwrap();
        assert!(network.is_connected);
        assert_eq!(providers.screen.probe().unwrap().width, 1280);
        assert_eq!(handle.probe_count(Capability::Network), 1);
        assert_eq!(handle.probe_count(Capability::Screen), 1);
    }

    #[tokio::test]
    async fn injected_failure_then_heal() {
        let (providers, handle) = SimProviders::builder()
            .with_failure(
                Capability::Biometrics,
                ProbeError::Unavailable {
                    capability: Capability::Biometrics,
                    reason: "no sensor".to_string(),
                },
            )
            .build();
        assert!(providers.biometrics.probe().await.is_err());
        assert_eq!(handle.faulted(), vec![Capability::Biometrics]);

        handle.heal(Capability::Biometrics);
        assert!(providers.biometrics.probe().await.unwrap().is_enrolled);
        assert!(handle.faulted().is_empty());
    }

    #[test]
    fn hung_screen_reports_timeout() {
        let (providers, _handle) = SimProviders::builder().with_hang(Capability::Screen).build();
        assert!(matches!(
            providers.screen.probe(),
            Err(ProbeError::Timeout { capability: Capability::Screen, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_probe() {
        let (providers, _handle) = SimProviders::builder()
            .with_latency(Capability::Print, Duration::from_secs(3))
            .build();
        let started = tokio::time::Instant::now();
        providers.print.probe().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn battery_events_reach_matching_subscribers_only() {
        let (providers, handle) = SimProviders::builder().build();
        let levels = Arc::new(AtomicUsize::new(0));
        let l = Arc::clone(&levels);
        let sub = providers.battery.subscribe(
            BatteryEventKind::Level,
            Arc::new(move |_: &BatteryEvent| {
                l.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handle.set_battery_level(0.5);
        handle.set_battery_level(0.5);
        handle.set_low_power_mode(true);
        handle.set_battery_state(BatteryState::Charging);
        assert_eq!(levels.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        handle.set_battery_level(0.4);
        assert_eq!(levels.load(Ordering::SeqCst), 1);
        assert_eq!(handle.snapshot().battery.level, Some(0.4));
    }

    #[test]
    fn set_connected_false_clears_transport() {
        let (_providers, handle) = SimProviders::builder().build();
        handle.set_connected(false);
        let network = handle.snapshot().network;
        assert!(!network.is_connected);
        assert_eq!(network.connection_type, ConnectionType::None);
        assert_eq!(network.ip_address, None);
    }
}
