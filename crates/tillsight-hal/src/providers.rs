//! [`ProviderSet`] – the bundle of capability providers a monitor is built
//! from.
//!
//! The set holds one shared provider per capability.  Construct it directly
//! with real platform bindings, from [`host`][crate::host] for the local
//! machine, or via [`SimProviders`][crate::sim::SimProviders] for tests and
//! demos.  Cloning is cheap; clones share the same providers.

use std::sync::Arc;

use crate::device::DeviceCapabilities;
use crate::provider::{
    BatteryProvider, BiometricsProvider, BluetoothProvider, CameraProvider, DeviceInfoProvider,
    LocationProvider, NetworkProvider, PrintProvider, ScreenProvider,
};

#[derive(Clone)]
pub struct ProviderSet {
    pub network: Arc<NetworkProvider>,
    pub bluetooth: Arc<BluetoothProvider>,
    pub camera: Arc<CameraProvider>,
    pub location: Arc<LocationProvider>,
    pub biometrics: Arc<BiometricsProvider>,
    pub battery: Arc<dyn BatteryProvider>,
    pub print: Arc<PrintProvider>,
    pub screen: Arc<dyn ScreenProvider>,
    pub device_info: Arc<DeviceInfoProvider>,
}

impl ProviderSet {
    /// The hardware-proximity facade over this set's Bluetooth, camera and
    /// location providers.
    pub fn device_capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities::new(
            Arc::clone(&self.bluetooth),
            Arc::clone(&self.camera),
            Arc::clone(&self.location),
        )
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet").finish_non_exhaustive()
    }
}
