//! Capability provider contract.
//!
//! A provider is the collaborator that knows how to query one subsystem on
//! the terminal.  Drivers implement the trait for their status type and are
//! collected into a [`ProviderSet`][crate::providers::ProviderSet]; the rest
//! of the engine only ever talks to the trait, so real platform bindings and
//! simulated devices are interchangeable.
//!
//! Providers report failure through [`ProbeError`].  The
//! [`probe`][crate::probe] adapter is the boundary that turns any error into a
//! fallback status, so nothing above it ever sees a failed probe as an error.

use async_trait::async_trait;
use tillsight_middleware::{Listener, Subscription};
use tillsight_types::{
    BatteryState, BatteryStatus, BiometricsStatus, BluetoothStatus, CameraStatus,
    DeviceInfoStatus, LocationStatus, NetworkStatus, PrintStatus, ProbeError, ScreenStatus,
    SubsystemStatus,
};

/// An asynchronously probed subsystem.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    type Status: SubsystemStatus;

    /// Query the subsystem's current condition.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] when the subsystem is absent, permission was
    /// denied, or the query failed.
    async fn probe(&self) -> Result<Self::Status, ProbeError>;
}

/// The screen is the one capability queried synchronously.
pub trait ScreenProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ProbeError`] when display metrics cannot be read.
    fn probe(&self) -> Result<ScreenStatus, ProbeError>;
}

/// Which battery transitions a subscriber wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatteryEventKind {
    Level,
    ChargingState,
    LowPowerMode,
}

/// A live push from the battery subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatteryEvent {
    LevelChanged(f32),
    ChargingStateChanged(BatteryState),
    LowPowerModeChanged(bool),
}

impl BatteryEvent {
    pub fn kind(&self) -> BatteryEventKind {
        match self {
            BatteryEvent::LevelChanged(_) => BatteryEventKind::Level,
            BatteryEvent::ChargingStateChanged(_) => BatteryEventKind::ChargingState,
            BatteryEvent::LowPowerModeChanged(_) => BatteryEventKind::LowPowerMode,
        }
    }
}

/// Battery provider with push updates for level, charging state and
/// low-power-mode transitions.
pub trait BatteryProvider: CapabilityProvider<Status = BatteryStatus> {
    /// Register `callback` for events of `kind`.  The returned handle removes
    /// only this registration.
    fn subscribe(
        &self,
        kind: BatteryEventKind,
        callback: Listener<BatteryEvent>,
    ) -> Subscription<BatteryEvent>;
}

pub type NetworkProvider = dyn CapabilityProvider<Status = NetworkStatus>;
pub type BluetoothProvider = dyn CapabilityProvider<Status = BluetoothStatus>;
pub type CameraProvider = dyn CapabilityProvider<Status = CameraStatus>;
pub type LocationProvider = dyn CapabilityProvider<Status = LocationStatus>;
pub type BiometricsProvider = dyn CapabilityProvider<Status = BiometricsStatus>;
pub type PrintProvider = dyn CapabilityProvider<Status = PrintStatus>;
pub type DeviceInfoProvider = dyn CapabilityProvider<Status = DeviceInfoStatus>;

#[cfg(test)]
mod tests {
    use super::*;
    use tillsight_types::{Capability, ConnectionType};

    struct MockNetwork {
        fail: bool,
    }

    #[async_trait]
    impl CapabilityProvider for MockNetwork {
        type Status = NetworkStatus;

        async fn probe(&self) -> Result<NetworkStatus, ProbeError> {
            if self.fail {
                return Err(ProbeError::TransientFailure {
                    capability: Capability::Network,
                    reason: "dns lookup failed".to_string(),
                });
            }
            Ok(NetworkStatus {
                is_available: true,
                is_connected: true,
                connection_type: ConnectionType::Ethernet,
                is_internet_reachable: Some(true),
                ip_address: None,
                last_error: None,
            })
        }
    }

    #[tokio::test]
    async fn mock_provider_usable_through_trait_object() {
        let provider: Box<NetworkProvider> = Box::new(MockNetwork { fail: false });
        let status = provider.probe().await.unwrap();
        assert_eq!(status.connection_type, ConnectionType::Ethernet);

        let failing: Box<NetworkProvider> = Box::new(MockNetwork { fail: true });
        let err = failing.probe().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn battery_event_reports_kind() {
        assert_eq!(BatteryEvent::LevelChanged(0.5).kind(), BatteryEventKind::Level);
        assert_eq!(
            BatteryEvent::LowPowerModeChanged(true).kind(),
            BatteryEventKind::LowPowerMode
        );
        assert_eq!(
            BatteryEvent::ChargingStateChanged(BatteryState::Charging).kind(),
            BatteryEventKind::ChargingState
        );
    }
}
