//! Providers bound to the machine the process runs on.
//!
//! Network and device-info are probed for real.  Capabilities a generic host
//! has no API for (camera, Bluetooth radio, biometrics, …) are reported by
//! [`Unsupported`], which always fails with [`ProbeError::Unavailable`].

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tillsight_middleware::{Listener, ListenerRegistry, Subscription};
use tillsight_types::{
    BatteryStatus, Capability, ConnectionType, DeviceInfoStatus, NetworkStatus, ProbeError,
    ScreenStatus, SubsystemStatus,
};
use tokio::net::UdpSocket;

use crate::provider::{
    BatteryEvent, BatteryEventKind, BatteryProvider, CapabilityProvider, ScreenProvider,
};
use crate::providers::ProviderSet;

/// Routable address used to pick the outbound interface.  No packet is sent:
/// connecting a UDP socket only selects a route.
const ROUTE_PROBE_ADDR: &str = "192.0.2.1:9";

/// Detects the outbound interface address.
pub struct HostNetwork;

#[async_trait]
impl CapabilityProvider for HostNetwork {
    type Status = NetworkStatus;

    async fn probe(&self) -> Result<NetworkStatus, ProbeError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| ProbeError::Unavailable {
                capability: Capability::Network,
                reason: e.to_string(),
            })?;
        let connected = socket.connect(ROUTE_PROBE_ADDR).await.is_ok();
        let ip = if connected {
            socket.local_addr().ok().map(|addr: SocketAddr| addr.ip())
        } else {
            None
        };
        let is_connected = ip.is_some_and(|ip| !ip.is_unspecified() && !ip.is_loopback());

        Ok(NetworkStatus {
            is_available: true,
            is_connected,
            connection_type: if is_connected {
                ConnectionType::Unknown
            } else {
                ConnectionType::None
            },
            is_internet_reachable: None,
            ip_address: ip.filter(|_| is_connected).map(|ip| ip.to_string()),
            last_error: None,
        })
    }
}

/// Reports OS, architecture and (on Linux) kernel release and memory size.
pub struct HostDeviceInfo;

#[async_trait]
impl CapabilityProvider for HostDeviceInfo {
    type Status = DeviceInfoStatus;

    async fn probe(&self) -> Result<DeviceInfoStatus, ProbeError> {
        let os_version = tokio::fs::read_to_string("/proc/sys/kernel/osrelease")
            .await
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let total_memory_bytes = tokio::fs::read_to_string("/proc/meminfo")
            .await
            .ok()
            .and_then(|raw| parse_mem_total(&raw));

        Ok(DeviceInfoStatus {
            is_available: true,
            brand: "generic".to_string(),
            model: std::env::consts::ARCH.to_string(),
            os_name: std::env::consts::OS.to_string(),
            os_version,
            is_physical_device: true,
            total_memory_bytes,
            last_error: None,
        })
    }
}

/// `MemTotal:       16314504 kB` → bytes.
fn parse_mem_total(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// A capability this host has no API for.
pub struct Unsupported<S> {
    _status: PhantomData<fn() -> S>,
}

impl<S> Default for Unsupported<S> {
    fn default() -> Self {
        Self {
            _status: PhantomData,
        }
    }
}

fn unsupported(capability: Capability) -> ProbeError {
    ProbeError::Unavailable {
        capability,
        reason: "not supported on this host".to_string(),
    }
}

#[async_trait]
impl<S: SubsystemStatus> CapabilityProvider for Unsupported<S> {
    type Status = S;

    async fn probe(&self) -> Result<S, ProbeError> {
        Err(unsupported(S::CAPABILITY))
    }
}

impl BatteryProvider for Unsupported<BatteryStatus> {
    /// No events are ever pushed; the subscription is inert.
    fn subscribe(
        &self,
        _kind: BatteryEventKind,
        callback: Listener<BatteryEvent>,
    ) -> Subscription<BatteryEvent> {
        ListenerRegistry::new().add_listener(callback)
    }
}

impl ScreenProvider for Unsupported<ScreenStatus> {
    fn probe(&self) -> Result<ScreenStatus, ProbeError> {
        Err(unsupported(Capability::Screen))
    }
}

/// Providers for the local machine.
pub fn host_providers() -> ProviderSet {
    ProviderSet {
        network: Arc::new(HostNetwork),
        bluetooth: Arc::new(Unsupported::default()),
        camera: Arc::new(Unsupported::default()),
        location: Arc::new(Unsupported::default()),
        biometrics: Arc::new(Unsupported::default()),
        battery: Arc::new(Unsupported::<BatteryStatus>::default()),
        print: Arc::new(Unsupported::default()),
        screen: Arc::new(Unsupported::<ScreenStatus>::default()),
        device_info: Arc::new(HostDeviceInfo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillsight_types::CameraStatus;

    #[test]
    fn parses_mem_total() {
        let raw = "MemTotal:       16314504 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_mem_total(raw), Some(16_314_504 * 1024));
        assert_eq!(parse_mem_total("MemFree: 1 kB"), None);
    }

    #[tokio::test]
    async fn unsupported_reports_unavailable() {
        let camera = Unsupported::<CameraStatus>::default();
        let err = CapabilityProvider::probe(&camera).await.unwrap_err();
        assert_eq!(err, unsupported(Capability::Camera));
    }

    #[test]
    fn unsupported_screen_is_sync_failure() {
        let screen = Unsupported::<ScreenStatus>::default();
        assert!(ScreenProvider::probe(&screen).is_err());
    }

    #[tokio::test]
    async fn host_device_info_never_fails() {
        let info = HostDeviceInfo.probe().await.unwrap();
        assert_eq!(info.os_name, std::env::consts::OS);
    }
}
