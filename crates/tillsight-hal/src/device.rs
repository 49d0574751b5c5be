//! [`DeviceCapabilities`] – narrow facade over the hardware-proximity
//! capabilities (Bluetooth, camera, location).
//!
//! Feature code that only needs to know "can I pair a card reader / scan a
//! barcode / tag this sale with a location" talks to this facade instead of
//! the full status monitor.  The monitor's partial refresh also goes through
//! it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tillsight_types::{BluetoothStatus, CameraStatus, LocationStatus, SubsystemStatus};

use crate::probe::{ProbeOutcome, probe_raw, settle};
use crate::provider::{BluetoothProvider, CameraProvider, LocationProvider};

/// Snapshot of the three proximity capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilityStatus {
    pub bluetooth: BluetoothStatus,
    pub camera: CameraStatus,
    pub location: LocationStatus,
    pub checked_at: DateTime<Utc>,
}

impl DeviceCapabilityStatus {
    pub fn bluetooth_ready(&self) -> bool {
        self.bluetooth.is_available && self.bluetooth.is_enabled && self.bluetooth.has_permission
    }

    pub fn camera_ready(&self) -> bool {
        self.camera.is_available && self.camera.has_permission
    }

    pub fn location_ready(&self) -> bool {
        self.location.is_available && self.location.has_permission && self.location.services_enabled
    }

    pub fn all_ready(&self) -> bool {
        self.bluetooth_ready() && self.camera_ready() && self.location_ready()
    }

    /// e.g. `"bluetooth=ready camera=ready location=not ready"`
    pub fn summary(&self) -> String {
        let flag = |ready: bool| if ready { "ready" } else { "not ready" };
        format!(
            "bluetooth={} camera={} location={}",
            flag(self.bluetooth_ready()),
            flag(self.camera_ready()),
            flag(self.location_ready())
        )
    }
}

/// Facade over the Bluetooth, camera and location providers.
#[derive(Clone)]
pub struct DeviceCapabilities {
    bluetooth: Arc<BluetoothProvider>,
    camera: Arc<CameraProvider>,
    location: Arc<LocationProvider>,
    timeout: Option<Duration>,
}

/// Per-capability outcomes of one facade probe.
#[derive(Debug, Clone)]
pub struct DeviceProbeOutcomes {
    pub bluetooth: ProbeOutcome<BluetoothStatus>,
    pub camera: ProbeOutcome<CameraStatus>,
    pub location: ProbeOutcome<LocationStatus>,
}

impl DeviceCapabilities {
    pub fn new(
        bluetooth: Arc<BluetoothProvider>,
        camera: Arc<CameraProvider>,
        location: Arc<LocationProvider>,
    ) -> Self {
        Self {
            bluetooth,
            camera,
            location,
            timeout: None,
        }
    }

    /// Bound each probe by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe all three capabilities concurrently and keep each outcome.
    pub async fn probe_all(&self) -> DeviceProbeOutcomes {
        let (bluetooth, camera, location) = tokio::join!(
            probe_raw(self.bluetooth.as_ref(), self.timeout),
            probe_raw(self.camera.as_ref(), self.timeout),
            probe_raw(self.location.as_ref(), self.timeout),
        );
        DeviceProbeOutcomes {
            bluetooth: settle(bluetooth),
            camera: settle(camera),
            location: settle(location),
        }
    }

    /// Probe all three capabilities concurrently.  Never fails.
    pub async fn status(&self) -> DeviceCapabilityStatus {
        let outcomes = self.probe_all().await;
        DeviceCapabilityStatus {
            bluetooth: outcomes.bluetooth.status,
            camera: outcomes.camera.status,
            location: outcomes.location.status,
            checked_at: Utc::now(),
        }
    }

    pub async fn bluetooth_status(&self) -> BluetoothStatus {
        settle(probe_raw(self.bluetooth.as_ref(), self.timeout).await).status
    }

    pub async fn camera_status(&self) -> CameraStatus {
        settle(probe_raw(self.camera.as_ref(), self.timeout).await).status
    }

    pub async fn location_status(&self) -> LocationStatus {
        settle(probe_raw(self.location.as_ref(), self.timeout).await).status
    }

    /// One line per capability, for logs.
    pub fn format_for_logging(status: &DeviceCapabilityStatus) -> Vec<String> {
        vec![
            status.bluetooth.format_for_logging(),
            status.camera.format_for_logging(),
            status.location.format_for_logging(),
        ]
    }
}
