//! Per-capability status types.
//!
//! Each type carries an availability flag, its capability-specific fields and
//! an optional `last_error`.  [`SubsystemStatus::fallback`] builds the value
//! reported when a probe fails, so a status is always fully populated.

use serde::{Deserialize, Serialize};

use crate::Capability;

/// Common shape shared by every per-capability status.
pub trait SubsystemStatus: Clone + Send + Sync + 'static {
    /// The capability this status describes.
    const CAPABILITY: Capability;

    /// Whether the subsystem can currently be used.
    fn is_available(&self) -> bool;

    /// Message from the most recent failed probe, if any.
    fn last_error(&self) -> Option<&str>;

    /// Fully-populated status reported when the probe failed with `error`.
    ///
    /// Always unavailable, with capability-specific defaults for every
    /// other field.
    fn fallback(error: String) -> Self;

    /// Deterministic single-line summary for logs.
    fn format_for_logging(&self) -> String;
}

/// Appends `error` to `line`, flattening control characters so the result
/// stays on one line.
fn with_error(line: String, error: Option<&str>) -> String {
    match error {
        Some(e) => {
            let e: String = e
                .chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect();
            format!("{line} [error: {e}]")
        }
        None => line,
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// ────────────────────────────────────────────────────────────────────────────
// Network
// ────────────────────────────────────────────────────────────────────────────

/// Transport the terminal is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Bluetooth,
    None,
    #[default]
    Unknown,
}

impl ConnectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Wifi => "wifi",
            ConnectionType::Cellular => "cellular",
            ConnectionType::Ethernet => "ethernet",
            ConnectionType::Bluetooth => "bluetooth",
            ConnectionType::None => "none",
            ConnectionType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_available: bool,
    pub is_connected: bool,
    pub connection_type: ConnectionType,
    /// `None` while reachability has not been determined.
    pub is_internet_reachable: Option<bool>,
    pub ip_address: Option<String>,
    pub last_error: Option<String>,
}

impl SubsystemStatus for NetworkStatus {
    const CAPABILITY: Capability = Capability::Network;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            is_connected: false,
            connection_type: ConnectionType::Unknown,
            is_internet_reachable: None,
            ip_address: None,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        let reachable = match self.is_internet_reachable {
            Some(true) => "reachable",
            Some(false) => "unreachable",
            None => "reachability unknown",
        };
        let state = if self.is_connected { "connected" } else { "offline" };
        let ip = self.ip_address.as_deref().unwrap_or("-");
        with_error(
            format!(
                "Network: {state} via {} ({reachable}, ip {ip})",
                self.connection_type.as_str()
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bluetooth
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BluetoothStatus {
    pub is_available: bool,
    pub is_enabled: bool,
    pub has_permission: bool,
    pub paired_devices: u32,
    pub last_error: Option<String>,
}

impl SubsystemStatus for BluetoothStatus {
    const CAPABILITY: Capability = Capability::Bluetooth;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            is_enabled: false,
            has_permission: false,
            paired_devices: 0,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        with_error(
            format!(
                "Bluetooth: available={} enabled={} permission={} paired={}",
                yes_no(self.is_available),
                yes_no(self.is_enabled),
                yes_no(self.has_permission),
                self.paired_devices
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub is_available: bool,
    pub has_permission: bool,
    pub has_front_camera: bool,
    pub has_back_camera: bool,
    pub last_error: Option<String>,
}

impl SubsystemStatus for CameraStatus {
    const CAPABILITY: Capability = Capability::Camera;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            has_permission: false,
            has_front_camera: false,
            has_back_camera: false,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        with_error(
            format!(
                "Camera: available={} permission={} front={} back={}",
                yes_no(self.is_available),
                yes_no(self.has_permission),
                yes_no(self.has_front_camera),
                yes_no(self.has_back_camera)
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Location
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStatus {
    pub is_available: bool,
    pub has_permission: bool,
    pub services_enabled: bool,
    /// Horizontal accuracy of the last fix, in metres.
    pub accuracy_m: Option<f64>,
    pub last_error: Option<String>,
}

impl SubsystemStatus for LocationStatus {
    const CAPABILITY: Capability = Capability::Location;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            has_permission: false,
            services_enabled: false,
            accuracy_m: None,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        let accuracy = match self.accuracy_m {
            Some(m) => format!("{m:.1}m"),
            None => "-".to_string(),
        };
        with_error(
            format!(
                "Location: available={} permission={} services={} accuracy={accuracy}",
                yes_no(self.is_available),
                yes_no(self.has_permission),
                yes_no(self.services_enabled)
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Biometrics
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    Fingerprint,
    Face,
    Iris,
}

impl BiometricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BiometricKind::Fingerprint => "fingerprint",
            BiometricKind::Face => "face",
            BiometricKind::Iris => "iris",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricsStatus {
    /// Biometric hardware is present.
    pub is_available: bool,
    /// At least one biometric credential is enrolled.
    pub is_enrolled: bool,
    pub supported_kinds: Vec<BiometricKind>,
    pub last_error: Option<String>,
}

impl SubsystemStatus for BiometricsStatus {
    const CAPABILITY: Capability = Capability::Biometrics;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            is_enrolled: false,
            supported_kinds: Vec::new(),
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        let kinds = if self.supported_kinds.is_empty() {
            "none".to_string()
        } else {
            self.supported_kinds
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join("+")
        };
        with_error(
            format!(
                "Biometrics: available={} enrolled={} kinds={kinds}",
                yes_no(self.is_available),
                yes_no(self.is_enrolled)
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Battery
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    #[default]
    Unknown,
    Unplugged,
    Charging,
    Full,
}

impl BatteryState {
    pub fn as_str(self) -> &'static str {
        match self {
            BatteryState::Unknown => "unknown",
            BatteryState::Unplugged => "unplugged",
            BatteryState::Charging => "charging",
            BatteryState::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub is_available: bool,
    /// Charge level in `0.0..=1.0`; `None` when unknown.
    pub level: Option<f32>,
    pub state: BatteryState,
    pub low_power_mode: bool,
    pub last_error: Option<String>,
}

impl BatteryStatus {
    /// Charge level as a whole percentage, if known.
    pub fn percent(&self) -> Option<u8> {
        self.level
            .map(|l| (l.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

}

impl SubsystemStatus for BatteryStatus {
    const CAPABILITY: Capability = Capability::Battery;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            level: None,
            state: BatteryState::Unknown,
            low_power_mode: false,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        let level = match self.percent() {
            Some(p) => format!("{p}%"),
            None => "?%".to_string(),
        };
        with_error(
            format!(
                "Battery: {level} {} low_power={}",
                self.state.as_str(),
                yes_no(self.low_power_mode)
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Print
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintStatus {
    /// A receipt printer is attached and accepting jobs.
    pub is_available: bool,
    pub selected_printer: Option<String>,
    pub last_error: Option<String>,
}

impl SubsystemStatus for PrintStatus {
    const CAPABILITY: Capability = Capability::Print;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            selected_printer: None,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        with_error(
            format!(
                "Print: available={} printer={}",
                yes_no(self.is_available),
                self.selected_printer.as_deref().unwrap_or("-")
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Screen
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
    #[default]
    Unknown,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        match (width, height) {
            (0, _) | (_, 0) => Orientation::Unknown,
            (w, h) if w > h => Orientation::Landscape,
            _ => Orientation::Portrait,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
            Orientation::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenStatus {
    pub is_available: bool,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub font_scale: f32,
    pub orientation: Orientation,
    pub last_error: Option<String>,
}

impl SubsystemStatus for ScreenStatus {
    const CAPABILITY: Capability = Capability::Screen;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            width: 0,
            height: 0,
            scale: 1.0,
            font_scale: 1.0,
            orientation: Orientation::Unknown,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        with_error(
            format!(
                "Screen: {}x{} @{:.1}x font={:.1}x {}",
                self.width,
                self.height,
                self.scale,
                self.font_scale,
                self.orientation.as_str()
            ),
            self.last_error(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Device info
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfoStatus {
    pub is_available: bool,
    pub brand: String,
    pub model: String,
    pub os_name: String,
    pub os_version: String,
    pub is_physical_device: bool,
    pub total_memory_bytes: Option<u64>,
    pub last_error: Option<String>,
}

impl SubsystemStatus for DeviceInfoStatus {
    const CAPABILITY: Capability = Capability::DeviceInfo;

    fn is_available(&self) -> bool {
        self.is_available
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fallback(error: String) -> Self {
        Self {
            is_available: false,
            brand: "unknown".to_string(),
            model: "unknown".to_string(),
            os_name: "unknown".to_string(),
            os_version: "unknown".to_string(),
            is_physical_device: false,
            total_memory_bytes: None,
            last_error: Some(error),
        }
    }

    fn format_for_logging(&self) -> String {
        let memory = match self.total_memory_bytes {
            Some(bytes) => format!("{}MiB", bytes / (1024 * 1024)),
            None => "-".to_string(),
        };
        with_error(
            format!(
                "Device: {} {} ({} {}) physical={} memory={memory}",
                self.brand,
                self.model,
                self.os_name,
                self.os_version,
                yes_no(self.is_physical_device)
            ),
            self.last_error(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_unavailable_and_carries_error() {
        let net = NetworkStatus::fallback("radio off".to_string());
        assert!(!net.is_available());
        assert!(!net.is_connected);
        assert_eq!(net.last_error(), Some("radio off"));

        let battery = BatteryStatus::fallback("no battery".to_string());
        assert!(!battery.is_available());
        assert_eq!(battery.level, None);
        assert_eq!(battery.state, BatteryState::Unknown);

        let device = DeviceInfoStatus::fallback("denied".to_string());
        assert_eq!(device.model, "unknown");
    }

    #[test]
    fn logging_line_stays_single_line() {
        let print = PrintStatus::fallback("spooler crashed\nsee log\r\tcode 7".to_string());
        let line = print.format_for_logging();
        assert!(!line.contains(['\n', '\r', '\t']));
        assert_eq!(
            line,
            "Print: available=no printer=- [error: spooler crashed see log  code 7]"
        );
    }

    #[test]
    fn logging_line_appends_error() {
        let print = PrintStatus::fallback("paper jam".to_string());
        assert_eq!(
            print.format_for_logging(),
            "Print: available=no printer=- [error: paper jam]"
        );
    }

    #[test]
    fn network_logging_line_is_single_line() {
        let net = NetworkStatus {
            is_available: true,
            is_connected: true,
            connection_type: ConnectionType::Wifi,
            is_internet_reachable: Some(true),
            ip_address: Some("10.0.0.7".to_string()),
            last_error: None,
        };
        let line = net.format_for_logging();
        assert_eq!(line, "Network: connected via wifi (reachable, ip 10.0.0.7)");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn battery_percent_rounds_and_clamps() {
        let mut battery = BatteryStatus::fallback(String::new());
        battery.level = Some(0.146);
        assert_eq!(battery.percent(), Some(15));
        battery.level = Some(1.4);
        assert_eq!(battery.percent(), Some(100));
    }

    #[test]
    fn orientation_follows_dimensions() {
        assert_eq!(Orientation::from_dimensions(1280, 800), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(800, 1280), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(0, 1280), Orientation::Unknown);
    }
}
