//! Configuration Vault – reads/writes `~/.tillsight/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tillsight_hal::AlertThresholds;
use tillsight_kernel::HealthThresholds;
use tillsight_runtime::MonitorConfig;

/// Where capability providers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Scriptable simulated terminal; the console's fault-injection commands
    /// only work here.
    #[default]
    Sim,
    /// The local machine.
    Host,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sim => write!(f, "sim"),
            Backend::Host => write!(f, "host"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sim" => Ok(Backend::Sim),
            "host" => Ok(Backend::Host),
            other => Err(format!("unknown backend '{other}' (expected sim or host)")),
        }
    }
}

/// Persisted console configuration stored in `~/.tillsight/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier shown in the banner and attached to log output.
    #[serde(default = "default_terminal_id")]
    pub terminal_id: String,

    #[serde(default)]
    pub backend: Backend,

    /// Background refresh period in milliseconds.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Per-probe timeout in milliseconds.  Unset means probes may take as
    /// long as they need.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,

    #[serde(default = "default_low_battery_alert")]
    pub low_battery_alert: f32,

    #[serde(default = "default_critical_battery_alert")]
    pub critical_battery_alert: f32,

    #[serde(default)]
    pub health: HealthThresholds,
}

fn default_terminal_id() -> String {
    "till-01".to_string()
}
fn default_refresh_interval_ms() -> u64 {
    30_000
}
fn default_low_battery_alert() -> f32 {
    0.15
}
fn default_critical_battery_alert() -> f32 {
    0.05
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terminal_id: default_terminal_id(),
            backend: Backend::default(),
            refresh_interval_ms: default_refresh_interval_ms(),
            probe_timeout_ms: None,
            low_battery_alert: default_low_battery_alert(),
            critical_battery_alert: default_critical_battery_alert(),
            health: HealthThresholds::default(),
        }
    }
}

impl Config {
    /// The monitor settings this config describes.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            probe_timeout: self.probe_timeout_ms.map(Duration::from_millis),
            health: self.health,
            alerts: AlertThresholds {
                low_level: self.low_battery_alert,
                critical_level: self.critical_battery_alert,
            },
        }
    }
}

/// Return the path to `~/.tillsight/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tillsight").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TILLSIGHT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TILLSIGHT_TERMINAL_ID` | `terminal_id` |
/// | `TILLSIGHT_BACKEND` | `backend` |
/// | `TILLSIGHT_REFRESH_MS` | `refresh_interval_ms` |
/// | `TILLSIGHT_PROBE_TIMEOUT_MS` | `probe_timeout_ms` (`0` clears it) |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TILLSIGHT_TERMINAL_ID") {
        cfg.terminal_id = v;
    }
    if let Ok(v) = std::env::var("TILLSIGHT_BACKEND")
        && let Ok(backend) = v.parse::<Backend>()
    {
        cfg.backend = backend;
    }
    if let Ok(v) = std::env::var("TILLSIGHT_REFRESH_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.refresh_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("TILLSIGHT_PROBE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.probe_timeout_ms = (ms > 0).then_some(ms);
    }
}

/// Save the config to disk, creating `~/.tillsight/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn roundtrip_keeps_probe_timeout_and_health() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.backend = Backend::Host;
        cfg.probe_timeout_ms = Some(2_500);
        cfg.health.unhealthy_warning_count = 5;
        save_to(&cfg, &path).expect("save");

        assert_eq!(load_from(&path).unwrap().unwrap(), cfg);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "terminal_id = \"lane-4\"\n[health]\nlow_battery_level = 0.2\n")
            .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.terminal_id, "lane-4");
        assert_eq!(cfg.refresh_interval_ms, 30_000);
        assert_eq!(cfg.health.low_battery_level, 0.2);
        assert_eq!(cfg.health.unhealthy_warning_count, 3);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh_interval_ms = \"soon\"").unwrap();
        assert!(load_from(&path).unwrap_err().starts_with("Failed to parse config"));
    }

    #[test]
    fn config_path_points_to_tillsight_dir() {
        let p = config_path_for_home("/home/cashier");
        assert_eq!(p, PathBuf::from("/home/cashier/.tillsight/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn monitor_config_converts_units() {
        let mut cfg = Config::default();
        cfg.refresh_interval_ms = 1_500;
        cfg.probe_timeout_ms = Some(750);
        cfg.critical_battery_alert = 0.08;
        let monitor = cfg.monitor_config();
        assert_eq!(monitor.refresh_interval, Duration::from_millis(1_500));
        assert_eq!(monitor.probe_timeout, Some(Duration::from_millis(750)));
        assert_eq!(monitor.alerts.critical_level, 0.08);
        assert_eq!(monitor.alerts.low_level, 0.15);
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let _env = ENV_LOCK.lock().unwrap();
        // SAFETY: ENV_LOCK serializes every test that touches these variables.
        unsafe {
            std::env::set_var("TILLSIGHT_TERMINAL_ID", "lane-7");
            std::env::set_var("TILLSIGHT_REFRESH_MS", "5000");
            std::env::set_var("TILLSIGHT_PROBE_TIMEOUT_MS", "not-a-number");
            std::env::set_var("TILLSIGHT_BACKEND", "host");
        }
        let mut cfg = Config::default();
        cfg.probe_timeout_ms = Some(100);
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.terminal_id, "lane-7");
        assert_eq!(cfg.refresh_interval_ms, 5_000);
        assert_eq!(cfg.probe_timeout_ms, Some(100));
        assert_eq!(cfg.backend, Backend::Host);

        unsafe { std::env::set_var("TILLSIGHT_PROBE_TIMEOUT_MS", "0") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.probe_timeout_ms, None);

        unsafe {
            std::env::remove_var("TILLSIGHT_TERMINAL_ID");
            std::env::remove_var("TILLSIGHT_REFRESH_MS");
            std::env::remove_var("TILLSIGHT_PROBE_TIMEOUT_MS");
            std::env::remove_var("TILLSIGHT_BACKEND");
        }
    }

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("SIM".parse::<Backend>(), Ok(Backend::Sim));
        assert_eq!("host".parse::<Backend>(), Ok(Backend::Host));
        assert!("cloud".parse::<Backend>().is_err());
        assert_eq!(Backend::Host.to_string(), "host");
    }
}
