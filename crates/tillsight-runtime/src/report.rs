//! Side-effect-free projections of a status snapshot for log sinks.
//!
//! Both projections accept `None` (the monitor has not been initialized yet)
//! and render a well-defined placeholder instead of failing.

use serde::Serialize;
use tillsight_types::{Capability, HealthReport, UnifiedStatus};

/// Placeholder shown for every capability before the first initialize.
pub const NOT_INITIALIZED: &str = "not initialized";

/// One header line plus one line per capability, in [`Capability::ALL`]
/// order.
///
/// ```text
/// Status as of 2026-03-02T10:15:00+00:00 (9/9 available, 0 init errors)
/// Network      yes  Network: connected via wifi (reachable, ip 192.168.1.20)
/// Bluetooth    yes  Bluetooth: ...
/// ```
pub fn status_table(status: Option<&UnifiedStatus>) -> Vec<String> {
    let Some(status) = status else {
        let mut lines = vec![format!("Status {NOT_INITIALIZED}")];
        lines.extend(
            Capability::ALL
                .into_iter()
                .map(|cap| format!("{:<12} {:<4} {NOT_INITIALIZED}", cap.label(), "-")),
        );
        return lines;
    };

    let mut lines = vec![format!(
        "Status as of {} ({}/{} available, {} init errors)",
        status.last_updated.to_rfc3339(),
        status.available_count(),
        Capability::ALL.len(),
        status.initialization_errors.len()
    )];
    lines.extend(Capability::ALL.into_iter().map(|cap| {
        let flag = if status.is_available(cap) { "yes" } else { "no" };
        format!("{:<12} {:<4} {}", cap.label(), flag, status.summary_line(cap))
    }));
    lines
}

#[derive(Serialize)]
struct Export<'a> {
    initialized: bool,
    status: Option<&'a UnifiedStatus>,
    health: &'a HealthReport,
}

/// Pretty-printed JSON document holding the snapshot and its health verdict.
pub fn export_status(status: Option<&UnifiedStatus>, health: &HealthReport) -> String {
    let export = Export {
        initialized: status.is_some(),
        status,
        health,
    };
    serde_json::to_string_pretty(&export).unwrap_or_else(|e| {
        serde_json::json!({ "initialized": status.is_some(), "export_error": e.to_string() })
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_before_initialize_has_placeholder_per_capability() {
        let lines = status_table(None);
        assert_eq!(lines.len(), Capability::ALL.len() + 1);
        assert_eq!(lines[0], "Status not initialized");
        for (line, cap) in lines[1..].iter().zip(Capability::ALL) {
            assert!(line.starts_with(cap.label()), "{line}");
            assert!(line.ends_with(NOT_INITIALIZED), "{line}");
        }
    }

    #[test]
    fn table_is_idempotent() {
        let status = UnifiedStatus::fallback("boot failed");
        assert_eq!(status_table(Some(&status)), status_table(Some(&status)));
    }

    #[test]
    fn table_marks_unavailable_capabilities() {
        let mut status = UnifiedStatus::fallback("boot failed");
        status.print.is_available = true;
        status.print.last_error = None;
        let lines = status_table(Some(&status));
        assert!(lines[0].contains("(1/9 available, 1 init errors)"));
        let print = lines.iter().find(|l| l.starts_with("Print")).unwrap();
        assert!(print.contains(" yes "));
        let network = lines.iter().find(|l| l.starts_with("Network")).unwrap();
        assert!(network.contains(" no "));
    }

    #[test]
    fn export_before_initialize_is_valid_json() {
        let report = HealthReport::default();
        let json: serde_json::Value = serde_json::from_str(&export_status(None, &report)).unwrap();
        assert_eq!(json["initialized"], false);
        assert!(json["status"].is_null());
    }

    #[test]
    fn export_embeds_status_and_health() {
        let status = UnifiedStatus::fallback("boot failed");
        let report = HealthReport {
            healthy: false,
            warnings: vec![],
            errors: vec!["Initialization error: boot failed".to_string()],
        };
        let json: serde_json::Value =
            serde_json::from_str(&export_status(Some(&status), &report)).unwrap();
        assert_eq!(json["initialized"], true);
        assert_eq!(json["status"]["initialization_errors"][0], "boot failed");
        assert_eq!(json["health"]["healthy"], false);
    }
}
