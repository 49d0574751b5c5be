//! Tracing pipeline initialisation for tillsight.
//!
//! Call [`init_tracing`] once at process startup to wire up the `tracing`
//! subscriber with an optional OTLP span exporter.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set the OTLP HTTP exporter is activated. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `TILLSIGHT_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = tillsight_runtime::telemetry::init_tracing("tillsight");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FORMAT_VAR: &str = "TILLSIGHT_LOG_FORMAT";

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber with an optional OTLP exporter.
///
/// Without `OTEL_EXPORTER_OTLP_ENDPOINT` only the console formatter is
/// installed.  A second call leaves the first subscriber in place.
///
/// The returned [`TracerProviderGuard`] **must** be held for the lifetime of
/// the process; dropping it flushes all pending span batches.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = wants_json(std::env::var(LOG_FORMAT_VAR).ok().as_deref());

    let provider = build_provider(service_name);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("tillsight")));
    let json_layer = use_json.then(|| tracing_subscriber::fmt::layer().json());
    let compact_layer = (!use_json).then(|| tracing_subscriber::fmt::layer().compact());

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(json_layer)
        .with(compact_layer)
        .try_init()
    {
        eprintln!("[tillsight] tracing already initialised: {e}");
    }

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// RAII guard that shuts down the OTel [`SdkTracerProvider`] on drop,
/// flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Whether spans are being exported to a collector.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[tillsight] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Build an [`SdkTracerProvider`] when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// Returns `None` when the env-var is absent or the exporter cannot be
/// initialised (the error is printed to stderr).
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[tillsight] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // The CLI builds its Tokio runtime after `init_tracing`, so the
            // exporter must not spawn tasks.
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_provider_returns_none_without_endpoint() {
        // SAFETY: single-threaded test; no other thread reads this env-var.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("test-service").is_none());
    }

    #[test]
    fn log_format_is_case_insensitive() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some("JSON")));
        assert!(!wants_json(Some("compact")));
        assert!(!wants_json(None));
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        let guard = TracerProviderGuard(None);
        assert!(!guard.is_exporting());
        drop(guard);
    }
}
