//! `tillsight-runtime` – the status aggregation service.
//!
//! # Modules
//!
//! - [`monitor`] – [`SystemMonitor`]: settle-all initialize across every
//!   capability provider, partial refresh, the shared monitoring timer and
//!   its listeners, health checks, and the event-bus bridge.
//! - [`report`] – status table and JSON export projections, safe to call
//!   before the first initialize.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.
//!   Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod monitor;
pub mod report;
pub mod telemetry;

pub use monitor::{DEFAULT_REFRESH_INTERVAL, MonitorConfig, SystemMonitor};
pub use report::{export_status, status_table};
pub use telemetry::{TracerProviderGuard, init_tracing};
