//! [`SystemMonitor`] – the status aggregation service.
//!
//! One monitor owns the providers, the current [`UnifiedStatus`] snapshot,
//! the status listeners and at most one periodic refresh timer.  Consumers
//! hold a cheap clone of the monitor and only ever receive copies of the
//! snapshot.
//!
//! # Lifecycle
//!
//! | Operation | Probes | Snapshot |
//! |---|---|---|
//! | [`initialize`][SystemMonitor::initialize] | all nine capabilities, concurrently | replaced |
//! | [`refresh_status`][SystemMonitor::refresh_status] | network, Bluetooth, camera, location | merged over the previous one |
//!
//! Neither operation fails.  A provider error becomes that capability's
//! fallback status (and, during initialize, an entry in
//! `initialization_errors`); a panic anywhere in the aggregation becomes a
//! full fallback snapshot on initialize, or leaves the previous snapshot in
//! place on refresh.
//!
//! # Monitoring session
//!
//! [`start_monitoring`][SystemMonitor::start_monitoring] registers an optional
//! listener and starts the shared refresh timer if it is not running yet.
//! Later calls only add listeners; the timer keeps the interval it was
//! started with.  Removing every listener does not stop the timer;
//! [`stop_monitoring`][SystemMonitor::stop_monitoring] does, and clears the
//! listeners.  A refresh already in flight when monitoring stops is allowed
//! to finish and its snapshot is still stored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::Utc;
use tillsight_hal::{
    AlertThresholds, BatteryAlertEngine, BatteryAttachment, CapabilityProvider,
    DeviceCapabilities, ProbeOutcome, ProviderSet, probe_raw, probe_screen, settle,
};
use tillsight_kernel::{HealthChecker, HealthThresholds};
use tillsight_middleware::{EventBus, Listener, ListenerRegistry, Subscription, Topic};
use tillsight_types::{
    Alert, Event, EventPayload, HealthReport, ProbeError, SubsystemStatus, UnifiedStatus,
};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::report;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// `tokio::time::interval` rejects a zero period.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

const EVENT_SOURCE: &str = "system_monitor";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    /// Timer period used when `start_monitoring` is not given one.
    pub refresh_interval: Duration,
    /// Upper bound for a single provider call.  `None` waits indefinitely,
    /// so a hung provider stalls `initialize`.
    pub probe_timeout: Option<Duration>,
    pub health: HealthThresholds,
    pub alerts: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            probe_timeout: None,
            health: HealthThresholds::default(),
            alerts: AlertThresholds::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SystemMonitor
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a status aggregation service.  Clones share all state.
#[derive(Clone)]
pub struct SystemMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    providers: ProviderSet,
    device: DeviceCapabilities,
    config: MonitorConfig,
    checker: HealthChecker,
    alerts: Arc<BatteryAlertEngine>,
    _battery_events: BatteryAttachment,
    current: RwLock<Option<Arc<UnifiedStatus>>>,
    listeners: ListenerRegistry<UnifiedStatus>,
    session: Mutex<Option<MonitoringSession>>,
    bridge: Mutex<Option<Bridge>>,
    #[cfg(test)]
    timers_started: std::sync::atomic::AtomicUsize,
}

struct MonitoringSession {
    interval: Duration,
    cancel: CancellationToken,
}

struct Bridge {
    bus: EventBus,
    publish_status: Listener<UnifiedStatus>,
}

impl SystemMonitor {
    /// Build a monitor over `providers`.  The battery alert engine is
    /// attached to the battery provider's live events immediately.
    pub fn new(providers: ProviderSet, config: MonitorConfig) -> Self {
        let alerts = Arc::new(BatteryAlertEngine::new(config.alerts));
        let battery_events = alerts.attach(providers.battery.as_ref());
        let device = providers
            .device_capabilities()
            .with_timeout(config.probe_timeout);

        Self {
            inner: Arc::new(Inner {
                providers,
                device,
                config,
                checker: HealthChecker::with_defaults(config.health),
                alerts,
                _battery_events: battery_events,
                current: RwLock::new(None),
                listeners: ListenerRegistry::new(),
                session: Mutex::new(None),
                bridge: Mutex::new(None),
                #[cfg(test)]
                timers_started: std::sync::atomic::AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.inner.providers
    }

    /// The Bluetooth/camera/location facade, sharing this monitor's probe
    /// timeout.
    pub fn device_capabilities(&self) -> &DeviceCapabilities {
        &self.inner.device
    }

    pub fn alert_engine(&self) -> &Arc<BatteryAlertEngine> {
        &self.inner.alerts
    }

    // ── Aggregation ─────────────────────────────────────────────────────────

    /// Probe every capability concurrently and replace the snapshot.
    ///
    /// Every provider runs to completion regardless of how the others fare.
    /// Each failing provider contributes its fallback status and one entry
    /// in `initialization_errors`.
    pub async fn initialize(&self) -> UnifiedStatus {
        let inner = Arc::clone(&self.inner);
        let status = match tokio::spawn(async move { inner.aggregate().await }).await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "status aggregation failed; storing fallback snapshot");
                UnifiedStatus::fallback(format!("status aggregation failed: {e}"))
            }
        };

        let stored = self.inner.store(status);
        info!(
            available = stored.available_count(),
            init_errors = stored.initialization_errors.len(),
            "status initialized"
        );
        self.inner.alerts.observe(&stored.battery);
        self.inner.publish(&stored);
        UnifiedStatus::clone(&stored)
    }

    /// Re-probe network and the proximity capabilities and merge the result
    /// over the previous snapshot.
    ///
    /// Other capabilities keep their previous values, as does a refreshed
    /// capability whose probe failed transiently.  Before the first
    /// initialize there is nothing to merge into: a fallback snapshot is
    /// returned and nothing is stored.
    pub async fn refresh_status(&self) -> UnifiedStatus {
        let Some(previous) = self.inner.snapshot() else {
            debug!("refresh skipped: status not initialized");
            return UnifiedStatus::fallback("status not initialized");
        };

        let inner = Arc::clone(&self.inner);
        let base = Arc::clone(&previous);
        let next = match tokio::spawn(async move { inner.partial_probe(&base).await }).await {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "status refresh failed; keeping previous snapshot");
                return UnifiedStatus::clone(&previous);
            }
        };

        for capability in next.changed_capabilities(&previous) {
            info!(
                capability = %capability,
                available = next.is_available(capability),
                "capability availability changed"
            );
        }

        let stored = self.inner.store(next);
        debug!(available = stored.available_count(), "status refreshed");
        self.inner.publish(&stored);
        UnifiedStatus::clone(&stored)
    }

    /// A copy of the current snapshot, `None` before the first initialize.
    pub fn get_current_status(&self) -> Option<UnifiedStatus> {
        self.inner.snapshot().map(|s| UnifiedStatus::clone(&s))
    }

    // ── Monitoring session ──────────────────────────────────────────────────

    /// Register `callback` (if any) and make sure the refresh timer runs.
    ///
    /// `interval` defaults to [`MonitorConfig::refresh_interval`] and only
    /// takes effect when this call starts the timer.  The returned
    /// subscription removes just this callback.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_monitoring(
        &self,
        callback: Option<Listener<UnifiedStatus>>,
        interval: Option<Duration>,
    ) -> Option<Subscription<UnifiedStatus>> {
        let subscription = callback.map(|cb| self.inner.listeners.add_listener(cb));
        let requested = interval.unwrap_or(self.inner.config.refresh_interval);

        let mut session = self.inner.session();
        match session.as_ref() {
            Some(running) => {
                if running.interval != requested.max(MIN_REFRESH_INTERVAL) {
                    debug!(
                        active_ms = running.interval.as_millis() as u64,
                        requested_ms = requested.as_millis() as u64,
                        "monitoring already running; keeping active interval"
                    );
                }
            }
            None => *session = Some(self.spawn_session(requested)),
        }
        subscription
    }

    /// Cancel the refresh timer and drop every registered listener.
    pub fn stop_monitoring(&self) {
        let session = self.inner.session().take();
        self.inner.listeners.clear();
        if let Some(session) = session {
            session.cancel.cancel();
            info!("monitoring stopped");
            self.inner.publish_lifecycle(EventPayload::MonitoringStopped);
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.session().is_some()
    }

    /// Period of the running timer.
    pub fn monitoring_interval(&self) -> Option<Duration> {
        self.inner.session().as_ref().map(|s| s.interval)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn spawn_session(&self, interval: Duration) -> MonitoringSession {
        let period = interval.max(MIN_REFRESH_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let monitor: Weak<Inner> = Arc::downgrade(&self.inner);

        #[cfg(test)]
        self.inner
            .timers_started
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let _task: JoinHandle<()> = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = monitor.upgrade() else { break };
                        debug!("monitoring tick");
                        SystemMonitor { inner }.refresh_status().await;
                    }
                }
            }
            debug!("monitoring loop exited");
        });

        let interval_ms = period.as_millis() as u64;
        info!(interval_ms, "monitoring started");
        self.inner
            .publish_lifecycle(EventPayload::MonitoringStarted { interval_ms });
        MonitoringSession {
            interval: period,
            cancel,
        }
    }

    // ── Health and reporting ────────────────────────────────────────────────

    /// Health verdict for the current snapshot.  Before the first initialize
    /// the terminal is reported unhealthy.
    pub fn perform_health_check(&self) -> HealthReport {
        self.inner
            .checker
            .evaluate_current(self.inner.snapshot().as_deref())
    }

    pub fn get_status_table(&self) -> Vec<String> {
        report::status_table(self.inner.snapshot().as_deref())
    }

    pub fn export_status(&self) -> String {
        let snapshot = self.inner.snapshot();
        let health = self.inner.checker.evaluate_current(snapshot.as_deref());
        report::export_status(snapshot.as_deref(), &health)
    }

    /// Log the status table, one `info` event per line.
    pub fn log_status(&self) {
        for line in self.get_status_table() {
            info!("{line}");
        }
    }

    // ── Bus bridge ──────────────────────────────────────────────────────────

    /// Republish every new snapshot on [`Topic::Status`], monitoring start
    /// and stop on [`Topic::Lifecycle`], and battery alerts on
    /// [`Topic::Alerts`].
    ///
    /// The bridge is independent of the monitoring listeners and survives
    /// `stop_monitoring`.  Bridging again replaces the previous bus for
    /// status and lifecycle events.
    pub fn bridge_to(&self, bus: &EventBus) -> Subscription<Alert> {
        let publish_status: Listener<UnifiedStatus> = Arc::new(bus.status_listener(EVENT_SOURCE));
        *self.inner.bridge() = Some(Bridge {
            bus: bus.clone(),
            publish_status,
        });
        self.inner.alerts.on_alert(bus.alert_listener(EVENT_SOURCE))
    }
}

impl std::fmt::Debug for SystemMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMonitor")
            .field("config", &self.inner.config)
            .field("initialized", &self.inner.snapshot().is_some())
            .field("monitoring", &self.is_monitoring())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internals
// ─────────────────────────────────────────────────────────────────────────────

impl Inner {
    async fn aggregate(&self) -> UnifiedStatus {
        let timeout = self.config.probe_timeout;
        let p = &self.providers;

        let network = spawn_probe(Arc::clone(&p.network), timeout);
        let bluetooth = spawn_probe(Arc::clone(&p.bluetooth), timeout);
        let camera = spawn_probe(Arc::clone(&p.camera), timeout);
        let location = spawn_probe(Arc::clone(&p.location), timeout);
        let biometrics = spawn_probe(Arc::clone(&p.biometrics), timeout);
        let battery = spawn_probe(Arc::clone(&p.battery), timeout);
        let print = spawn_probe(Arc::clone(&p.print), timeout);
        let device_info = spawn_probe(Arc::clone(&p.device_info), timeout);
        let screen = probe_screen(p.screen.as_ref());

        let (network, bluetooth, camera, location, biometrics, battery, print, device_info) = tokio::join!(
            network, bluetooth, camera, location, biometrics, battery, print, device_info
        );
        let network = settle(joined(network));
        let bluetooth = settle(joined(bluetooth));
        let camera = settle(joined(camera));
        let location = settle(joined(location));
        let biometrics = settle(joined(biometrics));
        let battery = settle(joined(battery));
        let print = settle(joined(print));
        let device_info = settle(joined(device_info));

        let initialization_errors = [
            network.error.as_ref(),
            bluetooth.error.as_ref(),
            camera.error.as_ref(),
            location.error.as_ref(),
            biometrics.error.as_ref(),
            battery.error.as_ref(),
            print.error.as_ref(),
            screen.error.as_ref(),
            device_info.error.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(ToString::to_string)
        .collect();

        UnifiedStatus {
            network: network.status,
            bluetooth: bluetooth.status,
            camera: camera.status,
            location: location.status,
            biometrics: biometrics.status,
            battery: battery.status,
            print: print.status,
            screen: screen.status,
            device_info: device_info.status,
            last_updated: Utc::now(),
            initialization_errors,
        }
    }

    async fn partial_probe(&self, previous: &UnifiedStatus) -> UnifiedStatus {
        let (network, device) = tokio::join!(
            probe_raw(self.providers.network.as_ref(), self.config.probe_timeout),
            self.device.probe_all(),
        );
        UnifiedStatus {
            network: carry_forward(&previous.network, settle(network)),
            bluetooth: carry_forward(&previous.bluetooth, device.bluetooth),
            camera: carry_forward(&previous.camera, device.camera),
            location: carry_forward(&previous.location, device.location),
            last_updated: Utc::now(),
            ..previous.clone()
        }
    }

    fn snapshot(&self) -> Option<Arc<UnifiedStatus>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store `status` as the current snapshot, never moving `last_updated`
    /// backwards.
    fn store(&self, mut status: UnifiedStatus) -> Arc<UnifiedStatus> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.as_ref() {
            status.last_updated = status.last_updated.max(previous.last_updated);
        }
        let status = Arc::new(status);
        *current = Some(Arc::clone(&status));
        status
    }

    /// Deliver a new snapshot to listeners and the bus bridge.
    fn publish(&self, status: &UnifiedStatus) {
        self.listeners.notify(status);
        let publish_status = self.bridge().as_ref().map(|b| Arc::clone(&b.publish_status));
        if let Some(publish_status) = publish_status {
            publish_status(status);
        }
    }

    fn publish_lifecycle(&self, payload: EventPayload) {
        let bus = self.bridge().as_ref().map(|b| b.bus.clone());
        if let Some(bus) = bus {
            bus.publish_quietly(Topic::Lifecycle, Event::new(EVENT_SOURCE, payload));
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<MonitoringSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bridge(&self) -> MutexGuard<'_, Option<Bridge>> {
        self.bridge.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.cancel.cancel();
        }
    }
}

/// Run one provider probe on its own task so a panic stays contained.
fn spawn_probe<P>(
    provider: Arc<P>,
    timeout: Option<Duration>,
) -> JoinHandle<Result<P::Status, ProbeError>>
where
    P: CapabilityProvider + ?Sized + 'static,
{
    tokio::spawn(async move { probe_raw(provider.as_ref(), timeout).await })
}

fn joined<S: SubsystemStatus>(
    result: Result<Result<S, ProbeError>, JoinError>,
) -> Result<S, ProbeError> {
    match result {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ProbeError::Panicked {
            capability: S::CAPABILITY,
        }),
        Err(_) => Err(ProbeError::TransientFailure {
            capability: S::CAPABILITY,
            reason: "probe task cancelled".to_string(),
        }),
    }
}

/// The refreshed status, or `previous` when the probe failed transiently.
fn carry_forward<S: SubsystemStatus>(previous: &S, outcome: ProbeOutcome<S>) -> S {
    match outcome.error {
        Some(e) if e.is_transient() => {
            debug!(capability = %S::CAPABILITY, error = %e, "keeping previous status after transient failure");
            previous.clone()
        }
        _ => outcome.status,
    }
}
