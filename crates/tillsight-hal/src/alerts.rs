//! [`BatteryAlertEngine`] – edge-triggered battery alerting.
//!
//! The engine remembers the previously observed level and low-power-mode
//! flag.  An alert fires only on the transition *into* a condition:
//!
//! - `critical_battery` when the level moves from above
//!   [`AlertThresholds::critical_level`] to at-or-below it;
//! - `low_battery` when the level moves from above
//!   [`AlertThresholds::low_level`] to at-or-below it (suppressed when the
//!   same sample also crosses the critical threshold);
//! - `low_power_mode` when the flag goes from off to on.  Turning it off is
//!   silent.
//!
//! Before the first observation the previous level is unknown, which counts
//! as above every threshold.
//!
//! # Example
//!
//! ```
//! use tillsight_hal::alerts::BatteryAlertEngine;
//! use tillsight_types::AlertKind;
//!
//! let engine = BatteryAlertEngine::default();
//! let fired: Vec<_> = [0.50, 0.20, 0.10, 0.30, 0.04]
//!     .into_iter()
//!     .filter_map(|level| engine.observe_level(level))
//!     .map(|alert| alert.kind)
//!     .collect();
//!
//! assert_eq!(fired, vec![AlertKind::LowBattery, AlertKind::CriticalBattery]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tillsight_middleware::{ListenerRegistry, Subscription};
use tillsight_types::{Alert, AlertKind, BatteryStatus, SubsystemStatus};
use tracing::{debug, info, warn};

use crate::provider::{BatteryEvent, BatteryEventKind, BatteryProvider};

/// Battery levels (in `0.0..=1.0`) that trigger alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub low_level: f32,
    pub critical_level: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_level: 0.15,
            critical_level: 0.05,
        }
    }
}

#[derive(Debug, Default)]
struct Observed {
    level: Option<f32>,
    low_power_mode: bool,
}

/// Detects threshold crossings and delivers [`Alert`]s to registered
/// callbacks.  Level changes are forwarded to a separate set of level
/// listeners.
pub struct BatteryAlertEngine {
    thresholds: AlertThresholds,
    observed: Mutex<Observed>,
    alert_listeners: ListenerRegistry<Alert>,
    level_listeners: ListenerRegistry<f32>,
}

impl Default for BatteryAlertEngine {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl BatteryAlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            observed: Mutex::new(Observed::default()),
            alert_listeners: ListenerRegistry::new(),
            level_listeners: ListenerRegistry::new(),
        }
    }

    /// Register an alert callback.
    pub fn on_alert(&self, callback: impl Fn(&Alert) + Send + Sync + 'static) -> Subscription<Alert> {
        self.alert_listeners.add(callback)
    }

    /// Register a callback invoked with every new battery level.
    pub fn on_level_change(
        &self,
        callback: impl Fn(&f32) + Send + Sync + 'static,
    ) -> Subscription<f32> {
        self.level_listeners.add(callback)
    }

    /// Pure edge detector: which alert, if any, the move from `previous` to
    /// `next` raises.
    pub fn crossing(thresholds: AlertThresholds, previous: Option<f32>, next: f32) -> Option<AlertKind> {
        let crossed = |threshold: f32| previous.is_none_or(|p| p > threshold) && next <= threshold;
        if crossed(thresholds.critical_level) {
            Some(AlertKind::CriticalBattery)
        } else if crossed(thresholds.low_level) {
            Some(AlertKind::LowBattery)
        } else {
            None
        }
    }

    /// Record a level sample and deliver the resulting alert, if any.
    pub fn observe_level(&self, level: f32) -> Option<Alert> {
        let previous = {
            let mut observed = self.lock();
            observed.level.replace(level)
        };

        if previous != Some(level) {
            self.level_listeners.notify(&level);
        }

        let kind = Self::crossing(self.thresholds, previous, level)?;
        let percent = (level.clamp(0.0, 1.0) * 100.0).round() as u8;
        let message = match kind {
            AlertKind::CriticalBattery => {
                format!("Battery critical: {percent}% remaining, connect a charger now")
            }
            _ => format!("Battery low: {percent}% remaining"),
        };
        Some(self.emit(Alert::new(kind, Some(level), message)))
    }

    /// Record the low-power-mode flag.  Only the off→on edge alerts.
    pub fn observe_low_power_mode(&self, enabled: bool) -> Option<Alert> {
        let (was_enabled, level) = {
            let mut observed = self.lock();
            let was = observed.low_power_mode;
            observed.low_power_mode = enabled;
            (was, observed.level)
        };
        if was_enabled || !enabled {
            return None;
        }
        Some(self.emit(Alert::new(
            AlertKind::LowPowerMode,
            level,
            "Low power mode enabled; background refresh may be throttled",
        )))
    }

    /// Feed a polled battery status.  Unknown levels are ignored, and a
    /// fallback from a failed probe leaves the remembered state untouched.
    pub fn observe(&self, status: &BatteryStatus) -> Vec<Alert> {
        if !status.is_available() || status.last_error().is_some() {
            debug!(error = ?status.last_error(), "battery status unavailable; alert state unchanged");
            return Vec::new();
        }
        let mut alerts = Vec::new();
        if let Some(level) = status.level {
            alerts.extend(self.observe_level(level));
        }
        alerts.extend(self.observe_low_power_mode(status.low_power_mode));
        alerts
    }

    /// Subscribe the engine to `provider`'s live level and low-power-mode
    /// events.  The engine is held weakly by the subscriptions.
    pub fn attach(self: &Arc<Self>, provider: &dyn BatteryProvider) -> BatteryAttachment {
        let subscriptions = [BatteryEventKind::Level, BatteryEventKind::LowPowerMode]
            .into_iter()
            .map(|kind| {
                let engine: Weak<Self> = Arc::downgrade(self);
                provider.subscribe(
                    kind,
                    Arc::new(move |event: &BatteryEvent| {
                        let Some(engine) = engine.upgrade() else {
                            return;
                        };
                        match *event {
                            BatteryEvent::LevelChanged(level) => {
                                engine.observe_level(level);
                            }
                            BatteryEvent::LowPowerModeChanged(enabled) => {
                                engine.observe_low_power_mode(enabled);
                            }
                            BatteryEvent::ChargingStateChanged(_) => {}
                        }
                    }),
                )
            })
            .collect();
        debug!("battery alert engine attached to provider events");
        BatteryAttachment { subscriptions }
    }

    fn emit(&self, alert: Alert) -> Alert {
        match alert.kind {
            AlertKind::CriticalBattery => warn!(kind = alert.kind.as_str(), message = %alert.message, "battery alert"),
            _ => info!(kind = alert.kind.as_str(), message = %alert.message, "battery alert"),
        }
        self.alert_listeners.notify(&alert);
        alert
    }

    fn lock(&self) -> MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Live event subscriptions created by [`BatteryAlertEngine::attach`].
#[derive(Debug)]
pub struct BatteryAttachment {
    subscriptions: Vec<Subscription<BatteryEvent>>,
}

impl BatteryAttachment {
    pub fn detach(self) {
        for sub in self.subscriptions {
            sub.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tillsight_types::BatteryState;

    fn kinds(engine: &BatteryAlertEngine, levels: &[f32]) -> Vec<Option<AlertKind>> {
        levels
            .iter()
            .map(|l| engine.observe_level(*l).map(|a| a.kind))
            .collect()
    }

    #[test]
    fn alerts_fire_only_on_downward_crossings() {
        let engine = BatteryAlertEngine::default();
        assert_eq!(
            kinds(&engine, &[0.50, 0.20, 0.10, 0.30, 0.04]),
            vec![
                None,
                None,
                Some(AlertKind::LowBattery),
                None,
                Some(AlertKind::CriticalBattery)
            ]
        );
    }

    #[test]
    fn hovering_below_threshold_does_not_repeat() {
        let engine = BatteryAlertEngine::default();
        assert_eq!(
            kinds(&engine, &[0.20, 0.14, 0.13, 0.15, 0.12]),
            vec![None, Some(AlertKind::LowBattery), None, None, None]
        );
    }

    #[test]
    fn exact_threshold_counts_as_crossed() {
        let engine = BatteryAlertEngine::default();
        assert_eq!(
            kinds(&engine, &[0.16, 0.15]),
            vec![None, Some(AlertKind::LowBattery)]
        );
    }

    #[test]
    fn first_sample_below_threshold_alerts() {
        let engine = BatteryAlertEngine::default();
        assert_eq!(
            kinds(&engine, &[0.04]),
            vec![Some(AlertKind::CriticalBattery)]
        );
    }

    #[test]
    fn recovering_above_threshold_rearms_alert() {
        let engine = BatteryAlertEngine::default();
        assert_eq!(
            kinds(&engine, &[0.10, 0.50, 0.10]),
            vec![Some(AlertKind::LowBattery), None, Some(AlertKind::LowBattery)]
        );
    }

    #[test]
    fn low_power_mode_alert_is_asymmetric() {
        let engine = BatteryAlertEngine::default();
        assert!(engine.observe_low_power_mode(false).is_none());
        let alert = engine.observe_low_power_mode(true).unwrap();
        assert_eq!(alert.kind, AlertKind::LowPowerMode);
        assert!(engine.observe_low_power_mode(true).is_none());
        assert!(engine.observe_low_power_mode(false).is_none());
        assert!(engine.observe_low_power_mode(true).is_some());
    }

    #[test]
    fn panicking_callback_does_not_block_delivery() {
        let engine = BatteryAlertEngine::default();
        let delivered = Arc::new(AtomicUsize::new(0));
        engine.on_alert(|_| panic!("ui thread gone"));
        let d = Arc::clone(&delivered);
        engine.on_alert(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        engine.observe_level(0.03);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn level_listeners_see_changes_only() {
        let engine = BatteryAlertEngine::default();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        engine.on_level_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        engine.observe_level(0.8);
        engine.observe_level(0.8);
        engine.observe_level(0.7);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observe_status_combines_level_and_low_power() {
        let engine = BatteryAlertEngine::default();
        let status = BatteryStatus {
            is_available: true,
            level: Some(0.12),
            state: BatteryState::Unplugged,
            low_power_mode: true,
            last_error: None,
        };
        let alerts: Vec<_> = engine.observe(&status).into_iter().map(|a| a.kind).collect();
        assert_eq!(alerts, vec![AlertKind::LowBattery, AlertKind::LowPowerMode]);
        assert!(engine.observe(&status).is_empty());
    }

    #[test]
    fn failed_battery_reading_keeps_low_power_state() {
        let engine = BatteryAlertEngine::default();
        let on = BatteryStatus {
            is_available: true,
            level: Some(0.80),
            state: BatteryState::Unplugged,
            low_power_mode: true,
            last_error: None,
        };
        assert_eq!(engine.observe(&on).len(), 1);

        let failed = BatteryStatus::fallback("battery service restarting".to_string());
        assert!(engine.observe(&failed).is_empty());
        assert!(engine.observe(&on).is_empty());
    }

    #[test]
    fn attached_engine_alerts_on_pushed_events() {
        let (providers, handle) = crate::sim::SimProviders::builder().build();
        let engine = Arc::new(BatteryAlertEngine::default());
        let attachment = engine.attach(providers.battery.as_ref());

        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = Arc::clone(&fired);
        engine.on_alert(move |alert| f.lock().unwrap().push(alert.kind));

        handle.set_battery_level(0.10);
        handle.set_low_power_mode(true);
        attachment.detach();
        handle.set_battery_level(0.03);

        assert_eq!(
            *fired.lock().unwrap(),
            vec![AlertKind::LowBattery, AlertKind::LowPowerMode]
        );
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let engine = BatteryAlertEngine::new(AlertThresholds {
            low_level: 0.30,
            critical_level: 0.10,
        });
        assert_eq!(
            kinds(&engine, &[0.40, 0.25, 0.08]),
            vec![None, Some(AlertKind::LowBattery), Some(AlertKind::CriticalBattery)]
        );
    }
}
