//! Status probe adapter.
//!
//! Normalizes a provider's raw `Result` into a fully-populated status.  A
//! failed probe becomes [`SubsystemStatus::fallback`] with the error message
//! in `last_error`, and the error itself is handed back alongside so callers
//! that track initialization errors can record it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tillsight_types::{Capability, ProbeError, ScreenStatus, SubsystemStatus};
use tracing::warn;

use crate::provider::{CapabilityProvider, ScreenProvider};

/// A normalized probe result: always a status, plus the error that produced
/// it when the probe failed.
#[derive(Debug, Clone)]
pub struct ProbeOutcome<S> {
    pub status: S,
    pub error: Option<ProbeError>,
}

impl<S: SubsystemStatus> ProbeOutcome<S> {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Run `provider.probe()`, bounded by `timeout` when one is given.
///
/// # Errors
///
/// Propagates the provider's [`ProbeError`], or [`ProbeError::Timeout`] if
/// the bound elapsed first.
pub async fn probe_raw<P>(provider: &P, timeout: Option<Duration>) -> Result<P::Status, ProbeError>
where
    P: CapabilityProvider + ?Sized,
{
    let Some(after) = timeout else {
        return provider.probe().await;
    };
    match tokio::time::timeout(after, provider.probe()).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout {
            capability: <P::Status as SubsystemStatus>::CAPABILITY,
            after,
        }),
    }
}

/// Convert a raw probe result into a [`ProbeOutcome`].
pub fn settle<S: SubsystemStatus>(result: Result<S, ProbeError>) -> ProbeOutcome<S> {
    match result {
        Ok(status) => ProbeOutcome {
            status,
            error: None,
        },
        Err(e) => {
            warn!(capability = %S::CAPABILITY, error = %e, "probe failed; using fallback status");
            ProbeOutcome {
                status: S::fallback(e.to_string()),
                error: Some(e),
            }
        }
    }
}

/// Probe and normalize in one step.  Never fails.
pub async fn probe_status<P>(provider: &P, timeout: Option<Duration>) -> P::Status
where
    P: CapabilityProvider + ?Sized,
{
    settle(probe_raw(provider, timeout).await).status
}

/// Synchronous counterpart for the screen.  A panicking provider is reported
/// as [`ProbeError::Panicked`].
pub fn probe_screen(provider: &dyn ScreenProvider) -> ProbeOutcome<ScreenStatus> {
    let result = catch_unwind(AssertUnwindSafe(|| provider.probe())).unwrap_or(Err(
        ProbeError::Panicked {
            capability: Capability::Screen,
        },
    ));
    settle(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tillsight_types::{Orientation, PrintStatus};

    struct FailingPrinter;

    #[async_trait]
    impl CapabilityProvider for FailingPrinter {
        type Status = PrintStatus;

        async fn probe(&self) -> Result<PrintStatus, ProbeError> {
            Err(ProbeError::Unavailable {
                capability: Capability::Print,
                reason: "no printer attached".to_string(),
            })
        }
    }

    struct HangingPrinter;

    #[async_trait]
    impl CapabilityProvider for HangingPrinter {
        type Status = PrintStatus;

        async fn probe(&self) -> Result<PrintStatus, ProbeError> {
            std::future::pending().await
        }
    }

    struct PanickingScreen;

    impl ScreenProvider for PanickingScreen {
        fn probe(&self) -> Result<ScreenStatus, ProbeError> {
            panic!("display server gone")
        }
    }

    struct FixedScreen;

    impl ScreenProvider for FixedScreen {
        fn probe(&self) -> Result<ScreenStatus, ProbeError> {
            Ok(ScreenStatus {
                is_available: true,
                width: 800,
                height: 1280,
                scale: 1.5,
                font_scale: 1.0,
                orientation: Orientation::Portrait,
                last_error: None,
            })
        }
    }

    #[tokio::test]
    async fn failure_becomes_fallback_with_error() {
        let outcome = settle(probe_raw(&FailingPrinter, None).await);
        assert!(outcome.is_failure());
        assert!(!outcome.status.is_available);
        assert_eq!(
            outcome.status.last_error.as_deref(),
            Some("print unavailable: no printer attached")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_bounds_a_hung_probe() {
        let status = probe_status(&HangingPrinter, Some(Duration::from_secs(2))).await;
        assert!(!status.is_available);
        assert!(status.last_error.unwrap().contains("timed out"));
    }

    #[test]
    fn panicking_screen_is_contained() {
        let outcome = probe_screen(&PanickingScreen);
        assert_eq!(
            outcome.error,
            Some(ProbeError::Panicked {
                capability: Capability::Screen
            })
        );
        assert!(!outcome.status.is_available);
    }

    #[test]
    fn healthy_screen_passes_through() {
        let outcome = probe_screen(&FixedScreen);
        assert!(!outcome.is_failure());
        assert_eq!(outcome.status.width, 800);
    }
}
