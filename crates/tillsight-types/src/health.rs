use serde::{Deserialize, Serialize};

/// Health verdict derived from a [`UnifiedStatus`][crate::UnifiedStatus].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// Soft degradations that leave the terminal usable.
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}
