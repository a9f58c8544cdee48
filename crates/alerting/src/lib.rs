//! Alerting System
//!
//! Sounds a repeating cue while the driver is in a dangerous state:
//! - fixed-interval cadence that stops as soon as the alert clears
//! - synthesized sweep tone (no audio assets)
//! - pluggable notifiers

mod cadence;
mod notifier;
mod tone;

pub use cadence::{run_alert_loop, AlertCadence};
pub use notifier::{AlertNotifier, BellNotifier, LogNotifier};
pub use tone::{ToneSpec, Waveform, DEFAULT_SAMPLE_RATE};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Alerting errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Invalid tone: {0}")]
    InvalidTone(String),
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Repeat period while alerting (default: 1000ms)
    pub interval_ms: u64,
    /// Tone played on each cue
    pub tone: ToneSpec,
    /// Also ring the terminal bell
    pub bell: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            tone: ToneSpec::default(),
            bell: false,
        }
    }
}

impl AlertConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), AlertError> {
        if self.interval_ms == 0 {
            return Err(AlertError::InvalidInterval("interval_ms must be > 0".into()));
        }
        self.tone.validate()
    }
}
