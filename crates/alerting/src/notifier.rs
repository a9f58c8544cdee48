//! Alert sinks

use std::io::Write;
use tracing::warn;

use crate::ToneSpec;

/// Receives one call per alert cue
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, tone: &ToneSpec);
}

/// Logs each cue at WARN
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl AlertNotifier for LogNotifier {
    fn notify(&self, tone: &ToneSpec) {
        warn!(
            start_hz = tone.start_hz,
            end_hz = tone.end_hz,
            duration_ms = tone.duration_ms,
            "ALERT: dangerous driving behavior"
        );
    }
}

/// Rings the terminal bell on stderr, then forwards to the inner notifier
#[derive(Debug, Default, Clone, Copy)]
pub struct BellNotifier<N> {
    inner: N,
}

impl<N: AlertNotifier> BellNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: AlertNotifier> AlertNotifier for BellNotifier<N> {
    fn notify(&self, tone: &ToneSpec) {
        let mut stderr = std::io::stderr().lock();
        // A closed stderr only loses the bell
        let _ = stderr.write_all(b"\x07").and_then(|_| stderr.flush());
        self.inner.notify(tone);
    }
}
