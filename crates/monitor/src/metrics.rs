//! Prometheus metric names and recorders for the monitor loop.

use std::time::Duration;

use alerting::{AlertNotifier, ToneSpec};
use metrics::{counter, gauge, histogram};

pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "dms_frames_processed_total";
    pub const FRAMES_CLASSIFIED_TOTAL: &str = "dms_frames_classified_total";
    pub const CLASSIFICATION_DURATION_SECONDS: &str = "dms_classification_duration_seconds";
    pub const FACE_DETECTIONS_TOTAL: &str = "dms_face_detections_total";
    pub const FRAME_ERRORS_TOTAL: &str = "dms_frame_errors_total";
    pub const SOURCE_SWITCHES_TOTAL: &str = "dms_source_switches_total";
    pub const ALERTS_FIRED_TOTAL: &str = "dms_alerts_fired_total";
    pub const ALERTING: &str = "dms_alerting";
}

/// Record a frame read from the active source
pub fn record_frame(source_kind: &str, face_found: bool) {
    let labels = [("source", source_kind.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
    if face_found {
        counter!(names::FACE_DETECTIONS_TOTAL).increment(1);
    }
}

/// Record a classified frame and how long classification took, excluding face detection
pub fn record_classification(duration: Duration) {
    counter!(names::FRAMES_CLASSIFIED_TOTAL).increment(1);
    histogram!(names::CLASSIFICATION_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_frame_error(source_kind: &str) {
    let labels = [("source", source_kind.to_string())];
    counter!(names::FRAME_ERRORS_TOTAL, &labels).increment(1);
}

pub fn record_source_switch(source_kind: &str) {
    let labels = [("source", source_kind.to_string())];
    counter!(names::SOURCE_SWITCHES_TOTAL, &labels).increment(1);
}

pub fn set_alerting(alerting: bool) {
    gauge!(names::ALERTING).set(if alerting { 1.0 } else { 0.0 });
}

/// Counts alert cues before handing them to the wrapped notifier
pub struct MeteredNotifier<N> {
    inner: N,
}

impl<N: AlertNotifier> MeteredNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: AlertNotifier> AlertNotifier for MeteredNotifier<N> {
    fn notify(&self, tone: &ToneSpec) {
        counter!(names::ALERTS_FIRED_TOTAL).increment(1);
        self.inner.notify(tone);
    }
}
