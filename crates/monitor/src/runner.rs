//! Monitor loop

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use camera_capture::{open_source, FrameSource, MediaSource, VideoFrame};
use chrono::Utc;
use dms::{create_face_detector, DecisionPipeline, FaceDetector, FaceDetectorConfig, PipelineConfig};
use inference_engine::{BehaviorClassifier, InferenceError};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::{metrics, MonitorError, MonitorSnapshot};

/// Pending classifier load, resolved while the loop is already running
pub type ClassifierLoad =
    Pin<Box<dyn Future<Output = Result<Box<dyn BehaviorClassifier>, InferenceError>> + Send>>;

const COMMAND_QUEUE: usize = 16;

/// Control messages for the monitor loop
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    /// Release the active source and open another
    SwitchSource(MediaSource),
    Shutdown,
}

/// Totals reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub frames_processed: u64,
    pub frames_classified: u64,
    pub source_switches: u64,
}

/// Cloneable handle for talking to a running monitor.
///
/// The loop exits once every client has been dropped.
#[derive(Debug, Clone)]
pub struct MonitorClient {
    commands: mpsc::Sender<MonitorCommand>,
    snapshots: watch::Receiver<MonitorSnapshot>,
    alerting: watch::Receiver<bool>,
}

impl MonitorClient {
    pub async fn switch_source(&self, source: MediaSource) -> Result<(), MonitorError> {
        self.commands
            .send(MonitorCommand::SwitchSource(source))
            .await
            .map_err(|_| MonitorError::Stopped)
    }

    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.commands
            .send(MonitorCommand::Shutdown)
            .await
            .map_err(|_| MonitorError::Stopped)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshots.clone()
    }

    /// Alerting flag, changes only on edges
    pub fn alerting(&self) -> watch::Receiver<bool> {
        self.alerting.clone()
    }
}

/// What one read from the source produced
enum Step {
    Frame {
        face_found: bool,
        classified: bool,
        elapsed: Duration,
    },
    EndOfStream,
    SourceFailed,
}

/// Everything touched per frame; moved onto the blocking pool for each step
struct FrameWorker {
    pipeline: DecisionPipeline,
    detector: Box<dyn FaceDetector>,
    source: Option<Box<dyn FrameSource>>,
    source_kind: &'static str,
    source_error: Option<String>,
    last_frame: Option<Arc<VideoFrame>>,
    frames_processed: u64,
}

impl FrameWorker {
    fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn frame_interval(&self) -> Duration {
        self.source
            .as_ref()
            .map_or(Duration::ZERO, |s| s.frame_interval())
    }

    fn switch_source(&mut self, source: &MediaSource) {
        self.release_source();
        self.last_frame = None;
        self.source_kind = source.kind();

        match open_source(source) {
            Ok(opened) => {
                info!("Switched to {}", opened.describe());
                self.source = Some(opened);
                self.source_error = None;
                self.pipeline.attach_source();
            }
            Err(e) => {
                error!("Failed to open {} source: {}", source.kind(), e);
                self.source_error = Some(e.to_string());
            }
        }
    }

    fn release_source(&mut self) {
        if let Some(source) = self.source.take() {
            debug!("Released {}", source.describe());
            self.pipeline.detach_source();
        }
    }

    fn step(&mut self) -> Option<Step> {
        let source = self.source.as_mut()?;
        match source.next_frame() {
            Ok(Some(frame)) => {
                let face = self.detector.detect(&frame).unwrap_or_else(|e| {
                    warn!("Face detection failed on frame {}: {}", frame.sequence, e);
                    None
                });

                let started = std::time::Instant::now();
                let classified_before = self.pipeline.frames_classified();
                self.pipeline.on_frame(&frame, face);
                self.frames_processed += 1;
                self.last_frame = Some(Arc::new(frame));

                Some(Step::Frame {
                    face_found: face.is_some(),
                    classified: self.pipeline.frames_classified() > classified_before,
                    elapsed: started.elapsed(),
                })
            }
            Ok(None) => {
                info!("{} reached end of stream", source.describe());
                self.release_source();
                Some(Step::EndOfStream)
            }
            Err(e) => {
                error!("Frame read failed on {}: {}", source.describe(), e);
                self.source_error = Some(e.to_string());
                self.release_source();
                Some(Step::SourceFailed)
            }
        }
    }

    /// Like [`step`](Self::step), but a panic while reading or processing a
    /// frame drops the source instead of the worker
    fn step_contained(&mut self) -> Option<Step> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
            Ok(step) => step,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Frame processing on {} source panicked: {}", self.source_kind, message);
                self.source_error = Some(format!("frame processing panicked: {}", message));
                self.release_source();
                Some(Step::SourceFailed)
            }
        }
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            phase: self.pipeline.phase(),
            status: self.pipeline.status().text().to_string(),
            confidence: self.pipeline.confidence(),
            alerting: self.pipeline.alerting(),
            decision: self.pipeline.decision(),
            face: self.pipeline.face(),
            source: self.source.as_ref().map(|s| s.describe()),
            source_error: self.source_error.clone(),
            load_error: self.pipeline.load_error().map(str::to_owned),
            frames_processed: self.frames_processed,
            frames_classified: self.pipeline.frames_classified(),
            history_len: self.pipeline.history_len(),
            updated_at: Utc::now(),
            frame: self.last_frame.clone(),
        }
    }
}

/// The driving loop.
///
/// Reads a frame when one is due, runs face detection and the decision
/// pipeline on it, then publishes a [`MonitorSnapshot`] and the alerting flag.
pub struct Monitor {
    worker: FrameWorker,
    load: ClassifierLoad,
    initial_source: Option<MediaSource>,
    commands: mpsc::Receiver<MonitorCommand>,
    snapshots: watch::Sender<MonitorSnapshot>,
    alerting: watch::Sender<bool>,
}

impl Monitor {
    pub fn new(
        pipeline: DecisionPipeline,
        detector: Box<dyn FaceDetector>,
        load: ClassifierLoad,
    ) -> (Self, MonitorClient) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::loading());
        let (alert_tx, alert_rx) = watch::channel(false);

        let monitor = Self {
            worker: FrameWorker {
                pipeline,
                detector,
                source: None,
                source_kind: "none",
                source_error: None,
                last_frame: None,
                frames_processed: 0,
            },
            load,
            initial_source: None,
            commands: command_rx,
            snapshots: snapshot_tx,
            alerting: alert_tx,
        };
        let client = MonitorClient {
            commands: command_tx,
            snapshots: snapshot_rx,
            alerting: alert_rx,
        };
        (monitor, client)
    }

    /// Build the pipeline and face detector from configuration
    pub fn from_config(
        pipeline: PipelineConfig,
        face: &FaceDetectorConfig,
        load: ClassifierLoad,
    ) -> Result<(Self, MonitorClient), MonitorError> {
        let pipeline = DecisionPipeline::new(pipeline)?;
        let detector = create_face_detector(face)?;
        Ok(Self::new(pipeline, detector, load))
    }

    /// Source opened when the loop starts
    pub fn with_source(mut self, source: MediaSource) -> Self {
        self.initial_source = Some(source);
        self
    }

    /// Run until `Shutdown` arrives or every client is dropped
    pub async fn run(self) -> Result<MonitorStats, MonitorError> {
        let Monitor {
            mut worker,
            mut load,
            initial_source,
            mut commands,
            snapshots,
            alerting,
        } = self;

        let mut stats = MonitorStats::default();
        let mut loaded = false;
        let mut next_frame = Instant::now();

        if let Some(source) = initial_source {
            worker.switch_source(&source);
        }
        publish(&worker, &snapshots, &alerting);
        info!("Monitor loop started");

        loop {
            let polling = worker.has_source();
            let deadline = next_frame;
            let frame_due = async move {
                if polling {
                    sleep_until(deadline).await;
                } else {
                    std::future::pending::<()>().await;
                }
            };

            tokio::select! {
                result = &mut load, if !loaded => {
                    loaded = true;
                    worker.pipeline.on_model_loaded(result);
                }
                command = commands.recv() => match command {
                    Some(MonitorCommand::SwitchSource(source)) => {
                        worker.switch_source(&source);
                        metrics::record_source_switch(source.kind());
                        stats.source_switches += 1;
                        next_frame = Instant::now();
                    }
                    Some(MonitorCommand::Shutdown) => {
                        info!("Monitor shutdown requested");
                        break;
                    }
                    None => {
                        info!("All monitor clients dropped");
                        break;
                    }
                },
                _ = frame_due => {
                    let (returned, step) = tokio::task::spawn_blocking(move || {
                        let mut worker = worker;
                        let step = worker.step_contained();
                        (worker, step)
                    })
                    .await?;
                    worker = returned;

                    let now = Instant::now();
                    next_frame = (deadline + worker.frame_interval()).max(now);

                    match step {
                        Some(Step::Frame { face_found, classified, elapsed }) => {
                            metrics::record_frame(worker.source_kind, face_found);
                            if classified {
                                metrics::record_classification(elapsed);
                            }
                        }
                        Some(Step::SourceFailed) => metrics::record_frame_error(worker.source_kind),
                        Some(Step::EndOfStream) | None => {}
                    }
                }
            }

            publish(&worker, &snapshots, &alerting);
        }

        worker.release_source();
        publish(&worker, &snapshots, &alerting);
        alerting.send_replace(false);
        metrics::set_alerting(false);

        stats.frames_processed = worker.frames_processed;
        stats.frames_classified = worker.pipeline.frames_classified();
        info!(
            "Monitor loop stopped: {} frames, {} classified, {} source switches",
            stats.frames_processed, stats.frames_classified, stats.source_switches
        );
        Ok(stats)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn publish(
    worker: &FrameWorker,
    snapshots: &watch::Sender<MonitorSnapshot>,
    alerting: &watch::Sender<bool>,
) {
    let snapshot = worker.snapshot();
    let flag = snapshot.alerting;
    snapshots.send_replace(snapshot);

    let changed = alerting.send_if_modified(|current| {
        if *current == flag {
            return false;
        }
        *current = flag;
        true
    });
    if changed {
        info!("Alerting {}", if flag { "raised" } else { "cleared" });
        metrics::set_alerting(flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{DmsError, FaceBox, NoFaceDetector, PipelinePhase};
    use inference_engine::MockClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SAFE: [f32; 6] = [0.02, 0.02, 0.02, 0.9, 0.02, 0.02];
    const DISTRACTED: [f32; 6] = [0.02, 0.9, 0.02, 0.02, 0.02, 0.02];

    fn synthetic(limit: Option<u64>) -> MediaSource {
        MediaSource::Synthetic {
            width: 32,
            height: 24,
            fps: 200,
            limit,
        }
    }

    fn ready(scores: [f32; 6]) -> ClassifierLoad {
        Box::pin(async move {
            Ok(Box::new(MockClassifier::constant(scores).with_input_size(8, 8))
                as Box<dyn BehaviorClassifier>)
        })
    }

    fn monitor(config: PipelineConfig, load: ClassifierLoad) -> (Monitor, MonitorClient) {
        monitor_with(config, Box::new(NoFaceDetector), load)
    }

    fn monitor_with(
        config: PipelineConfig,
        detector: Box<dyn FaceDetector>,
        load: ClassifierLoad,
    ) -> (Monitor, MonitorClient) {
        let pipeline = DecisionPipeline::new(config).unwrap();
        Monitor::new(pipeline, detector, load)
    }

    fn face(n: usize) -> FaceBox {
        FaceBox {
            x_center: n as f32 / 100.0,
            y_center: 0.5,
            width: 0.2,
            height: 0.3,
            confidence: 0.9,
        }
    }

    /// Reports a different face on every call
    struct CountingDetector {
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for CountingDetector {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceBox>, DmsError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(face(n)))
        }
    }

    /// Panics on its first call, then finds nothing
    #[derive(Default)]
    struct PanicOnceDetector {
        panicked: bool,
    }

    impl FaceDetector for PanicOnceDetector {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceBox>, DmsError> {
            if !self.panicked {
                self.panicked = true;
                panic!("detector state corrupted");
            }
            Ok(None)
        }
    }

    async fn wait_for(
        client: &MonitorClient,
        predicate: impl Fn(&MonitorSnapshot) -> bool,
    ) -> MonitorSnapshot {
        let mut rx = client.subscribe();
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if predicate(&current) {
                        return current.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("monitor did not reach the expected state")
    }

    #[tokio::test]
    async fn test_classifies_until_end_of_stream() {
        let (monitor, client) = monitor(PipelineConfig::default(), ready(SAFE));
        let handle = tokio::spawn(monitor.with_source(synthetic(Some(12))).run());

        let snapshot = wait_for(&client, |s| s.frames_processed == 12 && s.source.is_none()).await;
        assert_eq!(snapshot.phase, PipelinePhase::Ready);
        assert_eq!(snapshot.status, "SafeDriving");
        assert!(!snapshot.alerting);
        assert!(snapshot.frame.is_some());

        client.shutdown().await.unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.frames_processed, 12);
        // Frames 0, 5 and 10 are sampled, unless the first frames arrived before the load resolved
        assert!(stats.frames_classified >= 1 && stats.frames_classified <= 3);
    }

    #[tokio::test]
    async fn test_alert_flag_follows_decision() {
        let config = PipelineConfig {
            sample_interval: 1,
            ..Default::default()
        };
        let (monitor, client) = monitor(config, ready(DISTRACTED));
        let mut alerting = client.alerting();
        let handle = tokio::spawn(monitor.with_source(synthetic(None)).run());

        tokio::time::timeout(Duration::from_secs(10), alerting.wait_for(|flag| *flag))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.snapshot().status, "Distracted");

        client.shutdown().await.unwrap();
        handle.await.unwrap().unwrap();
        assert!(!*alerting.borrow());
    }

    #[tokio::test]
    async fn test_load_failure_never_alerts() {
        let failing: ClassifierLoad =
            Box::pin(async { Err(InferenceError::ModelLoad("missing weights".into())) });
        let (monitor, client) = monitor(PipelineConfig::default(), failing);
        let handle = tokio::spawn(monitor.with_source(synthetic(Some(20))).run());

        let snapshot = wait_for(&client, |s| s.phase == PipelinePhase::Failed).await;
        assert_eq!(snapshot.status, dms::pipeline::MODEL_ERROR_LABEL);
        assert_eq!(snapshot.confidence, 0.0);
        assert!(snapshot.load_error.is_some());

        let snapshot = wait_for(&client, |s| s.source.is_none()).await;
        assert_eq!(snapshot.frames_classified, 0);
        assert!(!snapshot.alerting);

        client.shutdown().await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_switch_source_keeps_history() {
        let config = PipelineConfig {
            sample_interval: 1,
            ..Default::default()
        };
        let (monitor, client) = monitor(config, ready(SAFE));
        let handle = tokio::spawn(monitor.with_source(synthetic(Some(4))).run());

        let first = wait_for(&client, |s| s.source.is_none() && s.frames_processed == 4).await;
        assert!(first.history_len > 0);

        client.switch_source(synthetic(Some(3))).await.unwrap();
        let second = wait_for(&client, |s| s.source.is_none() && s.frames_processed == 7).await;
        assert!(second.history_len > first.history_len);

        client.shutdown().await.unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.source_switches, 1);
    }

    #[tokio::test]
    async fn test_unopenable_source_reports_error() {
        let (monitor, client) = monitor(PipelineConfig::default(), ready(SAFE));
        let handle = tokio::spawn(monitor.run());

        client
            .switch_source(MediaSource::VideoFile {
                path: "/nonexistent/clip.gif".into(),
                fps: 15,
                looping: false,
            })
            .await
            .unwrap();

        let snapshot = wait_for(&client, |s| s.source_error.is_some()).await;
        assert!(snapshot.source.is_none());
        assert_eq!(snapshot.frames_processed, 0);

        client.shutdown().await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_detector_runs_on_every_frame() {
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = CountingDetector {
            calls: calls.clone(),
        };
        let (monitor, client) =
            monitor_with(PipelineConfig::default(), Box::new(detector), ready(SAFE));
        let handle = tokio::spawn(monitor.run());

        // Attach only once the classifier is ready so every frame counts toward K
        wait_for(&client, |s| s.phase == PipelinePhase::Ready).await;
        client.switch_source(synthetic(Some(12))).await.unwrap();

        let snapshot = wait_for(&client, |s| s.source.is_none() && s.frames_processed == 12).await;
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        // Frames 0, 5 and 10
        assert_eq!(snapshot.frames_classified, 3);
        assert_eq!(snapshot.history_len, 3);
        // Frame 11 is skipped by the sampler but still updates the face
        assert_eq!(snapshot.face, Some(face(11)));

        client.shutdown().await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_source_is_rejected() {
        let (monitor, client) = monitor(PipelineConfig::default(), ready(SAFE));
        let handle = tokio::spawn(monitor.run());

        client
            .switch_source(MediaSource::Synthetic {
                width: 70_000,
                height: 70_000,
                fps: 15,
                limit: None,
            })
            .await
            .unwrap();
        let snapshot = wait_for(&client, |s| s.source_error.is_some()).await;
        assert!(snapshot.source.is_none());

        client.switch_source(synthetic(Some(3))).await.unwrap();
        let snapshot = wait_for(&client, |s| s.frames_processed == 3).await;
        assert!(snapshot.source_error.is_none());

        client.shutdown().await.unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.source_switches, 2);
    }

    #[tokio::test]
    async fn test_panicking_frame_step_keeps_loop_alive() {
        let (monitor, client) = monitor_with(
            PipelineConfig::default(),
            Box::new(PanicOnceDetector::default()),
            ready(SAFE),
        );
        let handle = tokio::spawn(monitor.with_source(synthetic(None)).run());

        let snapshot = wait_for(&client, |s| s.source_error.is_some()).await;
        assert!(snapshot.source.is_none());
        assert!(snapshot
            .source_error
            .as_deref()
            .is_some_and(|e| e.contains("detector state corrupted")));
        assert_eq!(snapshot.frames_processed, 0);

        client.switch_source(synthetic(Some(3))).await.unwrap();
        wait_for(&client, |s| s.frames_processed == 3 && s.source.is_none()).await;

        client.shutdown().await.unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.frames_processed, 3);
    }

    #[tokio::test]
    async fn test_stops_when_clients_dropped() {
        let (monitor, client) = monitor(PipelineConfig::default(), ready(SAFE));
        let handle = tokio::spawn(monitor.run());
        drop(client);

        let stats = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats, MonitorStats::default());
    }

    #[test]
    fn test_from_config_rejects_invalid_pipeline() {
        let config = PipelineConfig {
            sample_interval: 0,
            ..Default::default()
        };
        let result = Monitor::from_config(config, &FaceDetectorConfig::default(), ready(SAFE));
        assert!(matches!(result, Err(MonitorError::Pipeline(_))));
    }

    #[test]
    fn test_snapshot_serializes_without_frame() {
        let json = serde_json::to_value(MonitorSnapshot::loading()).unwrap();
        assert_eq!(json["phase"], "uninitialized");
        assert_eq!(json["status"], "Loading model...");
        assert!(json.get("frame").is_none());
    }
}
