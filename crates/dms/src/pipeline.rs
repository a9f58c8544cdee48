//! Frame decision pipeline

use camera_capture::VideoFrame;
use inference_engine::{preprocess, BehaviorClassifier, InferenceError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{decide, DecisionResult, DmsError, FaceBox, PipelineConfig, PredictionHistory};

/// Fixed status text shown when the classifier failed to load
pub const MODEL_ERROR_LABEL: &str = "Error loading model";

/// Pipeline lifecycle.
///
/// `Uninitialized -> Ready` when the classifier load resolves (or `Failed`,
/// which is permanent). Once a frame source is attached every frame is
/// either `Evaluating` (classified) or `Idle` (skipped by the sampling policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Uninitialized,
    Ready,
    Evaluating,
    Idle,
    Failed,
}

/// What the presentation layer shows as the current label
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLabel {
    Loading,
    Error,
    Ready,
    Behavior(crate::BehaviorClass),
}

impl StatusLabel {
    pub fn text(&self) -> &'static str {
        match self {
            StatusLabel::Loading => "Loading model...",
            StatusLabel::Error => MODEL_ERROR_LABEL,
            StatusLabel::Ready => "Waiting for video",
            StatusLabel::Behavior(class) => class.as_str(),
        }
    }
}

/// Converts frames into behavior decisions
pub struct DecisionPipeline {
    config: PipelineConfig,
    classifier: Option<Box<dyn BehaviorClassifier>>,
    history: Option<PredictionHistory>,
    phase: PipelinePhase,
    source_attached: bool,
    frame_index: u64,
    frames_classified: u64,
    decision: Option<DecisionResult>,
    face: Option<FaceBox>,
    load_error: Option<String>,
}

impl DecisionPipeline {
    /// Create a pipeline waiting for its classifier
    pub fn new(config: PipelineConfig) -> Result<Self, DmsError> {
        config.validate()?;
        let history = config
            .smoothing
            .then(|| PredictionHistory::new(config.history_size));

        info!(
            "Decision pipeline: threshold={}, every {} frame(s), smoothing={}",
            config.confidence_threshold,
            config.sample_interval,
            history.as_ref().map_or(0, |h| h.capacity())
        );

        Ok(Self {
            config,
            classifier: None,
            history,
            phase: PipelinePhase::Uninitialized,
            source_attached: false,
            frame_index: 0,
            frames_classified: 0,
            decision: None,
            face: None,
            load_error: None,
        })
    }

    /// Resolve the asynchronous classifier load
    pub fn on_model_loaded(&mut self, result: Result<Box<dyn BehaviorClassifier>, InferenceError>) {
        if self.phase != PipelinePhase::Uninitialized {
            warn!("Ignoring classifier load result in phase {:?}", self.phase);
            return;
        }

        match result {
            Ok(classifier) => {
                self.classifier = Some(classifier);
                self.phase = PipelinePhase::Ready;
                info!("Classifier ready");
            }
            Err(e) => {
                error!("Classifier failed to load: {}", e);
                self.load_error = Some(e.to_string());
                self.phase = PipelinePhase::Failed;
            }
        }
    }

    /// A frame source became active.
    ///
    /// Restarts the sampling counter; the prediction history carries over.
    pub fn attach_source(&mut self) {
        self.source_attached = true;
        self.frame_index = 0;
        debug!("Frame source attached, history holds {} entries", self.history_len());
    }

    /// The active frame source went away
    pub fn detach_source(&mut self) {
        self.source_attached = false;
        if matches!(self.phase, PipelinePhase::Evaluating | PipelinePhase::Idle) {
            self.phase = PipelinePhase::Ready;
        }
    }

    /// Process one frame.
    ///
    /// Every K-th frame is classified; the others, and any frame before the
    /// classifier is ready, return the previous decision unchanged.
    pub fn on_frame(&mut self, frame: &VideoFrame, face: Option<FaceBox>) -> Option<DecisionResult> {
        self.face = face;

        if !self.source_attached
            || matches!(self.phase, PipelinePhase::Uninitialized | PipelinePhase::Failed)
        {
            return self.decision;
        }

        let index = self.frame_index;
        self.frame_index += 1;
        if index % self.config.sample_interval as u64 != 0 {
            self.phase = PipelinePhase::Idle;
            return self.decision;
        }
        self.phase = PipelinePhase::Evaluating;

        let Some(classifier) = self.classifier.as_mut() else {
            return self.decision;
        };

        let (width, height) = classifier.input_size();
        let scores = match preprocess(frame, width, height).and_then(|t| classifier.predict(&t)) {
            Ok(scores) => scores,
            Err(e) => {
                warn!("Frame {} not classified: {}", frame.sequence, e);
                return self.decision;
            }
        };

        let scores = match self.history.as_mut() {
            Some(history) => {
                history.push(scores);
                history.mean()
            }
            None => scores,
        };

        let decision = decide(&scores, &self.config);
        debug!(
            "Frame {}: {} ({:.3}) alerting={}",
            frame.sequence, decision.label, decision.confidence, decision.alerting
        );
        self.decision = Some(decision);
        self.frames_classified += 1;
        self.decision
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Latest decision (None until the first classified frame)
    pub fn decision(&self) -> Option<DecisionResult> {
        self.decision
    }

    /// Face box from the most recent frame
    pub fn face(&self) -> Option<FaceBox> {
        self.face
    }

    /// Confidence shown to the user (0 until a frame is classified)
    pub fn confidence(&self) -> f32 {
        self.decision.map_or(0.0, |d| d.confidence)
    }

    /// Whether the alarm should sound
    pub fn alerting(&self) -> bool {
        self.phase != PipelinePhase::Failed && self.decision.is_some_and(|d| d.alerting)
    }

    pub fn status(&self) -> StatusLabel {
        match (self.phase, self.decision) {
            (PipelinePhase::Failed, _) => StatusLabel::Error,
            (PipelinePhase::Uninitialized, _) => StatusLabel::Loading,
            (_, Some(decision)) => StatusLabel::Behavior(decision.label),
            (_, None) => StatusLabel::Ready,
        }
    }

    /// Classifier load failure message, if any
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Frames seen since the current source was attached
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frames_classified(&self) -> u64 {
        self.frames_classified
    }

    pub fn history_len(&self) -> usize {
        self.history.as_ref().map_or(0, |h| h.len())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
