//! Per-frame decision: arg-max label and threshold alerting

use inference_engine::ClassProbabilityVector;
use serde::{Deserialize, Serialize};

use crate::{BehaviorClass, PipelineConfig};

/// Decision for the most recently classified frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Highest-scoring class
    pub label: BehaviorClass,
    /// Its (possibly smoothed) score
    pub confidence: f32,
    /// Dangerous class scored above the threshold
    pub alerting: bool,
}

/// Index and value of the largest score; the first maximum wins ties
pub fn argmax(scores: &ClassProbabilityVector) -> (usize, f32) {
    let mut best = (0, scores[0]);
    for (index, &score) in scores.iter().enumerate().skip(1) {
        if score > best.1 {
            best = (index, score);
        }
    }
    best
}

/// Label the scores and apply the alert threshold
pub fn decide(scores: &ClassProbabilityVector, config: &PipelineConfig) -> DecisionResult {
    let (index, confidence) = argmax(scores);
    // NUM_CLASSES entries, so the index is always in the label table
    let label = BehaviorClass::ALL[index];
    let alerting = config.is_dangerous(label) && confidence > config.confidence_threshold;

    DecisionResult {
        label,
        confidence,
        alerting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tie_goes_to_lower_index() {
        let (index, score) = argmax(&[0.1, 0.4, 0.0, 0.4, 0.1, 0.0]);
        assert_eq!(index, 1);
        assert_eq!(score, 0.4);

        assert_eq!(argmax(&[0.0; 6]).0, 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let config = PipelineConfig::default();

        let at_threshold = decide(&[0.0, 0.7, 0.0, 0.0, 0.0, 0.0], &config);
        assert_eq!(at_threshold.label, BehaviorClass::Distracted);
        assert!(!at_threshold.alerting);

        let above = decide(&[0.0, 0.71, 0.0, 0.0, 0.0, 0.0], &config);
        assert!(above.alerting);
    }

    #[test]
    fn test_safe_driving_never_alerts() {
        let config = PipelineConfig::default();
        let decision = decide(&[0.0, 0.0, 0.0, 0.99, 0.0, 0.0], &config);
        assert_eq!(decision.label, BehaviorClass::SafeDriving);
        assert!(!decision.alerting);
    }

    #[test]
    fn test_unnormalized_scores_are_accepted() {
        let config = PipelineConfig::default();
        let decision = decide(&[3.0, -1.0, 2.0, 0.0, 0.0, 5.5], &config);
        assert_eq!(decision.label, BehaviorClass::Yawn);
        assert_eq!(decision.confidence, 5.5);
        assert!(decision.alerting);
    }

    proptest! {
        #[test]
        fn alerting_matches_rule(scores in prop::array::uniform6(0.0f32..1.0)) {
            let config = PipelineConfig::default();
            let decision = decide(&scores, &config);

            prop_assert!(scores.iter().all(|s| *s <= decision.confidence));
            let first_max = scores.iter().position(|s| *s == decision.confidence).unwrap();
            prop_assert_eq!(decision.label as usize, first_max);
            prop_assert_eq!(
                decision.alerting,
                decision.label != BehaviorClass::SafeDriving && decision.confidence > 0.7
            );
        }
    }
}
