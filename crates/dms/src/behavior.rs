//! Behavior class labels

use std::fmt;

use inference_engine::NUM_CLASSES;
use serde::{Deserialize, Serialize};

/// Driver behavior classes, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorClass {
    DangerousDriving,
    Distracted,
    Drinking,
    SafeDriving,
    SleepyDriving,
    Yawn,
}

impl BehaviorClass {
    /// All classes indexed by model output position
    pub const ALL: [BehaviorClass; NUM_CLASSES] = [
        BehaviorClass::DangerousDriving,
        BehaviorClass::Distracted,
        BehaviorClass::Drinking,
        BehaviorClass::SafeDriving,
        BehaviorClass::SleepyDriving,
        BehaviorClass::Yawn,
    ];

    /// Label string as used by the training set
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorClass::DangerousDriving => "DangerousDriving",
            BehaviorClass::Distracted => "Distracted",
            BehaviorClass::Drinking => "Drinking",
            BehaviorClass::SafeDriving => "SafeDriving",
            BehaviorClass::SleepyDriving => "SleepyDriving",
            BehaviorClass::Yawn => "Yawn",
        }
    }

    /// Classes that alert when confident enough
    pub fn default_dangerous() -> Vec<BehaviorClass> {
        Self::ALL
            .into_iter()
            .filter(|class| *class != BehaviorClass::SafeDriving)
            .collect()
    }
}

impl fmt::Display for BehaviorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
