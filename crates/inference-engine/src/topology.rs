//! Layers-model topology repair.
//!
//! Newer Keras exporters write the `InputLayer` shape as `batch_shape`, which
//! older layers-model loaders reject; they expect `batch_input_shape`. The
//! fix renames the key in the first `InputLayer` of
//! `modelTopology.model_config.config.layers`.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Topology repair errors
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Missing topology key: {0}")]
    MissingKey(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a repair attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyFix {
    /// `batch_shape` renamed to `batch_input_shape`
    Renamed,
    /// Nothing to rename
    AlreadyFixed,
}

/// Rename `batch_shape` in the first `InputLayer` config of a parsed document
pub fn fix_input_layer(document: &mut Value) -> Result<TopologyFix, TopologyError> {
    let layers = document
        .get_mut("modelTopology")
        .ok_or(TopologyError::MissingKey("modelTopology"))?
        .get_mut("model_config")
        .ok_or(TopologyError::MissingKey("model_config"))?
        .get_mut("config")
        .ok_or(TopologyError::MissingKey("config"))?
        .get_mut("layers")
        .and_then(Value::as_array_mut)
        .ok_or(TopologyError::MissingKey("layers"))?;

    let Some(input_layer) = layers
        .iter_mut()
        .find(|layer| layer.get("class_name").and_then(Value::as_str) == Some("InputLayer"))
    else {
        return Ok(TopologyFix::AlreadyFixed);
    };

    let config = input_layer
        .get_mut("config")
        .and_then(Value::as_object_mut)
        .ok_or(TopologyError::MissingKey("config"))?;

    match config.remove("batch_shape") {
        Some(shape) => {
            config.insert("batch_input_shape".to_string(), shape);
            Ok(TopologyFix::Renamed)
        }
        None => Ok(TopologyFix::AlreadyFixed),
    }
}

/// Repair a `model.json` file in place; the file is rewritten only when renamed
pub fn fix_file(path: &Path) -> Result<TopologyFix, TopologyError> {
    let contents = std::fs::read_to_string(path)?;
    let mut document: Value = serde_json::from_str(&contents)?;

    let outcome = fix_input_layer(&mut document)?;
    match outcome {
        TopologyFix::Renamed => {
            std::fs::write(path, serde_json::to_string(&document)?)?;
            info!("Renamed 'batch_shape' to 'batch_input_shape' in {}", path.display());
        }
        TopologyFix::AlreadyFixed => {
            warn!("'batch_shape' not found in {}; no changes made", path.display());
        }
    }
    Ok(outcome)
}
