//! Driver Monitor Loop
//!
//! Owns the active frame source, the face detector and the decision
//! pipeline. Frames are processed one at a time; state leaves the loop
//! only through watch channels.

pub mod metrics;
mod runner;
mod snapshot;

pub use runner::{ClassifierLoad, Monitor, MonitorClient, MonitorCommand, MonitorStats};
pub use snapshot::MonitorSnapshot;

use thiserror::Error;

/// Monitor errors
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Monitor loop has stopped")]
    Stopped,

    #[error("Frame worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Pipeline(#[from] dms::DmsError),
}
