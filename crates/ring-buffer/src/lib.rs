//! Bounded Ring Buffer
//!
//! Provides a fixed-capacity FIFO that evicts its oldest entry on overflow.
//! Used to hold the most recent classifier outputs for temporal smoothing.

mod buffer;

pub use buffer::{Iter, RingBuffer};
