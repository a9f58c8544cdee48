//! Moving-average smoothing over recent classifier outputs

use inference_engine::{ClassProbabilityVector, NUM_CLASSES};
use ring_buffer::RingBuffer;

/// Bounded history of raw class scores.
///
/// The mean divides by the number of vectors currently held, so until the
/// window fills, early frames are averaged over fewer samples.
#[derive(Debug, Clone)]
pub struct PredictionHistory {
    buffer: RingBuffer<ClassProbabilityVector>,
}

impl PredictionHistory {
    /// Create a history holding at most `capacity` vectors
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RingBuffer::new(capacity),
        }
    }

    /// Add a vector, evicting the oldest when full
    pub fn push(&mut self, scores: ClassProbabilityVector) {
        self.buffer.push(scores);
    }

    /// Element-wise mean over the held vectors (zeros when empty)
    pub fn mean(&self) -> ClassProbabilityVector {
        let mut sums = [0.0f64; NUM_CLASSES];
        for scores in &self.buffer {
            for (sum, score) in sums.iter_mut().zip(scores.iter()) {
                *sum += *score as f64;
            }
        }

        let count = self.buffer.len().max(1) as f64;
        let mut mean = [0.0f32; NUM_CLASSES];
        for (slot, sum) in mean.iter_mut().zip(sums.iter()) {
            *slot = (sum / count) as f32;
        }
        mean
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
