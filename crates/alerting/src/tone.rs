//! Synthesized alert tone

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::AlertError;

/// Sample rate used when rendering for playback or WAV export
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// Final envelope level relative to the starting gain
const FADE_FLOOR: f64 = 0.01;

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    #[default]
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Sample at `cycle` in [0, 1), range [-1, 1]
    fn sample(self, cycle: f64) -> f64 {
        match self {
            Waveform::Sine => (TAU * cycle).sin(),
            Waveform::Square => {
                if cycle < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * cycle - 1.0,
            Waveform::Triangle => 4.0 * (cycle - 0.5).abs() - 1.0,
        }
    }
}

/// Exponential frequency sweep with an exponential gain fade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSpec {
    pub waveform: Waveform,
    pub start_hz: f64,
    pub end_hz: f64,
    pub duration_ms: u64,
    pub gain: f64,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            waveform: Waveform::Square,
            start_hz: 880.0,
            end_hz: 440.0,
            duration_ms: 300,
            gain: 0.3,
        }
    }
}

impl ToneSpec {
    pub fn validate(&self) -> Result<(), AlertError> {
        if !(self.start_hz > 0.0 && self.end_hz > 0.0) {
            return Err(AlertError::InvalidTone("frequencies must be > 0".into()));
        }
        if self.duration_ms == 0 {
            return Err(AlertError::InvalidTone("duration_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.gain) {
            return Err(AlertError::InvalidTone("gain must be within [0, 1]".into()));
        }
        Ok(())
    }

    /// Number of samples at `sample_rate`
    pub fn sample_count(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.duration_ms / 1000) as usize
    }

    /// Render mono samples in [-gain, gain]
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let count = self.sample_count(sample_rate);
        let duration = self.duration_ms as f64 / 1000.0;
        let ratio = self.end_hz / self.start_hz;
        let log_ratio = ratio.ln();

        (0..count)
            .map(|n| {
                let t = n as f64 / sample_rate as f64;
                let progress = t / duration;

                // Integrated phase of f(t) = start * ratio^(t / duration), in cycles
                let cycles = if log_ratio.abs() < 1e-12 {
                    self.start_hz * t
                } else {
                    self.start_hz * duration * (ratio.powf(progress) - 1.0) / log_ratio
                };
                let envelope = self.gain * FADE_FLOOR.powf(progress);
                (self.waveform.sample(cycles.fract()) * envelope) as f32
            })
            .collect()
    }

    /// Render as a 16-bit PCM mono WAV file
    pub fn to_wav(&self, sample_rate: u32) -> Vec<u8> {
        let samples = self.render(sample_rate);
        let data_len = (samples.len() * 2) as u32;
        let mut wav = Vec::with_capacity(44 + data_len as usize);

        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            wav.extend_from_slice(&pcm.to_le_bytes());
        }
        wav
    }
}
