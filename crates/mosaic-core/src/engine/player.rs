//! Sample player over a preloaded buffer
//!
//! Fractional read position, signed rate (negative plays backwards), gain,
//! and optional looping. Reads interpolate linearly between neighbors.

use std::sync::Arc;

use crate::audio_file::AudioClip;

/// Plays one [`AudioClip`]
#[derive(Debug, Clone, Default)]
pub struct SamplePlayer {
    clip: Option<Arc<AudioClip>>,
    position: f64,
    rate: f64,
    gain: f32,
    looping: bool,
    playing: bool,
    loops: u64,
}

impl SamplePlayer {
    /// Idle player with unity gain
    pub fn new() -> Self {
        Self {
            gain: 1.0,
            rate: 1.0,
            ..Default::default()
        }
    }

    /// Start `clip` at `rate`; reverse rates start from the last sample
    pub fn start(&mut self, clip: Arc<AudioClip>, rate: f64, looping: bool) {
        let len = clip.len();
        self.position = if rate < 0.0 {
            len.saturating_sub(1) as f64
        } else {
            0.0
        };
        self.playing = len > 0;
        self.clip = Some(clip);
        self.rate = rate;
        self.looping = looping;
        self.loops = 0;
    }

    /// Stop and release the clip
    pub fn stop(&mut self) {
        self.playing = false;
        self.clip = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Read position in clip samples
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Seek (clamped to the clip)
    pub fn set_position(&mut self, position: f64) {
        let max = self.len().saturating_sub(1) as f64;
        self.position = position.clamp(0.0, max.max(0.0));
    }

    /// Clip length in samples (0 when idle)
    pub fn len(&self) -> usize {
        self.clip.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Times the clip has wrapped since `start`
    pub fn loops(&self) -> u64 {
        self.loops
    }

    /// Next output sample (silence when stopped)
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.playing {
            return 0.0;
        }
        let Some(clip) = self.clip.as_ref() else {
            self.playing = false;
            return 0.0;
        };
        let samples = &clip.samples;
        let len = samples.len();

        let idx = self.position.floor() as usize;
        let frac = (self.position - idx as f64) as f32;
        let a = samples[idx.min(len - 1)];
        let b = if idx + 1 < len {
            samples[idx + 1]
        } else if self.looping {
            samples[0]
        } else {
            a
        };
        let out = (a + (b - a) * frac) * self.gain;

        self.position += self.rate;
        let end = len as f64;
        if self.position >= end || self.position < 0.0 {
            if self.looping {
                self.position = self.position.rem_euclid(end);
                self.loops += 1;
            } else {
                self.playing = false;
            }
        }
        out
    }
}
