//! Live-tunable session parameters
//!
//! Written only through [`EngineCommand`](super::EngineCommand)s from the
//! presentation side; the sequencer reads them at phase boundaries.

use serde::{Deserialize, Serialize};

use crate::types::ContentMode;

/// Upper bound for both gains
pub const MAX_GAIN: f32 = 2.0;

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Listen window before each match, in seconds
    pub listen_secs: f32,
    /// Pause between clips, in seconds
    pub cooldown_secs: f32,
    /// Neighbors fetched per match
    pub k: usize,
    /// Background stream gain (before ducking)
    pub background_gain: f32,
    /// Clip output gain
    pub clip_gain: f32,
    /// Clean or explicit content
    pub content_mode: ContentMode,
    /// Suppress triggers at the end of listening
    pub paused: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_secs: 2.0,
            cooldown_secs: 1.0,
            k: 5,
            background_gain: 0.8,
            clip_gain: 1.0,
            content_mode: ContentMode::default(),
            paused: false,
        }
    }
}

impl SessionConfig {
    /// Copy with every field clamped into its valid range
    pub fn clamped(mut self) -> Self {
        self.listen_secs = clamp_secs(self.listen_secs);
        self.cooldown_secs = clamp_secs(self.cooldown_secs);
        self.k = self.k.max(1);
        self.background_gain = clamp_gain(self.background_gain);
        self.clip_gain = clamp_gain(self.clip_gain);
        self
    }
}

pub(crate) fn clamp_secs(secs: f32) -> f32 {
    if secs.is_finite() {
        secs.max(0.0)
    } else {
        0.0
    }
}

pub(crate) fn clamp_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.clamp(0.0, MAX_GAIN)
    } else {
        0.0
    }
}
