//! Linear ADSR envelope with fixed times

use serde::{Deserialize, Serialize};

use crate::types::secs_to_samples;

/// Envelope times, configured once per session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub attack_secs: f32,
    pub decay_secs: f32,
    /// Level held after decay (0..1)
    pub sustain_level: f32,
    pub release_secs: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_secs: 0.01,
            decay_secs: 0.1,
            sustain_level: 0.8,
            release_secs: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Attack/decay/sustain/release gain generator
#[derive(Debug, Clone)]
pub struct Adsr {
    attack: u64,
    decay: u64,
    sustain: f32,
    release: u64,
    stage: Stage,
    level: f32,
    /// Samples spent in the current stage
    elapsed: u64,
    /// Level when release began
    release_from: f32,
}

impl Adsr {
    pub fn new(config: &EnvelopeConfig, sample_rate: u32) -> Self {
        Self {
            attack: secs_to_samples(config.attack_secs, sample_rate),
            decay: secs_to_samples(config.decay_secs, sample_rate),
            sustain: config.sustain_level.clamp(0.0, 1.0),
            release: secs_to_samples(config.release_secs, sample_rate),
            stage: Stage::Idle,
            level: 0.0,
            elapsed: 0,
            release_from: 0.0,
        }
    }

    /// Release length in samples
    pub fn release_samples(&self) -> u64 {
        self.release
    }

    /// Restart from the attack stage
    pub fn key_on(&mut self) {
        self.stage = Stage::Attack;
        self.elapsed = 0;
        self.level = 0.0;
    }

    /// Enter release from the current level
    pub fn key_off(&mut self) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
            self.elapsed = 0;
            self.release_from = self.level;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Advance one sample and return the gain
    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                self.elapsed += 1;
                if self.elapsed >= self.attack {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                    self.elapsed = 0;
                } else {
                    self.level = self.elapsed as f32 / self.attack as f32;
                }
            }
            Stage::Decay => {
                self.elapsed += 1;
                if self.elapsed >= self.decay {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                } else {
                    let t = self.elapsed as f32 / self.decay as f32;
                    self.level = 1.0 + (self.sustain - 1.0) * t;
                }
            }
            Stage::Sustain => self.level = self.sustain,
            Stage::Release => {
                self.elapsed += 1;
                if self.elapsed >= self.release {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                } else {
                    let t = self.elapsed as f32 / self.release as f32;
                    self.level = self.release_from * (1.0 - t);
                }
            }
        }
        self.level
    }
}
