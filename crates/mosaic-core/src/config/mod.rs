//! Application configuration
//!
//! One YAML file drives both binaries. Every section is optional and falls
//! back to its defaults:
//!
//! ```yaml
//! analysis:
//!   sample_rate: 44100
//!   window_size: 1024
//! build:
//!   frames_per_row: 8
//! session:
//!   listen_secs: 2.0
//!   content_mode: clean
//! performance:
//!   total_secs: 600
//!   seed: 7
//! assets:
//!   database: /srv/mosaic/features.db
//!   background: /srv/mosaic/bed.wav
//! ```

mod io;
mod paths;

use serde::{Deserialize, Serialize};

use crate::assets::AssetPaths;
use crate::audio::AudioConfig;
use crate::db::builder::BuildConfig;
use crate::engine::{EngineSettings, EnvelopeConfig, SessionConfig};
use crate::features::ExtractorConfig;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};

/// Default performance arc length, seconds
pub const DEFAULT_PERFORMANCE_SECS: f32 = 600.0;

/// Length and randomness of one performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub total_secs: f32,
    /// Fixed RNG seed for reproducible runs (None = seeded from entropy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            total_secs: DEFAULT_PERFORMANCE_SECS,
            seed: None,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub audio: AudioConfig,
    pub analysis: ExtractorConfig,
    pub build: BuildConfig,
    pub session: SessionConfig,
    pub performance: PerformanceConfig,
    pub envelope: EnvelopeConfig,
    pub assets: AssetPaths,
}

impl MosaicConfig {
    /// Corpus build parameters sharing the live analysis configuration
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            extractor: self.analysis.clone(),
            ..self.build.clone()
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            extractor: self.analysis.clone(),
            envelope: self.envelope,
            performance_secs: self.performance.total_secs,
            seed: self.performance.seed,
            session: self.session.clamped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentMode;
    use std::path::PathBuf;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "session:\n  k: 9\n  content_mode: clean\nperformance:\n  seed: 7\n";
        let config: MosaicConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.session.k, 9);
        assert_eq!(config.session.content_mode, ContentMode::Clean);
        assert_eq!(config.session.listen_secs, SessionConfig::default().listen_secs);
        assert_eq!(config.performance.seed, Some(7));
        assert_eq!(config.performance.total_secs, DEFAULT_PERFORMANCE_SECS);
        assert_eq!(config.analysis, ExtractorConfig::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = MosaicConfig::default();
        config.analysis.num_mfcc = 13;
        config.build.frames_per_row = 4;
        config.session.background_gain = 0.5;
        config.performance.total_secs = 120.0;
        config.assets.database = PathBuf::from("/srv/mosaic/features.db");
        config.assets.lyrics = Some(PathBuf::from("lyrics.txt"));

        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: MosaicConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_build_config_follows_analysis() {
        let mut config = MosaicConfig::default();
        config.analysis.num_mfcc = 13;
        config.build.hop_size = 256;

        let build = config.build_config();
        assert_eq!(build.extractor.num_mfcc, 13);
        assert_eq!(build.hop_size, 256);
    }

    #[test]
    fn test_engine_settings_clamp_session() {
        let mut config = MosaicConfig::default();
        config.session.k = 0;
        config.performance.seed = Some(3);

        let settings = config.engine_settings();
        assert_eq!(settings.session.k, 1);
        assert_eq!(settings.seed, Some(3));
        assert_eq!(settings.performance_secs, DEFAULT_PERFORMANCE_SECS);
    }
}
