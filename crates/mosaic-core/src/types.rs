//! Common types for Mosaic
//!
//! Fundamental identifiers and constants shared by the analysis pipeline,
//! the feature database and the playback engine.

/// Default sample rate used for analysis and playback (44.1kHz)
///
/// The clip corpus is rendered at this rate. The live engine adopts whatever
/// rate the output device negotiates and folds the difference into clip
/// playback rates.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Audio sample type (mono, 32-bit float)
pub type Sample = f32;

/// Stable index of a record in the feature database (0..count, file order)
pub type RecordId = usize;

/// Interned index of a source clip file in the clip registry
pub type ClipId = usize;

/// Content mode for lyric display and substitute selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Only clips and lyrics that passed the clean filter
    Clean,
    /// Everything
    #[default]
    Explicit,
}

impl ContentMode {
    /// Convert from the boolean "clean" flag used by the console
    pub fn from_clean_flag(clean: bool) -> Self {
        if clean {
            ContentMode::Clean
        } else {
            ContentMode::Explicit
        }
    }

    /// Whether this is the clean mode
    pub fn is_clean(&self) -> bool {
        matches!(self, ContentMode::Clean)
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            ContentMode::Clean => "clean",
            ContentMode::Explicit => "explicit",
        }
    }
}

/// Convert seconds to a whole number of samples (rounded, never negative)
#[inline]
pub fn secs_to_samples(secs: f32, sample_rate: u32) -> u64 {
    (secs.max(0.0) as f64 * sample_rate as f64).round() as u64
}

/// Convert a sample count to seconds
#[inline]
pub fn samples_to_secs(samples: u64, sample_rate: u32) -> f32 {
    (samples as f64 / sample_rate.max(1) as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_mode_flag() {
        assert_eq!(ContentMode::from_clean_flag(true), ContentMode::Clean);
        assert_eq!(ContentMode::from_clean_flag(false), ContentMode::Explicit);
        assert!(ContentMode::Clean.is_clean());
        assert!(!ContentMode::default().is_clean());
    }

    #[test]
    fn test_sample_conversions() {
        assert_eq!(secs_to_samples(1.0, 44100), 44100);
        assert_eq!(secs_to_samples(-3.0, 44100), 0);
        assert!((samples_to_secs(22050, 44100) - 0.5).abs() < 1e-6);
    }
}
