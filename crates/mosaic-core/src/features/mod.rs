//! Audio feature extraction
//!
//! - [`FeatureExtractor`]: one analysis window → one feature vector
//!   (spectral centroid, spectral flux, RMS, MFCCs)
//! - [`FeatureAccumulator`]: running average of consecutive frames, used both
//!   by the database builder and by the live listen window

mod accumulator;
mod extractor;

pub use accumulator::FeatureAccumulator;
pub use extractor::{ExtractorConfig, FeatureExtractor, SCALAR_FEATURES};

use thiserror::Error;

/// Errors that can occur during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Invalid extractor configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("FFT error: {0}")]
    Transform(String),
}
