//! Frame-level spectral feature extraction
//!
//! Turns one analysis window of mono samples into a fixed-dimension vector:
//!
//! ```text
//! [ centroid, flux, rms, mfcc_0, mfcc_1, ..., mfcc_{M-1} ]
//! ```
//!
//! The same extractor configuration is used offline (database construction)
//! and live (performance loop), so the two vector spaces line up.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use super::FeatureError;
use crate::types::{Sample, DEFAULT_SAMPLE_RATE};

/// Number of scalar (non-cepstral) features at the head of every vector
pub const SCALAR_FEATURES: usize = 3;

/// Floor added before taking the log of mel energies
const LOG_FLOOR: f32 = 1e-10;

/// Analysis parameters, fixed for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Sample rate the mel filterbank is laid out for
    pub sample_rate: u32,
    /// Analysis window length in samples (FFT size)
    pub window_size: usize,
    /// Number of cepstral coefficients (M)
    pub num_mfcc: usize,
    /// Number of triangular mel bands feeding the DCT
    pub num_mel_bands: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: 1024,
            num_mfcc: 20,
            num_mel_bands: 40,
        }
    }
}

impl ExtractorConfig {
    /// Feature vector dimension (N = 3 + M)
    pub fn dimension(&self) -> usize {
        SCALAR_FEATURES + self.num_mfcc
    }

    /// Hop size used by the live loop (50% overlap)
    pub fn live_hop(&self) -> usize {
        (self.window_size / 2).max(1)
    }

    /// Number of FFT bins produced per window
    pub fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    fn validate(&self) -> Result<(), FeatureError> {
        if self.window_size < 16 || self.window_size % 2 != 0 {
            return Err(FeatureError::InvalidConfig(format!(
                "window size must be even and >= 16, got {}",
                self.window_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(FeatureError::InvalidConfig("sample rate must be positive".into()));
        }
        if self.num_mfcc == 0 || self.num_mfcc > self.num_mel_bands {
            return Err(FeatureError::InvalidConfig(format!(
                "need 0 < num_mfcc ({}) <= num_mel_bands ({})",
                self.num_mfcc, self.num_mel_bands
            )));
        }
        Ok(())
    }
}

/// Reusable feature extractor
///
/// Owns the FFT plan, the Hann window, the mel filterbank and the DCT basis.
/// All buffers are allocated once in [`FeatureExtractor::new`]; calling
/// [`extract_into`](Self::extract_into) never allocates, so it is safe to run
/// on the audio thread.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    /// L2-normalized magnitudes of the previous frame (flux state)
    previous: Vec<f32>,
    /// Row-major `num_mel_bands x num_bins`
    mel_weights: Vec<f32>,
    mel_energies: Vec<f32>,
    /// Row-major `num_mfcc x num_mel_bands`
    dct_basis: Vec<f32>,
}

impl FeatureExtractor {
    /// Create an extractor for the given configuration
    pub fn new(config: ExtractorConfig) -> Result<Self, FeatureError> {
        config.validate()?;

        let n = config.window_size;
        let bins = config.num_bins();

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);

        // Periodic Hann window
        let window: Vec<f32> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        let mel_weights = mel_filterbank(config.num_mel_bands, n, config.sample_rate);
        let dct_basis = dct_ii_basis(config.num_mfcc, config.num_mel_bands);

        Ok(Self {
            fft,
            window,
            input,
            spectrum,
            scratch,
            magnitudes: vec![0.0; bins],
            previous: vec![0.0; bins],
            mel_weights,
            mel_energies: vec![0.0; config.num_mel_bands],
            dct_basis,
            config,
        })
    }

    /// The configuration this extractor was built with
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Output dimension
    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    /// Forget the previous frame (flux restarts from silence)
    ///
    /// Call between unrelated signals, e.g. between corpus files.
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Extract a feature vector from one window of samples
    pub fn extract(&mut self, frame: &[Sample]) -> Result<Vec<f32>, FeatureError> {
        let mut out = vec![0.0; self.dimension()];
        self.extract_into(frame, &mut out)?;
        Ok(out)
    }

    /// Extract into a caller-provided buffer of length [`dimension`](Self::dimension)
    pub fn extract_into(&mut self, frame: &[Sample], out: &mut [f32]) -> Result<(), FeatureError> {
        if frame.len() != self.config.window_size {
            return Err(FeatureError::InvalidInput(format!(
                "expected {} samples, got {}",
                self.config.window_size,
                frame.len()
            )));
        }
        if out.len() != self.dimension() {
            return Err(FeatureError::InvalidInput(format!(
                "output buffer has {} slots, dimension is {}",
                out.len(),
                self.dimension()
            )));
        }

        let rms = (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt();

        for ((dst, &s), &w) in self.input.iter_mut().zip(frame).zip(&self.window) {
            *dst = s * w;
        }
        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| FeatureError::Transform(e.to_string()))?;

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *mag = c.norm();
        }

        let centroid = self.centroid();
        let flux = self.flux();
        self.mfcc_into(&mut out[SCALAR_FEATURES..]);

        out[0] = centroid;
        out[1] = flux;
        out[2] = rms;
        Ok(())
    }

    /// Magnitude-weighted mean bin, normalized to 0..1
    fn centroid(&self) -> f32 {
        let total: f32 = self.magnitudes.iter().sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        let weighted: f32 = self
            .magnitudes
            .iter()
            .enumerate()
            .map(|(k, &m)| k as f32 * m)
            .sum();
        weighted / total / self.magnitudes.len() as f32
    }

    /// Distance between this frame's normalized spectrum and the last one
    ///
    /// Updates the stored previous spectrum.
    fn flux(&mut self) -> f32 {
        let norm = self.magnitudes.iter().map(|m| m * m).sum::<f32>().sqrt();
        let inv = if norm > f32::EPSILON { 1.0 / norm } else { 0.0 };

        let mut sum = 0.0f32;
        for (prev, &mag) in self.previous.iter_mut().zip(&self.magnitudes) {
            let current = mag * inv;
            let diff = current - *prev;
            sum += diff * diff;
            *prev = current;
        }
        sum.sqrt()
    }

    fn mfcc_into(&mut self, out: &mut [f32]) {
        let bins = self.magnitudes.len();
        for (band, energy) in self.mel_energies.iter_mut().enumerate() {
            let row = &self.mel_weights[band * bins..(band + 1) * bins];
            let e: f32 = row
                .iter()
                .zip(&self.magnitudes)
                .map(|(&w, &m)| w * m * m)
                .sum();
            *energy = (e + LOG_FLOOR).ln();
        }

        let bands = self.mel_energies.len();
        for (k, coeff) in out.iter_mut().enumerate() {
            let row = &self.dct_basis[k * bands..(k + 1) * bands];
            *coeff = row.iter().zip(&self.mel_energies).map(|(&b, &e)| b * e).sum();
        }
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters evenly spaced on the mel scale from 0Hz to Nyquist
fn mel_filterbank(num_bands: usize, fft_size: usize, sample_rate: u32) -> Vec<f32> {
    let bins = fft_size / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let max_mel = hz_to_mel(nyquist);

    let edges: Vec<f32> = (0..num_bands + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (num_bands + 1) as f32))
        .collect();
    let bin_hz = sample_rate as f32 / fft_size as f32;

    let mut weights = vec![0.0f32; num_bands * bins];
    for band in 0..num_bands {
        let (lo, mid, hi) = (edges[band], edges[band + 1], edges[band + 2]);
        for k in 0..bins {
            let f = k as f32 * bin_hz;
            let w = if f > lo && f <= mid && mid > lo {
                (f - lo) / (mid - lo)
            } else if f > mid && f < hi && hi > mid {
                (hi - f) / (hi - mid)
            } else {
                0.0
            };
            weights[band * bins + k] = w;
        }
    }
    weights
}

/// Orthonormal DCT-II basis, `num_coeffs x num_bands`
fn dct_ii_basis(num_coeffs: usize, num_bands: usize) -> Vec<f32> {
    let b = num_bands as f32;
    let mut basis = vec![0.0f32; num_coeffs * num_bands];
    for k in 0..num_coeffs {
        let scale = if k == 0 { (1.0 / b).sqrt() } else { (2.0 / b).sqrt() };
        for m in 0..num_bands {
            let angle = std::f32::consts::PI * k as f32 * (m as f32 + 0.5) / b;
            basis[k * num_bands + m] = scale * angle.cos();
        }
    }
    basis
}
