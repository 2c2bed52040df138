//! Offline database construction
//!
//! Scans a corpus of short clips, slides the analysis window over each one
//! and writes averaged feature rows in the flat database format. Runs once,
//! before a performance; the live engine only ever loads the result.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{write_row, DbError};
use crate::audio_file::{load_mono, AudioClip};
use crate::features::{ExtractorConfig, FeatureAccumulator, FeatureError, FeatureExtractor};
use crate::types::Sample;

/// Corpus analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Filled from the `analysis` section so the corpus and the live input
    /// always share one extractor configuration
    #[serde(skip)]
    pub extractor: ExtractorConfig,
    /// Samples between successive analysis windows
    pub hop_size: usize,
    /// Frames averaged into one database row
    pub frames_per_row: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            hop_size: extractor.window_size,
            extractor,
            frames_per_row: 8,
        }
    }
}

/// One averaged row, before it is written
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedRow {
    /// Offset of the group's first window, in seconds
    pub offset_secs: f32,
    /// Mean feature vector of the group
    pub features: Vec<f32>,
}

/// Analyze one clip's samples into database rows
///
/// Samples must already be at the extractor's sample rate. Every row is
/// analyzed with fresh spectral-flux state. Clips shorter than
/// one window produce a single zero-padded frame. A trailing group with fewer
/// than `frames_per_row` frames is still emitted.
pub fn analyze_samples(
    samples: &[Sample],
    config: &BuildConfig,
) -> Result<Vec<AnalyzedRow>, FeatureError> {
    let mut extractor = FeatureExtractor::new(config.extractor.clone())?;
    let window = config.extractor.window_size;
    let hop = config.hop_size.max(1);
    let per_row = config.frames_per_row.max(1);
    let sample_rate = config.extractor.sample_rate as f32;

    let mut rows = Vec::new();
    let mut accumulator = FeatureAccumulator::new(extractor.dimension());
    let mut frame = vec![0.0f32; extractor.dimension()];
    let mut padded = vec![0.0f32; window];
    let mut group_start = 0usize;

    let mut start = 0usize;
    loop {
        let end = start + window;
        let block: &[Sample] = if end <= samples.len() {
            &samples[start..end]
        } else if start == 0 {
            // Clip shorter than one window
            padded[..samples.len()].copy_from_slice(samples);
            &padded
        } else {
            break;
        };

        if accumulator.is_empty() {
            // Each row starts its flux history from silence, like a live
            // listening window
            extractor.reset();
            group_start = start;
        }
        extractor.extract_into(block, &mut frame)?;
        accumulator.push(&frame);

        if accumulator.count() == per_row {
            if let Some(features) = accumulator.mean() {
                rows.push(AnalyzedRow {
                    offset_secs: group_start as f32 / sample_rate,
                    features,
                });
            }
            accumulator.clear();
        }

        if end >= samples.len() {
            break;
        }
        start += hop;
    }

    if let Some(features) = accumulator.mean() {
        rows.push(AnalyzedRow {
            offset_secs: group_start as f32 / sample_rate,
            features,
        });
    }

    Ok(rows)
}

/// Decode a clip file and analyze it at the configured rate
pub fn analyze_file(path: &Path, config: &BuildConfig) -> anyhow::Result<Vec<AnalyzedRow>> {
    let clip: AudioClip = load_mono(path)?;
    let clip = clip.resampled(config.extractor.sample_rate);
    Ok(analyze_samples(&clip.samples, config)?)
}

/// Result of analyzing a whole corpus
#[derive(Debug, Default)]
pub struct CorpusAnalysis {
    /// `(clip name, rows)` in input order, failed files omitted
    pub clips: Vec<(String, Vec<AnalyzedRow>)>,
    /// Files that could not be decoded or analyzed
    pub skipped: Vec<PathBuf>,
}

impl CorpusAnalysis {
    /// Total rows across all clips
    pub fn row_count(&self) -> usize {
        self.clips.iter().map(|(_, rows)| rows.len()).sum()
    }

    /// Store clip names relative to `root` where they live beneath it
    pub fn relativize(&mut self, root: &Path) {
        for (name, _) in &mut self.clips {
            if let Ok(relative) = Path::new(name.as_str()).strip_prefix(root) {
                *name = relative.display().to_string();
            }
        }
    }
}

/// Analyze every file in parallel
///
/// Failures are logged and skipped. Output order follows input order.
/// Paths containing whitespace cannot be stored in the database format and
/// are skipped as well.
pub fn analyze_corpus(paths: &[PathBuf], config: &BuildConfig) -> CorpusAnalysis {
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| {
            let result = if path.to_string_lossy().contains(char::is_whitespace) {
                Err(anyhow::anyhow!("clip path contains whitespace"))
            } else {
                analyze_file(path, config)
            };
            (path, result)
        })
        .collect();

    let mut analysis = CorpusAnalysis::default();
    for (path, result) in results {
        match result {
            Ok(rows) => {
                log::debug!("Analyzed {:?}: {} rows", path, rows.len());
                analysis.clips.push((path.display().to_string(), rows));
            }
            Err(e) => {
                log::warn!("Skipping {:?}: {:#}", path, e);
                analysis.skipped.push(path.clone());
            }
        }
    }
    analysis
}

/// Write an analyzed corpus in database format
pub fn write_database(path: &Path, analysis: &CorpusAnalysis) -> Result<(), DbError> {
    let io_err = |source| DbError::Io {
        path: path.display().to_string(),
        source,
    };

    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for (name, rows) in &analysis.clips {
        for row in rows {
            write_row(&mut writer, name, row.offset_secs, &row.features).map_err(io_err)?;
        }
    }
    writer.flush().map_err(io_err)?;

    log::info!(
        "Wrote {} rows for {} clips to {:?}",
        analysis.row_count(),
        analysis.clips.len(),
        path
    );
    Ok(())
}

/// Collect audio files from a directory (sorted) or a list file
///
/// A list file holds one path per line; relative entries resolve against the
/// list's own directory.
pub fn collect_inputs(input: &Path) -> std::io::Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_audio_file(p))
            .collect();
        files.sort();
        return Ok(files);
    }

    let base = input.parent().unwrap_or_else(|| Path::new("."));
    let contents = std::fs::read_to_string(input)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            let p = PathBuf::from(l);
            if p.is_absolute() {
                p
            } else {
                base.join(p)
            }
        })
        .collect())
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "wav" | "flac" | "mp3"))
        .unwrap_or(false)
}
