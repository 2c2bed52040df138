//! Audio file handling
//!
//! Decodes short clips (and the background track) to mono `f32` with
//! Symphonia, and writes mono WAV files with hound for offline renders.

use std::fs::File;
use std::path::Path;

use crate::types::Sample;

/// Audio file errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioFileError {
    /// File not found or couldn't be opened
    #[error("IO error: {0}")]
    IoError(String),
    /// Invalid or unsupported file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// Container holds no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,
    /// Decoding succeeded but produced no samples
    #[error("File contains no audio")]
    Empty,
}

/// A decoded mono clip held entirely in memory
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono samples
    pub samples: Vec<Sample>,
    /// Native sample rate of `samples`
    pub sample_rate: u32,
}

impl AudioClip {
    /// Create a clip from mono samples
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of sample frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the clip has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration at the native rate, in seconds
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }

    /// Linearly resample to `target_rate`
    ///
    /// Returns a clone when the rates already match. Only used offline
    /// (database construction); playback folds rate differences into the
    /// player's speed instead.
    pub fn resampled(&self, target_rate: u32) -> AudioClip {
        if target_rate == self.sample_rate || self.samples.is_empty() || target_rate == 0 {
            return self.clone();
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len = ((self.samples.len() as f64) / ratio).floor().max(1.0) as usize;
        let last = self.samples.len() - 1;

        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = (pos.floor() as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = (pos - idx as f64) as f32;
                self.samples[idx] + (self.samples[next] - self.samples[idx]) * frac
            })
            .collect();

        AudioClip::new(samples, target_rate)
    }
}

/// Decode an audio file to a mono clip using Symphonia
///
/// Multi-channel files are downmixed by averaging channels.
pub fn load_mono(path: &Path) -> Result<AudioClip, AudioFileError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path).map_err(|e| AudioFileError::IoError(format!("{:?}: {}", path, e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioFileError::InvalidFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or(AudioFileError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioFileError::InvalidFormat("Unknown sample rate".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioFileError::InvalidFormat(e.to_string()))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet from {:?}: {}", path, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet from {:?}: {}", path, e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    let samples: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    if samples.is_empty() {
        return Err(AudioFileError::Empty);
    }

    Ok(AudioClip::new(samples, sample_rate))
}

/// Write mono samples as a 32-bit float WAV file
pub fn write_wav(path: &Path, samples: &[Sample], sample_rate: u32) -> Result<(), AudioFileError> {
    use hound::{SampleFormat, WavSpec, WavWriter};

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| AudioFileError::IoError(e.to_string()))?;
    for &s in samples {
        writer
            .write_sample(s)
            .map_err(|e| AudioFileError::IoError(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| AudioFileError::IoError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let samples: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();

        write_wav(&path, &samples, 44100).unwrap();
        let clip = load_mono(&path).unwrap();

        assert_eq!(clip.sample_rate, 44100);
        assert_eq!(clip.len(), samples.len());
        for (a, b) in clip.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stereo_is_downmixed() {
        use hound::{SampleFormat, WavSpec, WavWriter};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(1.0f32).unwrap();
            writer.write_sample(0.0f32).unwrap();
        }
        writer.finalize().unwrap();

        let clip = load_mono(&path).unwrap();
        assert_eq!(clip.sample_rate, 22050);
        assert_eq!(clip.len(), 100);
        assert!(clip.samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_mono(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, AudioFileError::IoError(_)));
    }

    #[test]
    fn test_resample_halves_length() {
        let clip = AudioClip::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 8);
        let down = clip.resampled(4);
        assert_eq!(down.sample_rate, 4);
        assert_eq!(down.samples, vec![0.0, 2.0, 4.0, 6.0]);

        let same = clip.resampled(8);
        assert_eq!(same, clip);
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip::new(vec![0.0; 22050], 44100);
        assert!((clip.duration_secs() - 0.5).abs() < 1e-6);
    }
}
