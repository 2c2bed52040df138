//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Console thread  │───push()───────────►│   Command Queue     │
//! │                  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop() at boundaries
//!         │ snapshot()                                ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │   EngineStatus   │◄────publish()───────│  CPAL Audio Thread  │
//! │    (seqlock)     │                     │ (owns MosaicEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```
//!
//! The engine renders mono; every device channel receives the same signal.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, MAX_BUFFER_SIZE};
use super::device::find_output_device;
use super::error::{AudioError, AudioResult};
use crate::engine::{EngineError, EngineStatus, MosaicEngine};
use crate::types::Sample;

/// Keeps the output stream alive. Drop this to stop audio.
pub struct OutputHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
    status: Arc<EngineStatus>,
}

impl OutputHandle {
    /// Negotiated device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Requested buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get the audio latency in milliseconds (one-way, output only)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Status published by the engine running inside the stream
    pub fn status(&self) -> Arc<EngineStatus> {
        Arc::clone(&self.status)
    }
}

/// Open the output device and start an engine on it
///
/// `build_engine` receives the negotiated sample rate; the engine it returns
/// moves into the audio callback and is never touched from outside again.
pub fn start_output<F>(
    config: &AudioConfig,
    preferred_rate: u32,
    build_engine: F,
) -> AudioResult<OutputHandle>
where
    F: FnOnce(u32) -> Result<MosaicEngine, EngineError>,
{
    let device = find_output_device(config.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let target_rate = config.sample_rate.unwrap_or(preferred_rate);
    let supported = get_output_config(&device, target_rate)?;
    let sample_rate = supported.sample_rate().0;
    let buffer_size = config.buffer_size.frames();

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        config.buffer_size.latency_ms(sample_rate)
    );

    let engine = build_engine(sample_rate)?;
    let status = engine.status();

    let stream = build_output_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(OutputHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
        channels: stream_config.channels,
        status,
    })
}

/// Pick an f32 configuration covering `target_rate`, else the closest usable one
fn get_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let covers = |c: &cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32 && covers(c))
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| AudioError::ConfigError("No f32 output configuration".to_string()))?;

    let sample_rate = if covers(best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: MosaicEngine,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut mono: Vec<Sample> = vec![0.0; MAX_BUFFER_SIZE];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for block in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
                    let frames = block.len() / channels;
                    let mono = &mut mono[..frames];
                    engine.process(mono);
                    fan_out(mono, block, channels);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

/// Copy each mono sample into every channel of its frame
fn fan_out(mono: &[Sample], interleaved: &mut [f32], channels: usize) {
    for (frame, &sample) in interleaved.chunks_mut(channels).zip(mono) {
        frame.fill(sample);
    }
}
