//! Live audio output
//!
//! A single CPAL output stream that owns the [`MosaicEngine`](crate::engine::MosaicEngine)
//! and renders it in the device callback.

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use cpal_backend::{start_output, OutputHandle};
pub use device::{find_output_device, output_device_names};
pub use error::{AudioError, AudioResult};
