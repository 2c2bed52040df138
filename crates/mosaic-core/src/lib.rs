//! Mosaic Core - feature matching and playback sequencing for live audio mosaics

pub mod assets;
pub mod audio;
pub mod audio_file;
pub mod config;
pub mod db;
pub mod engine;
pub mod features;
pub mod index;
pub mod performance;
pub mod types;

pub use types::*;
