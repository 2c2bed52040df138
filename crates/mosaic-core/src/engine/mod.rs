//! Real-time playback engine
//!
//! The engine owns everything the sequencing task mutates; the presentation
//! side talks to it through two channels only:
//!
//! - [`EngineCommand`]s over a lock-free `rtrb` queue (presentation → engine)
//! - [`EngineStatus`], a seqlock-guarded block of atomics (engine → presentation)
//!
//! The feature database, index, asset catalog and clip bank are immutable
//! after startup and shared by `Arc`.

mod command;
mod engine;
mod envelope;
mod player;
mod session;
mod status;

pub use command::{command_channel, CommandSender, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use engine::{
    clip_duration_secs, listen_hops, EngineError, EngineResources, EngineSettings, MosaicEngine,
    MAX_CLIP_SECS, MAX_LISTEN_FRAMES, MIN_CLIP_SECS,
};
pub use envelope::{Adsr, EnvelopeConfig};
pub use player::SamplePlayer;
pub use session::{SessionConfig, MAX_GAIN};
pub use status::{EngineStatus, Phase, StatusSnapshot};
