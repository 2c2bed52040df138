//! Lock-free command queue from the presentation side to the engine
//!
//! The console (or any other front end) pushes commands into an `rtrb`
//! ring buffer; the engine pops them only at phase boundaries, so the
//! sequencer never sees a parameter change mid-computation.

use super::session::{clamp_gain, clamp_secs, SessionConfig};
use crate::types::ContentMode;

/// Commands sent to the engine
///
/// All variants are `Copy`-sized scalars; nothing here allocates on either
/// side of the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Listen window length, seconds
    SetListenSecs(f32),
    /// Cooldown length, seconds
    SetCooldownSecs(f32),
    /// Neighbor count K (clamped to >= 1)
    SetK(usize),
    /// Background gain before ducking
    SetBackgroundGain(f32),
    /// Clip gain
    SetClipGain(f32),
    /// Clean or explicit content
    SetContentMode(ContentMode),
    /// Pause or resume triggering
    SetPaused(bool),
    /// Restart the performance arc and clear trigger counters
    ResetEscalation,
}

impl EngineCommand {
    /// Apply a session command, clamping its value
    ///
    /// Returns `false` for commands that are not session edits.
    pub fn apply_to(&self, session: &mut SessionConfig) -> bool {
        match *self {
            EngineCommand::SetListenSecs(secs) => session.listen_secs = clamp_secs(secs),
            EngineCommand::SetCooldownSecs(secs) => session.cooldown_secs = clamp_secs(secs),
            EngineCommand::SetK(k) => session.k = k.max(1),
            EngineCommand::SetBackgroundGain(gain) => session.background_gain = clamp_gain(gain),
            EngineCommand::SetClipGain(gain) => session.clip_gain = clamp_gain(gain),
            EngineCommand::SetContentMode(mode) => session.content_mode = mode,
            EngineCommand::SetPaused(paused) => session.paused = paused,
            EngineCommand::ResetEscalation => return false,
        }
        true
    }
}

/// Capacity of the command queue
///
/// Commands come from a human at a console; 64 is far beyond any burst.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Create a new command channel (producer/consumer pair)
///
/// The producer goes to the presentation side (wrap it in a
/// [`CommandSender`]), the consumer to the engine.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Command sender for the presentation thread
///
/// Wraps the lock-free producer. Never blocks.
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Queue a command
    ///
    /// Returns `Err(cmd)` if the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Check if the queue has space for more commands
    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}
