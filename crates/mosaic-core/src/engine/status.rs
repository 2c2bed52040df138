//! Engine → presentation status
//!
//! The engine is the only writer. Fields are individual atomics guarded by a
//! sequence counter (seqlock): the writer bumps the counter to odd, stores
//! every field, then bumps it back to even. Readers retry until they see the
//! same even counter before and after copying, so a [`StatusSnapshot`] is
//! never a mix of two publishes.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::session::SessionConfig;
use crate::performance::Act;
use crate::types::{ClipId, ContentMode, RecordId};

const NONE: usize = usize::MAX;

/// Sequencer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    Listening = 0,
    Matching = 1,
    Deciding = 2,
    Playing = 3,
    Cooldown = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Matching,
            2 => Phase::Deciding,
            3 => Phase::Playing,
            4 => Phase::Cooldown,
            _ => Phase::Listening,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Listening => "listening",
            Phase::Matching => "matching",
            Phase::Deciding => "deciding",
            Phase::Playing => "playing",
            Phase::Cooldown => "cooldown",
        }
    }
}

/// A consistent copy of the engine status
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusSnapshot {
    /// Audio clock, samples rendered since start
    pub clock: u64,
    pub progress: f32,
    pub act: Act,
    pub phase: Phase,
    /// Clips started since the last reset
    pub triggers: u64,
    /// How many of those were substitutes
    pub substitutions: u64,
    pub last_record: Option<RecordId>,
    pub last_clip: Option<ClipId>,
    /// Substitute index in the list of `last_mode`
    pub last_substitute: Option<usize>,
    pub last_mode: ContentMode,
    pub used_deepfake: bool,
    /// Signed playback rate of the last clip
    pub last_rate: f32,
    /// Background position and length, in background samples
    pub background_position: u64,
    pub background_len: u64,
    /// Background gain currently applied (after ducking)
    pub background_gain: f32,
    pub background_loops: u64,
    pub session: SessionConfig,
}

/// Shared status block (engine writes, anyone reads)
#[derive(Debug, Default)]
pub struct EngineStatus {
    seq: AtomicU64,
    clock: AtomicU64,
    progress: AtomicU32,
    act: AtomicU8,
    phase: AtomicU8,
    triggers: AtomicU64,
    substitutions: AtomicU64,
    last_record: AtomicUsize,
    last_clip: AtomicUsize,
    last_substitute: AtomicUsize,
    last_clean: AtomicBool,
    used_deepfake: AtomicBool,
    last_rate: AtomicU32,
    background_position: AtomicU64,
    background_len: AtomicU64,
    background_gain: AtomicU32,
    background_loops: AtomicU64,
    listen_secs: AtomicU32,
    cooldown_secs: AtomicU32,
    k: AtomicUsize,
    session_background_gain: AtomicU32,
    clip_gain: AtomicU32,
    clean: AtomicBool,
    paused: AtomicBool,
}

impl EngineStatus {
    /// Create a status block holding `initial`
    pub fn new(initial: &StatusSnapshot) -> Self {
        let status = Self::default();
        status.publish(initial);
        status
    }

    /// Publish a full snapshot (single writer only)
    pub fn publish(&self, s: &StatusSnapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let r = Ordering::Relaxed;
        self.clock.store(s.clock, r);
        self.progress.store(s.progress.to_bits(), r);
        self.act.store(s.act.number(), r);
        self.phase.store(s.phase as u8, r);
        self.triggers.store(s.triggers, r);
        self.substitutions.store(s.substitutions, r);
        self.last_record.store(s.last_record.unwrap_or(NONE), r);
        self.last_clip.store(s.last_clip.unwrap_or(NONE), r);
        self.last_substitute.store(s.last_substitute.unwrap_or(NONE), r);
        self.last_clean.store(s.last_mode.is_clean(), r);
        self.used_deepfake.store(s.used_deepfake, r);
        self.last_rate.store(s.last_rate.to_bits(), r);
        self.background_position.store(s.background_position, r);
        self.background_len.store(s.background_len, r);
        self.background_gain.store(s.background_gain.to_bits(), r);
        self.background_loops.store(s.background_loops, r);
        self.listen_secs.store(s.session.listen_secs.to_bits(), r);
        self.cooldown_secs.store(s.session.cooldown_secs.to_bits(), r);
        self.k.store(s.session.k, r);
        self.session_background_gain.store(s.session.background_gain.to_bits(), r);
        self.clip_gain.store(s.session.clip_gain.to_bits(), r);
        self.clean.store(s.session.content_mode.is_clean(), r);
        self.paused.store(s.session.paused, r);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read a consistent snapshot (lock-free, retries on a concurrent publish)
    pub fn snapshot(&self) -> StatusSnapshot {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let snapshot = self.read_fields();
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return snapshot;
            }
        }
    }

    /// Whether the engine is currently paused (single field, no retry)
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Audio clock (single field, no retry)
    #[inline]
    pub fn clock(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    fn read_fields(&self) -> StatusSnapshot {
        let r = Ordering::Relaxed;
        let opt = |v: usize| if v == NONE { None } else { Some(v) };
        StatusSnapshot {
            clock: self.clock.load(r),
            progress: f32::from_bits(self.progress.load(r)),
            act: Act::from_u8(self.act.load(r)),
            phase: Phase::from_u8(self.phase.load(r)),
            triggers: self.triggers.load(r),
            substitutions: self.substitutions.load(r),
            last_record: opt(self.last_record.load(r)),
            last_clip: opt(self.last_clip.load(r)),
            last_substitute: opt(self.last_substitute.load(r)),
            last_mode: ContentMode::from_clean_flag(self.last_clean.load(r)),
            used_deepfake: self.used_deepfake.load(r),
            last_rate: f32::from_bits(self.last_rate.load(r)),
            background_position: self.background_position.load(r),
            background_len: self.background_len.load(r),
            background_gain: f32::from_bits(self.background_gain.load(r)),
            background_loops: self.background_loops.load(r),
            session: SessionConfig {
                listen_secs: f32::from_bits(self.listen_secs.load(r)),
                cooldown_secs: f32::from_bits(self.cooldown_secs.load(r)),
                k: self.k.load(r),
                background_gain: f32::from_bits(self.session_background_gain.load(r)),
                clip_gain: f32::from_bits(self.clip_gain.load(r)),
                content_mode: ContentMode::from_clean_flag(self.clean.load(r)),
                paused: self.paused.load(r),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_publish_then_snapshot() {
        let status = EngineStatus::new(&StatusSnapshot::default());
        assert_eq!(status.snapshot().last_clip, None);

        let snapshot = StatusSnapshot {
            clock: 44100,
            progress: 0.5,
            act: Act::Two,
            phase: Phase::Playing,
            triggers: 3,
            substitutions: 1,
            last_record: Some(12),
            last_clip: Some(4),
            last_substitute: Some(0),
            last_mode: ContentMode::Clean,
            used_deepfake: true,
            last_rate: -1.25,
            background_position: 100,
            background_len: 1000,
            background_gain: 0.4,
            background_loops: 2,
            session: SessionConfig {
                k: 7,
                paused: true,
                content_mode: ContentMode::Clean,
                ..Default::default()
            },
        };
        status.publish(&snapshot);
        assert_eq!(status.snapshot(), snapshot);
        assert!(status.is_paused());
        assert_eq!(status.clock(), 44100);
    }

    #[test]
    fn test_snapshot_is_never_torn() {
        let status = Arc::new(EngineStatus::default());
        let writer_status = Arc::clone(&status);

        let writer = std::thread::spawn(move || {
            for i in 0..20_000u64 {
                let snapshot = StatusSnapshot {
                    clock: i,
                    triggers: i,
                    substitutions: i,
                    background_loops: i,
                    background_position: i,
                    ..Default::default()
                };
                writer_status.publish(&snapshot);
            }
        });

        for _ in 0..20_000 {
            let s = status.snapshot();
            assert_eq!(s.clock, s.triggers);
            assert_eq!(s.clock, s.substitutions);
            assert_eq!(s.clock, s.background_loops);
            assert_eq!(s.clock, s.background_position);
        }
        writer.join().unwrap();
    }
}
