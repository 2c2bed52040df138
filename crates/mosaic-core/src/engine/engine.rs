//! The mosaic engine: sequencing task and mixer
//!
//! `MosaicEngine::process` is the whole sequencing task. It renders the
//! background plus the current clip into a mono buffer, advancing the audio
//! clock sample by sample, and only acts at boundaries:
//!
//! ```text
//!  Listening ──(listen_hops hops)──► Matching ─► Deciding ─► Playing ─► Cooldown
//!      ▲          paused: restart          │ no clip audio: ───────────────┤
//!      └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commands are drained and the session re-read at every boundary, never in
//! between. Everything the engine touches per sample is preallocated; the
//! only shared state it writes is the [`EngineStatus`] seqlock.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::command::EngineCommand;
use super::envelope::{Adsr, EnvelopeConfig};
use super::player::SamplePlayer;
use super::session::SessionConfig;
use super::status::{EngineStatus, Phase, StatusSnapshot};
use crate::assets::{AssetCatalog, ClipBank};
use crate::audio_file::AudioClip;
use crate::db::{DbError, FeatureDatabase};
use crate::features::{ExtractorConfig, FeatureAccumulator, FeatureError, FeatureExtractor};
use crate::index::{NearestNeighborIndex, Neighbor};
use crate::performance::{self, Escalation};
use crate::types::{secs_to_samples, ClipId, RecordId, Sample};

/// Most analysis frames a single listen window may accumulate
pub const MAX_LISTEN_FRAMES: usize = 512;

/// Shortest clip playback, seconds
pub const MIN_CLIP_SECS: f32 = 0.3;

/// Longest clip playback, seconds
pub const MAX_CLIP_SECS: f32 = 6.0;

/// Engine construction errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Index dimension {index} does not match extractor dimension {extractor}")]
    IndexDimension { index: usize, extractor: usize },

    #[error("Background track is empty")]
    EmptyBackground,

    #[error("Invalid output sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Immutable, shared inputs
#[derive(Debug, Clone)]
pub struct EngineResources {
    pub database: Arc<FeatureDatabase>,
    pub index: Arc<NearestNeighborIndex>,
    pub catalog: Arc<AssetCatalog>,
    pub bank: Arc<ClipBank>,
    pub background: Arc<AudioClip>,
}

/// Fixed per-session settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Must match the database's analysis configuration
    pub extractor: ExtractorConfig,
    pub envelope: EnvelopeConfig,
    /// Length of the performance arc, seconds
    pub performance_secs: f32,
    /// RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Initial session parameters
    pub session: SessionConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            envelope: EnvelopeConfig::default(),
            performance_secs: 600.0,
            seed: None,
            session: SessionConfig::default(),
        }
    }
}

/// Number of analysis hops in a listen window
///
/// `ceil(listen_secs * sample_rate / hop)`, clamped to `[1, MAX_LISTEN_FRAMES]`.
pub fn listen_hops(listen_secs: f32, sample_rate: u32, hop: usize) -> usize {
    let samples = listen_secs.max(0.0) as f64 * sample_rate as f64;
    let hops = (samples / hop.max(1) as f64).ceil();
    (hops as usize).clamp(1, MAX_LISTEN_FRAMES)
}

/// Playback length of a clip at `rate`, clamped to `[MIN_CLIP_SECS, MAX_CLIP_SECS]`
pub fn clip_duration_secs(len: usize, clip_sample_rate: u32, rate: f32) -> f32 {
    let speed = clip_sample_rate.max(1) as f64 * (rate.abs() as f64).max(1e-3);
    ((len as f64 / speed) as f32).clamp(MIN_CLIP_SECS, MAX_CLIP_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayStage {
    Hold,
    Release,
}

/// What a trigger resolved to
struct Choice {
    record: RecordId,
    clip: ClipId,
    substitute: Option<usize>,
    audio: Arc<AudioClip>,
}

/// Real-time mosaic engine
///
/// Owned by the audio thread (or the offline renderer).
pub struct MosaicEngine {
    sample_rate: u32,

    database: Arc<FeatureDatabase>,
    index: Arc<NearestNeighborIndex>,
    catalog: Arc<AssetCatalog>,
    bank: Arc<ClipBank>,

    extractor: FeatureExtractor,
    accumulator: FeatureAccumulator,
    window: Vec<Sample>,
    frame: Vec<f32>,
    query: Vec<f32>,
    neighbors: Vec<Neighbor>,
    results: Vec<RecordId>,
    analysis_rate: u32,
    analysis_hop: usize,
    hop_samples: u64,
    listen_hops: usize,
    hops_done: usize,

    background_clip: Arc<AudioClip>,
    background: SamplePlayer,
    background_gain: f32,
    logged_loops: u64,
    clip: SamplePlayer,
    envelope: Adsr,

    session: SessionConfig,
    commands: rtrb::Consumer<EngineCommand>,
    escalation: Escalation,
    rng: SmallRng,

    clock: u64,
    phase: Phase,
    play_stage: PlayStage,
    countdown: u64,

    status: Arc<EngineStatus>,
    snapshot: StatusSnapshot,
}

impl MosaicEngine {
    /// Create an engine rendering at `sample_rate`
    ///
    /// Fails if the database, index and extractor disagree on the feature
    /// dimension, or the background is unusable.
    pub fn new(
        sample_rate: u32,
        resources: EngineResources,
        settings: EngineSettings,
        commands: rtrb::Consumer<EngineCommand>,
    ) -> Result<Self, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }

        let extractor = FeatureExtractor::new(settings.extractor.clone())?;
        let dimension = extractor.dimension();
        resources.database.ensure_dimension(dimension)?;
        if resources.index.dimension() != dimension {
            return Err(EngineError::IndexDimension {
                index: resources.index.dimension(),
                extractor: dimension,
            });
        }
        if resources.background.is_empty() {
            return Err(EngineError::EmptyBackground);
        }

        // The background is analyzed in place, so keep it at the analysis rate
        let analysis_rate = settings.extractor.sample_rate;
        let background_clip = if resources.background.sample_rate == analysis_rate {
            resources.background
        } else {
            log::info!(
                "Resampling background from {}Hz to {}Hz for analysis",
                resources.background.sample_rate,
                analysis_rate
            );
            Arc::new(resources.background.resampled(analysis_rate))
        };

        let analysis_hop = settings.extractor.live_hop();
        let hop_samples = ((analysis_hop as f64 * sample_rate as f64 / analysis_rate as f64).round()
            as u64)
            .max(1);

        let mut background = SamplePlayer::new();
        background.start(
            Arc::clone(&background_clip),
            analysis_rate as f64 / sample_rate as f64,
            true,
        );

        let session = settings.session.clamped();
        let rng = match settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let total = secs_to_samples(settings.performance_secs, sample_rate);

        let snapshot = StatusSnapshot {
            background_len: background_clip.len() as u64,
            background_gain: session.background_gain,
            session,
            ..Default::default()
        };
        let status = Arc::new(EngineStatus::new(&snapshot));
        let records = resources.index.len();

        log::info!(
            "MosaicEngine: {}Hz output, {}Hz analysis, hop {} samples, {} records, performance {:.0}s",
            sample_rate,
            analysis_rate,
            hop_samples,
            records,
            settings.performance_secs
        );

        let mut engine = Self {
            sample_rate,
            database: resources.database,
            index: resources.index,
            catalog: resources.catalog,
            bank: resources.bank,
            accumulator: FeatureAccumulator::new(dimension),
            window: vec![0.0; settings.extractor.window_size],
            frame: vec![0.0; dimension],
            query: vec![0.0; dimension],
            neighbors: Vec::with_capacity(records),
            results: Vec::with_capacity(records),
            extractor,
            analysis_rate,
            analysis_hop,
            hop_samples,
            listen_hops: 1,
            hops_done: 0,
            background_clip,
            background,
            background_gain: session.background_gain,
            logged_loops: 0,
            clip: SamplePlayer::new(),
            envelope: Adsr::new(&settings.envelope, sample_rate),
            session,
            commands,
            escalation: Escalation::new(0, total),
            rng,
            clock: 0,
            phase: Phase::Listening,
            play_stage: PlayStage::Hold,
            countdown: 0,
            status,
            snapshot,
        };
        engine.begin_listening();
        Ok(engine)
    }

    /// Shared status for the presentation side
    pub fn status(&self) -> Arc<EngineStatus> {
        Arc::clone(&self.status)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples rendered so far
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current session parameters (as of the last boundary)
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Render the next `out.len()` mono samples
    pub fn process(&mut self, out: &mut [Sample]) {
        let mut offset = 0;
        while offset < out.len() {
            let n = ((out.len() - offset) as u64).min(self.countdown) as usize;
            self.render(&mut out[offset..offset + n]);
            offset += n;
            self.clock += n as u64;
            self.countdown -= n as u64;
            self.advance();
        }
        self.publish_status();
    }

    fn render(&mut self, out: &mut [Sample]) {
        let clip_active = self.clip.is_playing() || !self.envelope.is_idle();
        for sample in out.iter_mut() {
            let background = self.background.next_sample() * self.background_gain;
            let clip = if clip_active {
                self.clip.next_sample() * self.envelope.next()
            } else {
                0.0
            };
            *sample = background + clip;
        }
    }

    /// Run boundaries until the next one lies in the future
    fn advance(&mut self) {
        while self.countdown == 0 {
            self.drain_commands();
            self.log_background_loops();
            match self.phase {
                Phase::Listening => self.on_hop(),
                Phase::Playing => self.on_play_boundary(),
                Phase::Cooldown | Phase::Matching | Phase::Deciding => self.begin_listening(),
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            log::debug!("Engine command: {:?}", cmd);
            if !cmd.apply_to(&mut self.session) {
                self.escalation.reset(self.clock);
                self.snapshot.triggers = 0;
                self.snapshot.substitutions = 0;
                log::info!("Performance reset at clock {}", self.clock);
            }
        }
        if self.phase != Phase::Playing {
            self.background_gain = self.session.background_gain;
        }
    }

    fn log_background_loops(&mut self) {
        let loops = self.background.loops();
        if loops > self.logged_loops {
            log::info!("Background reached its end, looping (pass {})", loops + 1);
            self.logged_loops = loops;
        }
    }

    fn progress(&self) -> f32 {
        self.escalation.progress(self.clock)
    }

    fn begin_listening(&mut self) {
        self.phase = Phase::Listening;
        self.accumulator.clear();
        self.extractor.reset();
        self.hops_done = 0;
        self.listen_hops = listen_hops(self.session.listen_secs, self.analysis_rate, self.analysis_hop);
        self.countdown = self.hop_samples;
    }

    fn on_hop(&mut self) {
        self.capture_window();
        match self.extractor.extract_into(&self.window, &mut self.frame) {
            Ok(()) => self.accumulator.push(&self.frame),
            Err(e) => log::error!("Feature extraction failed: {}", e),
        }

        self.hops_done += 1;
        if self.hops_done < self.listen_hops {
            self.countdown = self.hop_samples;
            return;
        }

        if self.session.paused {
            self.begin_listening();
            return;
        }

        self.phase = Phase::Matching;
        let Some(record) = self.match_query() else {
            self.begin_listening();
            return;
        };

        self.phase = Phase::Deciding;
        match self.choose(record) {
            Some(choice) => self.begin_playing(choice),
            None => self.begin_cooldown(),
        }
    }

    /// Copy the most recent analysis window of the background
    ///
    /// Samples before playback started read as silence.
    fn capture_window(&mut self) {
        let samples = &self.background_clip.samples;
        let len = samples.len() as u64;
        let consumed = self.background.loops() * len + self.background.position().floor() as u64;
        let size = self.window.len() as u64;
        let silent = size.saturating_sub(consumed) as usize;
        let start = consumed.saturating_sub(size);

        self.window[..silent].fill(0.0);
        for (i, slot) in self.window[silent..].iter_mut().enumerate() {
            *slot = samples[((start + i as u64) % len) as usize];
        }
    }

    /// Average, search, filter by content mode, and pick
    ///
    /// The whole index is ranked and the `k` nearest records the active mode
    /// allows are kept, so a mode with a restricted list still gets `k`
    /// candidates. `None` when the mode allows nothing in the database.
    fn match_query(&mut self) -> Option<RecordId> {
        if !self.accumulator.mean_into(&mut self.query) {
            return None;
        }
        if let Err(e) = self.index.search_into(
            &self.query,
            self.index.len(),
            &mut self.neighbors,
            &mut self.results,
        ) {
            log::error!("Search failed: {}", e);
            return None;
        }

        let database = &self.database;
        let set = self.catalog.for_mode(self.session.content_mode);
        self.results.retain(|id| {
            database
                .record(*id)
                .map(|r| set.allows(r.clip))
                .unwrap_or(false)
        });
        self.results.truncate(self.session.k);
        if self.results.is_empty() {
            log::debug!(
                "No {} clip in the database, skipping trigger",
                self.session.content_mode.name()
            );
            return None;
        }

        let progress = self.progress();
        let pick = performance::pick_result(&mut self.rng, progress, self.results.len());
        self.results.get(pick).copied()
    }

    /// Apply the substitution policy and resolve audio
    fn choose(&mut self, record: RecordId) -> Option<Choice> {
        let clip = self.database.record(record)?.clip;
        let mode = self.session.content_mode;
        let progress = self.escalation.progress(self.clock);
        let set = self.catalog.for_mode(mode);

        let decision = performance::decide(&mut self.rng, progress, set.substitutes.len(), || {
            set.substitute_for(clip)
        });

        if let Some(index) = decision.substitute() {
            if let Some(audio) = self.bank.substitute(mode, index) {
                return Some(Choice {
                    record,
                    clip,
                    substitute: Some(index),
                    audio: Arc::clone(audio),
                });
            }
            log::warn!("Substitute {} was not preloaded, playing the original", index);
        }

        match self.bank.real(clip) {
            Some(audio) => Some(Choice {
                record,
                clip,
                substitute: None,
                audio: Arc::clone(audio),
            }),
            None => {
                log::warn!(
                    "Clip {} was not preloaded, skipping trigger",
                    self.database.clips().name(clip).unwrap_or("?")
                );
                None
            }
        }
    }

    fn begin_playing(&mut self, choice: Choice) {
        let progress = self.progress();
        let substituted = choice.substitute.is_some();
        let rate = performance::playback_rate(&mut self.rng, progress, substituted);

        let duration_secs = clip_duration_secs(choice.audio.len(), choice.audio.sample_rate, rate);
        let duration = secs_to_samples(duration_secs, self.sample_rate).max(1);
        let native = choice.audio.sample_rate as f64 / self.sample_rate as f64;

        self.clip.start(choice.audio, rate as f64 * native, false);
        self.clip.set_gain(self.session.clip_gain);
        self.envelope.key_on();
        self.background_gain = self.session.background_gain * (1.0 - progress);

        self.phase = Phase::Playing;
        self.play_stage = PlayStage::Hold;
        self.countdown = duration.saturating_sub(self.envelope.release_samples());

        self.snapshot.triggers += 1;
        if substituted {
            self.snapshot.substitutions += 1;
        }
        self.snapshot.last_record = Some(choice.record);
        self.snapshot.last_clip = Some(choice.clip);
        self.snapshot.last_substitute = choice.substitute;
        self.snapshot.last_mode = self.session.content_mode;
        self.snapshot.used_deepfake = substituted;
        self.snapshot.last_rate = rate;
        self.publish_status();

        log::info!(
            "Trigger {}: record {} clip {}{} rate {:.3} ({:.2}s, {})",
            self.snapshot.triggers,
            choice.record,
            choice.clip,
            if substituted { " [substitute]" } else { "" },
            rate,
            duration_secs,
            self.escalation.act(self.clock)
        );
    }

    fn on_play_boundary(&mut self) {
        match self.play_stage {
            PlayStage::Hold => {
                self.envelope.key_off();
                self.play_stage = PlayStage::Release;
                self.countdown = self.envelope.release_samples();
            }
            PlayStage::Release => {
                self.clip.stop();
                self.background_gain = self.session.background_gain;
                self.begin_cooldown();
            }
        }
    }

    fn begin_cooldown(&mut self) {
        self.phase = Phase::Cooldown;
        self.countdown = secs_to_samples(self.session.cooldown_secs, self.sample_rate);
    }

    fn publish_status(&mut self) {
        let progress = self.progress();
        let s = &mut self.snapshot;
        s.clock = self.clock;
        s.progress = progress;
        s.act = performance::Act::from_progress(progress);
        s.phase = self.phase;
        s.background_position = self.background.position() as u64;
        s.background_gain = self.background_gain;
        s.background_loops = self.background.loops();
        s.session = self.session;
        self.status.publish(&self.snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ContentSet;
    use crate::db::builder::{analyze_samples, BuildConfig};
    use crate::db::write_row;
    use crate::engine::command::{command_channel, CommandSender};
    use crate::types::ContentMode;

    const SR: u32 = 8000;

    fn extractor_config() -> ExtractorConfig {
        ExtractorConfig {
            sample_rate: SR,
            window_size: 256,
            num_mfcc: 8,
            num_mel_bands: 16,
        }
    }

    fn tone(freq: f32, secs: f32) -> AudioClip {
        let len = (secs * SR as f32) as usize;
        let samples = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin() * 0.5)
            .collect();
        AudioClip::new(samples, SR)
    }

    struct Fixture {
        resources: EngineResources,
        settings: EngineSettings,
    }

    fn fixture(preloaded: bool) -> Fixture {
        let clips = [
            ("clip_one.wav", tone(330.0, 0.5)),
            ("clip_two.wav", tone(1200.0, 0.4)),
        ];
        let config = BuildConfig {
            extractor: extractor_config(),
            hop_size: 256,
            frames_per_row: 4,
        };

        let mut text = Vec::new();
        for (name, clip) in &clips {
            for row in analyze_samples(&clip.samples, &config).unwrap() {
                write_row(&mut text, name, row.offset_secs, &row.features).unwrap();
            }
        }
        let database = FeatureDatabase::parse(std::str::from_utf8(&text).unwrap()).unwrap();
        let index = NearestNeighborIndex::from_database(&database).unwrap();

        let explicit = ContentSet::with_substitutes(
            vec![
                "fakes/clip_one_df.wav".to_string(),
                "fakes/clip_two_df.wav".to_string(),
            ],
            database.clips(),
        )
        .unwrap();
        let catalog = AssetCatalog {
            explicit,
            ..Default::default()
        };

        let real = clips
            .iter()
            .map(|(_, clip)| preloaded.then(|| Arc::new(clip.clone())))
            .collect();
        let fake = vec![
            preloaded.then(|| Arc::new(tone(500.0, 0.5))),
            preloaded.then(|| Arc::new(tone(900.0, 0.5))),
        ];
        let bank = ClipBank::from_parts(real, Vec::new(), fake);

        let background = Arc::new(AudioClip::new(
            tone(330.0, 0.3)
                .samples
                .into_iter()
                .chain(tone(1200.0, 0.3).samples)
                .collect(),
            SR,
        ));

        Fixture {
            resources: EngineResources {
                database: Arc::new(database),
                index: Arc::new(index),
                catalog: Arc::new(catalog),
                bank: Arc::new(bank),
                background,
            },
            settings: EngineSettings {
                extractor: extractor_config(),
                envelope: EnvelopeConfig::default(),
                performance_secs: 4.0,
                seed: Some(42),
                session: SessionConfig {
                    listen_secs: 0.1,
                    cooldown_secs: 0.05,
                    k: 3,
                    ..Default::default()
                },
            },
        }
    }

    fn engine(fixture: Fixture) -> (MosaicEngine, CommandSender) {
        let (tx, rx) = command_channel();
        let engine = MosaicEngine::new(SR, fixture.resources, fixture.settings, rx).unwrap();
        (engine, CommandSender::new(tx))
    }

    /// Run for `secs`, returning every phase seen at block ends
    fn run(engine: &mut MosaicEngine, secs: f32) -> Vec<Phase> {
        let mut buffer = vec![0.0f32; 200];
        let blocks = (secs * SR as f32 / 200.0).ceil() as usize;
        (0..blocks)
            .map(|_| {
                engine.process(&mut buffer);
                engine.status().snapshot().phase
            })
            .collect()
    }

    #[test]
    fn test_listen_hops() {
        assert_eq!(listen_hops(0.0, 44100, 512), 1);
        assert_eq!(listen_hops(1.0, 44100, 512), 87);
        assert_eq!(listen_hops(3600.0, 44100, 512), MAX_LISTEN_FRAMES);
        assert_eq!(listen_hops(0.1, 8000, 128), 7);
    }

    #[test]
    fn test_clip_duration_is_clamped() {
        assert_eq!(clip_duration_secs(44100, 44100, 1.0), 1.0);
        assert_eq!(clip_duration_secs(44100, 44100, -2.0), 0.5);
        assert_eq!(clip_duration_secs(100, 44100, 1.0), MIN_CLIP_SECS);
        assert_eq!(clip_duration_secs(44100 * 60, 44100, 1.0), MAX_CLIP_SECS);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut fixture = fixture(true);
        fixture.settings.extractor.num_mfcc = 4;
        let (_tx, rx) = command_channel();
        let result = MosaicEngine::new(SR, fixture.resources, fixture.settings, rx);
        assert!(matches!(
            result,
            Err(EngineError::Database(DbError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_cycles_through_phases() {
        let (mut engine, _tx) = engine(fixture(true));
        let phases = run(&mut engine, 3.0);

        assert!(phases.contains(&Phase::Listening));
        assert!(phases.contains(&Phase::Playing));
        assert!(phases.contains(&Phase::Cooldown));

        let status = engine.status().snapshot();
        assert!(status.triggers >= 2, "only {} triggers", status.triggers);
        assert!(status.last_clip.is_some());
        assert!(status.last_record.is_some());
        assert_eq!(status.clock, engine.clock());
    }

    #[test]
    fn test_pause_suppresses_triggers() {
        let mut fixture = fixture(true);
        fixture.settings.session.paused = true;
        let (mut engine, mut tx) = engine(fixture);

        let phases = run(&mut engine, 2.0);
        assert!(phases.iter().all(|p| *p == Phase::Listening));
        assert_eq!(engine.status().snapshot().triggers, 0);
        assert!(engine.status().is_paused());

        tx.send(EngineCommand::SetPaused(false)).unwrap();
        run(&mut engine, 1.0);
        assert!(engine.status().snapshot().triggers > 0);
    }

    #[test]
    fn test_clean_mode_never_plays_unlisted_clips() {
        let mut fixture = fixture(true);
        let catalog = AssetCatalog {
            clean: ContentSet::default().with_allowed(vec![false, true]),
            explicit: fixture.resources.catalog.explicit.clone(),
        };
        fixture.resources.catalog = Arc::new(catalog);
        fixture.settings.session.content_mode = ContentMode::Clean;
        fixture.settings.session.k = 1;
        let (mut engine, _tx) = engine(fixture);

        // The 330 Hz half of the background is closest to clip_one
        let mut buffer = vec![0.0f32; 200];
        for _ in 0..(3 * SR / 200) {
            engine.process(&mut buffer);
            let status = engine.status().snapshot();
            assert_ne!(status.last_clip, Some(0));
        }
        let status = engine.status().snapshot();
        assert!(status.triggers > 0);
        assert_eq!(status.last_clip, Some(1));
    }

    #[test]
    fn test_mode_without_allowed_clips_never_triggers() {
        let mut fixture = fixture(true);
        let catalog = AssetCatalog {
            clean: ContentSet::default().with_allowed(vec![false, false]),
            explicit: fixture.resources.catalog.explicit.clone(),
        };
        fixture.resources.catalog = Arc::new(catalog);
        fixture.settings.session.content_mode = ContentMode::Clean;
        let (mut engine, _tx) = engine(fixture);

        let phases = run(&mut engine, 2.0);
        assert!(!phases.contains(&Phase::Playing));
        assert_eq!(engine.status().snapshot().triggers, 0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let (mut engine, mut tx) = engine(fixture(true));
        run(&mut engine, 4.0);
        let before = engine.status().snapshot();
        assert!(before.triggers > 0);
        assert!(before.progress > 0.9);

        // Commands land at the next boundary; hops are short while listening.
        // Pausing at the same boundary keeps a new trigger from racing the check.
        while engine.phase() != Phase::Listening {
            run(&mut engine, 0.025);
        }
        tx.send(EngineCommand::SetPaused(true)).unwrap();
        tx.send(EngineCommand::ResetEscalation).unwrap();
        run(&mut engine, 0.025);

        let after = engine.status().snapshot();
        assert_eq!(after.triggers, 0);
        assert_eq!(after.substitutions, 0);
        assert!(after.progress < 0.05);
    }

    #[test]
    fn test_session_commands_apply_at_boundaries() {
        let (mut engine, mut tx) = engine(fixture(true));
        tx.send(EngineCommand::SetK(0)).unwrap();
        tx.send(EngineCommand::SetBackgroundGain(0.25)).unwrap();
        run(&mut engine, 0.05);

        let status = engine.status().snapshot();
        assert_eq!(status.session.k, 1);
        assert_eq!(status.session.background_gain, 0.25);
        assert_eq!(engine.session().k, 1);
    }

    #[test]
    fn test_background_loops() {
        let (mut engine, _tx) = engine(fixture(true));
        run(&mut engine, 2.0);
        // 0.6s background
        assert!(engine.status().snapshot().background_loops >= 3);
    }

    #[test]
    fn test_substitutes_late_in_the_arc() {
        let mut fixture = fixture(true);
        fixture.settings.performance_secs = 0.01;
        let (mut engine, _tx) = engine(fixture);
        run(&mut engine, 8.0);

        let status = engine.status().snapshot();
        assert!(status.substitutions > 0);
        assert!(status.substitutions <= status.triggers);
        assert_eq!(status.progress, 1.0);
    }

    #[test]
    fn test_unloaded_clips_skip_to_cooldown() {
        let (mut engine, _tx) = engine(fixture(false));
        let phases = run(&mut engine, 2.0);
        assert!(!phases.contains(&Phase::Playing));
        assert_eq!(engine.status().snapshot().triggers, 0);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let render = || {
            let (mut engine, _tx) = engine(fixture(true));
            let mut out = vec![0.0f32; SR as usize * 3];
            for chunk in out.chunks_mut(333) {
                engine.process(chunk);
            }
            (out, engine.status().snapshot().triggers)
        };
        let (a, triggers_a) = render();
        let (b, triggers_b) = render();
        assert_eq!(triggers_a, triggers_b);
        assert_eq!(a, b);
    }
}
