//! Offline rendering
//!
//! Drives the engine from the main thread on a virtual clock instead of a
//! device callback. With a fixed seed the output is reproducible, which makes
//! this the way to audition a whole performance arc quickly.
//!
//! An optional script schedules console commands on the virtual clock, one per
//! line as `<seconds> <command>`:
//!
//! ```text
//! 30   k 8
//! 90   clean on
//! 240  pause
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use mosaic_core::engine::{CommandSender, EngineStatus, MosaicEngine};
use mosaic_core::types::{secs_to_samples, Sample};

use crate::console::{dispatch, parse_line, ConsoleInput, Flow, StatusFormatter};

/// Samples rendered per engine call
pub const RENDER_BLOCK: usize = 512;

/// A console input due at a point on the virtual clock
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledInput {
    pub at_samples: u64,
    pub input: ConsoleInput,
}

/// Parse a command script, sorted by time (stable for equal times)
pub fn parse_script(text: &str, sample_rate: u32) -> Result<Vec<ScheduledInput>> {
    let mut script = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (time, command) = line
            .split_once(char::is_whitespace)
            .with_context(|| format!("line {}: expected '<seconds> <command>'", line_no + 1))?;
        let secs: f32 = time
            .parse()
            .ok()
            .filter(|s: &f32| s.is_finite() && *s >= 0.0)
            .with_context(|| format!("line {}: bad time '{}'", line_no + 1, time))?;
        let Some(input) = parse_line(command).with_context(|| format!("line {}", line_no + 1))?
        else {
            bail!("line {}: missing command", line_no + 1);
        };
        script.push(ScheduledInput {
            at_samples: secs_to_samples(secs, sample_rate),
            input,
        });
    }
    script.sort_by_key(|s| s.at_samples);
    Ok(script)
}

pub fn load_script(path: &Path, sample_rate: u32) -> Result<Vec<ScheduledInput>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read command script {:?}", path))?;
    parse_script(&text, sample_rate).with_context(|| format!("Invalid command script {:?}", path))
}

/// Render `secs` seconds, printing a status line every simulated second
///
/// Stops early at a scripted `quit`.
pub fn render(
    engine: &mut MosaicEngine,
    sender: &mut CommandSender,
    formatter: &StatusFormatter,
    secs: f32,
    script: &[ScheduledInput],
) -> Vec<Sample> {
    let sample_rate = engine.sample_rate();
    let total = secs_to_samples(secs, sample_rate);
    let status = engine.status();

    let mut out: Vec<Sample> = Vec::with_capacity(total as usize);
    let mut block = vec![0.0; RENDER_BLOCK];
    let mut pending = script.iter().peekable();
    let mut next_report = sample_rate as u64;
    let mut clock = 0u64;

    'render: while clock < total {
        while let Some(scheduled) = pending.peek() {
            if scheduled.at_samples > clock {
                break;
            }
            if dispatch(scheduled.input, sender, formatter, &status) == Flow::Quit {
                log::info!("Scripted quit at {:.2}s", clock as f64 / sample_rate as f64);
                break 'render;
            }
            pending.next();
        }

        let mut until = total.min(next_report);
        if let Some(scheduled) = pending.peek() {
            until = until.min(scheduled.at_samples);
        }
        let n = ((until - clock) as usize).clamp(1, RENDER_BLOCK);

        engine.process(&mut block[..n]);
        out.extend_from_slice(&block[..n]);
        clock += n as u64;

        if clock >= next_report {
            report(formatter, &status);
            next_report += sample_rate as u64;
        }
    }
    out
}

fn report(formatter: &StatusFormatter, status: &EngineStatus) {
    println!("{}", formatter.line(&status.snapshot()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::audio_file::write_wav;
    use mosaic_core::config::MosaicConfig;
    use mosaic_core::db::write_row;
    use mosaic_core::engine::{command_channel, EngineCommand};
    use mosaic_core::features::ExtractorConfig;

    const SR: u32 = 8000;

    fn tone(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin() * 0.3)
            .collect()
    }

    /// Engine over a two-clip corpus in `dir`, plus its queue and formatter
    fn engine_in(dir: &Path) -> (MosaicEngine, CommandSender, StatusFormatter) {
        let extractor = ExtractorConfig {
            sample_rate: SR,
            window_size: 256,
            num_mfcc: 8,
            num_mel_bands: 16,
        };
        let mut db = Vec::new();
        write_row(&mut db, "a.wav", 0.0, &vec![0.5; extractor.dimension()]).unwrap();
        write_row(&mut db, "b.wav", 0.0, &vec![1.5; extractor.dimension()]).unwrap();
        std::fs::write(dir.join("features.db"), db).unwrap();
        write_wav(&dir.join("a.wav"), &tone(330.0, 2000), SR).unwrap();
        write_wav(&dir.join("b.wav"), &tone(990.0, 3000), SR).unwrap();
        write_wav(&dir.join("bed.wav"), &tone(440.0, 16000), SR).unwrap();

        let mut config = MosaicConfig::default();
        config.analysis = extractor;
        config.assets.database = dir.join("features.db");
        config.assets.background = dir.join("bed.wav");
        config.session.listen_secs = 0.1;
        config.session.cooldown_secs = 0.05;
        config.performance.seed = Some(1);

        let resources = crate::startup::load_resources(&config).unwrap();
        let formatter = StatusFormatter::new(
            resources.database.clone(),
            resources.catalog.clone(),
            SR,
            SR,
        );
        let (producer, consumer) = command_channel();
        let engine = MosaicEngine::new(SR, resources, config.engine_settings(), consumer).unwrap();
        (engine, CommandSender::new(producer), formatter)
    }

    #[test]
    fn test_parse_script_sorts_and_converts() {
        let text = "# warm up\n\n10 pause\n2.5  k 4\n10 resume\n";
        let script = parse_script(text, 1000).unwrap();

        assert_eq!(script.len(), 3);
        assert_eq!(script[0].at_samples, 2500);
        assert_eq!(script[0].input, ConsoleInput::Command(EngineCommand::SetK(4)));
        assert_eq!(
            script[1].input,
            ConsoleInput::Command(EngineCommand::SetPaused(true))
        );
        assert_eq!(
            script[2].input,
            ConsoleInput::Command(EngineCommand::SetPaused(false))
        );
    }

    #[test]
    fn test_parse_script_rejects_bad_lines() {
        assert!(parse_script("soon pause\n", 1000).is_err());
        assert!(parse_script("-1 pause\n", 1000).is_err());
        assert!(parse_script("3 jump\n", 1000).is_err());
        assert!(parse_script("3\n", 1000).is_err());
    }

    #[test]
    fn test_scripted_commands_reach_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, mut sender, formatter) = engine_in(dir.path());
        let script = parse_script("0 pause\n0.3 k 4\n", SR).unwrap();

        let out = render(&mut engine, &mut sender, &formatter, 1.5, &script);
        assert_eq!(out.len(), 12000);

        let status = engine.status().snapshot();
        assert!(status.session.paused);
        assert_eq!(status.session.k, 4);
        assert_eq!(status.triggers, 0);
    }

    #[test]
    fn test_scripted_quit_stops_on_its_sample() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, mut sender, formatter) = engine_in(dir.path());
        let script = parse_script("0.3 quit\n", SR).unwrap();

        let out = render(&mut engine, &mut sender, &formatter, 2.0, &script);
        assert_eq!(out.len(), 2400);
        assert_eq!(engine.clock(), 2400);
    }

    #[test]
    fn test_render_without_script_runs_full_length() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, mut sender, formatter) = engine_in(dir.path());

        let out = render(&mut engine, &mut sender, &formatter, 1.0, &[]);
        assert_eq!(out.len(), SR as usize);
        assert!(out.iter().any(|s| *s != 0.0));
    }
}
