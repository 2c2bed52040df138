//! Console presentation task
//!
//! Reads operator commands from stdin on its own thread and renders the
//! engine status as one line of text. It never touches engine state
//! directly: commands go through the engine's queue, status comes from
//! seqlock snapshots.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::{self, Receiver};
use mosaic_core::assets::AssetCatalog;
use mosaic_core::db::FeatureDatabase;
use mosaic_core::engine::{CommandSender, EngineCommand, EngineStatus, Phase, StatusSnapshot};
use mosaic_core::types::{samples_to_secs, ContentMode};

pub const HELP: &str = "commands: listen <s> | cooldown <s> | k <n> | bg <gain> | clip <gain> | \
clean on|off | pause | resume | reset | status | quit";

/// One parsed console line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleInput {
    Command(EngineCommand),
    Status,
    Help,
    Quit,
}

/// Parse one line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        bail!("too many arguments");
    }

    let input = match word.to_ascii_lowercase().as_str() {
        "listen" => ConsoleInput::Command(EngineCommand::SetListenSecs(number(word, arg)?)),
        "cooldown" => ConsoleInput::Command(EngineCommand::SetCooldownSecs(number(word, arg)?)),
        "k" => ConsoleInput::Command(EngineCommand::SetK(number(word, arg)?)),
        "bg" => ConsoleInput::Command(EngineCommand::SetBackgroundGain(number(word, arg)?)),
        "clip" => ConsoleInput::Command(EngineCommand::SetClipGain(number(word, arg)?)),
        "clean" => {
            let clean = match arg.map(str::to_ascii_lowercase).as_deref() {
                Some("on") => true,
                Some("off") => false,
                _ => bail!("usage: clean on|off"),
            };
            ConsoleInput::Command(EngineCommand::SetContentMode(ContentMode::from_clean_flag(clean)))
        }
        "pause" => ConsoleInput::Command(EngineCommand::SetPaused(true)),
        "resume" => ConsoleInput::Command(EngineCommand::SetPaused(false)),
        "reset" => ConsoleInput::Command(EngineCommand::ResetEscalation),
        "status" => ConsoleInput::Status,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" => ConsoleInput::Quit,
        other => bail!("unknown command '{}'", other),
    };

    let takes_arg = matches!(
        input,
        ConsoleInput::Command(
            EngineCommand::SetListenSecs(_)
                | EngineCommand::SetCooldownSecs(_)
                | EngineCommand::SetK(_)
                | EngineCommand::SetBackgroundGain(_)
                | EngineCommand::SetClipGain(_)
                | EngineCommand::SetContentMode(_)
        )
    );
    if !takes_arg && arg.is_some() {
        bail!("'{}' takes no argument", word);
    }
    Ok(Some(input))
}

fn number<T: std::str::FromStr>(word: &str, arg: Option<&str>) -> Result<T> {
    let arg = arg.ok_or_else(|| anyhow!("usage: {} <value>", word))?;
    arg.parse()
        .map_err(|_| anyhow!("'{}' is not a valid value for {}", arg, word))
}

/// Whether the session continues after an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Act on one parsed input
///
/// Engine commands are queued; the engine applies them at its next boundary.
pub fn dispatch(
    input: ConsoleInput,
    sender: &mut CommandSender,
    formatter: &StatusFormatter,
    status: &EngineStatus,
) -> Flow {
    match input {
        ConsoleInput::Command(cmd) => {
            if let Err(cmd) = sender.send(cmd) {
                println!("command queue full, dropped {:?}", cmd);
            } else {
                log::debug!("queued {:?}", cmd);
            }
        }
        ConsoleInput::Status => println!("{}", formatter.detail(&status.snapshot())),
        ConsoleInput::Help => println!("{}", HELP),
        ConsoleInput::Quit => return Flow::Quit,
    }
    Flow::Continue
}

/// Parse and dispatch one raw line, reporting parse errors to the operator
pub fn handle_line(
    line: &str,
    sender: &mut CommandSender,
    formatter: &StatusFormatter,
    status: &EngineStatus,
) -> Flow {
    match parse_line(line) {
        Ok(Some(input)) => dispatch(input, sender, formatter, status),
        Ok(None) => Flow::Continue,
        Err(e) => {
            println!("{} ({})", e, HELP);
            Flow::Continue
        }
    }
}

/// Forward stdin lines over a channel; the channel disconnects at EOF
pub fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    std::thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn console thread")?;
    Ok(rx)
}

/// Turns status snapshots into text, resolving ids against the loaded assets
pub struct StatusFormatter {
    database: Arc<FeatureDatabase>,
    catalog: Arc<AssetCatalog>,
    sample_rate: u32,
    /// Background positions are counted at the analysis rate
    analysis_rate: u32,
}

impl StatusFormatter {
    pub fn new(
        database: Arc<FeatureDatabase>,
        catalog: Arc<AssetCatalog>,
        sample_rate: u32,
        analysis_rate: u32,
    ) -> Self {
        Self {
            database,
            catalog,
            sample_rate,
            analysis_rate,
        }
    }

    /// One-line summary, printed once per second
    pub fn line(&self, s: &StatusSnapshot) -> String {
        let secs = samples_to_secs(s.clock, self.sample_rate);
        let mut line = format!(
            "[{:02}:{:02}] {} {:>3.0}% {:<9} {} trig {} sub {} | bg {:.2}",
            (secs / 60.0) as u32,
            (secs % 60.0) as u32,
            s.act,
            s.progress * 100.0,
            if s.session.paused { "paused" } else { s.phase.name() },
            s.session.content_mode.name(),
            s.triggers,
            s.substitutions,
            s.background_gain,
        );

        if let Some(clip) = self.last_clip_name(s) {
            line.push_str(&format!(" | {} @{:+.2}", clip, s.last_rate));
            if s.used_deepfake {
                if let Some(sub) = self.last_substitute_name(s) {
                    line.push_str(&format!(" -> {}", sub));
                }
            }
            if s.phase == Phase::Playing {
                if let Some(lyric) = self.last_lyric(s) {
                    line.push_str(&format!(" \"{}\"", lyric));
                }
            }
        }
        line
    }

    /// Multi-line dump for the `status` command
    pub fn detail(&self, s: &StatusSnapshot) -> String {
        let session = &s.session;
        let bg_pos = samples_to_secs(s.background_position, self.analysis_rate);
        let bg_len = samples_to_secs(s.background_len, self.analysis_rate);
        format!(
            "clock      {:.2}s\n\
             arc        {} ({:.1}%), phase {}\n\
             triggers   {} ({} substituted)\n\
             last       {}{}\n\
             background {:.1}/{:.1}s, pass {}, gain {:.2}\n\
             session    listen {:.2}s, cooldown {:.2}s, k {}, bg {:.2}, clip {:.2}, {}{}",
            samples_to_secs(s.clock, self.sample_rate),
            s.act,
            s.progress * 100.0,
            s.phase.name(),
            s.triggers,
            s.substitutions,
            self.last_clip_name(s).unwrap_or("-"),
            match (s.used_deepfake, self.last_substitute_name(s)) {
                (true, Some(sub)) => format!(" (substituted by {})", sub),
                _ => String::new(),
            },
            bg_pos,
            bg_len,
            s.background_loops + 1,
            s.background_gain,
            session.listen_secs,
            session.cooldown_secs,
            session.k,
            session.background_gain,
            session.clip_gain,
            session.content_mode.name(),
            if session.paused { ", paused" } else { "" },
        )
    }

    fn last_clip_name(&self, s: &StatusSnapshot) -> Option<&str> {
        s.last_record.and_then(|id| self.database.clip_name(id))
    }

    fn last_substitute_name(&self, s: &StatusSnapshot) -> Option<&str> {
        let index = s.last_substitute?;
        self.catalog
            .for_mode(s.last_mode)
            .substitutes
            .get(index)
            .map(String::as_str)
    }

    fn last_lyric(&self, s: &StatusSnapshot) -> Option<&str> {
        let clip = self.last_clip_name(s)?;
        self.catalog.for_mode(s.last_mode).lyrics.as_ref()?.lookup(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::assets::{ContentSet, LyricTable};
    use mosaic_core::engine::SessionConfig;
    use mosaic_core::performance::Act;

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(
            parse_line("listen 1.5").unwrap(),
            Some(ConsoleInput::Command(EngineCommand::SetListenSecs(1.5)))
        );
        assert_eq!(
            parse_line("  K 7 ").unwrap(),
            Some(ConsoleInput::Command(EngineCommand::SetK(7)))
        );
        assert_eq!(
            parse_line("bg 0.25").unwrap(),
            Some(ConsoleInput::Command(EngineCommand::SetBackgroundGain(0.25)))
        );
        assert_eq!(
            parse_line("clean on").unwrap(),
            Some(ConsoleInput::Command(EngineCommand::SetContentMode(ContentMode::Clean)))
        );
        assert_eq!(
            parse_line("clean OFF").unwrap(),
            Some(ConsoleInput::Command(EngineCommand::SetContentMode(ContentMode::Explicit)))
        );
        assert_eq!(
            parse_line("reset").unwrap(),
            Some(ConsoleInput::Command(EngineCommand::ResetEscalation))
        );
        assert_eq!(parse_line("status").unwrap(), Some(ConsoleInput::Status));
        assert_eq!(parse_line("quit").unwrap(), Some(ConsoleInput::Quit));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_handle_line_queues_commands() {
        let (producer, mut consumer) = mosaic_core::engine::command_channel();
        let mut sender = CommandSender::new(producer);
        let status = EngineStatus::new(&StatusSnapshot::default());
        let formatter = formatter();

        assert_eq!(handle_line("k 3", &mut sender, &formatter, &status), Flow::Continue);
        assert_eq!(handle_line("nonsense", &mut sender, &formatter, &status), Flow::Continue);
        assert_eq!(handle_line("pause", &mut sender, &formatter, &status), Flow::Continue);
        assert_eq!(handle_line("quit", &mut sender, &formatter, &status), Flow::Quit);

        assert_eq!(consumer.pop(), Ok(EngineCommand::SetK(3)));
        assert_eq!(consumer.pop(), Ok(EngineCommand::SetPaused(true)));
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_line("k").is_err());
        assert!(parse_line("k -1").is_err());
        assert!(parse_line("listen soon").is_err());
        assert!(parse_line("clean maybe").is_err());
        assert!(parse_line("pause now").is_err());
        assert!(parse_line("bg 1 2").is_err());
        assert!(parse_line("louder").is_err());
    }

    fn formatter() -> StatusFormatter {
        let db = FeatureDatabase::parse("clips/rap_01.wav 0 1 2\nclips/rap_02.wav 0 3 4\n").unwrap();
        let substitutes = vec!["fakes/rap_02_fake.wav".to_string()];
        let mut explicit = ContentSet::with_substitutes(substitutes, db.clips()).unwrap();
        explicit.lyrics = Some(
            LyricTable::from_lists(
                &["rap_01.wav".to_string(), "rap_02.wav".to_string()],
                &["first line".to_string(), "second line".to_string()],
            )
            .unwrap(),
        );
        let catalog = AssetCatalog {
            clean: ContentSet::default(),
            explicit,
        };
        StatusFormatter::new(Arc::new(db), Arc::new(catalog), 8000, 8000)
    }

    #[test]
    fn test_status_line_resolves_names() {
        let status = StatusSnapshot {
            clock: 8000 * 75,
            progress: 0.8,
            act: Act::Three,
            phase: Phase::Playing,
            triggers: 12,
            substitutions: 4,
            last_record: Some(1),
            last_clip: Some(1),
            last_substitute: Some(0),
            last_mode: ContentMode::Explicit,
            used_deepfake: true,
            last_rate: -1.25,
            session: SessionConfig::default(),
            ..Default::default()
        };

        let line = formatter().line(&status);
        assert!(line.starts_with("[01:15] act 3  80%"), "{}", line);
        assert!(line.contains("trig 12 sub 4"));
        assert!(line.contains("clips/rap_02.wav @-1.25"));
        assert!(line.contains("-> fakes/rap_02_fake.wav"));
        assert!(line.contains("\"second line\""));
    }

    #[test]
    fn test_status_line_before_first_trigger() {
        let mut status = StatusSnapshot::default();
        status.session.paused = true;

        let line = formatter().line(&status);
        assert!(line.contains("paused"));
        assert!(!line.contains('@'));

        let detail = formatter().detail(&status);
        assert!(detail.contains("last       -"));
        assert!(detail.contains(", paused"));
    }
}
