//! mosaic-player - live audio mosaic performance
//!
//! ```text
//! mosaic-player [--config <file>] [--seed <n>] [--device <name>]
//! mosaic-player [--config <file>] [--seed <n>] --render <secs> <out.wav> [--script <file>]
//! mosaic-player --list-devices
//! ```
//!
//! Live mode plays through the configured output device and takes console
//! commands on stdin until `quit` or end of input. Render mode runs the same
//! engine on a virtual clock and writes a mono WAV.

mod console;
mod render;
mod startup;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use mosaic_core::audio::{output_device_names, start_output};
use mosaic_core::audio_file::write_wav;
use mosaic_core::config::{default_config_path, load_config, MosaicConfig};
use mosaic_core::engine::{command_channel, CommandSender, MosaicEngine};

use console::{handle_line, spawn_stdin_reader, Flow, StatusFormatter, HELP};

/// How often the live console prints a status line
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    seed: Option<u64>,
    device: Option<String>,
    render: Option<(f32, PathBuf)>,
    script: Option<PathBuf>,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                parsed.config = Some(PathBuf::from(args.next().context("--config needs a path")?))
            }
            "--seed" => {
                let value = args.next().context("--seed needs a number")?;
                parsed.seed = Some(value.parse().with_context(|| format!("bad --seed '{}'", value))?);
            }
            "--device" => parsed.device = Some(args.next().context("--device needs a name")?),
            "--render" => {
                let secs = args.next().context("--render needs <secs> <out.wav>")?;
                let secs: f32 = secs
                    .parse()
                    .ok()
                    .filter(|s: &f32| s.is_finite() && *s > 0.0)
                    .with_context(|| format!("bad --render duration '{}'", secs))?;
                let out = args.next().context("--render needs <secs> <out.wav>")?;
                parsed.render = Some((secs, PathBuf::from(out)));
            }
            "--script" => {
                parsed.script = Some(PathBuf::from(args.next().context("--script needs a path")?))
            }
            "--list-devices" => parsed.list_devices = true,
            other => bail!("unknown argument '{}'", other),
        }
    }
    if parsed.script.is_some() && parsed.render.is_none() {
        bail!("--script only applies to --render");
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    if args.list_devices {
        for name in output_device_names().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    // Clip preloading is the only heavy parallel work; name the threads so
    // they are recognizable next to the audio thread
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-load-{}", i))
        .build_global()
    {
        log::warn!("Rayon thread pool already initialized: {}", e);
    }

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config: MosaicConfig = load_config(&config_path);
    if let Some(seed) = args.seed {
        config.performance.seed = Some(seed);
    }
    if let Some(device) = &args.device {
        config.audio.device = Some(device.clone());
    }

    log::info!("mosaic-player starting up");
    let resources = startup::load_resources(&config)?;

    match &args.render {
        Some((secs, out)) => run_offline(&config, resources, *secs, out, args.script.as_deref()),
        None => run_live(&config, resources),
    }
}

fn run_live(config: &MosaicConfig, resources: mosaic_core::engine::EngineResources) -> Result<()> {
    let (producer, consumer) = command_channel();
    let mut sender = CommandSender::new(producer);
    let settings = config.engine_settings();
    let database = resources.database.clone();
    let catalog = resources.catalog.clone();

    let handle = start_output(&config.audio, config.analysis.sample_rate, move |sample_rate| {
        MosaicEngine::new(sample_rate, resources, settings, consumer)
    })
    .context("Failed to start audio output")?;

    let status = handle.status();
    let formatter = StatusFormatter::new(
        database,
        catalog,
        handle.sample_rate(),
        config.analysis.sample_rate,
    );

    println!(
        "Performing: {:.0}s arc at {}Hz (~{:.1}ms latency)",
        config.performance.total_secs,
        handle.sample_rate(),
        handle.latency_ms()
    );
    println!("{}", HELP);

    let lines = spawn_stdin_reader()?;
    let ticker = crossbeam::channel::tick(STATUS_INTERVAL);
    loop {
        crossbeam::select! {
            recv(lines) -> line => match line {
                Ok(line) => {
                    if handle_line(&line, &mut sender, &formatter, &status) == Flow::Quit {
                        break;
                    }
                }
                Err(_) => {
                    log::info!("Console input closed");
                    break;
                }
            },
            recv(ticker) -> _ => println!("{}", formatter.line(&status.snapshot())),
        }
    }

    println!("{}", formatter.detail(&status.snapshot()));
    drop(handle);
    log::info!("mosaic-player stopped");
    Ok(())
}

fn run_offline(
    config: &MosaicConfig,
    resources: mosaic_core::engine::EngineResources,
    secs: f32,
    out: &std::path::Path,
    script: Option<&std::path::Path>,
) -> Result<()> {
    let sample_rate = config.audio.sample_rate.unwrap_or(config.analysis.sample_rate);
    let script = match script {
        Some(path) => render::load_script(path, sample_rate)?,
        None => Vec::new(),
    };

    let (producer, consumer) = command_channel();
    let mut sender = CommandSender::new(producer);
    let formatter = StatusFormatter::new(
        resources.database.clone(),
        resources.catalog.clone(),
        sample_rate,
        config.analysis.sample_rate,
    );
    let mut engine = MosaicEngine::new(sample_rate, resources, config.engine_settings(), consumer)
        .context("Failed to create engine")?;

    log::info!("Rendering {:.1}s at {}Hz to {:?}", secs, sample_rate, out);
    let samples = render::render(&mut engine, &mut sender, &formatter, secs, &script);

    write_wav(out, &samples, sample_rate).with_context(|| format!("Failed to write {:?}", out))?;
    println!("{}", formatter.detail(&engine.status().snapshot()));
    println!(
        "Wrote {:.1}s to {}",
        samples.len() as f32 / sample_rate as f32,
        out.display()
    );
    Ok(())
}
