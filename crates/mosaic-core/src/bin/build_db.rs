//! mosaic-build-db - analyze a clip corpus into a feature database
//!
//! ```text
//! mosaic-build-db [--config <file>] [--out <db>] [--hop <samples>]
//!                 [--frames <n>] <clip-dir | clip-list>
//! ```
//!
//! Clip names are stored relative to the output file's directory when the
//! clips live beneath it, so the player resolves them without a clip root.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use mosaic_core::config::{default_config_path, load_config, MosaicConfig};
use mosaic_core::db::builder::{analyze_corpus, collect_inputs, write_database};

struct Args {
    config: PathBuf,
    out: Option<PathBuf>,
    hop: Option<usize>,
    frames: Option<usize>,
    input: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut config = default_config_path();
    let mut out = None;
    let mut hop = None;
    let mut frames = None;
    let mut input = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = PathBuf::from(args.next().context("--config needs a path")?),
            "--out" => out = Some(PathBuf::from(args.next().context("--out needs a path")?)),
            "--hop" => {
                let value = args.next().context("--hop needs a sample count")?;
                hop = Some(value.parse().with_context(|| format!("bad --hop '{}'", value))?);
            }
            "--frames" => {
                let value = args.next().context("--frames needs a count")?;
                frames = Some(value.parse().with_context(|| format!("bad --frames '{}'", value))?);
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    bail!("only one input directory or list file is accepted");
                }
            }
        }
    }

    Ok(Args {
        config,
        out,
        hop,
        frames,
        input: input.context(
            "usage: mosaic-build-db [--config <file>] [--out <db>] [--hop <samples>] [--frames <n>] <clip-dir | clip-list>",
        )?,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config: MosaicConfig = load_config(&args.config);

    let mut build = config.build_config();
    if let Some(hop) = args.hop {
        build.hop_size = hop;
    }
    if let Some(frames) = args.frames {
        build.frames_per_row = frames;
    }
    if build.hop_size == 0 || build.frames_per_row == 0 {
        bail!("hop size and frames per row must be at least 1");
    }

    let out = args
        .out
        .unwrap_or_else(|| config.assets.database.clone());
    if out.as_os_str().is_empty() {
        bail!("no output path: pass --out or set assets.database in the config");
    }

    let inputs = collect_inputs(&args.input)
        .with_context(|| format!("Failed to read clip inputs from {:?}", args.input))?;
    if inputs.is_empty() {
        bail!("no audio files found in {:?}", args.input);
    }

    log::info!(
        "Analyzing {} files: {}Hz, window {}, hop {}, {} frames per row, dimension {}",
        inputs.len(),
        build.extractor.sample_rate,
        build.extractor.window_size,
        build.hop_size,
        build.frames_per_row,
        build.extractor.dimension()
    );

    let mut analysis = analyze_corpus(&inputs, &build);
    if analysis.clips.is_empty() {
        bail!("none of the {} input files could be analyzed", inputs.len());
    }

    let root = out.parent().unwrap_or_else(|| Path::new("."));
    if let Ok(root) = root.canonicalize() {
        for (name, _) in &mut analysis.clips {
            if let Ok(absolute) = Path::new(name.as_str()).canonicalize() {
                *name = absolute.display().to_string();
            }
        }
        analysis.relativize(&root);
    }

    write_database(&out, &analysis).with_context(|| format!("Failed to write {:?}", out))?;

    if !analysis.skipped.is_empty() {
        log::warn!("{} files were skipped", analysis.skipped.len());
    }
    println!(
        "{}: {} rows from {} clips ({} skipped)",
        out.display(),
        analysis.row_count(),
        analysis.clips.len(),
        analysis.skipped.len()
    );
    Ok(())
}
