//! mosaic-db-inspect - summarize a feature database
//!
//! ```text
//! mosaic-db-inspect [--config <file>] [--rows <n>] [<db>]
//! ```
//!
//! Prints record, clip and dimension counts, the per-dimension value range,
//! and checks the dimension against the configured extractor.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mosaic_core::config::{default_config_path, load_config, MosaicConfig};
use mosaic_core::db::FeatureDatabase;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let mut config_path = default_config_path();
    let mut rows = 5usize;
    let mut db_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = PathBuf::from(args.next().context("--config needs a path")?)
            }
            "--rows" => {
                let value = args.next().context("--rows needs a count")?;
                rows = value.parse().with_context(|| format!("bad --rows '{}'", value))?;
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => db_path = Some(PathBuf::from(other)),
        }
    }

    let config: MosaicConfig = load_config(&config_path);
    let db_path = db_path.unwrap_or_else(|| config.assets.database.clone());
    if db_path.as_os_str().is_empty() {
        bail!("usage: mosaic-db-inspect [--config <file>] [--rows <n>] <db>");
    }

    let db = FeatureDatabase::load(&db_path)
        .with_context(|| format!("Failed to load feature database {:?}", db_path))?;

    println!("database:  {}", db_path.display());
    println!("records:   {}", db.len());
    println!("clips:     {}", db.clips().len());
    println!("dimension: {}", db.dimension());

    let mut min = vec![f32::INFINITY; db.dimension()];
    let mut max = vec![f32::NEG_INFINITY; db.dimension()];
    for record in db.records() {
        for (i, &value) in record.features.iter().enumerate() {
            min[i] = min[i].min(value);
            max[i] = max[i].max(value);
        }
    }
    for (i, (lo, hi)) in min.iter().zip(&max).enumerate() {
        println!("  f{:<3} [{:>12.5}, {:>12.5}]", i, lo, hi);
    }

    for id in 0..rows.min(db.len()) {
        if let Some(record) = db.record(id) {
            println!(
                "#{:<6} {} @ {:.3}s",
                id,
                db.clip_name(id).unwrap_or("?"),
                record.offset_secs
            );
        }
    }

    let expected = config.analysis.dimension();
    match db.ensure_dimension(expected) {
        Ok(()) => println!("extractor dimension {} matches", expected),
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
