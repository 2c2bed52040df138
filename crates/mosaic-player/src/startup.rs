//! Startup validation
//!
//! Loads everything the engine needs, in dependency order, and stops at the
//! first failure with the offending resource named. Nothing here runs once
//! the performance has started.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mosaic_core::assets::{AssetCatalog, ClipBank};
use mosaic_core::audio_file::load_mono;
use mosaic_core::config::MosaicConfig;
use mosaic_core::db::FeatureDatabase;
use mosaic_core::engine::EngineResources;
use mosaic_core::index::NearestNeighborIndex;

/// Load and validate every shared resource
pub fn load_resources(config: &MosaicConfig) -> Result<EngineResources> {
    let assets = &config.assets;
    if assets.database.as_os_str().is_empty() {
        bail!("assets.database is not set");
    }
    if assets.background.as_os_str().is_empty() {
        bail!("assets.background is not set");
    }

    let database = FeatureDatabase::load(&assets.database)
        .with_context(|| format!("Failed to load feature database {:?}", assets.database))?;
    database
        .ensure_dimension(config.analysis.dimension())
        .with_context(|| format!("Feature database {:?} was built with different analysis settings", assets.database))?;

    let index = NearestNeighborIndex::from_database(&database)
        .context("Failed to build the nearest-neighbor index")?;
    log::info!("Index ready: {} vectors, dimension {}", index.len(), index.dimension());

    let catalog = AssetCatalog::load(assets, database.clips()).context("Failed to load asset lists")?;

    let bank = ClipBank::preload(assets, database.clips(), &catalog);
    if bank.loaded_real() == 0 {
        bail!(
            "none of the {} clips in {:?} could be decoded (clip root {:?})",
            database.clips().len(),
            assets.database,
            assets.clip_root()
        );
    }

    let background = load_mono(&assets.background)
        .with_context(|| format!("Failed to load background track {:?}", assets.background))?;
    log::info!(
        "Background: {:.1}s at {}Hz",
        background.duration_secs(),
        background.sample_rate
    );

    Ok(EngineResources {
        database: Arc::new(database),
        index: Arc::new(index),
        catalog: Arc::new(catalog),
        bank: Arc::new(bank),
        background: Arc::new(background),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::audio_file::write_wav;
    use mosaic_core::db::write_row;
    use mosaic_core::features::ExtractorConfig;
    use std::path::Path;

    fn small_extractor() -> ExtractorConfig {
        ExtractorConfig {
            sample_rate: 8000,
            window_size: 256,
            num_mfcc: 8,
            num_mel_bands: 16,
        }
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.07).sin() * 0.3).collect()
    }

    fn write_db(path: &Path, dimension: usize) {
        let mut out = Vec::new();
        write_row(&mut out, "a.wav", 0.0, &vec![0.5; dimension]).unwrap();
        write_row(&mut out, "b.wav", 0.0, &vec![1.5; dimension]).unwrap();
        std::fs::write(path, out).unwrap();
    }

    fn fixture(dir: &Path, dimension: usize) -> MosaicConfig {
        write_db(&dir.join("features.db"), dimension);
        write_wav(&dir.join("a.wav"), &tone(2000), 8000).unwrap();
        write_wav(&dir.join("b.wav"), &tone(3000), 8000).unwrap();
        write_wav(&dir.join("bed.wav"), &tone(16000), 8000).unwrap();

        let mut config = MosaicConfig::default();
        config.analysis = small_extractor();
        config.assets.database = dir.join("features.db");
        config.assets.background = dir.join("bed.wav");
        config
    }

    #[test]
    fn test_loads_valid_resources() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path(), small_extractor().dimension());

        let resources = load_resources(&config).unwrap();
        assert_eq!(resources.database.len(), 2);
        assert_eq!(resources.index.len(), 2);
        assert_eq!(resources.bank.loaded_real(), 2);
        assert_eq!(resources.background.len(), 16000);
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path(), 10);

        let err = load_resources(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("10"));
    }

    #[test]
    fn test_missing_background_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture(dir.path(), small_extractor().dimension());
        config.assets.background = dir.path().join("nope.wav");

        let err = load_resources(&config).unwrap_err();
        assert!(format!("{}", err).contains("background"));
    }

    #[test]
    fn test_unset_database_is_fatal() {
        let err = load_resources(&MosaicConfig::default()).unwrap_err();
        assert!(err.to_string().contains("assets.database"));
    }
}
