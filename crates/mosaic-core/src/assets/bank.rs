//! Preloaded clip audio
//!
//! Every clip the engine can trigger is decoded up front, in parallel, so the
//! audio thread never touches the filesystem. A clip that fails to load is
//! kept as a hole and skipped when it is picked.

use std::sync::Arc;

use rayon::prelude::*;

use super::{AssetCatalog, AssetPaths};
use crate::audio_file::{load_mono, AudioClip};
use crate::db::ClipRegistry;
use crate::types::{ClipId, ContentMode};

/// Decoded clips by id, plus each mode's substitutes by list index
#[derive(Debug, Default)]
pub struct ClipBank {
    real: Vec<Option<Arc<AudioClip>>>,
    clean_substitutes: Vec<Option<Arc<AudioClip>>>,
    explicit_substitutes: Vec<Option<Arc<AudioClip>>>,
}

impl ClipBank {
    /// Build a bank from already decoded clips
    pub fn from_parts(
        real: Vec<Option<Arc<AudioClip>>>,
        clean_substitutes: Vec<Option<Arc<AudioClip>>>,
        explicit_substitutes: Vec<Option<Arc<AudioClip>>>,
    ) -> Self {
        Self {
            real,
            clean_substitutes,
            explicit_substitutes,
        }
    }

    /// Decode every registered clip and every substitute
    pub fn preload(paths: &AssetPaths, registry: &ClipRegistry, catalog: &AssetCatalog) -> Self {
        let names: Vec<&str> = registry.iter().map(|(_, name)| name).collect();
        let real = load_all(paths, &names);
        let clean_substitutes = load_all(
            paths,
            &catalog.clean.substitutes.iter().map(String::as_str).collect::<Vec<_>>(),
        );
        let explicit_substitutes = load_all(
            paths,
            &catalog.explicit.substitutes.iter().map(String::as_str).collect::<Vec<_>>(),
        );

        let bank = Self {
            real,
            clean_substitutes,
            explicit_substitutes,
        };
        log::info!(
            "ClipBank: {}/{} clips, {} clean and {} explicit substitutes loaded",
            bank.loaded_real(),
            bank.real.len(),
            bank.clean_substitutes.iter().flatten().count(),
            bank.explicit_substitutes.iter().flatten().count()
        );
        bank
    }

    /// Audio for a real clip
    pub fn real(&self, clip: ClipId) -> Option<&Arc<AudioClip>> {
        self.real.get(clip).and_then(Option::as_ref)
    }

    /// Audio for a substitute of the given mode
    pub fn substitute(&self, mode: ContentMode, index: usize) -> Option<&Arc<AudioClip>> {
        let list = match mode {
            ContentMode::Clean => &self.clean_substitutes,
            ContentMode::Explicit => &self.explicit_substitutes,
        };
        list.get(index).and_then(Option::as_ref)
    }

    /// Number of real clips that decoded
    pub fn loaded_real(&self) -> usize {
        self.real.iter().flatten().count()
    }

    /// Longest real or substitute clip, in samples
    pub fn longest_clip(&self) -> usize {
        self.real
            .iter()
            .chain(&self.clean_substitutes)
            .chain(&self.explicit_substitutes)
            .flatten()
            .map(|clip| clip.len())
            .max()
            .unwrap_or(0)
    }
}

fn load_all(paths: &AssetPaths, names: &[&str]) -> Vec<Option<Arc<AudioClip>>> {
    names
        .par_iter()
        .map(|name| {
            let path = paths.resolve(name);
            match load_mono(&path) {
                Ok(clip) => Some(Arc::new(clip)),
                Err(e) => {
                    log::warn!("Failed to preload clip {:?}: {}", path, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ContentSet;
    use crate::audio_file::write_wav;

    #[test]
    fn test_preload_keeps_holes_for_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"), &[0.1; 100], 8000).unwrap();
        write_wav(&dir.path().join("a_fake.wav"), &[0.2; 50], 8000).unwrap();

        let mut registry = ClipRegistry::new();
        registry.intern("a.wav");
        registry.intern("missing.wav");

        let catalog = AssetCatalog {
            explicit: ContentSet {
                substitutes: vec!["a_fake.wav".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let paths = AssetPaths {
            database: dir.path().join("db.txt"),
            ..Default::default()
        };

        let bank = ClipBank::preload(&paths, &registry, &catalog);
        assert_eq!(bank.real(0).map(|c| c.len()), Some(100));
        assert!(bank.real(1).is_none());
        assert!(bank.real(7).is_none());
        assert_eq!(bank.substitute(ContentMode::Explicit, 0).map(|c| c.len()), Some(50));
        assert!(bank.substitute(ContentMode::Clean, 0).is_none());
        assert_eq!(bank.loaded_real(), 1);
        assert_eq!(bank.longest_clip(), 100);
    }
}
