//! Asset resolution
//!
//! Everything the engine needs besides the feature database, resolved once at
//! startup into lookup tables:
//!
//! - clip lists (real clips, clean and explicit)
//! - substitute ("deepfake") lists and the clip → substitute map
//! - lyric tables parallel to the clip lists
//! - the preloaded audio of every clip that can be triggered ([`bank`])
//!
//! Optional assets that are missing disable their feature with a warning.
//! Malformed ones (mismatched lengths, unusable names) are fatal.

pub mod bank;

pub use bank::ClipBank;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::ClipRegistry;
use crate::types::{ClipId, ContentMode};

/// Asset errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot derive a base name from clip identity '{0}'")]
    UnparseableIdentity(String),

    #[error("{lyrics} has {lyric_count} lines but {clips} lists {clip_count} clips")]
    LengthMismatch {
        lyrics: String,
        lyric_count: usize,
        clips: String,
        clip_count: usize,
    },
}

/// Locations of the performance assets
///
/// Relative clip paths (in the database and in the lists) resolve against
/// `clip_root`, or the database's directory when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    pub database: PathBuf,
    pub background: PathBuf,
    pub clip_root: Option<PathBuf>,
    pub clips: Option<PathBuf>,
    pub clips_clean: Option<PathBuf>,
    pub lyrics: Option<PathBuf>,
    pub lyrics_clean: Option<PathBuf>,
    pub deepfakes: Option<PathBuf>,
    pub deepfakes_clean: Option<PathBuf>,
}

impl AssetPaths {
    /// Directory clip identities are relative to
    pub fn clip_root(&self) -> PathBuf {
        match &self.clip_root {
            Some(root) => root.clone(),
            None => self
                .database
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Resolve a clip path against the clip root
    pub fn resolve(&self, clip: &str) -> PathBuf {
        let path = Path::new(clip);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.clip_root().join(path)
        }
    }
}

/// Read a list file: one entry per line, surrounding whitespace and blank
/// lines dropped
pub fn read_list(path: &Path) -> Result<Vec<String>, AssetError> {
    let contents = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// File stem of a clip identity
///
/// Strips the directory, the extension, and a trailing window suffix
/// (`#<n>` or `@<offset>`), so `clips/001_a_b_p003.wav#3` becomes
/// `001_a_b_p003`. Lyrics and content lists are keyed by this.
pub fn clip_stem(identity: &str) -> Result<String, AssetError> {
    let file = identity
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(identity);

    let mut name = strip_window_suffix(file);
    if let Some(dot) = name.rfind('.') {
        if dot > 0 {
            name = &name[..dot];
        }
    }
    let name = strip_window_suffix(name);

    if name.is_empty() || name.starts_with('.') {
        return Err(AssetError::UnparseableIdentity(identity.to_string()));
    }
    Ok(name.to_string())
}

/// Base name of a clip identity
///
/// The stem with a trailing phrase suffix (`_p<digits>`) removed, so every
/// phrase cut from one song shares `001_a_b`.
pub fn base_name(identity: &str) -> Result<String, AssetError> {
    let stem = clip_stem(identity)?;
    let base = strip_phrase_suffix(&stem);
    if base.is_empty() {
        return Err(AssetError::UnparseableIdentity(identity.to_string()));
    }
    Ok(base.to_string())
}

fn strip_window_suffix(name: &str) -> &str {
    match name.rfind(['#', '@']) {
        Some(pos)
            if pos + 1 < name.len()
                && name[pos + 1..]
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '.') =>
        {
            &name[..pos]
        }
        _ => name,
    }
}

fn strip_phrase_suffix(name: &str) -> &str {
    match name.rfind("_p") {
        Some(pos)
            if pos + 2 < name.len() && name[pos + 2..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &name[..pos]
        }
        _ => name,
    }
}

/// Clip → first matching substitute, built once
///
/// A substitute rendered from the same phrase (its path contains the clip's
/// stem) is preferred; otherwise the first one containing the clip's base
/// name, i.e. any phrase of the same song.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepfakeMap {
    by_clip: Vec<Option<usize>>,
}

impl DeepfakeMap {
    /// Scan `substitutes` for every clip in `registry`
    pub fn build(substitutes: &[String], registry: &ClipRegistry) -> Result<Self, AssetError> {
        let mut by_clip = Vec::with_capacity(registry.len());
        for (_, name) in registry.iter() {
            let stem = clip_stem(name)?;
            let base = base_name(name)?;
            let found = substitutes
                .iter()
                .position(|s| s.contains(&stem))
                .or_else(|| substitutes.iter().position(|s| s.contains(&base)));
            by_clip.push(found);
        }
        Ok(Self { by_clip })
    }

    /// Substitute index for a clip
    pub fn lookup(&self, clip: ClipId) -> Option<usize> {
        self.by_clip.get(clip).copied().flatten()
    }

    /// Number of clips that have a substitute
    pub fn covered(&self) -> usize {
        self.by_clip.iter().filter(|s| s.is_some()).count()
    }
}

/// Lyric lines keyed by clip stem, one per phrase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTable {
    by_name: HashMap<String, String>,
}

impl LyricTable {
    /// Pair a clip list with a lyric list of the same length
    pub fn from_lists(clips: &[String], lyrics: &[String]) -> Result<Self, AssetError> {
        if clips.len() != lyrics.len() {
            return Err(AssetError::LengthMismatch {
                lyrics: "lyrics".to_string(),
                lyric_count: lyrics.len(),
                clips: "clip list".to_string(),
                clip_count: clips.len(),
            });
        }
        let mut by_name = HashMap::with_capacity(clips.len());
        for (clip, line) in clips.iter().zip(lyrics) {
            by_name.entry(clip_stem(clip)?).or_insert_with(|| line.clone());
        }
        Ok(Self { by_name })
    }

    /// Load both files and pair them
    pub fn load(clip_list: &Path, lyric_file: &Path) -> Result<Self, AssetError> {
        let clips = read_list(clip_list)?;
        let lyrics = read_list(lyric_file)?;
        Self::from_lists(&clips, &lyrics).map_err(|e| match e {
            AssetError::LengthMismatch {
                lyric_count,
                clip_count,
                ..
            } => AssetError::LengthMismatch {
                lyrics: lyric_file.display().to_string(),
                lyric_count,
                clips: clip_list.display().to_string(),
                clip_count,
            },
            other => other,
        })
    }

    /// Lyric for a clip identity
    pub fn lookup(&self, identity: &str) -> Option<&str> {
        let stem = clip_stem(identity).ok()?;
        self.by_name.get(&stem).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Assets for one content mode
#[derive(Debug, Clone, Default)]
pub struct ContentSet {
    /// Clips allowed in this mode, by id (`None`: all)
    allowed: Option<Vec<bool>>,
    /// Active substitute paths
    pub substitutes: Vec<String>,
    pub deepfakes: DeepfakeMap,
    pub lyrics: Option<LyricTable>,
}

impl ContentSet {
    /// All clips allowed, substitutes mapped against `registry`, no lyrics
    pub fn with_substitutes(
        substitutes: Vec<String>,
        registry: &ClipRegistry,
    ) -> Result<Self, AssetError> {
        let deepfakes = DeepfakeMap::build(&substitutes, registry)?;
        Ok(Self {
            allowed: None,
            substitutes,
            deepfakes,
            lyrics: None,
        })
    }

    /// Restrict the mode to the clips flagged in `allowed`, indexed by id
    pub fn with_allowed(mut self, allowed: Vec<bool>) -> Self {
        self.allowed = Some(allowed);
        self
    }

    /// Whether a matched clip may play in this mode
    pub fn allows(&self, clip: ClipId) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.get(clip).copied().unwrap_or(false),
            None => true,
        }
    }

    /// Substitute for a clip, as an index into `substitutes`
    pub fn substitute_for(&self, clip: ClipId) -> Option<usize> {
        self.deepfakes.lookup(clip)
    }
}

/// All content, both modes
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    pub clean: ContentSet,
    pub explicit: ContentSet,
}

impl AssetCatalog {
    /// Resolve every optional list named in `paths`
    pub fn load(paths: &AssetPaths, registry: &ClipRegistry) -> Result<Self, AssetError> {
        Ok(Self {
            clean: load_content_set(
                "clean",
                paths.clips_clean.as_deref(),
                paths.lyrics_clean.as_deref(),
                paths.deepfakes_clean.as_deref(),
                registry,
            )?,
            explicit: load_content_set(
                "explicit",
                paths.clips.as_deref(),
                paths.lyrics.as_deref(),
                paths.deepfakes.as_deref(),
                registry,
            )?,
        })
    }

    /// Content for a mode
    pub fn for_mode(&self, mode: ContentMode) -> &ContentSet {
        match mode {
            ContentMode::Clean => &self.clean,
            ContentMode::Explicit => &self.explicit,
        }
    }
}

/// Read an optional list; a configured but missing file only warns
fn optional_list(label: &str, path: Option<&Path>) -> Result<Option<Vec<String>>, AssetError> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        log::warn!("{} list {:?} not found, feature disabled", label, path);
        return Ok(None);
    }
    read_list(path).map(Some)
}

fn load_content_set(
    mode: &str,
    clips: Option<&Path>,
    lyrics: Option<&Path>,
    deepfakes: Option<&Path>,
    registry: &ClipRegistry,
) -> Result<ContentSet, AssetError> {
    let clip_list = optional_list(&format!("{} clip", mode), clips)?;

    let allowed = clip_list.as_ref().map(|list| {
        let stems: Vec<String> = list.iter().filter_map(|c| clip_stem(c).ok()).collect();
        registry
            .iter()
            .map(|(_, name)| {
                clip_stem(name)
                    .map(|b| stems.iter().any(|x| *x == b))
                    .unwrap_or(false)
            })
            .collect::<Vec<bool>>()
    });

    let substitutes = optional_list(&format!("{} deepfake", mode), deepfakes)?.unwrap_or_default();
    let deepfakes = DeepfakeMap::build(&substitutes, registry)?;

    let lyrics = match (clip_list.as_ref(), optional_list(&format!("{} lyric", mode), lyrics)?) {
        (Some(clip_list), Some(lines)) => {
            let table = LyricTable::from_lists(clip_list, &lines).map_err(|e| match e {
                AssetError::LengthMismatch {
                    lyric_count,
                    clip_count,
                    ..
                } => AssetError::LengthMismatch {
                    lyrics: format!("{} lyrics", mode),
                    lyric_count,
                    clips: format!("{} clip list", mode),
                    clip_count,
                },
                other => other,
            })?;
            Some(table)
        }
        (None, Some(_)) => {
            log::warn!("{} lyrics configured without a clip list, lyrics disabled", mode);
            None
        }
        _ => None,
    };

    log::info!(
        "Assets ({}): {} substitutes covering {} clips, lyrics {}",
        mode,
        substitutes.len(),
        deepfakes.covered(),
        if lyrics.is_some() { "on" } else { "off" }
    );

    Ok(ContentSet {
        allowed,
        substitutes,
        deepfakes,
        lyrics,
    })
}
