//! Feature database
//!
//! A flat, line-oriented table of analysis windows:
//!
//! ```text
//! <clip-file> <window-offset-seconds> <feature_0> <feature_1> ... <feature_{N-1}>
//! ```
//!
//! One line per record, space separated, blank lines ignored. Record ids are
//! the 0-based position of the line among non-blank lines. The database is
//! built offline by [`builder`] and loaded once at startup; it is immutable
//! afterwards and shared with `Arc`.

pub mod builder;
mod registry;

pub use registry::ClipRegistry;

use std::io::Write;
use std::path::Path;

use crate::types::{ClipId, RecordId};

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to read feature database {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Feature database contains no data")]
    NoData,

    #[error("Malformed feature database at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error(
        "Feature dimension mismatch: database has {database} features per record, \
         extractor produces {extractor}"
    )]
    DimensionMismatch { database: usize, extractor: usize },
}

/// One analysis window of one clip
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRecord {
    /// Owning clip
    pub clip: ClipId,
    /// Window start within the clip, in seconds
    pub offset_secs: f32,
    /// Feature vector (dimension N)
    pub features: Vec<f32>,
}

/// Loaded feature database
#[derive(Debug, Clone)]
pub struct FeatureDatabase {
    dimension: usize,
    records: Vec<DatabaseRecord>,
    clips: ClipRegistry,
}

impl FeatureDatabase {
    /// Load and parse a database file
    pub fn load(path: &Path) -> Result<Self, DbError> {
        log::info!("FeatureDatabase: loading {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|source| DbError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let db = Self::parse(&contents)?;
        log::info!(
            "FeatureDatabase: {} records, {} clips, dimension {}",
            db.len(),
            db.clips.len(),
            db.dimension
        );
        Ok(db)
    }

    /// Parse database text
    ///
    /// The first pass sizes the table and fixes the dimension from the first
    /// non-blank line; the second pass fills records and interns clip names.
    pub fn parse(contents: &str) -> Result<Self, DbError> {
        let mut count = 0usize;
        let mut first_tokens = None;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if first_tokens.is_none() {
                first_tokens = Some(line.split_whitespace().count());
            }
            count += 1;
        }

        let tokens = first_tokens.ok_or(DbError::NoData)?;
        if tokens < 3 {
            return Err(DbError::Malformed {
                line: 1,
                reason: format!("expected clip, offset and at least one feature, got {} columns", tokens),
            });
        }
        let dimension = tokens - 2;

        let mut records = Vec::with_capacity(count);
        let mut clips = ClipRegistry::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = |reason: String| DbError::Malformed {
                line: line_no + 1,
                reason,
            };

            let mut fields = line.split_whitespace();
            let (Some(clip_name), Some(offset)) = (fields.next(), fields.next()) else {
                return Err(malformed("missing clip or offset column".to_string()));
            };
            let offset_secs: f32 = offset
                .parse()
                .map_err(|_| malformed(format!("bad offset '{}'", offset)))?;

            let mut features = Vec::with_capacity(dimension);
            for field in fields {
                let value: f32 = field
                    .parse()
                    .map_err(|_| malformed(format!("bad feature value '{}'", field)))?;
                features.push(value);
            }
            if features.len() != dimension {
                return Err(malformed(format!(
                    "expected {} features, found {}",
                    dimension,
                    features.len()
                )));
            }

            let clip = clips.intern(clip_name);
            records.push(DatabaseRecord {
                clip,
                offset_secs,
                features,
            });
        }

        Ok(Self {
            dimension,
            records,
            clips,
        })
    }

    /// Fail unless the database dimension equals the extractor's
    pub fn ensure_dimension(&self, extractor_dimension: usize) -> Result<(), DbError> {
        if self.dimension != extractor_dimension {
            return Err(DbError::DimensionMismatch {
                database: self.dimension,
                extractor: extractor_dimension,
            });
        }
        Ok(())
    }

    /// Feature dimension N
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the database has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record by id
    pub fn record(&self, id: RecordId) -> Option<&DatabaseRecord> {
        self.records.get(id)
    }

    /// All records in id order
    pub fn records(&self) -> &[DatabaseRecord] {
        &self.records
    }

    /// The clip identity registry
    pub fn clips(&self) -> &ClipRegistry {
        &self.clips
    }

    /// Source file name of a record's clip
    pub fn clip_name(&self, id: RecordId) -> Option<&str> {
        self.record(id).and_then(|r| self.clips.name(r.clip))
    }
}

/// Write one database row
///
/// Floats use Rust's shortest round-trip formatting, so a reload reproduces
/// the exact values.
pub fn write_row<W: Write>(
    writer: &mut W,
    clip: &str,
    offset_secs: f32,
    features: &[f32],
) -> std::io::Result<()> {
    write!(writer, "{} {}", clip, offset_secs)?;
    for value in features {
        write!(writer, " {}", value)?;
    }
    writeln!(writer)
}
