//! Exact nearest-neighbor search over feature vectors
//!
//! The database holds tens to low hundreds of records, so a flat scan over
//! contiguous storage is both exact and fast enough for the audio thread.
//! Distances are compared squared; ordering is identical to Euclidean.

use crate::db::FeatureDatabase;
use crate::types::RecordId;

/// Index errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("Cannot train an index on zero vectors")]
    Empty,

    #[error("Got {vectors} vectors but {ids} ids")]
    LengthMismatch { vectors: usize, ids: usize },

    #[error("Vector dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// A scored search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: RecordId,
    /// Squared Euclidean distance to the query
    pub distance_sq: f32,
}

/// Flat exact k-NN index
#[derive(Debug, Clone)]
pub struct NearestNeighborIndex {
    dimension: usize,
    /// Row-major `len x dimension`
    data: Vec<f32>,
    ids: Vec<RecordId>,
}

impl NearestNeighborIndex {
    /// Train over `vectors` with parallel `ids`
    pub fn train(vectors: &[&[f32]], ids: &[RecordId]) -> Result<Self, IndexError> {
        if vectors.len() != ids.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                ids: ids.len(),
            });
        }
        let first = vectors.first().ok_or(IndexError::Empty)?;
        let dimension = first.len();

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for v in vectors {
            if v.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    found: v.len(),
                });
            }
            data.extend_from_slice(v);
        }

        Ok(Self {
            dimension,
            data,
            ids: ids.to_vec(),
        })
    }

    /// Train over every record of a database, ids `0..len`
    pub fn from_database(db: &FeatureDatabase) -> Result<Self, IndexError> {
        let vectors: Vec<&[f32]> = db.records().iter().map(|r| r.features.as_slice()).collect();
        let ids: Vec<RecordId> = (0..vectors.len()).collect();
        Self::train(&vectors, &ids)
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The `k` nearest ids, nearest first
    ///
    /// `k` is clamped to at least 1; asking for more than `len()` returns all.
    /// Equal distances order by lowest id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RecordId>, IndexError> {
        let mut scratch = Vec::with_capacity(self.len());
        let mut results = Vec::with_capacity(k.clamp(1, self.len().max(1)));
        self.search_into(query, k, &mut scratch, &mut results)?;
        Ok(results)
    }

    /// Allocation-free search once `scratch` and `results` have capacity
    ///
    /// `scratch` should hold `len()` entries and `results` `k` entries; both
    /// are cleared before use.
    pub fn search_into(
        &self,
        query: &[f32],
        k: usize,
        scratch: &mut Vec<Neighbor>,
        results: &mut Vec<RecordId>,
    ) -> Result<(), IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        scratch.clear();
        results.clear();

        for (row, &id) in self.data.chunks_exact(self.dimension).zip(&self.ids) {
            let distance_sq = row
                .iter()
                .zip(query)
                .map(|(a, b)| {
                    let d = a - b;
                    d * d
                })
                .sum::<f32>();
            scratch.push(Neighbor { id, distance_sq });
        }

        let k = k.max(1).min(scratch.len());
        let by_distance = |a: &Neighbor, b: &Neighbor| {
            a.distance_sq
                .total_cmp(&b.distance_sq)
                .then_with(|| a.id.cmp(&b.id))
        };

        if k < scratch.len() {
            scratch.select_nth_unstable_by(k - 1, by_distance);
            scratch.truncate(k);
        }
        scratch.sort_unstable_by(by_distance);

        results.extend(scratch.iter().map(|n| n.id));
        Ok(())
    }
}
