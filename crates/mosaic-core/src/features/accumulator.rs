//! Running average of feature frames

/// Accumulates feature frames and produces their element-wise mean
///
/// Sums are kept in `f64` so long listen windows don't lose precision.
/// Storage is allocated once; pushing and averaging never allocate.
#[derive(Debug, Clone)]
pub struct FeatureAccumulator {
    sums: Vec<f64>,
    count: usize,
}

impl FeatureAccumulator {
    /// Create an accumulator for vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            sums: vec![0.0; dimension],
            count: 0,
        }
    }

    /// Dimension of accumulated vectors
    pub fn dimension(&self) -> usize {
        self.sums.len()
    }

    /// Number of frames accumulated since the last clear
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether no frames have been accumulated
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add one frame (extra trailing values are ignored, missing ones count as 0)
    pub fn push(&mut self, frame: &[f32]) {
        for (sum, &v) in self.sums.iter_mut().zip(frame) {
            *sum += v as f64;
        }
        self.count += 1;
    }

    /// Write the mean into `out`
    ///
    /// Returns false (and leaves `out` untouched) when nothing was accumulated.
    pub fn mean_into(&self, out: &mut [f32]) -> bool {
        if self.count == 0 {
            return false;
        }
        let n = self.count as f64;
        for (dst, &sum) in out.iter_mut().zip(&self.sums) {
            *dst = (sum / n) as f32;
        }
        true
    }

    /// Mean as a new vector, or None when empty
    pub fn mean(&self) -> Option<Vec<f32>> {
        let mut out = vec![0.0; self.sums.len()];
        self.mean_into(&mut out).then_some(out)
    }

    /// Reset to empty
    pub fn clear(&mut self) {
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        self.count = 0;
    }
}
