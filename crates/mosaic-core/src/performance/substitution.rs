//! Deepfake substitution policy
//!
//! Decides, per trigger, whether a matched real clip is swapped for its
//! lookalike. The chance grows with the performance arc.

use rand::Rng;

use super::escalation::{ACT_THREE_START, ACT_TWO_START};

/// Probability reached at the end of act 2
pub const ACT_TWO_MAX_PROBABILITY: f32 = 0.8;

/// Fixed probability throughout act 3
pub const ACT_THREE_PROBABILITY: f32 = 0.9;

/// Substitution probability at `progress`
///
/// Zero in act 1 and whenever there is nothing to substitute with.
pub fn substitution_probability(progress: f32, has_substitutes: bool) -> f32 {
    if !has_substitutes {
        return 0.0;
    }
    let progress = progress.clamp(0.0, 1.0);
    if progress < ACT_TWO_START {
        0.0
    } else if progress < ACT_THREE_START {
        let t = (progress - ACT_TWO_START) / (ACT_THREE_START - ACT_TWO_START);
        t * ACT_TWO_MAX_PROBABILITY
    } else {
        ACT_THREE_PROBABILITY
    }
}

/// Outcome of one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substitution {
    /// Roll failed; play the real clip
    Original,
    /// Play this substitute (index into the active substitute list)
    Substitute(usize),
    /// Roll succeeded but no substitute exists for the clip
    FellBack,
}

impl Substitution {
    /// Whether a substitute is actually played
    pub fn used_deepfake(&self) -> bool {
        matches!(self, Substitution::Substitute(_))
    }

    pub fn substitute(&self) -> Option<usize> {
        match self {
            Substitution::Substitute(index) => Some(*index),
            _ => None,
        }
    }
}

/// Roll for substitution and resolve the substitute
///
/// `lookup` is only consulted on a successful roll.
pub fn decide<R, F>(rng: &mut R, progress: f32, active_len: usize, lookup: F) -> Substitution
where
    R: Rng + ?Sized,
    F: FnOnce() -> Option<usize>,
{
    let probability = substitution_probability(progress, active_len > 0);
    if probability <= 0.0 || rng.gen::<f32>() >= probability {
        return Substitution::Original;
    }
    match lookup() {
        Some(index) => Substitution::Substitute(index),
        None => Substitution::FellBack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn count_substitutions(progress: f32, trials: usize) -> usize {
        let mut rng = SmallRng::seed_from_u64(7);
        (0..trials)
            .filter(|_| decide(&mut rng, progress, 3, || Some(0)).used_deepfake())
            .count()
    }

    #[test]
    fn test_never_substitutes_in_act_one() {
        assert_eq!(count_substitutions(0.1, 1000), 0);
    }

    #[test]
    fn test_act_three_rate() {
        let hits = count_substitutions(0.9, 1000);
        assert!((850..=950).contains(&hits), "got {}", hits);
    }

    #[test]
    fn test_probability_shape() {
        assert_eq!(substitution_probability(0.0, true), 0.0);
        assert_eq!(substitution_probability(0.24, true), 0.0);
        assert_eq!(substitution_probability(0.25, true), 0.0);
        assert_eq!(substitution_probability(0.7, true), 0.9);
        assert_eq!(substitution_probability(1.0, true), 0.9);

        let mut last = 0.0;
        for i in 0..=100 {
            let p = 0.25 + 0.4499 * i as f32 / 100.0;
            let prob = substitution_probability(p, true);
            assert!(prob >= last);
            assert!(prob <= ACT_TWO_MAX_PROBABILITY);
            last = prob;
        }
        assert!(last > 0.79);
    }

    #[test]
    fn test_empty_list_never_substitutes() {
        for p in [0.0, 0.3, 0.5, 0.8, 1.0] {
            assert_eq!(substitution_probability(p, false), 0.0);
        }
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(decide(&mut rng, 1.0, 0, || Some(0)), Substitution::Original);
        }
    }

    #[test]
    fn test_missing_substitute_falls_back() {
        let mut rng = SmallRng::seed_from_u64(3);
        let outcomes: Vec<_> = (0..200).map(|_| decide(&mut rng, 1.0, 2, || None)).collect();
        assert!(outcomes.iter().all(|o| !o.used_deepfake()));
        assert!(outcomes.contains(&Substitution::FellBack));
    }
}
