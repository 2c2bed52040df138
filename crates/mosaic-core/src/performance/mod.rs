//! Time-driven performance policy
//!
//! The escalation arc turns audio-clock time into progress and an act; the
//! substitution policy and the sequencer's rate rules read both.

pub mod escalation;
pub mod substitution;

pub use escalation::{Act, Escalation, ACT_THREE_START, ACT_TWO_START};
pub use substitution::{decide, substitution_probability, Substitution};

use rand::Rng;

/// Progress after which picks favor the closer half of the results
pub const TIGHT_PICK_PROGRESS: f32 = 0.5;

/// Choose one of `count` ranked search results
///
/// Early on any result is fair game; later only the closer half (rounded
/// down, never below the first) is eligible.
pub fn pick_result<R: Rng + ?Sized>(rng: &mut R, progress: f32, count: usize) -> usize {
    if count <= 1 {
        return 0;
    }
    let pool = if progress < TIGHT_PICK_PROGRESS {
        count
    } else {
        count / 2
    };
    if pool <= 1 {
        0
    } else {
        rng.gen_range(0..pool)
    }
}

/// Rate jitter in act 2
pub const ACT_TWO_JITTER: f32 = 0.03;
/// Rate jitter in act 2 when a substitute plays
pub const ACT_TWO_SUBSTITUTE_JITTER: f32 = 0.08;
/// Chance of reversing in act 3
pub const ACT_THREE_REVERSE_CHANCE: f64 = 0.25;

/// Playback rate for a trigger, sign gives direction
pub fn playback_rate<R: Rng + ?Sized>(rng: &mut R, progress: f32, substituted: bool) -> f32 {
    match Act::from_progress(progress) {
        Act::One => 1.0,
        Act::Two => {
            let jitter = if substituted {
                ACT_TWO_SUBSTITUTE_JITTER
            } else {
                ACT_TWO_JITTER
            };
            1.0 + rng.gen_range(-jitter..=jitter)
        }
        Act::Three => {
            let rate = 1.0 + 0.5 * progress.clamp(0.0, 1.0);
            if rng.gen_bool(ACT_THREE_REVERSE_CHANCE) {
                -rate
            } else {
                rate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_pick_uses_all_results_early() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut seen = [false; 6];
        for _ in 0..500 {
            seen[pick_result(&mut rng, 0.2, 6)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_pick_closer_half_late() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..500 {
            assert!(pick_result(&mut rng, 0.8, 6) < 3);
            assert!(pick_result(&mut rng, 0.8, 5) < 2);
        }
        // K = 1 and K = 2 late always take the best match
        assert_eq!(pick_result(&mut rng, 0.9, 1), 0);
        assert_eq!(pick_result(&mut rng, 0.9, 2), 0);
        assert_eq!(pick_result(&mut rng, 0.9, 3), 0);
        assert_eq!(pick_result(&mut rng, 0.9, 0), 0);
    }

    #[test]
    fn test_rates_by_act() {
        let mut rng = SmallRng::seed_from_u64(5);
        assert_eq!(playback_rate(&mut rng, 0.1, true), 1.0);

        for _ in 0..200 {
            let r = playback_rate(&mut rng, 0.5, false);
            assert!((r - 1.0).abs() <= ACT_TWO_JITTER + 1e-6);
            let r = playback_rate(&mut rng, 0.5, true);
            assert!((r - 1.0).abs() <= ACT_TWO_SUBSTITUTE_JITTER + 1e-6);
        }

        let mut reversed = 0;
        for _ in 0..400 {
            let r = playback_rate(&mut rng, 0.8, false);
            assert!((r.abs() - 1.4).abs() < 1e-6);
            if r < 0.0 {
                reversed += 1;
            }
        }
        assert!((50..=150).contains(&reversed), "got {}", reversed);
    }
}
