//! Performance arc: progress and act from elapsed audio-clock time

/// Progress at which act 2 begins
pub const ACT_TWO_START: f32 = 0.25;

/// Progress at which act 3 begins
pub const ACT_THREE_START: f32 = 0.70;

/// Discrete stage of the performance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Act {
    #[default]
    One = 1,
    Two = 2,
    Three = 3,
}

impl Act {
    /// Step function over progress
    pub fn from_progress(progress: f32) -> Self {
        if progress < ACT_TWO_START {
            Act::One
        } else if progress < ACT_THREE_START {
            Act::Two
        } else {
            Act::Three
        }
    }

    /// Convert from the stored u8 (clamps unknown values)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 | 1 => Act::One,
            2 => Act::Two,
            _ => Act::Three,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Act {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "act {}", self.number())
    }
}

/// Start time and length of the performance, in audio-clock samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    start: u64,
    total: u64,
}

impl Escalation {
    /// Begin a performance of `total` samples at clock `now`
    pub fn new(now: u64, total: u64) -> Self {
        Self {
            start: now,
            total: total.max(1),
        }
    }

    /// `clamp((now - start) / total, 0, 1)`
    pub fn progress(&self, now: u64) -> f32 {
        let elapsed = now.saturating_sub(self.start);
        (elapsed as f64 / self.total as f64).clamp(0.0, 1.0) as f32
    }

    pub fn act(&self, now: u64) -> Act {
        Act::from_progress(self.progress(now))
    }

    /// Restart the arc from `now`
    pub fn reset(&mut self, now: u64) {
        self.start = now;
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_act_step_function() {
        assert_eq!(Act::from_progress(0.0), Act::One);
        assert_eq!(Act::from_progress(0.24), Act::One);
        assert_eq!(Act::from_progress(0.25), Act::Two);
        assert_eq!(Act::from_progress(0.69), Act::Two);
        assert_eq!(Act::from_progress(0.70), Act::Three);
        assert_eq!(Act::from_progress(1.0), Act::Three);
    }

    #[test]
    fn test_progress_is_clamped() {
        let arc = Escalation::new(1000, 100);
        assert_eq!(arc.progress(0), 0.0);
        assert_eq!(arc.progress(1000), 0.0);
        assert!((arc.progress(1050) - 0.5).abs() < 1e-6);
        assert_eq!(arc.progress(5000), 1.0);
        assert_eq!(arc.act(1080), Act::Three);
    }

    #[test]
    fn test_reset_restarts_from_now() {
        let mut arc = Escalation::new(0, 100);
        assert_eq!(arc.progress(90), 0.9);
        arc.reset(90);
        assert_eq!(arc.progress(90), 0.0);
        assert_eq!(arc.start(), 90);
        assert_eq!(arc.total(), 100);
    }

    #[test]
    fn test_zero_length_does_not_divide_by_zero() {
        let arc = Escalation::new(0, 0);
        assert_eq!(arc.progress(1), 1.0);
    }

    #[test]
    fn test_act_u8_roundtrip() {
        for act in [Act::One, Act::Two, Act::Three] {
            assert_eq!(Act::from_u8(act.number()), act);
        }
    }
}
