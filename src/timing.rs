use std::time::Duration;

/// The resolver's timing constants as one value, so tests can inject shorter
/// or longer windows.
#[derive(Debug, Clone, Copy)]
pub struct TimingPolicy {
    /// How long an incomplete chord prefix may keep events buffered, measured
    /// from its first press. A complete chord whose keys are all still held
    /// is exempt.
    pub combo_window: Duration,
    /// A chord key released sooner than this after the completing press means
    /// two keys brushed past each other mid-word, not a chord.
    pub min_overlap: Duration,
}

impl Default for TimingPolicy {
    fn default() -> TimingPolicy {
        TimingPolicy {
            combo_window: Duration::from_millis(50),
            min_overlap: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let timing = TimingPolicy::default();
        assert_eq!(timing.combo_window, Duration::from_millis(50));
        assert_eq!(timing.min_overlap, Duration::from_millis(1));
    }
}
