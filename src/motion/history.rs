use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 3;
pub const DEFAULT_MOTION_PERSISTENCE: usize = 2;

/// Bounded FIFO of per-tick motion flags.
///
/// Invariant: `len() <= capacity()`. The oldest entry is evicted first.
#[derive(Clone, Debug)]
pub struct MotionHistory {
    entries: VecDeque<bool>,
    capacity: usize,
}

impl MotionHistory {
    /// Create an empty history. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one tick, evicting the oldest entry at capacity.
    pub fn push(&mut self, has_motion: bool) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(has_motion);
    }

    /// Number of ticks with motion currently in the window.
    pub fn motion_count(&self) -> usize {
        self.entries.iter().filter(|&&m| m).count()
    }

    /// Fraction of the recorded entries that saw motion. Zero when empty.
    pub fn ratio(&self) -> f32 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.motion_count() as f32 / self.entries.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.entries.iter().copied()
    }
}

impl Default for MotionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Debounce settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Rolling window length in ticks.
    pub history_len: usize,
    /// Motion ticks required within the window.
    pub min_motion_ticks: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            history_len: DEFAULT_HISTORY_CAPACITY,
            min_motion_ticks: DEFAULT_MOTION_PERSISTENCE,
        }
    }
}

/// Rolling-window gate that rejects single-frame flicker.
///
/// Until the window fills, the requirement is judged over the entries seen so
/// far: at most `history.len()` motion ticks are required.
#[derive(Clone, Debug)]
pub struct PersistenceFilter {
    history: MotionHistory,
    min_motion_ticks: usize,
}

impl PersistenceFilter {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            history: MotionHistory::new(config.history_len),
            min_motion_ticks: config.min_motion_ticks,
        }
    }

    /// Record this tick and report whether motion has persisted.
    pub fn push(&mut self, has_motion: bool) -> bool {
        self.history.push(has_motion);
        self.is_persistent()
    }

    pub fn is_persistent(&self) -> bool {
        let required = self.required_ticks();
        required > 0 && self.history.motion_count() >= required
    }

    /// Motion ticks needed to pass with the current window fill.
    pub fn required_ticks(&self) -> usize {
        self.min_motion_ticks.min(self.history.len())
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }
}

impl Default for PersistenceFilter {
    fn default() -> Self {
        Self::new(&PersistenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_after(ticks: &[bool]) -> (PersistenceFilter, bool) {
        let mut filter = PersistenceFilter::default();
        let mut last = false;
        for &tick in ticks {
            last = filter.push(tick);
        }
        (filter, last)
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let mut history = MotionHistory::new(3);
        for i in 0..10 {
            history.push(i % 2 == 0);
            assert!(history.len() <= 3);
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = MotionHistory::new(3);
        for tick in [true, false, false, true] {
            history.push(tick);
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![false, false, true]);
    }

    #[test]
    fn two_of_three_is_persistent() {
        let (filter, persistent) = filter_after(&[true, true, false]);
        assert!(persistent);
        assert_eq!(filter.history().motion_count(), 2);
    }

    #[test]
    fn one_of_three_is_not_persistent() {
        let (_, persistent) = filter_after(&[true, false, false]);
        assert!(!persistent);
    }

    #[test]
    fn single_flicker_is_forgotten_after_window() {
        let (_, persistent) = filter_after(&[true, false, false, false, true]);
        assert!(!persistent);
    }

    #[test]
    fn startup_judges_available_entries() {
        let (filter, persistent) = filter_after(&[true]);
        assert!(persistent);
        assert_eq!(filter.required_ticks(), 1);
        assert!((filter.history().ratio() - 1.0).abs() < f32::EPSILON);

        let (_, persistent) = filter_after(&[false]);
        assert!(!persistent);

        let (filter, persistent) = filter_after(&[false, true]);
        assert!(!persistent);
        assert_eq!(filter.required_ticks(), 2);
        assert!((filter.history().ratio() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_history_is_not_persistent() {
        let filter = PersistenceFilter::default();
        assert!(!filter.is_persistent());
        assert_eq!(filter.history().ratio(), 0.0);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = MotionHistory::new(0);
        history.push(true);
        history.push(false);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![false]);
    }
}
