//! Progressive-fill pip model for one ordinal stat.
//!
//! # Invariants
//! - `value <= pips` at all times.
//! - Pip `i` (1-based) is filled iff `i <= value`.
//! - Clicking the last filled pip clears the stat; clicking any other pip
//!   fills up to and including it.

/// Pip state of one stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotGrid {
    pips: u8,
    value: u8,
}

impl DotGrid {
    /// Creates a grid with `value` clamped into `0..=pips`.
    pub fn new(pips: u8, value: u8) -> Self {
        Self {
            pips,
            value: value.min(pips),
        }
    }

    pub fn pips(&self) -> u8 {
        self.pips
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn is_filled(&self, pip: u8) -> bool {
        pip >= 1 && pip <= self.value
    }

    /// Value the grid would hold after clicking `pip`, or `None` when the
    /// pip is out of range.
    pub fn value_after_click(&self, pip: u8) -> Option<u8> {
        if pip == 0 || pip > self.pips {
            return None;
        }
        if self.value == pip {
            Some(0)
        } else {
            Some(pip)
        }
    }

    /// Applies one click and returns the new value.
    ///
    /// Out-of-range pips leave the grid unchanged.
    pub fn click(&mut self, pip: u8) -> u8 {
        if let Some(next) = self.value_after_click(pip) {
            self.value = next;
        }
        self.value
    }

    /// Minimal click sequence that moves this grid to `target`.
    ///
    /// `target` is clamped into range first.
    pub fn clicks_to(&self, target: u8) -> Vec<u8> {
        let target = target.min(self.pips);
        if target == self.value {
            Vec::new()
        } else if target == 0 {
            vec![self.value]
        } else {
            vec![target]
        }
    }

    /// Moves to `target` by replaying the minimal click sequence.
    pub fn set_value(&mut self, target: u8) -> u8 {
        for pip in self.clicks_to(target) {
            self.click(pip);
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::DotGrid;
    use proptest::prelude::*;

    #[test]
    fn clicking_unfilled_pip_fills_up_to_it() {
        let mut grid = DotGrid::new(6, 2);
        assert_eq!(grid.click(5), 5);
        assert!(grid.is_filled(5));
        assert!(!grid.is_filled(6));
    }

    #[test]
    fn clicking_filled_pip_below_value_unfills_beyond_it() {
        let mut grid = DotGrid::new(6, 5);
        assert_eq!(grid.click(3), 3);
    }

    #[test]
    fn clicking_last_filled_pip_clears_whole_stat() {
        let mut grid = DotGrid::new(4, 3);
        assert_eq!(grid.click(3), 0);
        assert!(!grid.is_filled(1));
    }

    #[test]
    fn out_of_range_click_is_ignored() {
        let mut grid = DotGrid::new(4, 2);
        assert_eq!(grid.click(0), 2);
        assert_eq!(grid.click(5), 2);
    }

    #[test]
    fn clicks_to_is_minimal() {
        let grid = DotGrid::new(5, 3);
        assert!(grid.clicks_to(3).is_empty());
        assert_eq!(grid.clicks_to(0), vec![3]);
        assert_eq!(grid.clicks_to(1), vec![1]);
        assert_eq!(grid.clicks_to(9), vec![5]);
    }

    proptest! {
        #[test]
        fn last_click_decides_value(pips in 1u8..=8, start in 0u8..=8, clicks in prop::collection::vec(1u8..=8, 1..20)) {
            let mut grid = DotGrid::new(pips, start);
            for pip in clicks.iter().copied().filter(|pip| *pip <= pips) {
                let before = grid.value();
                let after = grid.click(pip);
                if before == pip {
                    prop_assert_eq!(after, 0);
                } else {
                    prop_assert_eq!(after, pip);
                }
                prop_assert!(after <= pips);
            }
        }

        #[test]
        fn set_value_matches_click_replay(pips in 1u8..=8, start in 0u8..=8, target in 0u8..=8) {
            let mut direct = DotGrid::new(pips, start);
            let mut replayed = direct;
            for pip in replayed.clicks_to(target) {
                replayed.click(pip);
            }
            direct.set_value(target);
            prop_assert_eq!(direct, replayed);
            prop_assert_eq!(direct.value(), target.min(pips));
        }
    }
}
