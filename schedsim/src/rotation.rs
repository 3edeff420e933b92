//! Deterministic block durations.

use crate::config::BlockTicks;

/// Cycles through an inclusive range of block durations
///
/// Stands in for a random draw so that runs are reproducible: with the
/// default range the sequence is `3, 4, 5, 3, 4, 5, ...`. A range given
/// as `max < min` is read the other way round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRotation {
    min: u64,
    span: u64,
    next: u64,
}

impl BlockRotation {
    /// Creates a rotation starting at the low end of `ticks`
    pub fn new(ticks: BlockTicks) -> Self {
        Self::with_offset(ticks, 0)
    }

    /// Creates a rotation starting `offset` steps into the cycle
    pub fn with_offset(ticks: BlockTicks, offset: u64) -> Self {
        let min = ticks.min.min(ticks.max);
        let max = ticks.min.max(ticks.max);
        let span = (max - min).saturating_add(1);
        Self {
            min,
            span,
            next: offset % span,
        }
    }

    /// Returns the next duration
    pub fn next_duration(&mut self) -> u64 {
        let duration = self.min.saturating_add(self.next);
        self.next = (self.next + 1) % self.span;
        duration
    }
}

impl Default for BlockRotation {
    fn default() -> Self {
        Self::new(BlockTicks::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cycle() {
        let mut rotation = BlockRotation::default();
        let durations: Vec<u64> = (0..7).map(|_| rotation.next_duration()).collect();
        assert_eq!(durations, vec![3, 4, 5, 3, 4, 5, 3]);
    }

    #[test]
    fn test_offset() {
        let mut rotation = BlockRotation::with_offset(BlockTicks::default(), 4);
        assert_eq!(rotation.next_duration(), 4);
    }

    #[test]
    fn test_single_value_range() {
        let mut rotation = BlockRotation::new(BlockTicks { min: 2, max: 2 });
        assert_eq!(rotation.next_duration(), 2);
        assert_eq!(rotation.next_duration(), 2);
    }

    #[test]
    fn test_inverted_range() {
        let mut rotation = BlockRotation::new(BlockTicks { min: 6, max: 4 });
        assert_eq!(rotation.next_duration(), 4);
        assert_eq!(rotation.next_duration(), 5);
        assert_eq!(rotation.next_duration(), 6);
    }
}
