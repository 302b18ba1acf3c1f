use crate::inventory::Purpose;
use crate::object::CacheObject;

use super::{DeletionStrategy, SelectionStrategy, SizeAccumulator};

const DEFAULT_SIZE_NORM: f64 = 5.0e8;

/// Scores objects in proportion to their size.
///
/// Favors clearing the most space with the fewest deletions.  Sizes are
/// normalized against half a gigabyte so scores stay in a humane range.
#[derive(Debug, Clone)]
pub struct BySizeStrategy {
    acc: SizeAccumulator,
    size_norm: f64,
}

impl BySizeStrategy {
    #[must_use]
    pub fn new(need: i64, size_limit: i64) -> Self {
        Self {
            acc: SizeAccumulator::new(need, size_limit),
            size_norm: DEFAULT_SIZE_NORM,
        }
    }
}

impl Default for BySizeStrategy {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl SelectionStrategy for BySizeStrategy {
    fn score(&mut self, obj: &CacheObject) -> f64 {
        let size = obj.size();
        let score = if size > 0 {
            size as f64 / self.size_norm
        } else {
            0.0
        };
        self.acc.observe(size, score);
        score
    }

    fn purpose(&self) -> Purpose {
        Purpose::ForDeletionBySize
    }

    fn limit_reached(&self) -> bool {
        self.acc.limit_reached()
    }

    fn reset(&mut self) {
        self.acc.reset();
    }
}

impl DeletionStrategy for BySizeStrategy {
    fn total_size(&self) -> i64 {
        self.acc.total()
    }

    fn sufficient_size(&self) -> i64 {
        self.acc.sufficient()
    }

    fn new_for_size(&self, need: i64, size_limit: i64) -> Box<dyn DeletionStrategy> {
        Box::new(Self {
            acc: SizeAccumulator::new(need, size_limit),
            size_norm: self.size_norm,
        })
    }
}
