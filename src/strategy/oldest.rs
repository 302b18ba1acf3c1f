// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use crate::inventory::Purpose;
use crate::object::CacheObject;

use super::{DeletionStrategy, SelectionStrategy, SizeAccumulator};

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const DEFAULT_MIN_AGE_MS: i64 = 3_600_000;
const NORMAL_PRIORITY: f64 = 10.0;

/// Scores objects in proportion to their age.
///
/// The score is the object's age in days, weighted by its deletion priority
/// relative to the normal priority of 10.  Objects younger than a minimum
/// age (one hour by default) score 0, keeping freshly cached data from being
/// evicted in a tight churn loop.
#[derive(Debug, Clone)]
pub struct OldestStrategy {
    acc: SizeAccumulator,
    min_age_ms: i64,
}

impl OldestStrategy {
    #[must_use]
    pub fn new(need: i64, size_limit: i64) -> Self {
        Self {
            acc: SizeAccumulator::new(need, size_limit),
            min_age_ms: DEFAULT_MIN_AGE_MS,
        }
    }

    /// Override the minimum age below which objects are never selected.
    #[must_use]
    pub fn with_min_age_ms(mut self, min_age_ms: i64) -> Self {
        self.min_age_ms = min_age_ms.max(0);
        self
    }
}

impl Default for OldestStrategy {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl SelectionStrategy for OldestStrategy {
    fn score(&mut self, obj: &CacheObject) -> f64 {
        let now = crate::now_millis();
        let age = now - obj.metadatum_i64("since", now);
        let score = if age < self.min_age_ms {
            0.0
        } else {
            let priority = obj.metadatum_i64("priority", 10) as f64;
            priority * age as f64 / (MILLIS_PER_DAY * NORMAL_PRIORITY)
        };
        self.acc.observe(obj.size(), score);
        score
    }

    fn purpose(&self) -> Purpose {
        Purpose::ForDeletionByAge
    }

    fn limit_reached(&self) -> bool {
        self.acc.limit_reached()
    }

    fn reset(&mut self) {
        self.acc.reset();
    }
}

impl DeletionStrategy for OldestStrategy {
    fn total_size(&self) -> i64 {
        self.acc.total()
    }

    fn sufficient_size(&self) -> i64 {
        self.acc.sufficient()
    }

    fn new_for_size(&self, need: i64, size_limit: i64) -> Box<dyn DeletionStrategy> {
        Box::new(Self {
            acc: SizeAccumulator::new(need, size_limit),
            min_age_ms: self.min_age_ms,
        })
    }
}
