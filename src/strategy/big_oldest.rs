// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use crate::inventory::Purpose;
use crate::object::CacheObject;

use super::{DeletionStrategy, SelectionStrategy, SizeAccumulator};

const DEFAULT_AGE_TURNOVER_MS: f64 = 2.5 * 3_600_000.0;
const DEFAULT_SIZE_TURNOVER: f64 = 5.0e8;
const NORMAL_PRIORITY: f64 = 10.0;

/// Scores objects by a smooth blend of age and size.
///
/// Each factor saturates exponentially toward 1.0 past its turnover point
/// (2.5 hours of age, half a gigabyte of size), so an object that is both
/// reasonably old and reasonably large beats one that is extreme on a
/// single axis.  The blend is then weighted by the object's deletion
/// priority.
#[derive(Debug, Clone)]
pub struct BigOldestStrategy {
    acc: SizeAccumulator,
    age_turnover_ms: f64,
    size_turnover: f64,
}

impl BigOldestStrategy {
    #[must_use]
    pub fn new(need: i64, size_limit: i64) -> Self {
        Self {
            acc: SizeAccumulator::new(need, size_limit),
            age_turnover_ms: DEFAULT_AGE_TURNOVER_MS,
            size_turnover: DEFAULT_SIZE_TURNOVER,
        }
    }

    /// Override the age at which the age factor nears saturation.
    #[must_use]
    pub fn with_age_turnover_ms(mut self, turnover_ms: f64) -> Self {
        if turnover_ms > 0.0 {
            self.age_turnover_ms = turnover_ms;
        }
        self
    }

    /// Override the size at which the size factor nears saturation.
    #[must_use]
    pub fn with_size_turnover(mut self, turnover: f64) -> Self {
        if turnover > 0.0 {
            self.size_turnover = turnover;
        }
        self
    }
}

impl Default for BigOldestStrategy {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl SelectionStrategy for BigOldestStrategy {
    fn score(&mut self, obj: &CacheObject) -> f64 {
        let size = obj.size();
        let score = if size <= 0 {
            0.0
        } else {
            let now = crate::now_millis();
            let age = (now - obj.metadatum_i64("since", now)).max(0) as f64;
            let priority = obj.metadatum_i64("priority", 10) as f64;
            (1.0 - (-age / self.age_turnover_ms).exp())
                * (1.0 - (-(size as f64) / self.size_turnover).exp())
                * priority
                / NORMAL_PRIORITY
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

impl DeletionStrategy for BigOldestStrategy {
    fn total_size(&self) -> i64 {
        self.acc.total()
    }

    fn sufficient_size(&self) -> i64 {
        self.acc.sufficient()
    }

    fn new_for_size(&self, need: i64, size_limit: i64) -> Box<dyn DeletionStrategy> {
        Box::new(Self {
            acc: SizeAccumulator::new(need, size_limit),
            age_turnover_ms: self.age_turnover_ms,
            size_turnover: self.size_turnover,
        })
    }
}
