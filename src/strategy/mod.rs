// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Selection and deletion strategies.
//!
//! A [`SelectionStrategy`] encapsulates a policy for picking cache objects
//! for some purpose, namely deletion: it scores each candidate's
//! deletability (higher = more deletable), orders candidate lists, and
//! tracks when enough total size has been seen to stop selecting.
//!
//! A [`DeletionStrategy`] adds the minimum-needed / size-limit pair used by
//! the deletion planner, and can mint an independently parameterized copy of
//! itself per planning attempt via
//! [`new_for_size`](DeletionStrategy::new_for_size); apart from the explicit
//! size accumulator, strategies are stateless across uses.
//!
//! Scores are returned to the caller and paired into
//! [`ScoredObject`](crate::object::ScoredObject)s by the selection pass;
//! they are never stashed on the shared object value.
//!
//! Shipped policies:
//! - [`OldestStrategy`]: age-proportional, weighted by priority
//! - [`BigOldestStrategy`]: a smooth blend of age and size
//! - [`BySizeStrategy`]: size-proportional

pub mod big_oldest;
pub mod by_size;
pub mod oldest;

pub use big_oldest::BigOldestStrategy;
pub use by_size::BySizeStrategy;
pub use oldest::OldestStrategy;

use std::cmp::Ordering;

use crate::inventory::Purpose;
use crate::object::{CacheObject, ScoredObject};

/// A policy for selecting cache objects for some purpose.
pub trait SelectionStrategy: Send + Sync {
    /// Score the deletability of an object (higher = more deletable) and
    /// fold its size into the sufficiency accumulator.
    fn score(&mut self, obj: &CacheObject) -> f64;

    /// The selection purpose, used by the inventory to pick the candidate
    /// ordering this strategy expects.
    fn purpose(&self) -> Purpose;

    /// True once enough total size has been scored for a sufficient
    /// selection.
    fn limit_reached(&self) -> bool;

    /// Restart the sufficiency accumulator.
    fn reset(&mut self);

    /// Order a scored candidate list per this policy.  The default orders by
    /// descending score.
    fn sort(&self, objs: &mut [ScoredObject]) {
        objs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }
}

/// A selection strategy specifically for deletion, with explicit sizing.
///
/// `need` is the minimum byte count the selection must reach to be usable;
/// the size limit is intentionally larger, providing spare candidates in
/// case some objects later fail to delete.
pub trait DeletionStrategy: SelectionStrategy {
    /// Total size of all objects scored so far.
    fn total_size(&self) -> i64;

    /// The portion of the scored total that satisfies the needed size.
    /// Once [`limit_reached`](SelectionStrategy::limit_reached) is true,
    /// this equals or exceeds the configured need.
    fn sufficient_size(&self) -> i64;

    /// A fresh instance of this policy parameterized for one planning
    /// attempt.
    fn new_for_size(&self, need: i64, size_limit: i64) -> Box<dyn DeletionStrategy>;
}

/// Shared sufficiency accounting for size-limited strategies.
///
/// Only objects with positive size *and* positive score count toward the
/// total; an unscoreable object would never actually be deleted, so it must
/// not count as progress.
#[derive(Debug, Clone)]
pub struct SizeAccumulator {
    size_limit: i64,
    need: i64,
    total: i64,
    sufficient: i64,
}

impl SizeAccumulator {
    pub fn new(need: i64, size_limit: i64) -> Self {
        Self {
            size_limit,
            need,
            total: 0,
            sufficient: 0,
        }
    }

    /// Fold one scored object into the running totals.
    pub fn observe(&mut self, size: i64, score: f64) {
        if size > 0 && score > 0.0 {
            self.total += size;
        }
        if self.sufficient < self.need {
            self.sufficient = self.total;
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.total > self.size_limit
    }

    pub fn reset(&mut self) {
        self.total = 0;
        self.sufficient = 0;
    }

    pub fn need(&self) -> i64 {
        self.need
    }

    pub fn size_limit(&self) -> i64 {
        self.size_limit
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn sufficient(&self) -> i64 {
        self.sufficient
    }
}
