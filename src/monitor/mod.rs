// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background integrity monitoring.
//!
//! The [`IntegrityMonitor`] walks cached objects that have not been examined
//! recently and runs a pipeline of [`ObjectCheck`]s over each.  Objects that
//! pass get their checked timestamp refreshed; copies that fail are removed
//! so a fresh one can be restored on next access.  A pass whose checks keep
//! erroring out gives up rather than churning the cache.

pub mod checks;

pub use checks::{ChecksumCheck, ExpiryCheck, SizeCheck};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::inventory::Purpose;
use crate::object::CacheObject;
use crate::volume::CacheVolume;

/// One verification applied to a cached object.
///
/// `Ok(())` is a pass.  A [`CacheError::Integrity`] means the object is bad
/// and should be evicted; any other error means the check could not run.
#[async_trait]
pub trait ObjectCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, object: &CacheObject) -> Result<(), CacheError>;
}

/// Tally of one monitoring pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// objects examined
    pub checked: usize,
    /// objects that passed every check
    pub passed: usize,
    /// objects that failed a check
    pub failed: usize,
    /// objects whose checks could not run this pass
    pub errors: usize,
}

/// Periodically re-verifies cached objects against a check pipeline.
pub struct IntegrityMonitor {
    cache: Arc<Cache>,
    checks: Vec<Box<dyn ObjectCheck>>,
    fail_limit: usize,
}

impl IntegrityMonitor {
    pub fn new(cache: Arc<Cache>, checks: Vec<Box<dyn ObjectCheck>>, fail_limit: usize) -> Self {
        Self {
            cache,
            checks,
            fail_limit: fail_limit.max(1),
        }
    }

    /// A monitor running the standard size, checksum, and expiry checks.
    pub fn standard(cache: Arc<Cache>, config: &CacheConfig) -> Self {
        Self::new(
            cache,
            vec![
                Box::new(SizeCheck),
                Box::new(ChecksumCheck),
                Box::new(ExpiryCheck::new(config.expiry_days)),
            ],
            config.monitor_fail_limit,
        )
    }

    /// Run every check against one cached object, refreshing its checked
    /// stamp on a pass.  The first failing check's error comes back as-is.
    pub async fn check(&self, object: &CacheObject) -> Result<(), CacheError> {
        let obj = match &object.volume {
            Some(_) => object.clone(),
            None => {
                let vol = self
                    .cache
                    .volume(&object.volname)
                    .ok_or_else(|| CacheError::MissingVolume(object.volname.clone()))?;
                object.clone().attached(vol)
            }
        };
        for check in &self.checks {
            check.check(&obj).await?;
        }
        self.stamp(&obj).await
    }

    /// The objects currently overdue for a check, at most `max` of them,
    /// without acting on any.
    pub async fn select_overdue(&self, max: usize) -> Result<Vec<CacheObject>, CacheError> {
        Ok(self
            .cache
            .inventory()
            .select_objects(Purpose::ForCheck, max)
            .await?)
    }

    /// Check up to `max` overdue objects, removing copies that fail.
    /// Returns zero counts when nothing is due.
    #[instrument(skip(self), fields(cache = self.cache.name()))]
    pub async fn check_once(&self, max: usize) -> Result<SweepStats, CacheError> {
        let due = self.select_overdue(max).await?;
        let mut stats = SweepStats::default();
        let mut failed = Vec::new();
        self.scan(&due, true, i64::MAX, &mut stats, &mut failed)
            .await?;
        Ok(stats)
    }

    /// Check up to `max` overdue objects and report the copies that failed.
    /// With `delete_on_fail` false the failing copies are left in place, so
    /// a caller can audit before repairing.
    #[instrument(skip(self), fields(cache = self.cache.name()))]
    pub async fn find_corrupted(
        &self,
        max: usize,
        delete_on_fail: bool,
    ) -> Result<Vec<CacheObject>, CacheError> {
        let due = self.select_overdue(max).await?;
        let mut stats = SweepStats::default();
        let mut failed = Vec::new();
        self.scan(&due, delete_on_fail, i64::MAX, &mut stats, &mut failed)
            .await?;
        Ok(failed)
    }

    /// Sweep everything due, in batches.  Objects stamped at or after the
    /// sweep's start are skipped, so a sweep never chases its own freshly
    /// stamped objects.
    #[instrument(skip(self), fields(cache = self.cache.name()))]
    pub async fn sweep(&self, batch: usize) -> Result<SweepStats, CacheError> {
        let start = crate::now_millis();
        let mut total = SweepStats::default();
        let mut failed = Vec::new();
        loop {
            let due = self.select_overdue(batch).await?;
            let examined = self
                .scan(&due, true, start, &mut total, &mut failed)
                .await?;
            if examined == 0 {
                break;
            }
        }
        info!(
            checked = total.checked,
            passed = total.passed,
            failed = total.failed,
            errors = total.errors,
            "integrity sweep complete"
        );
        Ok(total)
    }

    /// Run the pipeline over each due object not stamped since `before`.
    /// Failing copies land in `failed` (and are removed when
    /// `delete_on_fail`); checks that cannot run count against the error
    /// budget, and exhausting it aborts the whole pass.
    async fn scan(
        &self,
        due: &[CacheObject],
        delete_on_fail: bool,
        before: i64,
        stats: &mut SweepStats,
        failed: &mut Vec<CacheObject>,
    ) -> Result<usize, CacheError> {
        let mut examined = 0;
        for obj in due {
            if obj.metadatum_i64("checked", 0) >= before {
                continue;
            }
            examined += 1;
            stats.checked += 1;
            match self.run_checks(obj).await {
                Ok(()) => {
                    stats.passed += 1;
                    self.stamp(obj).await?;
                }
                Err(e @ CacheError::Integrity { .. }) => {
                    warn!(volume = %obj.volname, name = %obj.name, error = %e,
                          "cached copy failed integrity check");
                    stats.failed += 1;
                    failed.push(obj.clone());
                    if delete_on_fail {
                        self.remove_copy(obj).await?;
                    }
                }
                Err(e) => {
                    warn!(volume = %obj.volname, name = %obj.name, error = %e,
                          "integrity check could not run");
                    stats.errors += 1;
                    if stats.errors > self.fail_limit {
                        return Err(CacheError::CheckAborted(format!(
                            "{} checks could not run; latest: {e}",
                            stats.errors
                        )));
                    }
                }
            }
        }
        Ok(examined)
    }

    async fn run_checks(&self, obj: &CacheObject) -> Result<(), CacheError> {
        let vol = self
            .cache
            .volume(&obj.volname)
            .ok_or_else(|| CacheError::MissingVolume(obj.volname.clone()))?;
        let attached = obj.clone().attached(vol);
        for check in &self.checks {
            check.check(&attached).await?;
        }
        Ok(())
    }

    /// Drop one failing copy: its bytes and its record, nothing else.
    /// Other replicas of the same object stay cached.
    async fn remove_copy(&self, obj: &CacheObject) -> Result<(), CacheError> {
        let vol = self
            .cache
            .volume(&obj.volname)
            .ok_or_else(|| CacheError::MissingVolume(obj.volname.clone()))?;
        vol.remove(&obj.name).await?;
        self.cache
            .inventory()
            .remove_object(&obj.volname, &obj.name)
            .await?;
        Ok(())
    }

    async fn stamp(&self, obj: &CacheObject) -> Result<(), CacheError> {
        self.cache
            .inventory()
            .update_checked_time(&obj.volname, &obj.name, crate::now_millis())
            .await?;
        Ok(())
    }
}
