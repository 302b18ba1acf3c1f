// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Deletion planning.
//!
//! A [`DeletionPlanner`] figures out, per volume, which objects would have
//! to be deleted to make room for a new one, and packages the answer as a
//! [`DeletionPlan`].  Plans are advisory until executed: they snapshot the
//! inventory at planning time, carry a cost score, and can be ranked across
//! volumes so the cache tries the cheapest viable volume first.
//!
//! Planning never mutates anything.  All deletion happens in
//! [`DeletionPlan::execute`], under whatever locking the caller imposes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::inventory::{Inventory, VolumeStatus};
use crate::object::CacheObject;
use crate::strategy::DeletionStrategy;
use crate::volume::CacheVolume;

/// Extra fraction of the requested size that must be free after deletion.
pub const DEFAULT_DELETE_HEADROOM: f64 = 0.02;

/// Extra fraction of the shortfall worth of spare deletion candidates to
/// select, in case some candidates fail to delete.
pub const DEFAULT_SELECT_HEADROOM: f64 = 0.20;

/// The outcome of executing a deletion plan.
#[derive(Debug, Default)]
pub struct PlanExecution {
    /// bytes known to have been freed
    pub freed: i64,
    /// the objects actually removed, in removal order
    pub removed: Vec<CacheObject>,
}

/// A concrete proposal for freeing space in one volume.
pub struct DeletionPlan {
    volume: Arc<dyn CacheVolume>,
    inventory: Arc<dyn Inventory>,
    objects: Vec<CacheObject>,
    /// bytes that must come free through deletion; 0 for a no-op plan
    bytes_needed: i64,
    /// bytes the planned deletions are expected to free
    bytes_planned: i64,
    score: f64,
}

impl DeletionPlan {
    /// The name of the volume this plan would free space in.
    pub fn volume_name(&self) -> &str {
        self.volume.name()
    }

    /// The objects this plan may delete, cheapest-to-lose first.  The list
    /// carries more than the shortfall strictly requires; the extras are
    /// spares, consumed only when an earlier deletion fails.
    pub fn objects(&self) -> &[CacheObject] {
        &self.objects
    }

    /// The cost of this plan; 0 means no deletions are required.  Lower
    /// scores rank earlier.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn bytes_needed(&self) -> i64 {
        self.bytes_needed
    }

    pub fn bytes_planned(&self) -> i64 {
        self.bytes_planned
    }

    /// Delete planned objects until enough space has come free.
    ///
    /// Individual deletion failures are logged and skipped; spare
    /// candidates at the tail of the plan take their place.  The plan
    /// fails only if the survivors cannot cover the needed bytes, or if
    /// the volume has stopped accepting updates since planning time.
    pub async fn execute(&self) -> Result<PlanExecution, CacheError> {
        let status = self.inventory.volume_status(self.volume.name()).await?;
        if status < VolumeStatus::ReadWrite {
            return Err(CacheError::DeletionFailure(format!(
                "volume {} is no longer updatable (status {:?})",
                self.volume.name(),
                status
            )));
        }

        let mut out = PlanExecution::default();
        for obj in &self.objects {
            if out.freed >= self.bytes_needed {
                break;
            }
            match self.volume.remove(&obj.name).await {
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        volume = self.volume.name(),
                        name = %obj.name,
                        error = %e,
                        "planned deletion failed; moving on"
                    );
                    continue;
                }
            }
            self.inventory
                .remove_object(self.volume.name(), &obj.name)
                .await?;
            out.freed += obj.size().max(0);
            out.removed.push(obj.clone());
        }

        if out.freed < self.bytes_needed {
            return Err(CacheError::DeletionFailure(format!(
                "freed only {} of {} bytes in volume {}",
                out.freed,
                self.bytes_needed,
                self.volume.name()
            )));
        }
        if !out.removed.is_empty() {
            info!(
                volume = self.volume.name(),
                removed = out.removed.len(),
                freed = out.freed,
                "deletion plan executed"
            );
        }
        Ok(out)
    }

    /// Execute the plan and then record a reservation of the given size in
    /// the freed volume.  Returns the reservation record's name along with
    /// the deletion outcome.
    ///
    /// The volume's available space is re-read after the deletions; the
    /// plan was drawn against a snapshot, and other writers may have eaten
    /// the room in the meantime.
    pub async fn execute_and_reserve(
        &self,
        size: i64,
    ) -> Result<(String, PlanExecution), CacheError> {
        let out = self.execute().await?;
        let avail = self.inventory.available_space_in(self.volume.name()).await?;
        if avail < size {
            return Err(CacheError::DeletionFailure(format!(
                "volume {} has {} bytes available after deletion, {} required",
                self.volume.name(),
                avail,
                size
            )));
        }
        let resv = self
            .inventory
            .reserve_space_in(self.volume.name(), size)
            .await?;
        Ok((resv, out))
    }
}

/// Builds and ranks [`DeletionPlan`]s against the inventory.
pub struct DeletionPlanner {
    inventory: Arc<dyn Inventory>,
    delete_headroom: f64,
    select_headroom: f64,
}

impl DeletionPlanner {
    #[must_use]
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self {
            inventory,
            delete_headroom: DEFAULT_DELETE_HEADROOM,
            select_headroom: DEFAULT_SELECT_HEADROOM,
        }
    }

    #[must_use]
    pub fn with_headroom(mut self, delete_headroom: f64, select_headroom: f64) -> Self {
        self.delete_headroom = delete_headroom.max(0.0);
        self.select_headroom = select_headroom.max(0.0);
        self
    }

    /// Propose a plan to fit `size` bytes into one volume, or `None` when
    /// the volume cannot viably make that much room.
    pub async fn plan_for(
        &self,
        volume: Arc<dyn CacheVolume>,
        size: i64,
        strategy: &dyn DeletionStrategy,
    ) -> Result<Option<DeletionPlan>, CacheError> {
        let avail = self.inventory.available_space_in(volume.name()).await?;
        let padded = ((1.0 + self.delete_headroom) * size as f64).round() as i64;
        if avail >= padded {
            // room already; a plan with nothing to delete
            return Ok(Some(DeletionPlan {
                volume,
                inventory: Arc::clone(&self.inventory),
                objects: Vec::new(),
                bytes_needed: 0,
                bytes_planned: 0,
                score: 0.0,
            }));
        }

        let needed = padded - avail;
        let select_limit =
            ((1.0 + self.select_headroom) * (size - avail) as f64).round() as i64;
        let mut sized = strategy.new_for_size(needed, select_limit);
        let scored = self
            .inventory
            .select_scored_from(volume.name(), sized.as_mut())
            .await?;

        if sized.sufficient_size() < needed {
            debug!(
                volume = volume.name(),
                needed,
                selectable = sized.sufficient_size(),
                "not enough deletable content for a viable plan"
            );
            return Ok(None);
        }

        // score the plan over the prefix of candidates that covers the
        // shortfall, crossing object included; every selected candidate
        // stays in the plan so later ones can stand in for failed removals
        let mut prefix = 0usize;
        let mut planned = 0i64;
        let mut sum_score = 0.0;
        for so in &scored {
            planned += so.object.size().max(0);
            sum_score += so.score;
            prefix += 1;
            if planned > needed {
                break;
            }
        }
        let score = prefix as f64 / sum_score;
        let objects: Vec<CacheObject> = scored.into_iter().map(|so| so.object).collect();
        let bytes_planned = objects.iter().map(|o| o.size().max(0)).sum();

        Ok(Some(DeletionPlan {
            volume,
            inventory: Arc::clone(&self.inventory),
            objects,
            bytes_needed: needed,
            bytes_planned,
            score,
        }))
    }

    /// Propose plans for fitting `size` bytes into each of the candidate
    /// volumes, ranked cheapest first.  Each candidate pairs a volume with
    /// the deletion policy to plan it under.
    ///
    /// An empty candidate list is a [`CacheError::NoMatchingVolumes`]; a
    /// non-empty list in which no volume yields a viable plan is a
    /// [`CacheError::DeletionFailure`].
    pub async fn order_plans(
        &self,
        size: i64,
        candidates: &[(Arc<dyn CacheVolume>, &dyn DeletionStrategy)],
    ) -> Result<Vec<DeletionPlan>, CacheError> {
        if candidates.is_empty() {
            return Err(CacheError::NoMatchingVolumes(format!(
                "no volumes eligible to receive {size} bytes"
            )));
        }

        let mut plans = Vec::new();
        for (volume, strategy) in candidates {
            match self.plan_for(Arc::clone(volume), size, *strategy).await {
                Ok(Some(plan)) => plans.push(plan),
                Ok(None) => {}
                Err(e) => {
                    warn!(volume = volume.name(), error = %e, "planning failed for volume");
                }
            }
        }
        if plans.is_empty() {
            return Err(CacheError::DeletionFailure(format!(
                "no volume can make room for {size} bytes"
            )));
        }

        plans.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::MemoryInventory;
    use crate::strategy::{BySizeStrategy, OldestStrategy};
    use crate::volume::{MemoryVolume, ObjectStream, VolumeError};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tokio::io::AsyncRead;

    /// Delegates to a memory volume but refuses to remove one object.
    struct BalkyVolume {
        inner: MemoryVolume,
        stuck: String,
    }

    impl BalkyVolume {
        fn new(name: &str, stuck: &str) -> Self {
            Self {
                inner: MemoryVolume::new(name),
                stuck: stuck.to_string(),
            }
        }
    }

    #[async_trait]
    impl CacheVolume for BalkyVolume {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn exists(&self, name: &str) -> Result<bool, VolumeError> {
            self.inner.exists(name).await
        }

        async fn save_as(
            &self,
            from: &mut (dyn AsyncRead + Send + Unpin),
            name: &str,
            metadata: &mut Map<String, Value>,
        ) -> Result<(), VolumeError> {
            self.inner.save_as(from, name, metadata).await
        }

        async fn get_stream(&self, name: &str) -> Result<ObjectStream, VolumeError> {
            self.inner.get_stream(name).await
        }

        async fn get(&self, name: &str) -> Result<CacheObject, VolumeError> {
            self.inner.get(name).await
        }

        async fn remove(&self, name: &str) -> Result<bool, VolumeError> {
            if name == self.stuck {
                return Err(VolumeError::access(self.name(), "removal refused"));
            }
            self.inner.remove(name).await
        }
    }

    async fn put(
        inv: &MemoryInventory,
        vol: &dyn CacheVolume,
        name: &str,
        size: usize,
        since: i64,
        priority: i64,
    ) {
        let bytes = vec![0u8; size];
        let mut md = Map::new();
        vol.save_as(&mut &bytes[..], name, &mut md).await.unwrap();
        md.insert("size".into(), json!(size as i64));
        inv.add_object(&format!("id/{name}"), vol.name(), name, Some(&md))
            .await
            .unwrap();
        let tweak: Map<String, Value> = [
            ("since".to_string(), json!(since)),
            ("priority".to_string(), json!(priority)),
        ]
        .into_iter()
        .collect();
        inv.update_metadata(vol.name(), name, &tweak).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_op_plan_when_room_exists() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 1000, None).await.unwrap();
        let vol: Arc<dyn CacheVolume> = Arc::new(MemoryVolume::new("v"));

        let planner = DeletionPlanner::new(inv);
        let strat = OldestStrategy::default();
        let plan = planner.plan_for(vol, 100, &strat).await.unwrap().unwrap();
        assert_eq!(plan.score(), 0.0);
        assert!(plan.objects().is_empty());
        assert_eq!(plan.execute().await.unwrap().freed, 0);
    }

    #[tokio::test]
    async fn test_plan_covers_shortfall_with_crossing_object() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 950, None).await.unwrap();
        let vol = Arc::new(MemoryVolume::new("v"));

        let old = crate::now_millis() - 10 * 86_400_000;
        put(&inv, &*vol, "a", 500, old, 10).await;
        put(&inv, &*vol, "b", 450, old + 1000, 10).await;
        // volume is full: avail = 0, so a request for 80 needs 80 freed

        let planner =
            DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>).with_headroom(0.0, 0.20);
        let strat = BySizeStrategy::default();
        let plan = planner
            .plan_for(vol.clone() as Arc<dyn CacheVolume>, 80, &strat)
            .await
            .unwrap()
            .unwrap();

        // the largest object alone crosses the 80-byte shortfall
        assert_eq!(plan.objects().len(), 1);
        assert_eq!(plan.objects()[0].name, "a");
        assert_eq!(plan.bytes_needed(), 80);
        assert!(plan.bytes_planned() >= 80);

        let out = plan.execute().await.unwrap();
        assert_eq!(out.freed, 500);
        assert_eq!(out.removed.len(), 1);
        assert!(!vol.exists("a").await.unwrap());
        assert!(inv.get_object("v", "a").await.unwrap().is_none());
        assert!(inv.get_object("v", "b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_plan_score_counts_objects_over_scores() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 950, None).await.unwrap();
        let vol = Arc::new(MemoryVolume::new("v"));

        let old = crate::now_millis() - 86_400_000;
        put(&inv, &*vol, "big", 40, old, 10).await;
        put(&inv, &*vol, "small", 50, old, 10).await;
        // fill the rest so avail is 0
        put(&inv, &*vol, "filler", 860, old, 0).await;

        let planner =
            DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>).with_headroom(0.0, 0.0);

        // score each candidate by hand: size/5e8, needing both to cover 80
        let strat = BySizeStrategy::default();
        let plan = planner
            .plan_for(vol.clone() as Arc<dyn CacheVolume>, 80, &strat)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plan.objects().len(), 2);
        let expected = 2.0 / ((50.0 + 40.0) / 5.0e8);
        assert!((plan.score() - expected).abs() / expected < 1e-9);
    }

    #[tokio::test]
    async fn test_available_space_offsets_the_shortfall() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 1000, None).await.unwrap();
        let vol = Arc::new(MemoryVolume::new("v"));

        let now = crate::now_millis();
        // age-proportional scores: one day ~= 1.0, five days ~= 5.0
        put(&inv, &*vol, "a", 50, now - 86_400_000, 10).await;
        put(&inv, &*vol, "b", 40, now - 5 * 86_400_000, 10).await;
        put(&inv, &*vol, "pinned", 860, now, 0).await;
        // 950 of 1000 used, so an 80-byte request is only 30 bytes short

        let planner =
            DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>).with_headroom(0.0, 0.20);
        let strat = OldestStrategy::default();
        let plan = planner
            .plan_for(vol as Arc<dyn CacheVolume>, 80, &strat)
            .await
            .unwrap()
            .unwrap();

        // the older 40-byte object covers the shortfall by itself
        assert_eq!(plan.bytes_needed(), 30);
        assert_eq!(plan.objects().len(), 1);
        assert_eq!(plan.objects()[0].name, "b");
        let expected = 1.0 / 5.0;
        assert!((plan.score() - expected).abs() / expected < 1e-3);
    }

    #[tokio::test]
    async fn test_insufficient_content_yields_no_plan() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 100, None).await.unwrap();
        let vol = Arc::new(MemoryVolume::new("v"));
        let old = crate::now_millis() - 86_400_000;
        put(&inv, &*vol, "only", 90, old, 10).await;

        let planner = DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>);
        let strat = BySizeStrategy::default();
        // nothing deletable covers a 500-byte request in a 100-byte volume
        let plan = planner
            .plan_for(vol as Arc<dyn CacheVolume>, 500, &strat)
            .await
            .unwrap();
        assert!(plan.is_none());
    }

    #[tokio::test]
    async fn test_order_plans_ranks_no_op_first() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("full", 100, None).await.unwrap();
        inv.register_volume("roomy", 10_000, None).await.unwrap();
        let full = Arc::new(MemoryVolume::new("full"));
        let roomy = Arc::new(MemoryVolume::new("roomy"));
        let old = crate::now_millis() - 86_400_000;
        put(&inv, &*full, "a", 95, old, 10).await;

        let planner = DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>);
        let strat = OldestStrategy::default();
        let candidates: Vec<(Arc<dyn CacheVolume>, &dyn DeletionStrategy)> = vec![
            (full as Arc<dyn CacheVolume>, &strat),
            (roomy as Arc<dyn CacheVolume>, &strat),
        ];
        let plans = planner.order_plans(50, &candidates).await.unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].volume_name(), "roomy");
        assert_eq!(plans[0].score(), 0.0);
        assert!(plans[1].score() > 0.0);
    }

    #[tokio::test]
    async fn test_order_plans_error_taxonomy() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("tiny", 10, None).await.unwrap();
        let tiny = Arc::new(MemoryVolume::new("tiny"));

        let planner = DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>);
        let strat = OldestStrategy::default();

        let err = planner.order_plans(100, &[]).await.err().unwrap();
        assert!(matches!(err, CacheError::NoMatchingVolumes(_)));

        let candidates: Vec<(Arc<dyn CacheVolume>, &dyn DeletionStrategy)> =
            vec![(tiny as Arc<dyn CacheVolume>, &strat)];
        let err = planner.order_plans(100, &candidates).await.err().unwrap();
        assert!(matches!(err, CacheError::DeletionFailure(_)));
    }

    #[tokio::test]
    async fn test_execute_and_reserve_records_reservation() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 1000, None).await.unwrap();
        let vol: Arc<dyn CacheVolume> = Arc::new(MemoryVolume::new("v"));

        let planner = DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>);
        let strat = OldestStrategy::default();
        let plan = planner.plan_for(vol, 200, &strat).await.unwrap().unwrap();
        let (resv, out) = plan.execute_and_reserve(200).await.unwrap();
        assert_eq!(out.freed, 0);
        assert!(resv.starts_with(crate::inventory::RESERVE_PREFIX));
        assert_eq!(inv.available_space_in("v").await.unwrap(), 800);
    }

    #[tokio::test]
    async fn test_spare_candidates_cover_a_failed_removal() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 170, None).await.unwrap();
        let vol = Arc::new(BalkyVolume::new("v", "a"));

        let old = crate::now_millis() - 86_400_000;
        put(&inv, &*vol, "a", 70, old, 10).await;
        put(&inv, &*vol, "b", 50, old, 10).await;
        put(&inv, &*vol, "c", 50, old + 1000, 10).await;
        // volume is full; a 100-byte request needs 100 freed, and the 20 %
        // selection headroom pulls all three objects into the plan

        let planner =
            DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>).with_headroom(0.0, 0.20);
        let strat = BySizeStrategy::default();
        let plan = planner
            .plan_for(vol.clone() as Arc<dyn CacheVolume>, 100, &strat)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plan.objects().len(), 3);
        assert_eq!(plan.bytes_needed(), 100);

        // "a" refuses to delete; the spare at the tail makes up for it
        let out = plan.execute().await.unwrap();
        assert_eq!(out.freed, 100);
        let removed: Vec<&str> = out.removed.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(removed, vec!["b", "c"]);
        assert!(vol.exists("a").await.unwrap());
        assert!(inv.get_object("v", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_execute_refuses_demoted_volume() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 1000, None).await.unwrap();
        let vol = Arc::new(MemoryVolume::new("v"));
        let old = crate::now_millis() - 86_400_000;
        put(&inv, &*vol, "a", 900, old, 10).await;

        let planner = DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>);
        let strat = BySizeStrategy::default();
        let plan = planner
            .plan_for(vol.clone() as Arc<dyn CacheVolume>, 500, &strat)
            .await
            .unwrap()
            .unwrap();

        inv.set_volume_status("v", VolumeStatus::ReadOnly)
            .await
            .unwrap();
        let err = plan.execute().await.unwrap_err();
        assert!(matches!(err, CacheError::DeletionFailure(_)));
        assert!(vol.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_execute_and_reserve_rechecks_available_space() {
        let inv = Arc::new(MemoryInventory::new());
        inv.register_volume("v", 100, None).await.unwrap();
        let vol = Arc::new(MemoryVolume::new("v"));

        let planner =
            DeletionPlanner::new(Arc::clone(&inv) as Arc<dyn Inventory>).with_headroom(0.0, 0.20);
        let strat = OldestStrategy::default();
        // an empty 100-byte volume yields a no-op plan for 90 bytes
        let plan = planner
            .plan_for(vol.clone() as Arc<dyn CacheVolume>, 90, &strat)
            .await
            .unwrap()
            .unwrap();
        assert!(plan.objects().is_empty());

        // a competing writer lands before the plan runs
        put(&inv, &*vol, "squatter", 80, crate::now_millis(), 10).await;
        let err = plan.execute_and_reserve(90).await.unwrap_err();
        assert!(matches!(err, CacheError::DeletionFailure(_)));
    }
}
