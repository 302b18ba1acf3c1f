// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The cache front end.
//!
//! A [`Cache`] ties together a set of named [`CacheVolume`]s, the
//! [`Inventory`] that tracks what sits in them, and the deletion machinery
//! that makes room for new arrivals.  Space is obtained through
//! [`reserve_space`](Cache::reserve_space), which plans and executes
//! evictions as needed and hands back a [`Reservation`] to save objects
//! through.
//!
//! Plan execution and the round-robin ordering of volumes are serialized
//! under one async lock, so two concurrent reservations can never count the
//! same free bytes twice or delete each other's victims.

mod listeners;

pub use listeners::{DeletionListener, ReservationListener, SaveListener};

use listeners::ListenerSet;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::{CacheConfig, VolumeConfig};
use crate::error::CacheError;
use crate::monitor::IntegrityMonitor;
use crate::inventory::{Inventory, VolumeStatus};
use crate::object::CacheObject;
use crate::plan::DeletionPlanner;
use crate::reservation::Reservation;
use crate::strategy::{BigOldestStrategy, DeletionStrategy};
use crate::volume::CacheVolume;

/// Role bits a volume can be registered with, matched against the
/// preference mask of [`Cache::reserve_space`].
pub mod roles {
    /// fit for anything
    pub const GENERAL_PURPOSE: u32 = 1;
    /// tuned for large objects
    pub const LARGE_OBJECTS: u32 = 2;
    /// tuned for many small objects
    pub const SMALL_OBJECTS: u32 = 4;
    /// low-latency storage
    pub const FAST_ACCESS: u32 = 8;
}

/// A multi-volume object cache with planned eviction.
pub struct Cache {
    name: String,
    inventory: Arc<dyn Inventory>,
    planner: DeletionPlanner,
    volumes: RwLock<HashMap<String, Arc<dyn CacheVolume>>>,
    strategies: RwLock<HashMap<String, Arc<dyn DeletionStrategy>>>,
    default_strategy: Arc<dyn DeletionStrategy>,
    /// round-robin volume order; also the plan-execution lock
    recent: Mutex<VecDeque<String>>,
    resv_listeners: ListenerSet<dyn ReservationListener>,
    save_listeners: ListenerSet<dyn SaveListener>,
    del_listeners: ListenerSet<dyn DeletionListener>,
}

impl Cache {
    /// Create a cache over the given inventory, evicting under the
    /// [`BigOldestStrategy`] by default.
    pub fn new(
        name: impl Into<String>,
        inventory: Arc<dyn Inventory>,
        config: &CacheConfig,
    ) -> Arc<Self> {
        Self::with_strategy(name, inventory, config, Arc::new(BigOldestStrategy::default()))
    }

    /// Create a cache with an explicit default deletion strategy.
    pub fn with_strategy(
        name: impl Into<String>,
        inventory: Arc<dyn Inventory>,
        config: &CacheConfig,
        default_strategy: Arc<dyn DeletionStrategy>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            planner: DeletionPlanner::new(Arc::clone(&inventory))
                .with_headroom(config.delete_headroom, config.select_headroom),
            inventory,
            volumes: RwLock::new(HashMap::new()),
            strategies: RwLock::new(HashMap::new()),
            default_strategy,
            recent: Mutex::new(VecDeque::new()),
            resv_listeners: ListenerSet::default(),
            save_listeners: ListenerSet::default(),
            del_listeners: ListenerSet::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inventory(&self) -> Arc<dyn Inventory> {
        Arc::clone(&self.inventory)
    }

    /// Attach a volume and register it with the inventory.
    ///
    /// `metadata` may carry a `roles` bitmask (see [`roles`]) and an initial
    /// `status`; re-attaching updates capacity and metadata but never raises
    /// a previously lowered status.
    pub async fn add_volume(
        &self,
        volume: Arc<dyn CacheVolume>,
        capacity: i64,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<(), CacheError> {
        let name = volume.name().to_string();
        self.inventory
            .register_volume(&name, capacity, metadata)
            .await?;
        self.volumes.write().insert(name.clone(), volume);

        let mut recent = self.recent.lock().await;
        if !recent.contains(&name) {
            recent.push_back(name.clone());
        }
        info!(cache = %self.name, volume = %name, capacity, "volume attached");
        Ok(())
    }

    /// Attach a volume described by a [`VolumeConfig`]: capacity, roles,
    /// initial status, and any per-volume deletion strategy come from the
    /// description.  The volume's own name must match the description.
    pub async fn add_configured_volume(
        &self,
        volume: Arc<dyn CacheVolume>,
        config: &VolumeConfig,
    ) -> Result<(), CacheError> {
        if volume.name() != config.name {
            return Err(CacheError::MissingVolume(format!(
                "volume {} does not match configuration for {}",
                volume.name(),
                config.name
            )));
        }
        let md = config.metadata();
        let md = if md.is_empty() { None } else { Some(&md) };
        self.add_volume(Arc::clone(&volume), config.capacity, md)
            .await?;
        if let Some(strategy) = config.strategy() {
            self.set_strategy_for(volume.name(), strategy);
        }
        Ok(())
    }

    /// A monitor over this cache running the standard size, checksum, and
    /// expiry checks.
    pub fn integrity_monitor(self: &Arc<Self>, config: &CacheConfig) -> IntegrityMonitor {
        IntegrityMonitor::standard(Arc::clone(self), config)
    }

    /// Use a specific deletion strategy when planning evictions from one
    /// volume.
    pub fn set_strategy_for(&self, volname: impl Into<String>, strategy: Arc<dyn DeletionStrategy>) {
        self.strategies.write().insert(volname.into(), strategy);
    }

    /// The live handle for an attached volume.
    pub fn volume(&self, name: &str) -> Option<Arc<dyn CacheVolume>> {
        self.volumes.read().get(name).cloned()
    }

    pub fn volume_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.volumes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// True if at least one retrievable copy of the object is recorded.
    pub async fn is_cached(&self, id: &str) -> Result<bool, CacheError> {
        Ok(!self.inventory.find_object(id).await?.is_empty())
    }

    /// Find a retrievable copy of an object and return it attached to its
    /// live volume, or `None` when the cache has no usable copy.
    ///
    /// When every recorded copy is verifiably gone from its volume, the
    /// stale records are purged so the inventory self-corrects.  When a
    /// volume could not even be consulted and no other copy resolved, the
    /// object's state is unknown and the call fails rather than guessing.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn find_object(&self, id: &str) -> Result<Option<CacheObject>, CacheError> {
        let copies = self.inventory.find_object(id).await?;
        if copies.is_empty() {
            return Ok(None);
        }

        let mut trouble: Option<(String, String, String)> = None;
        for copy in copies {
            let Some(vol) = self.volume(&copy.volname) else {
                warn!(volume = %copy.volname, "inventory names a volume this cache lacks");
                continue;
            };
            match vol.exists(&copy.name).await {
                Ok(true) => {
                    self.inventory
                        .update_access_time(&copy.volname, &copy.name)
                        .await?;
                    return Ok(Some(copy.attached(vol)));
                }
                Ok(false) => {
                    warn!(
                        volume = %copy.volname,
                        name = %copy.name,
                        "cached object missing from volume"
                    );
                }
                Err(e) => {
                    warn!(volume = %copy.volname, name = %copy.name, error = %e,
                          "volume failed the existence check; trying other copies");
                    trouble = Some((copy.volname.clone(), copy.name.clone(), e.to_string()));
                }
            }
        }

        if let Some((volume, name, message)) = trouble {
            return Err(CacheError::Inaccessible {
                volume,
                name,
                message,
            });
        }
        warn!(id, "every recorded copy has vanished; purging stale records");
        self.uncache(id).await?;
        Ok(None)
    }

    /// Remove every cached copy of an object.  Unknown ids are a no-op.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn uncache(&self, id: &str) -> Result<(), CacheError> {
        let _guard = self.recent.lock().await;
        for copy in self
            .inventory
            .find_object_for(id, VolumeStatus::InfoOnly)
            .await?
        {
            if !copy.cached {
                continue;
            }
            let Some(vol) = self.volume(&copy.volname) else {
                warn!(volume = %copy.volname, name = %copy.name,
                      "cannot uncache from a detached volume; record kept");
                continue;
            };
            vol.remove(&copy.name).await?;
            self.inventory.remove_object(&copy.volname, &copy.name).await?;
            debug!(volume = %copy.volname, name = %copy.name, "object uncached");
        }
        Ok(())
    }

    /// Reserve room for `size` bytes, evicting as needed.
    ///
    /// `preferences` is a role bitmask (see [`roles`]); 0 means any
    /// read-write volume will do.  Volumes are tried in round-robin order of
    /// least recent use, cheapest eviction plan first; a volume whose plan
    /// fails in execution is skipped in favor of the next one.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn reserve_space(
        self: &Arc<Self>,
        size: i64,
        preferences: u32,
    ) -> Result<Reservation, CacheError> {
        let mut recent = self.recent.lock().await;

        let mut eligible: Vec<(Arc<dyn CacheVolume>, Arc<dyn DeletionStrategy>)> = Vec::new();
        for volname in recent.iter() {
            let Some(vol) = self.volume(volname) else {
                continue;
            };
            let info = self.inventory.volume_info(volname).await?;
            if info.status < VolumeStatus::ReadWrite {
                continue;
            }
            if preferences != 0 && info.roles() & preferences == 0 {
                continue;
            }
            let strategy = self
                .strategies
                .read()
                .get(volname)
                .cloned()
                .unwrap_or_else(|| Arc::clone(&self.default_strategy));
            eligible.push((vol, strategy));
        }

        let candidates: Vec<(Arc<dyn CacheVolume>, &dyn DeletionStrategy)> = eligible
            .iter()
            .map(|(v, s)| (Arc::clone(v), s.as_ref()))
            .collect();
        let plans = self.planner.order_plans(size, &candidates).await?;

        let mut last_failure = None;
        for plan in plans {
            let volname = plan.volume_name().to_string();
            match plan.execute_and_reserve(size).await {
                Ok((record, out)) => {
                    if !out.removed.is_empty() {
                        self.del_listeners
                            .notify(|l| l.objects_deleted(&volname, &out.removed, out.freed));
                    }
                    // rotate the winner to the back of the round-robin
                    recent.retain(|v| v != &volname);
                    recent.push_back(volname.clone());

                    self.resv_listeners
                        .notify(|l| l.reservation_made(&volname, size));
                    info!(volume = %volname, size, "space reserved");

                    let vol = self
                        .volume(&volname)
                        .ok_or_else(|| CacheError::MissingVolume(volname.clone()))?;
                    return Ok(Reservation::new(
                        Arc::downgrade(self),
                        self.inventory(),
                        vol,
                        record,
                        size,
                    ));
                }
                Err(CacheError::DeletionFailure(msg)) => {
                    warn!(volume = %volname, reason = %msg, "plan fell through; trying next volume");
                    last_failure = Some(msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(CacheError::DeletionFailure(last_failure.unwrap_or_else(
            || format!("no volume could make room for {size} bytes"),
        )))
    }

    pub fn add_reservation_listener(&self, listener: Arc<dyn ReservationListener>) {
        self.resv_listeners.add(listener);
    }

    pub fn remove_reservation_listener(&self, listener: &Arc<dyn ReservationListener>) {
        self.resv_listeners.remove(listener);
    }

    pub fn add_save_listener(&self, listener: Arc<dyn SaveListener>) {
        self.save_listeners.add(listener);
    }

    pub fn remove_save_listener(&self, listener: &Arc<dyn SaveListener>) {
        self.save_listeners.remove(listener);
    }

    pub fn add_deletion_listener(&self, listener: Arc<dyn DeletionListener>) {
        self.del_listeners.add(listener);
    }

    pub fn remove_deletion_listener(&self, listener: &Arc<dyn DeletionListener>) {
        self.del_listeners.remove(listener);
    }

    pub(crate) fn notify_object_saved(&self, object: &CacheObject) {
        self.save_listeners.notify(|l| l.object_saved(object));
    }
}
