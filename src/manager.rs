// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache management: the restore-on-miss front door.
//!
//! A [`CacheManager`] pairs a [`Cache`] with a [`Restorer`] that knows how
//! to pull objects back out of long-term storage.  Callers ask for objects
//! by id; the manager restores them into reserved cache space when they are
//! not already present, and runs the integrity monitor over what is.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::monitor::{IntegrityMonitor, SweepStats};
use crate::object::CacheObject;
use crate::reservation::Reservation;
use crate::volume::VolumeError;

/// Pulls objects out of long-term storage into reserved cache space.
#[async_trait]
pub trait Restorer: Send + Sync {
    /// True if long-term storage definitely has no such object.
    async fn does_not_exist(&self, id: &str) -> Result<bool, CacheError>;

    /// The object's size in bytes, needed to reserve room for it.
    async fn size_of(&self, id: &str) -> Result<i64, CacheError>;

    /// Stream the object's bytes into the reservation under `objname`,
    /// recording whatever metadata long-term storage can vouch for.
    async fn restore(
        &self,
        id: &str,
        reservation: &mut Reservation,
        objname: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<CacheObject, CacheError>;

    /// The name the object should carry inside a cache volume.
    fn name_for(&self, id: &str) -> String {
        id.to_string()
    }
}

/// Restores objects on miss and keeps the cached copies healthy.
pub struct CacheManager {
    cache: Arc<Cache>,
    restorer: Arc<dyn Restorer>,
    monitor: IntegrityMonitor,
}

impl CacheManager {
    pub fn new(cache: Arc<Cache>, restorer: Arc<dyn Restorer>, config: &CacheConfig) -> Self {
        Self {
            monitor: IntegrityMonitor::standard(Arc::clone(&cache), config),
            cache,
            restorer,
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }

    /// Make sure an object is in the cache, restoring it if need be.
    /// Returns true if this call brought it in.
    #[instrument(skip(self))]
    pub async fn cache_object(&self, id: &str) -> Result<bool, CacheError> {
        self.cache_object_for(id, 0).await
    }

    /// Like [`cache_object`](Self::cache_object), restricting the restored
    /// copy to volumes matching a role preference mask.
    pub async fn cache_object_for(&self, id: &str, preferences: u32) -> Result<bool, CacheError> {
        if self.cache.is_cached(id).await? {
            return Ok(false);
        }
        if self.restorer.does_not_exist(id).await? {
            return Err(CacheError::RestorationTargetNotFound(id.to_string()));
        }

        let size = self.restorer.size_of(id).await?;
        let mut reservation = self.cache.reserve_space(size, preferences).await?;
        let objname = self.restorer.name_for(id);
        match self
            .restorer
            .restore(id, &mut reservation, &objname, None)
            .await
        {
            Ok(obj) => {
                if reservation.remaining() > 0 {
                    reservation.release().await?;
                }
                info!(id, volume = %obj.volname, size = obj.size(), "object restored to cache");
                Ok(true)
            }
            Err(e) => {
                let _ = reservation.release().await;
                Err(e)
            }
        }
    }

    /// Replace any cached copies with a fresh restore from long-term
    /// storage.  Used when a cached copy is known or suspected to be stale.
    #[instrument(skip(self))]
    pub async fn recache_object(&self, id: &str, preferences: u32) -> Result<(), CacheError> {
        self.cache.uncache(id).await?;
        self.cache_object_for(id, preferences).await?;
        Ok(())
    }

    /// A URL the cached object can be read from directly, when its volume
    /// supports one.  Restores the object first on a cache miss.
    pub async fn redirect_for(&self, id: &str) -> Result<Option<String>, CacheError> {
        let obj = self.fetch(id).await?;
        let Some(vol) = obj.volume.as_ref() else {
            return Ok(None);
        };
        match vol.redirect_for(&obj.name).await {
            Ok(url) => Ok(Some(url)),
            Err(VolumeError::Unsupported { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch an object, restoring it first when the cache misses.
    #[instrument(skip(self))]
    pub async fn fetch(&self, id: &str) -> Result<CacheObject, CacheError> {
        if let Some(obj) = self.cache.find_object(id).await? {
            return Ok(obj);
        }
        self.cache_object(id).await?;
        self.cache
            .find_object(id)
            .await?
            .ok_or_else(|| CacheError::NotFound(id.to_string()))
    }

    pub async fn is_cached(&self, id: &str) -> Result<bool, CacheError> {
        self.cache.is_cached(id).await
    }

    pub async fn uncache(&self, id: &str) -> Result<(), CacheError> {
        self.cache.uncache(id).await
    }

    /// Run an integrity sweep over everything due for a check.
    pub async fn check(&self, batch: usize) -> Result<SweepStats, CacheError> {
        self.monitor.sweep(batch).await
    }
}
