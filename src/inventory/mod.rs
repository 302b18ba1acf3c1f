// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage inventory: the system of record for cache contents.
//!
//! The [`Inventory`] tracks which object copies live in which volumes, along
//! with per-record metadata (size, checksum, priority, timestamps) and the
//! per-volume registry (capacity, status, roles).  Volumes themselves stay
//! dumb byte stores; the inventory is authoritative for status and capacity,
//! joined to volumes by name only.
//!
//! Implementations must preserve atomicity of individual record mutations;
//! beyond that the backing store is unconstrained.  [`MemoryInventory`] is
//! the in-process implementation shipped with this crate.

pub mod memory;

pub use memory::MemoryInventory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::object::{CacheObject, ScoredObject};
use crate::strategy::SelectionStrategy;

/// Prefix marking inventory records that account for reserved-but-unfilled
/// space rather than real objects.
pub const RESERVE_PREFIX: &str = "<reserve#";

/// The status of a registered volume, ordered from least to most capable.
///
/// Each level implies the ones below it: a `ReadWrite` volume also serves
/// reads and info queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    /// the volume must not be used at all
    Disabled,
    /// only object info (size, checksum, status) may be served
    InfoOnly,
    /// objects may be retrieved but not added or removed
    ReadOnly,
    /// objects may be added and removed
    ReadWrite,
}

/// The purpose behind a default selection query.
///
/// A closed set: anything not covered here goes through an explicit
/// [`SelectionStrategy`] instead of a new purpose label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// candidates for a deletion plan, most deletable first
    /// (priority descending, then oldest first)
    ForDeletion,
    /// deletion candidates favoring large objects
    /// (priority descending, largest first, then oldest first)
    ForDeletionBySize,
    /// deletion candidates favoring old objects
    /// (oldest first, then priority descending)
    ForDeletionByAge,
    /// objects due for an integrity check, least recently checked first
    ForCheck,
}

impl Default for Purpose {
    fn default() -> Self {
        Purpose::ForDeletion
    }
}

/// Errors raised by inventory operations.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// an unregistered volume name was used
    #[error("{0}: volume not registered in inventory")]
    VolumeNotFound(String),

    /// failure reaching or updating the backing store
    #[error("inventory access failure: {0}")]
    Access(String),

    /// a required metadata field is absent or has the wrong type
    #[error("{field}: metadatum missing or has unexpected type: {message}")]
    Metadata { field: String, message: String },

    /// a checksum algorithm name that was never registered
    #[error("{0}: not a registered checksum algorithm")]
    UnknownAlgorithm(String),
}

/// Per-volume registration info as the inventory records it.
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub name: String,
    pub capacity: i64,
    pub status: VolumeStatus,
    pub metadata: Map<String, Value>,
}

impl VolumeInfo {
    /// The role bitmask assigned at registration, 0 when none.
    pub fn roles(&self) -> u32 {
        self.metadata
            .get("roles")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }
}

/// The contract an inventory backing store must satisfy.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Find all copies of an object, restricted to volumes usable for
    /// retrieval (status at least [`VolumeStatus::ReadOnly`]).
    async fn find_object(&self, id: &str) -> Result<Vec<CacheObject>, InventoryError> {
        self.find_object_for(id, VolumeStatus::ReadOnly).await
    }

    /// Find all copies of an object in volumes with at least the given
    /// status.  For `ReadOnly` and above, only records whose bytes are
    /// believed present are returned.
    async fn find_object_for(
        &self,
        id: &str,
        purpose: VolumeStatus,
    ) -> Result<Vec<CacheObject>, InventoryError>;

    /// Find a single record by its (volume, name) pair, or `None`.
    async fn get_object(
        &self,
        volname: &str,
        objname: &str,
    ) -> Result<Option<CacheObject>, InventoryError>;

    /// Record the addition of an object to a volume, stamping the `since`
    /// timestamp and extracting size/checksum/priority from the metadata.
    /// Any previous record with the same (volume, name) is replaced.
    async fn add_object(
        &self,
        id: &str,
        volname: &str,
        objname: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<CacheObject, InventoryError>;

    /// Update only the named metadata fields of an existing record.
    /// Returns false if the record does not exist.
    async fn update_metadata(
        &self,
        volname: &str,
        objname: &str,
        metadata: &Map<String, Value>,
    ) -> Result<bool, InventoryError>;

    /// Set the record's last-access time to now.  Returns false if the
    /// record does not exist.
    async fn update_access_time(
        &self,
        volname: &str,
        objname: &str,
    ) -> Result<bool, InventoryError>;

    /// Set the record's last-checked time.  Returns false if the record
    /// does not exist.
    async fn update_checked_time(
        &self,
        volname: &str,
        objname: &str,
        when_ms: i64,
    ) -> Result<bool, InventoryError>;

    /// Purge the record for the named object in the named volume.
    async fn remove_object(&self, volname: &str, objname: &str) -> Result<(), InventoryError>;

    /// Select up to `limit` objects from one volume for a named purpose.
    async fn select_objects_from(
        &self,
        volname: &str,
        purpose: Purpose,
        limit: usize,
    ) -> Result<Vec<CacheObject>, InventoryError>;

    /// Select objects from one volume under an explicit strategy: the
    /// strategy is reset, candidates are scored in purpose order until the
    /// strategy reports its limit reached, and the result is sorted per the
    /// strategy.
    async fn select_scored_from(
        &self,
        volname: &str,
        strategy: &mut dyn SelectionStrategy,
    ) -> Result<Vec<ScoredObject>, InventoryError>;

    /// Select up to `limit` objects across all volumes for a named purpose.
    /// [`Purpose::ForCheck`] honors the check grace period and skips
    /// reservation records.
    async fn select_objects(
        &self,
        purpose: Purpose,
        limit: usize,
    ) -> Result<Vec<CacheObject>, InventoryError>;

    /// Cache-wide variant of [`select_scored_from`][Self::select_scored_from].
    async fn select_scored(
        &self,
        strategy: &mut dyn SelectionStrategy,
    ) -> Result<Vec<ScoredObject>, InventoryError>;

    /// Make a checksum algorithm name known to the inventory.
    async fn register_algorithm(&self, algname: &str) -> Result<(), InventoryError>;

    /// The checksum algorithm names known to the inventory.
    async fn algorithms(&self) -> Result<Vec<String>, InventoryError>;

    /// Register a volume available for storage.  Re-registering updates the
    /// capacity and metadata but never raises a previously lowered status.
    async fn register_volume(
        &self,
        name: &str,
        capacity: i64,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<(), InventoryError>;

    /// The names of the registered volumes.
    async fn volumes(&self) -> Result<Vec<String>, InventoryError>;

    /// The registration info for one volume.
    async fn volume_info(&self, name: &str) -> Result<VolumeInfo, InventoryError>;

    /// Update the status of a registered volume.
    async fn set_volume_status(
        &self,
        volname: &str,
        status: VolumeStatus,
    ) -> Result<(), InventoryError>;

    /// The current status of a registered volume.
    async fn volume_status(&self, volname: &str) -> Result<VolumeStatus, InventoryError>;

    /// Unused capacity in one volume, in bytes.  May be negative when the
    /// recorded contents exceed the registered capacity.
    async fn available_space_in(&self, volname: &str) -> Result<i64, InventoryError>;

    /// Unused capacity per volume.
    async fn available_space(&self) -> Result<HashMap<String, i64>, InventoryError>;

    /// Used space per volume: the sum of object sizes and open reservations.
    async fn used_space(&self) -> Result<HashMap<String, i64>, InventoryError>;

    /// Account for reserved space in a volume by creating a reservation
    /// record of the given size.  Returns the record's name.
    async fn reserve_space_in(&self, volname: &str, size: i64) -> Result<String, InventoryError>;
}
