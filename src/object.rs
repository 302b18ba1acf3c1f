// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache object data model.
//!
//! A [`CacheObject`] is a value snapshot of one copy of a data object held in
//! one cache volume.  It pairs the object's identity (its volume-independent
//! `id`, the volume it sits in, and the name it has inside that volume) with
//! the metadata the inventory recorded for it (size, checksum, timestamps,
//! and arbitrary application fields).
//!
//! A `CacheObject` is not a live handle: many code paths (notably inventory
//! queries) return objects with no attached [`CacheVolume`].  Callers that
//! need byte access must first resolve `volname` to a live volume, which is
//! what [`Cache::find_object`](crate::cache::Cache::find_object) does.
//!
//! # Example
//!
//! ```
//! use depot_cache::object::CacheObject;
//! use serde_json::json;
//!
//! let mut md = serde_json::Map::new();
//! md.insert("size".into(), json!(2048));
//! md.insert("priority".into(), json!(10));
//!
//! let obj = CacheObject::with_metadata("goob/file.dat", "vol-a", md);
//! assert_eq!(obj.size(), 2048);
//! assert_eq!(obj.metadatum_i64("priority", 0), 10);
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::volume::CacheVolume;

/// One copy of a data object as recorded in the cache.
///
/// This is a value snapshot, not an identity: it is created fresh by
/// inventory lookups and selection queries, and nothing keeps it in sync with
/// the store afterward.
#[derive(Clone)]
pub struct CacheObject {
    /// the volume-independent identifier for the object, if known
    pub id: Option<String>,
    /// the name the object has within its volume
    pub name: String,
    /// the name of the volume holding this copy
    pub volname: String,
    /// a live handle on the holding volume.  Often `None`: inventory
    /// implementations cannot instantiate volumes, so attachment happens
    /// later (e.g. in `Cache::find_object` or the integrity monitor).
    pub volume: Option<Arc<dyn CacheVolume>>,
    /// whether the inventory currently believes the bytes are in the volume
    pub cached: bool,
    metadata: Map<String, Value>,
}

impl CacheObject {
    /// Create an object snapshot with empty metadata.
    pub fn new(name: impl Into<String>, volname: impl Into<String>) -> Self {
        Self::with_metadata(name, volname, Map::new())
    }

    /// Create an object snapshot carrying the given metadata.
    pub fn with_metadata(
        name: impl Into<String>,
        volname: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            volname: volname.into(),
            volume: None,
            cached: true,
            metadata,
        }
    }

    /// Attach a live volume handle, fixing `volname` to match.
    #[must_use]
    pub fn attached(mut self, volume: Arc<dyn CacheVolume>) -> Self {
        self.volname = volume.name().to_string();
        self.volume = Some(volume);
        self
    }

    /// The size of the object in bytes, or -1 if unknown.
    pub fn size(&self) -> i64 {
        self.metadatum_i64("size", -1)
    }

    /// The last-modified time in epoch milliseconds, or -1 if unknown.
    ///
    /// Falls back to the `since` timestamp (when the copy entered the cache)
    /// when no explicit `modified` value was recorded.
    pub fn last_modified(&self) -> i64 {
        let modt = self.metadatum_i64("modified", -1);
        if modt >= 0 {
            modt
        } else {
            self.metadatum_i64("since", -1)
        }
    }

    /// True if a value exists for the named metadatum.
    pub fn has_metadatum(&self, name: &str) -> bool {
        self.metadata.contains_key(name)
    }

    /// Look up an integer metadatum, returning `defval` when absent or when
    /// the stored value is not a number.
    pub fn metadatum_i64(&self, name: &str, defval: i64) -> i64 {
        self.metadata
            .get(name)
            .and_then(Value::as_i64)
            .unwrap_or(defval)
    }

    /// Look up a string metadatum, returning `defval` when absent or when
    /// the stored value is not a string.
    pub fn metadatum_str<'a>(&'a self, name: &str, defval: &'a str) -> &'a str {
        self.metadata
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or(defval)
    }

    /// Borrow the full metadata map.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Set one metadatum, replacing any previous value.
    pub fn set_metadatum(&mut self, name: impl Into<String>, value: Value) {
        self.metadata.insert(name.into(), value);
    }

    /// Return an owned copy of the metadata.
    pub fn export_metadata(&self) -> Map<String, Value> {
        self.metadata.clone()
    }
}

impl fmt::Debug for CacheObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("volname", &self.volname)
            .field("attached", &self.volume.is_some())
            .field("cached", &self.cached)
            .field("size", &self.size())
            .finish()
    }
}

/// A cache object paired with the deletability score a selection pass gave
/// it.
///
/// Scores live here, next to the snapshot they describe, rather than as a
/// mutable scratch field on the shared object value; a score is only
/// meaningful within the selection pass that produced it.
#[derive(Debug, Clone)]
pub struct ScoredObject {
    pub object: CacheObject,
    pub score: f64,
}

impl ScoredObject {
    pub fn new(object: CacheObject, score: f64) -> Self {
        Self { object, score }
    }
}
