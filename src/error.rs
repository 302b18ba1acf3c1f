// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for cache operations.

use thiserror::Error;

use crate::inventory::InventoryError;
use crate::volume::VolumeError;

/// Errors raised by cache-level operations.
///
/// Volume and inventory failures convert in via `From`, so `?` composes
/// across the layers.
#[derive(Error, Debug)]
pub enum CacheError {
    /// the requested object is not in the cache
    #[error("{0}: object not found in cache")]
    NotFound(String),

    /// a failure in a volume's byte store
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// a failure in the inventory
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// a cached object failed an integrity check
    #[error("{volume}:{name}: integrity check failed: {message}")]
    Integrity {
        volume: String,
        name: String,
        message: String,
    },

    /// no volume was eligible to receive the requested reservation
    #[error("no cache volumes match the space request: {0}")]
    NoMatchingVolumes(String),

    /// deletion could not free the space a plan called for
    #[error("unable to free the requested space: {0}")]
    DeletionFailure(String),

    /// restoring an object from long-term storage failed
    #[error("{id}: restoration failed: {message}")]
    Restoration { id: String, message: String },

    /// the object to restore does not exist in long-term storage
    #[error("{0}: no such object in long-term storage")]
    RestorationTargetNotFound(String),

    /// the inventory names a volume this cache has no handle for
    #[error("{0}: volume not attached to this cache")]
    MissingVolume(String),

    /// an object's record exists but its bytes cannot be reached
    #[error("{volume}:{name}: object bytes are inaccessible: {message}")]
    Inaccessible {
        volume: String,
        name: String,
        message: String,
    },

    /// an integrity pass gave up after too many checks could not run
    #[error("integrity checking aborted: {0}")]
    CheckAborted(String),
}

impl CacheError {
    pub(crate) fn integrity(
        volume: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            volume: volume.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// True for the not-found family, where retrying cannot help.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::RestorationTargetNotFound(_)
        ) || matches!(self, Self::Volume(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
