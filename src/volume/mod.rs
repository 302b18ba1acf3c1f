// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache volume storage abstraction.
//!
//! A [`CacheVolume`] is a dumb byte store: it can save, stream, and remove
//! named objects, and nothing else.  It knows nothing about other volumes,
//! capacities, statuses, or which objects "should" be in it; all of that
//! bookkeeping belongs to the [`Inventory`](crate::inventory::Inventory).
//!
//! Implementations:
//! - [`FilesystemVolume`]: objects as files under a root directory
//! - [`MemoryVolume`]: objects in process memory, mainly for tests and
//!   small transient caches
//! - [`NullVolume`]: discards bytes, remembers names; a harmless stand-in
//!   and test double

pub mod filesystem;
pub mod memory;
pub mod null;

pub use filesystem::FilesystemVolume;
pub use memory::MemoryVolume;
pub use null::NullVolume;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::object::CacheObject;

/// A readable byte stream handed out by a volume.
pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

/// Errors raised by volume operations.
///
/// Every operation fails with either *not-found* (the named object is absent)
/// or a general storage-access error; callers rely on that distinction when
/// deciding whether a record is stale or the storage itself is in trouble.
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("{volume}:{name}: object not found in volume")]
    NotFound { volume: String, name: String },

    #[error("{volume}: operation not supported: {operation}")]
    Unsupported { volume: String, operation: String },

    #[error("{volume}: storage access failure: {message}")]
    Access {
        volume: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl VolumeError {
    pub fn not_found(volume: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            volume: volume.into(),
            name: name.into(),
        }
    }

    pub fn access(volume: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            volume: volume.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn io(volume: impl Into<String>, message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Access {
            volume: volume.into(),
            message: message.into(),
            source: Some(err),
        }
    }

    /// True for the *not-found* kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Storage for holding data objects.
///
/// Implementations hide how bytes are organized in the underlying storage.
/// `exists()` answers whether a named object is physically present; search
/// and metadata live in the inventory, not here.
#[async_trait]
pub trait CacheVolume: Send + Sync {
    /// The name this volume is registered under.
    fn name(&self) -> &str;

    /// True if an object with the given name exists in this volume.
    async fn exists(&self, name: &str) -> Result<bool, VolumeError>;

    /// Save a copy of an object to this volume, replacing any existing
    /// object with the same name.  The metadata may be augmented (e.g. with
    /// a `modified` timestamp reflecting the write).
    async fn save_as(
        &self,
        from: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
        metadata: &mut Map<String, Value>,
    ) -> Result<(), VolumeError>;

    /// Copy an object held in another volume into this one.
    ///
    /// Fails if the source object is missing or if source and destination
    /// resolve to the same object.  Implementations may optimize same-backend
    /// copies; this default streams through memory.
    async fn save_from(&self, obj: &CacheObject, name: &str) -> Result<(), VolumeError> {
        let src = obj.volume.as_ref().ok_or_else(|| {
            VolumeError::access(
                self.name(),
                format!("no live volume attached for source object {}", obj.name),
            )
        })?;
        if src.name() == self.name() && obj.name == name {
            return Err(VolumeError::access(
                self.name(),
                format!("request to copy {}:{} onto itself", obj.volname, obj.name),
            ));
        }
        if !src.exists(&obj.name).await? {
            return Err(VolumeError::not_found(src.name(), &obj.name));
        }
        let mut stream = src.get_stream(&obj.name).await?;
        let mut md = obj.export_metadata();
        self.save_as(&mut stream, name, &mut md).await
    }

    /// Open a byte stream on the named object.
    async fn get_stream(&self, name: &str) -> Result<ObjectStream, VolumeError>;

    /// Return a snapshot describing the named object as the volume sees it
    /// (at minimum, its physical size).
    async fn get(&self, name: &str) -> Result<CacheObject, VolumeError>;

    /// Remove the named object.  Returns `Ok(false)` when there was nothing
    /// to remove; that is not an error.
    async fn remove(&self, name: &str) -> Result<bool, VolumeError>;

    /// A URL the object can be read from directly, bypassing a stream copy.
    ///
    /// Volumes without direct access signal [`VolumeError::Unsupported`].
    async fn redirect_for(&self, name: &str) -> Result<String, VolumeError> {
        let _ = name;
        Err(VolumeError::Unsupported {
            volume: self.name().to_string(),
            operation: "redirect_for".to_string(),
        })
    }
}

/// Drain a reader to the end, returning the byte count.  Used by volumes
/// that must consume their input even when discarding it.
pub(crate) async fn drain(from: &mut (dyn AsyncRead + Send + Unpin)) -> std::io::Result<u64> {
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = from.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
    }
}
