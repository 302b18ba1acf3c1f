// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Space reservations.
//!
//! A [`Reservation`] is a claim on free space in one volume, created by
//! [`Cache::reserve_space`](crate::cache::Cache::reserve_space) after any
//! necessary evictions.  While it lives, the claimed bytes are accounted as
//! used in the inventory (under a `<reserve#...>` record), so concurrent
//! reservations cannot hand out the same space twice.  Saving objects
//! through the reservation converts claimed bytes into real ones; whatever
//! claim is left should be given back with [`release`](Reservation::release).

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::CacheError;
use crate::inventory::Inventory;
use crate::object::CacheObject;
use crate::volume::{CacheVolume, VolumeError};

const CHECKSUM_ALGORITHM: &str = "sha256";

/// Counts and fingerprints bytes as they stream through to a volume.
struct DigestReader<'a> {
    inner: &'a mut (dyn AsyncRead + Send + Unpin),
    count: u64,
    hasher: Sha256,
}

impl<'a> DigestReader<'a> {
    fn new(inner: &'a mut (dyn AsyncRead + Send + Unpin)) -> Self {
        Self {
            inner,
            count: 0,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (u64, String) {
        (self.count, hex::encode(self.hasher.finalize()))
    }
}

impl AsyncRead for DigestReader<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let res = Pin::new(&mut *this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = res {
            let fresh = &buf.filled()[before..];
            this.count += fresh.len() as u64;
            this.hasher.update(fresh);
        }
        res
    }
}

/// A claim on free space in one cache volume.
pub struct Reservation {
    cache: Weak<Cache>,
    inventory: Arc<dyn Inventory>,
    volume: Arc<dyn CacheVolume>,
    record: String,
    remaining: i64,
    released: bool,
}

impl Reservation {
    pub(crate) fn new(
        cache: Weak<Cache>,
        inventory: Arc<dyn Inventory>,
        volume: Arc<dyn CacheVolume>,
        record: String,
        size: i64,
    ) -> Self {
        Self {
            cache,
            inventory,
            volume,
            record,
            remaining: size,
            released: false,
        }
    }

    /// The volume this reservation claims space in.
    pub fn volume_name(&self) -> &str {
        self.volume.name()
    }

    /// Claimed bytes not yet converted into saved objects.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Save an object's bytes into the reserved space and record it in the
    /// inventory.
    ///
    /// The stream is hashed on the way through; unless the caller supplied
    /// its own checksum metadata, the computed sha256 is recorded.  When the
    /// metadata declares an expected `size`, a stream of any other length is
    /// rolled back and rejected.  The reservation shrinks by the bytes
    /// written and releases itself once exhausted.
    pub async fn save_as(
        &mut self,
        from: &mut (dyn AsyncRead + Send + Unpin),
        id: &str,
        objname: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<CacheObject, CacheError> {
        if self.released {
            return Err(CacheError::Volume(VolumeError::access(
                self.volume.name(),
                format!("reservation {} already released", self.record),
            )));
        }

        let mut md = metadata.cloned().unwrap_or_default();
        let mut reader = DigestReader::new(from);
        self.volume.save_as(&mut reader, objname, &mut md).await?;
        let (count, digest) = reader.finish();
        let written = count as i64;

        let expected = md.get("size").and_then(Value::as_i64);
        if let Some(expected) = expected {
            if expected != written {
                let _ = self.volume.remove(objname).await;
                return Err(CacheError::Volume(VolumeError::access(
                    self.volume.name(),
                    format!("{objname}: expected {expected} bytes, saved {written}"),
                )));
            }
        } else {
            md.insert("size".into(), json!(written));
        }
        if !md.contains_key("checksum") {
            self.inventory.register_algorithm(CHECKSUM_ALGORITHM).await?;
            md.insert("checksum".into(), json!(digest));
            md.insert("checksumAlgorithm".into(), json!(CHECKSUM_ALGORITHM));
        }

        let obj = match self
            .inventory
            .add_object(id, self.volume.name(), objname, Some(&md))
            .await
        {
            Ok(obj) => obj,
            Err(e) => {
                // the bytes are orphaned without a record; take them back out
                let _ = self.volume.remove(objname).await;
                return Err(e.into());
            }
        };

        self.remaining -= written;
        if self.remaining <= 0 {
            self.inventory
                .remove_object(self.volume.name(), &self.record)
                .await?;
            self.released = true;
            debug!(
                volume = self.volume.name(),
                reservation = %self.record,
                "reservation exhausted"
            );
        } else {
            let mut update = Map::new();
            update.insert("size".into(), json!(self.remaining));
            self.inventory
                .update_metadata(self.volume.name(), &self.record, &update)
                .await?;
        }

        let obj = obj.attached(Arc::clone(&self.volume));
        if let Some(cache) = self.cache.upgrade() {
            cache.notify_object_saved(&obj);
        }
        Ok(obj)
    }

    /// Give back whatever claim is left.
    pub async fn release(mut self) -> Result<(), CacheError> {
        if !self.released {
            self.inventory
                .remove_object(self.volume.name(), &self.record)
                .await?;
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.released {
            // can't touch the inventory from a sync drop; the claim stays on
            // the books until the volume is re-registered or swept
            warn!(
                volume = self.volume.name(),
                reservation = %self.record,
                remaining = self.remaining,
                "reservation dropped without release; claimed space stays recorded"
            );
        }
    }
}
