// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The standard integrity checks.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use super::ObjectCheck;
use crate::error::CacheError;
use crate::object::CacheObject;
use crate::volume::CacheVolume;

fn require_volume(object: &CacheObject) -> Result<&dyn CacheVolume, CacheError> {
    match &object.volume {
        Some(vol) => Ok(vol.as_ref()),
        None => Err(CacheError::Inaccessible {
            volume: object.volname.clone(),
            name: object.name.clone(),
            message: "object is not attached to a live volume".to_string(),
        }),
    }
}

/// Fails objects whose bytes in the volume do not match the recorded size.
pub struct SizeCheck;

#[async_trait]
impl ObjectCheck for SizeCheck {
    fn name(&self) -> &str {
        "size"
    }

    async fn check(&self, object: &CacheObject) -> Result<(), CacheError> {
        let recorded = object.size();
        if recorded < 0 {
            // nothing to compare against
            return Ok(());
        }
        let vol = require_volume(object)?;
        let actual = match vol.get(&object.name).await {
            Ok(snapshot) => snapshot.size(),
            // a record whose bytes are gone is corrupt, not unverifiable
            Err(e) if e.is_not_found() => {
                return Err(CacheError::integrity(
                    &object.volname,
                    &object.name,
                    "object no longer present in its volume",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        if actual >= 0 && actual != recorded {
            return Err(CacheError::integrity(
                &object.volname,
                &object.name,
                format!("recorded {recorded} bytes but volume holds {actual}"),
            ));
        }
        Ok(())
    }
}

/// Fails objects whose bytes no longer hash to the recorded checksum.
pub struct ChecksumCheck;

#[async_trait]
impl ObjectCheck for ChecksumCheck {
    fn name(&self) -> &str {
        "checksum"
    }

    async fn check(&self, object: &CacheObject) -> Result<(), CacheError> {
        let Some(recorded) = object
            .metadata()
            .get("checksum")
            .and_then(serde_json::Value::as_str)
        else {
            return Err(CacheError::integrity(
                &object.volname,
                &object.name,
                "no checksum recorded",
            ));
        };
        let algorithm = object.metadatum_str("checksumAlgorithm", "sha256");
        if algorithm != "sha256" {
            return Err(CacheError::integrity(
                &object.volname,
                &object.name,
                format!("{algorithm}: cannot verify this checksum algorithm"),
            ));
        }

        let vol = require_volume(object)?;
        let mut stream = match vol.get_stream(&object.name).await {
            Ok(stream) => stream,
            Err(e) if e.is_not_found() => {
                return Err(CacheError::integrity(
                    &object.volname,
                    &object.name,
                    "object no longer present in its volume",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| CacheError::Inaccessible {
                    volume: object.volname.clone(),
                    name: object.name.clone(),
                    message: e.to_string(),
                })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let actual = hex::encode(hasher.finalize());
        if actual != recorded {
            return Err(CacheError::integrity(
                &object.volname,
                &object.name,
                format!("checksum mismatch: recorded {recorded}, computed {actual}"),
            ));
        }
        Ok(())
    }
}

/// Fails objects that have sat in the cache beyond their welcome.
pub struct ExpiryCheck {
    max_age_ms: i64,
}

impl ExpiryCheck {
    #[must_use]
    pub fn new(expiry_days: u32) -> Self {
        Self {
            max_age_ms: i64::from(expiry_days) * 86_400_000,
        }
    }
}

#[async_trait]
impl ObjectCheck for ExpiryCheck {
    fn name(&self) -> &str {
        "expiry"
    }

    async fn check(&self, object: &CacheObject) -> Result<(), CacheError> {
        let modified = object.last_modified();
        if modified < 0 {
            return Ok(());
        }
        let age = crate::now_millis() - modified;
        if age > self.max_age_ms {
            return Err(CacheError::integrity(
                &object.volname,
                &object.name,
                format!("object has gone {age} ms without update"),
            ));
        }
        Ok(())
    }
}
