// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filesystem-backed cache volume.
//!
//! Objects are stored as files under a root directory, with the object name
//! used as the relative path.  An optional base URL enables
//! [`redirect_for`](crate::volume::CacheVolume::redirect_for) so web clients
//! can fetch objects without a stream copy through this process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::fs;
use tokio::io::AsyncRead;

use super::{CacheVolume, ObjectStream, VolumeError};
use crate::object::CacheObject;

/// A cache volume storing objects as files under a root directory.
pub struct FilesystemVolume {
    name: String,
    root: PathBuf,
    base_url: Option<String>,
}

impl FilesystemVolume {
    /// Open a volume rooted at an existing directory.
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self, VolumeError> {
        let name = name.into();
        let root = root.into();
        if !root.is_dir() {
            return Err(VolumeError::access(
                &name,
                format!("{}: not an existing directory", root.display()),
            ));
        }
        Ok(Self {
            name,
            root,
            base_url: None,
        })
    }

    /// Open a volume that can also hand out direct-access URLs formed by
    /// appending the object name to `base_url`.
    pub fn with_redirect_base(
        root: impl Into<PathBuf>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, VolumeError> {
        let mut vol = Self::new(root, name)?;
        let mut base = base_url.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        vol.base_url = Some(base);
        Ok(vol)
    }

    /// The directory this volume stores its objects under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl CacheVolume for FilesystemVolume {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.path_for(name).is_file())
    }

    async fn save_as(
        &self,
        from: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
        metadata: &mut Map<String, Value>,
    ) -> Result<(), VolumeError> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VolumeError::io(&self.name, format!("failed to save {name}"), e))?;
        }
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| VolumeError::io(&self.name, format!("failed to save {name}"), e))?;
        if let Err(e) = tokio::io::copy(from, &mut file).await {
            // don't leave a partial object behind
            let _ = fs::remove_file(&path).await;
            return Err(VolumeError::io(
                &self.name,
                format!("failed to save {name}"),
                e,
            ));
        }
        metadata.insert("modified".into(), json!(crate::now_millis()));
        Ok(())
    }

    async fn get_stream(&self, name: &str) -> Result<ObjectStream, VolumeError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(VolumeError::not_found(&self.name, name));
        }
        let file = fs::File::open(&path)
            .await
            .map_err(|e| VolumeError::io(&self.name, format!("failed to open {name}"), e))?;
        Ok(Box::new(file))
    }

    async fn get(&self, name: &str) -> Result<CacheObject, VolumeError> {
        let path = self.path_for(name);
        let meta = fs::metadata(&path)
            .await
            .map_err(|_| VolumeError::not_found(&self.name, name))?;
        if !meta.is_file() {
            return Err(VolumeError::not_found(&self.name, name));
        }
        let mut md = Map::new();
        md.insert("size".into(), json!(meta.len() as i64));
        if let Ok(modt) = meta.modified() {
            if let Ok(dur) = modt.duration_since(std::time::UNIX_EPOCH) {
                md.insert("modified".into(), json!(dur.as_millis() as i64));
            }
        }
        Ok(CacheObject::with_metadata(name, &self.name, md))
    }

    async fn remove(&self, name: &str) -> Result<bool, VolumeError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .await
            .map_err(|e| VolumeError::io(&self.name, format!("failed to remove {name}"), e))?;
        Ok(true)
    }

    async fn redirect_for(&self, name: &str) -> Result<String, VolumeError> {
        match &self.base_url {
            Some(base) => Ok(format!("{base}{name}")),
            None => Err(VolumeError::Unsupported {
                volume: self.name.clone(),
                operation: "redirect_for".to_string(),
            }),
        }
    }
}
