use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tokio::io::AsyncRead;

use super::{drain, CacheVolume, ObjectStream, VolumeError};
use crate::object::CacheObject;

/// A volume that discards bytes and only remembers object names.
///
/// Serves two purposes: a harmless stand-in where a live volume is required
/// but no real storage is wanted, and a test double for exercising cache
/// logic without touching bytes.
pub struct NullVolume {
    name: String,
    holdings: Mutex<HashSet<String>>,
}

impl NullVolume {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holdings: Mutex::new(HashSet::new()),
        }
    }

    /// Declare an object present without writing any bytes.
    pub fn add_object_name(&self, name: impl Into<String>) {
        self.holdings.lock().insert(name.into());
    }
}

#[async_trait]
impl CacheVolume for NullVolume {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.holdings.lock().contains(name))
    }

    async fn save_as(
        &self,
        from: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
        _metadata: &mut Map<String, Value>,
    ) -> Result<(), VolumeError> {
        drain(from)
            .await
            .map_err(|e| VolumeError::io(&self.name, format!("trouble reading {name}"), e))?;
        self.add_object_name(name);
        Ok(())
    }

    async fn get_stream(&self, name: &str) -> Result<ObjectStream, VolumeError> {
        if !self.holdings.lock().contains(name) {
            return Err(VolumeError::not_found(&self.name, name));
        }
        Ok(Box::new(std::io::Cursor::new(Vec::new())))
    }

    async fn get(&self, name: &str) -> Result<CacheObject, VolumeError> {
        if !self.holdings.lock().contains(name) {
            return Err(VolumeError::not_found(&self.name, name));
        }
        Ok(CacheObject::new(name, &self.name))
    }

    async fn remove(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.holdings.lock().remove(name))
    }
}
