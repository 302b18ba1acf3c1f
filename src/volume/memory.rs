use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{CacheVolume, ObjectStream, VolumeError};
use crate::object::CacheObject;

/// A volume that holds its objects in process memory.
///
/// Backed by a concurrent map, so it is safe to share across tasks.  Useful
/// for tests and for small, transient front caches.
pub struct MemoryVolume {
    name: String,
    data: DashMap<String, Vec<u8>>,
}

impl MemoryVolume {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: DashMap::new(),
        }
    }

    /// Current object count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl CacheVolume for MemoryVolume {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.data.contains_key(name))
    }

    async fn save_as(
        &self,
        from: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
        metadata: &mut Map<String, Value>,
    ) -> Result<(), VolumeError> {
        let mut bytes = Vec::new();
        from.read_to_end(&mut bytes)
            .await
            .map_err(|e| VolumeError::io(&self.name, format!("failed to save {name}"), e))?;
        metadata.insert("modified".into(), json!(crate::now_millis()));
        self.data.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn get_stream(&self, name: &str) -> Result<ObjectStream, VolumeError> {
        match self.data.get(name) {
            Some(bytes) => Ok(Box::new(std::io::Cursor::new(bytes.value().clone()))),
            None => Err(VolumeError::not_found(&self.name, name)),
        }
    }

    async fn get(&self, name: &str) -> Result<CacheObject, VolumeError> {
        match self.data.get(name) {
            Some(bytes) => {
                let mut md = Map::new();
                md.insert("size".into(), json!(bytes.value().len() as i64));
                Ok(CacheObject::with_metadata(name, &self.name, md))
            }
            None => Err(VolumeError::not_found(&self.name, name)),
        }
    }

    async fn remove(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.data.remove(name).is_some())
    }
}
