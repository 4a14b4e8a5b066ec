//! File-backed owner registry.

use super::{write_atomic, OwnerRegistry};
use crate::error::StoreError;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Key/value registry persisted as one JSON object file.
///
/// Reads go to disk every time so edits made while the agent runs are picked up.
pub struct JsonFileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Load {
                    path: self.path.clone(),
                    source,
                }
                .into())
            }
        };
        let map = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(map)
    }
}

#[async_trait]
impl OwnerRegistry for JsonFileRegistry {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&map).map_err(StoreError::Value)?;
        write_atomic(&self.path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OwnerRecord;
    use serde_json::json;

    #[tokio::test]
    async fn absent_key_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = JsonFileRegistry::new(tmp.path().join("owner.json"));
        assert!(registry.get("number").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_keeps_other_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = JsonFileRegistry::new(tmp.path().join("owner.json"));
        registry.set("a", json!(1)).await.unwrap();
        registry.set("b", json!({"x": true})).await.unwrap();
        assert_eq!(registry.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(registry.get("b").await.unwrap(), Some(json!({"x": true})));
    }

    #[tokio::test]
    async fn owner_record_shape_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("owner.json");
        let registry = JsonFileRegistry::new(&path);
        OwnerRecord::new("+15550001234")
            .save(&registry)
            .await
            .unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, json!({"number": {"number": "+15550001234"}}));

        let reopened = JsonFileRegistry::new(&path);
        let owner = OwnerRecord::load(&reopened).await.unwrap().unwrap();
        assert_eq!(owner.number, "+15550001234");
    }
}
