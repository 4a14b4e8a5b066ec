use super::{AuthState, CredentialStore, OwnerRegistry};
use crate::{error::StoreError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory credential store (for testing or single-run; not persistent).
pub struct MemoryCredentialStore {
    state: RwLock<Option<AuthState>>,
    saves: RwLock<usize>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            saves: RwLock::new(0),
        }
    }

    /// Store pre-seeded with `state`, as if saved by an earlier run.
    pub fn with_state(state: AuthState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
            saves: RwLock::new(0),
        }
    }

    /// Last saved state.
    pub fn snapshot(&self) -> Result<Option<AuthState>> {
        Ok(self
            .state
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?
            .clone())
    }

    pub fn save_count(&self) -> Result<usize> {
        Ok(*self
            .saves
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<AuthState> {
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(state.get_or_insert_with(AuthState::generate).clone())
    }

    async fn save(&self, state: &AuthState) -> Result<()> {
        *self
            .state
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))? = Some(state.clone());
        *self
            .saves
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))? += 1;
        Ok(())
    }
}

/// In-memory owner registry.
#[derive(Default)]
pub struct MemoryRegistry {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OwnerRegistry for MemoryRegistry {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OwnerRecord;

    #[tokio::test]
    async fn load_is_stable_until_saved() {
        let store = MemoryCredentialStore::new();
        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.save_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn save_replaces_state() {
        let store = MemoryCredentialStore::new();
        let mut state = store.load().await.unwrap();
        state.creds.registered = true;
        store.save(&state).await.unwrap();
        assert!(store.load().await.unwrap().is_registered());
        assert_eq!(store.save_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn registry_round_trips_owner() {
        let registry = MemoryRegistry::new();
        assert!(OwnerRecord::load(&registry).await.unwrap().is_none());
        OwnerRecord::new("+15550001234")
            .save(&registry)
            .await
            .unwrap();
        let owner = OwnerRecord::load(&registry).await.unwrap().unwrap();
        assert_eq!(owner.number, "+15550001234");
    }

    #[tokio::test]
    async fn malformed_owner_value_is_an_error() {
        let registry = MemoryRegistry::new();
        registry
            .set("number", serde_json::json!("+15550001234"))
            .await
            .unwrap();
        assert!(OwnerRecord::load(&registry).await.is_err());
    }
}
