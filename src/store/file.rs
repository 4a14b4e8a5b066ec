//! Credentials on disk, one JSON document per store directory.

use super::{write_atomic, AuthState, CredentialStore};
use crate::error::StoreError;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const CREDS_FILE: &str = "creds.json";

/// Credential store kept as files under one directory (`<dir>/creds.json`).
pub struct MultiFileAuthStore {
    dir: PathBuf,
}

impl MultiFileAuthStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }
}

#[async_trait]
impl CredentialStore for MultiFileAuthStore {
    async fn load(&self) -> Result<AuthState> {
        let path = self.creds_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    dir = %self.dir.display(),
                    "no stored credentials, generating new ones"
                );
                return Ok(AuthState::generate());
            }
            Err(source) => return Err(StoreError::Load { path, source }.into()),
        };
        let state = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(state)
    }

    async fn save(&self, state: &AuthState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).map_err(StoreError::Value)?;
        write_atomic(&self.creds_path(), &bytes).await?;
        tracing::debug!(registered = state.creds.registered, "credentials saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Jid;

    #[tokio::test]
    async fn missing_dir_yields_fresh_state() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MultiFileAuthStore::new(tmp.path().join("auth"));
        let state = store.load().await.unwrap();
        assert!(!state.is_registered());
    }

    #[tokio::test]
    async fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MultiFileAuthStore::new(tmp.path().join("auth"));
        let mut state = AuthState::generate();
        state.creds.registered = true;
        state.creds.me = Some(Jid::new("15550001234", "s.whatsapp.net"));

        store.save(&state).await.unwrap();
        assert!(tmp.path().join("auth").join("creds.json").exists());
        assert!(!tmp.path().join("auth").join("creds.tmp").exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("creds.json"), b"{not json").unwrap();
        let store = MultiFileAuthStore::new(tmp.path());
        let err = store.load().await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Store(StoreError::Corrupt { .. })
        ));
    }
}
