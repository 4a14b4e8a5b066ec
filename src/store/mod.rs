//! Credential and owner persistence.

mod file;
mod memory;
mod registry;

pub use file::MultiFileAuthStore;
pub use memory::{MemoryCredentialStore, MemoryRegistry};
pub use registry::JsonFileRegistry;

use crate::error::StoreError;
use crate::types::Jid;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Registry key holding the [`OwnerRecord`].
pub const OWNER_KEY: &str = "number";

/// X25519 or Ed25519 key pair, stored as raw 32-byte halves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(with = "b64::array")]
    pub public: [u8; 32],
    #[serde(with = "b64::array")]
    pub private: [u8; 32],
}

/// Credentials of the linked device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCreds {
    pub noise_key: KeyPair,
    pub signed_identity_key: KeyPair,
    #[serde(with = "b64::array")]
    pub adv_secret_key: [u8; 32],
    pub registration_id: u16,
    /// Our account JID, known once a pairing code was requested.
    #[serde(default)]
    pub me: Option<Jid>,
    #[serde(default)]
    pub pairing_code: Option<String>,
    /// Ephemeral key announced with the last pairing code request.
    #[serde(default)]
    pub pairing_ephemeral_key: Option<KeyPair>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Signed device identity after pairing.
    #[serde(default, with = "b64::option")]
    pub account: Option<Vec<u8>>,
    #[serde(default)]
    pub registered: bool,
}

/// Everything needed to resume or establish a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub creds: AuthCreds,
}

impl AuthState {
    /// Fresh, unregistered state with newly generated keys.
    pub fn generate() -> Self {
        let keys = crate::pairing::DeviceKeys::generate();
        Self {
            creds: AuthCreds {
                noise_key: keys.noise,
                signed_identity_key: keys.identity,
                adv_secret_key: keys.adv_secret,
                registration_id: keys.registration_id,
                me: None,
                pairing_code: None,
                pairing_ephemeral_key: None,
                platform: None,
                account: None,
                registered: false,
            },
        }
    }

    pub fn is_registered(&self) -> bool {
        self.creds.registered
    }
}

/// Loads and saves the device credentials across restarts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored state, or fresh unregistered state when nothing is stored.
    async fn load(&self) -> crate::Result<AuthState>;

    /// Persist the state. It is durable once this returns.
    async fn save(&self, state: &AuthState) -> crate::Result<()>;
}

/// Small key/value store. Only [`OWNER_KEY`] is used.
#[async_trait]
pub trait OwnerRegistry: Send + Sync {
    async fn get(&self, key: &str) -> crate::Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> crate::Result<()>;
}

pub type Credentials = Arc<dyn CredentialStore>;
pub type Registry = Arc<dyn OwnerRegistry>;

/// The single owner: pairing number and relay destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub number: String,
}

impl OwnerRecord {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
        }
    }

    pub async fn load(registry: &dyn OwnerRegistry) -> crate::Result<Option<Self>> {
        match registry.get(OWNER_KEY).await? {
            Some(value) => Ok(Some(
                serde_json::from_value(value).map_err(StoreError::Value)?,
            )),
            None => Ok(None),
        }
    }

    pub async fn save(&self, registry: &dyn OwnerRegistry) -> crate::Result<()> {
        let value = serde_json::to_value(self).map_err(StoreError::Value)?;
        registry.set(OWNER_KEY, value).await
    }

    /// Address relayed media is sent to.
    pub fn address(&self) -> Option<Jid> {
        Jid::user_address(&self.number)
    }
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> crate::Result<()> {
    let save_err = |source| StoreError::Save {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(save_err)?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(save_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(save_err)?;
    Ok(())
}

/// Base64 (standard alphabet) encoding for byte fields.
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub mod array {
        use super::*;

        pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&STANDARD.encode(bytes))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
            let s = String::deserialize(d)?;
            let bytes = STANDARD.decode(s).map_err(de::Error::custom)?;
            bytes
                .try_into()
                .map_err(|v: Vec<u8>| de::Error::invalid_length(v.len(), &"32 bytes"))
        }
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => s.serialize_some(&STANDARD.encode(b)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| STANDARD.decode(s).map_err(de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_state_is_unregistered() {
        let state = AuthState::generate();
        assert!(!state.is_registered());
        assert!(state.creds.me.is_none());
        assert_ne!(state.creds.noise_key.public, [0u8; 32]);
    }

    #[test]
    fn creds_json_uses_base64_and_camel_case() {
        let mut state = AuthState::generate();
        state.creds.account = Some(vec![1, 2, 3]);
        let json = serde_json::to_value(&state).unwrap();
        assert!(json["creds"]["advSecretKey"].is_string());
        assert_eq!(json["creds"]["account"], "AQID");
        let back: AuthState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn short_key_is_rejected() {
        let mut json = serde_json::to_value(AuthState::generate()).unwrap();
        json["creds"]["advSecretKey"] = serde_json::Value::String("AQID".into());
        assert!(serde_json::from_value::<AuthState>(json).is_err());
    }

    #[test]
    fn owner_address_strips_plus() {
        let owner = OwnerRecord::new("+15550001234");
        assert_eq!(
            owner.address().unwrap().to_string(),
            "15550001234@s.whatsapp.net"
        );
    }
}
