//! # viewonce-relay
//!
//! WhatsApp linked-device agent that forwards view-once media to the account
//! owner as ordinary, re-viewable messages.
//!
//! ## Features
//!
//! - Pairing-code linking with credentials persisted across restarts
//! - Automatic reconnect on every disconnect except logout
//! - View-once detection, media download, MIME sniffing and forwarding
//! - HTTP liveness page for hosts that need a keep-alive ping
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use viewonce_relay::{
//!     client::ClientConnector,
//!     pairing::StdinPrompt,
//!     store::{JsonFileRegistry, MultiFileAuthStore},
//!     SessionManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut manager = SessionManager::new(
//!         Arc::new(ClientConnector::new()),
//!         Arc::new(MultiFileAuthStore::new("auth")),
//!         Arc::new(JsonFileRegistry::new("owner.json")),
//!         Arc::new(StdinPrompt::default()),
//!     );
//!     let halt = manager.run().await?;
//!     println!("stopped: {halt:?}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod liveness;
pub mod logging;
pub mod pairing;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use client::{Client, ClientConnector, CompletePairingParams};
pub use config::Config;
pub use error::{Error, Result};
pub use events::Event;
pub use protocol::{Connector, ProtocolClient};
pub use relay::{Relay, RelayOutcome};
pub use session::{Halt, SessionManager};
pub use store::{CredentialStore, OwnerRecord, OwnerRegistry};
pub use transport::Transport;
pub use types::{Jid, MessageId};
