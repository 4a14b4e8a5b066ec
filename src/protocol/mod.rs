//! Seam between the relay core and the WhatsApp protocol client.
//!
//! The core only talks to [`ProtocolClient`] and [`Connector`]; the bundled
//! [`Client`](crate::client::Client) is one implementation, tests use a fake.

#[cfg(test)]
pub(crate) mod mock;

use crate::events::{Event, InboundMessage};
use crate::store::AuthState;
use crate::types::{Jid, MessageId};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;

/// Receiving half of a session's event subscription. Dropping it unsubscribes.
pub type EventStream = mpsc::UnboundedReceiver<Event>;

/// How the linked device presents itself in the phone's device list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BrowserIdentity {
    pub platform: String,
    pub browser: String,
    pub version: String,
}

impl Default for BrowserIdentity {
    fn default() -> Self {
        Self {
            platform: "Linux".to_string(),
            browser: "Firefox".to_string(),
            version: "124.0".to_string(),
        }
    }
}

impl fmt::Display for BrowserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.browser, self.platform)
    }
}

/// Everything a client needs to open one session.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    pub auth: AuthState,
    pub browser: BrowserIdentity,
    /// Span the client logs under. Its target is filtered separately so
    /// protocol chatter stays out of the operator's log.
    pub logger: tracing::Span,
}

/// Top-level media kind of an outgoing message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    /// Category from a MIME type: the part before `/`, anything unknown is a document.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().map(str::trim) {
            Some("image") => Self::Image,
            Some("video") => Self::Video,
            Some("audio") => Self::Audio,
            _ => Self::Document,
        }
    }

    /// Payload key used by the protocol for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media message to send.
#[derive(Clone, Debug)]
pub struct OutgoingMedia {
    pub category: MediaCategory,
    pub data: Bytes,
    pub caption: Option<String>,
    pub mimetype: Option<String>,
    /// Only meaningful for documents.
    pub file_name: Option<String>,
}

/// Response from sending a message.
#[derive(Clone, Debug)]
pub struct SendResponse {
    pub timestamp: SystemTime,
    pub id: MessageId,
}

/// One live protocol session.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Current credentials as the client sees them.
    fn auth_state(&self) -> AuthState;

    /// Ask the server for a pairing code to link `phone_number`.
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String>;

    /// Download and decrypt the media referenced by `message`.
    async fn download_media(&self, message: &InboundMessage) -> Result<Bytes>;

    async fn send_message(&self, to: &Jid, media: OutgoingMedia) -> Result<SendResponse>;

    /// Close the connection. No events are delivered afterwards.
    async fn close(&self);
}

/// Opens sessions. Each call yields a new client and its event subscription.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, config: SocketConfig) -> Result<(Arc<dyn ProtocolClient>, EventStream)>;
}
