//! Transport abstraction for the wire under [`Client`](crate::client::Client).
//!
//! Implement this trait to plug in a Noise-over-WebSocket connection or any other
//! carrier. The client uses it for sending encoded nodes and fetching media;
//! receiving is done by the transport itself, which feeds the client through
//! its public methods.

use crate::events::MediaRef;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one encoded node.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Fetch and decrypt media from the CDN.
    async fn fetch_media(&self, media: &MediaRef) -> Result<Bytes>;

    async fn close(&self) -> Result<()>;
}

/// Creates one transport per session.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn Transport>>;
}
