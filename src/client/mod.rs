//! Bundled protocol client.
//!
//! Keeps the device credentials, issues pairing codes, completes pairing and
//! turns wire activity into [`Event`]s. The wire itself is a [`Transport`];
//! without one attached the client stays in the connecting phase.

mod send;

use crate::error::{ConnectionError, Error, MediaError, PairingError, SendError};
use crate::events::{
    ConnectionPhase, ConnectionUpdate, DisconnectError, DisconnectReason, Event, InboundMessage,
    MessagesUpsert,
};
use crate::pairing;
use crate::protocol::{
    BrowserIdentity, Connector, EventStream, OutgoingMedia, ProtocolClient, SendResponse,
    SocketConfig,
};
use crate::store::{AuthCreds, AuthState, KeyPair};
use crate::transport::{Transport, TransportFactory};
use crate::types::{Jid, MessageId};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::Digest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, RwLock};

/// Parameters for completing pairing after the phone accepted the code.
#[derive(Clone, Debug)]
pub struct CompletePairingParams<'a> {
    /// Device identity from the server: payload || HMAC-SHA256 tag keyed with the adv secret.
    pub device_identity_bytes: &'a [u8],
    pub jid: Jid,
    pub platform: &'a str,
}

/// Client for one session of the WhatsApp web multidevice API.
pub struct Client {
    auth: std::sync::RwLock<AuthState>,
    browser: BrowserIdentity,
    events: mpsc::UnboundedSender<Event>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    connected: AtomicBool,
    span: tracing::Span,
}

impl Client {
    /// Create a client and the event stream it reports into.
    pub fn new(config: SocketConfig) -> (Self, EventStream) {
        let (events, rx) = mpsc::unbounded_channel();
        let client = Self {
            auth: std::sync::RwLock::new(config.auth),
            browser: config.browser,
            events,
            transport: RwLock::new(None),
            connected: AtomicBool::new(false),
            span: config.logger,
        };
        (client, rx)
    }

    pub async fn attach_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write().await = Some(transport);
    }

    /// Start the session. Registered devices go straight to `open`; unregistered
    /// ones wait in `connecting` until pairing completes.
    ///
    /// A stored `account` whose signature does not verify is an error.
    pub async fn connect(&self) -> crate::Result<()> {
        let account = self.read_auth().creds.account.clone();
        if let Some(account) = account {
            pairing::verify_signed_identity(&account)?;
        }
        self.emit(Event::ConnectionUpdate(ConnectionUpdate {
            connection: Some(ConnectionPhase::Connecting),
            last_disconnect: None,
        }));
        if self.transport.read().await.is_none() {
            tracing::warn!(parent: &self.span, "no transport attached, session stays idle");
            return Ok(());
        }
        if self.is_registered() {
            self.connected.store(true, Ordering::SeqCst);
            tracing::debug!(parent: &self.span, browser = %self.browser, "session open");
            self.emit(Event::ConnectionUpdate(ConnectionUpdate::open()));
        }
        Ok(())
    }

    /// Called by the transport when the connection dropped.
    pub async fn handle_disconnect(&self, error: DisconnectError) {
        self.connected.store(false, Ordering::SeqCst);
        *self.transport.write().await = None;
        tracing::debug!(parent: &self.span, %error, "connection closed");
        self.emit(Event::ConnectionUpdate(ConnectionUpdate::closed(error)));
    }

    /// Called by the transport with decrypted incoming messages.
    pub fn handle_messages(&self, batch: MessagesUpsert) {
        self.emit(Event::MessagesUpsert(batch));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self) -> bool {
        self.read_auth().creds.registered
    }

    /// Generate a message ID (3EB0 + hex of hash).
    pub fn generate_message_id(&self) -> MessageId {
        use std::time::{SystemTime, UNIX_EPOCH};
        let mut data = Vec::with_capacity(8 + 20 + 16);
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        data.extend_from_slice(&t.to_be_bytes());
        if let Some(me) = &self.read_auth().creds.me {
            data.extend_from_slice(me.user.as_bytes());
        }
        data.extend_from_slice(b"@c.us");
        data.extend_from_slice(&rand::random::<[u8; 16]>());
        let hash = sha2::Sha256::digest(&data);
        format!("3EB0{}", hex::encode(&hash[..9]))
    }

    /// Verify the device identity the server sent after the phone accepted the
    /// pairing code, store the signed account and mark the device registered.
    ///
    /// Emits `creds.update`, then a `close` with `restartRequired` so the owner
    /// of the session reconnects with registered credentials.
    pub async fn complete_pairing(&self, params: CompletePairingParams<'_>) -> crate::Result<()> {
        let creds = self.read_auth().creds.clone();
        if creds.registered {
            return Err(PairingError::AlreadyRegistered.into());
        }
        let verified =
            pairing::verify_device_identity(params.device_identity_bytes, &creds.adv_secret_key)?;
        let account =
            pairing::sign_device_identity(&verified.payload, &creds.signed_identity_key.private);

        self.update_creds(|c| {
            c.me = Some(params.jid.clone());
            c.platform = Some(params.platform.to_string());
            c.account = Some(account);
            c.registered = true;
            c.pairing_code = None;
            c.pairing_ephemeral_key = None;
        });
        tracing::info!(
            parent: &self.span,
            jid = %params.jid,
            platform = params.platform,
            "pairing completed"
        );

        self.handle_disconnect(DisconnectError::new(
            DisconnectReason::RestartRequired,
            "restart required after pairing",
        ))
        .await;
        Ok(())
    }

    fn read_auth(&self) -> std::sync::RwLockReadGuard<'_, AuthState> {
        self.auth.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the credentials and report the new snapshot.
    fn update_creds(&self, f: impl FnOnce(&mut AuthCreds)) {
        let snapshot = {
            let mut auth = self.auth.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut auth.creds);
            auth.creds.clone()
        };
        self.emit(Event::CredsUpdate(snapshot));
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::trace!(parent: &self.span, "event dropped, no subscriber");
        }
    }

    async fn current_transport(&self) -> crate::Result<Arc<dyn Transport>> {
        self.transport.read().await.clone().ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl ProtocolClient for Client {
    fn auth_state(&self) -> AuthState {
        self.read_auth().clone()
    }

    async fn request_pairing_code(&self, phone_number: &str) -> crate::Result<String> {
        if self.is_registered() {
            return Err(PairingError::AlreadyRegistered.into());
        }
        let jid = Jid::user_address(phone_number)
            .ok_or_else(|| PairingError::InvalidPhoneNumber(phone_number.to_string()))?;
        let transport = self.current_transport().await?;

        let code = pairing::generate_pairing_code();
        let (public, private) = pairing::x25519_key_pair();
        let node = send::encode_pairing_request(&jid, &code, self.browser.to_string(), &public)
            .map_err(SendError::Encode)?;
        transport.send(&node).await?;

        tracing::debug!(parent: &self.span, %jid, "pairing code requested");
        self.update_creds(|c| {
            c.me = Some(jid);
            c.pairing_code = Some(code.clone());
            c.pairing_ephemeral_key = Some(KeyPair { public, private });
        });
        Ok(code)
    }

    async fn download_media(&self, message: &InboundMessage) -> crate::Result<Bytes> {
        let media = message.media().ok_or(MediaError::NoMedia)?;
        let transport = self.current_transport().await?;
        transport.fetch_media(media).await
    }

    async fn send_message(&self, to: &Jid, media: OutgoingMedia) -> crate::Result<SendResponse> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if !(to.is_user() || to.is_group()) {
            return Err(SendError::InvalidRecipient(to.to_string()).into());
        }
        if media.data.is_empty() {
            return Err(SendError::EmptyPayload.into());
        }
        let transport = self.current_transport().await?;
        let id = self.generate_message_id();
        let node = send::encode_media_message(to, &id, &media).map_err(SendError::Encode)?;
        transport.send(&node).await?;
        tracing::debug!(parent: &self.span, %to, %id, category = %media.category, "message sent");
        Ok(SendResponse {
            timestamp: std::time::SystemTime::now(),
            id,
        })
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let transport = self.transport.write().await.take();
        if let Some(transport) = transport {
            if let Err(e) = transport.close().await {
                tracing::debug!(parent: &self.span, error = %e, "transport close failed");
            }
        }
    }
}

/// Opens [`Client`] sessions, each on a fresh transport from the factory.
///
/// Without a factory every open fails, before any pairing prompt is shown.
#[derive(Default)]
pub struct ClientConnector {
    transports: Option<Arc<dyn TransportFactory>>,
}

impl ClientConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transports = Some(factory);
        self
    }
}

#[async_trait]
impl Connector for ClientConnector {
    async fn open(
        &self,
        config: SocketConfig,
    ) -> crate::Result<(Arc<dyn ProtocolClient>, EventStream)> {
        let factory = self
            .transports
            .as_ref()
            .ok_or_else(|| ConnectionError::Transport("no transport configured".into()))?;
        let transport = factory.create().await?;
        let (client, events) = Client::new(config);
        client.attach_transport(transport).await;
        client.connect().await?;
        Ok((Arc::new(client), events))
    }
}
