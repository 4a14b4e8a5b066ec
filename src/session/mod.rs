//! Session supervisor.
//!
//! Owns the live protocol session: opens it with stored credentials, pairs the
//! device when needed, persists credential updates, hands message batches to
//! the relay and reconnects on every disconnect except a logout.

use crate::events::{ConnectionPhase, ConnectionUpdate, DisconnectError, Event};
use crate::logging;
use crate::pairing::{self, PhonePrompt};
use crate::protocol::{BrowserIdentity, Connector, EventStream, ProtocolClient, SocketConfig};
use crate::relay::Relay;
use crate::store::{AuthCreds, AuthState, Credentials, OwnerRecord, Registry};
use crate::Result;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Why the supervisor stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Halt {
    /// The account unlinked this device. Pairing again needs fresh credentials.
    LoggedOut(DisconnectError),
    /// The client dropped its event stream without a close.
    EventsClosed,
}

/// What a `connection.update` asks the supervisor to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Reconnect(Option<DisconnectError>),
    LoggedOut(DisconnectError),
}

/// Classify a connection update. Only a close carries a transition, and only
/// the logged-out status is terminal.
pub fn next_transition(update: &ConnectionUpdate) -> Option<Transition> {
    if update.connection != Some(ConnectionPhase::Close) {
        return None;
    }
    Some(match &update.last_disconnect {
        Some(error) if error.is_logged_out() => Transition::LoggedOut(error.clone()),
        other => Transition::Reconnect(other.clone()),
    })
}

struct ActiveSession {
    generation: u64,
    client: Arc<dyn ProtocolClient>,
    relay: Relay,
    auth: AuthState,
}

/// Supervises one session at a time and replaces it after every recoverable
/// close.
///
/// At most one client is open: [`SessionManager::connect`] closes the previous
/// one before opening the next.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    credentials: Credentials,
    registry: Registry,
    prompt: Arc<dyn PhonePrompt>,
    browser: BrowserIdentity,
    generation: u64,
    active: Option<ActiveSession>,
}

impl SessionManager {
    /// Manager with the default browser identity. Nothing is opened until
    /// [`run`](Self::run) or [`connect`](Self::connect).
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: Credentials,
        registry: Registry,
        prompt: Arc<dyn PhonePrompt>,
    ) -> Self {
        Self {
            connector,
            credentials,
            registry,
            prompt,
            browser: BrowserIdentity::default(),
            generation: 0,
            active: None,
        }
    }

    /// Identity shown in the phone's linked devices list.
    pub fn with_browser(mut self, browser: BrowserIdentity) -> Self {
        self.browser = browser;
        self
    }

    /// Keep a session alive until logout.
    ///
    /// Returns `Err` when a connect attempt fails (pairing or credential
    /// errors); those are not retried.
    pub async fn run(&mut self) -> Result<Halt> {
        loop {
            let events = self.connect().await?;
            if let ControlFlow::Break(halt) = self.drive(events).await {
                self.retire().await;
                return Ok(halt);
            }
        }
    }

    /// Open a new session, retiring the previous one first.
    ///
    /// Unregistered credentials go through pairing: the operator supplies the
    /// number, the code is shown, and the number becomes the owner record.
    /// Registration itself completes later and shows up as a reconnect.
    pub async fn connect(&mut self) -> Result<EventStream> {
        self.retire().await;

        let auth = self.credentials.load().await?;
        self.generation += 1;
        let generation = self.generation;
        let config = SocketConfig {
            auth: auth.clone(),
            browser: self.browser.clone(),
            logger: tracing::info_span!("wa_client", generation),
        };
        let (client, events) = self.connector.open(config).await?;
        let registered = client.auth_state().is_registered();
        tracing::debug!(generation, registered, "session opened");

        self.active = Some(ActiveSession {
            generation,
            client: Arc::clone(&client),
            relay: Relay::new(Arc::clone(&client), Arc::clone(&self.registry)),
            auth,
        });

        if !registered {
            if let Err(e) = self.pair(client.as_ref()).await {
                tracing::error!(error = %e, "pairing failed");
                self.retire().await;
                return Err(e);
            }
        }
        Ok(events)
    }

    async fn pair(&self, client: &dyn ProtocolClient) -> Result<()> {
        let number = self.prompt.phone_number().await?;
        let code = client.request_pairing_code(&number).await?;
        self.prompt
            .show_pairing_code(&pairing::format_pairing_code(&code));
        OwnerRecord::new(number).save(self.registry.as_ref()).await?;
        tracing::info!("waiting for the code to be entered on the phone");
        Ok(())
    }

    /// Consume one session's events in order. `Continue` means reconnect.
    async fn drive(&mut self, mut events: EventStream) -> ControlFlow<Halt> {
        while let Some(event) = events.recv().await {
            match event {
                Event::CredsUpdate(creds) => self.persist(creds).await,
                Event::MessagesUpsert(batch) => {
                    if let Some(active) = &self.active {
                        let relay = active.relay.clone();
                        logging::spawn_logged("relay", async move {
                            relay.on_upsert(batch).await
                        });
                    }
                }
                Event::ConnectionUpdate(update) => {
                    if update.connection == Some(ConnectionPhase::Open) {
                        tracing::info!("connection open, relaying view-once media");
                    }
                    match next_transition(&update) {
                        Some(Transition::Reconnect(error)) => {
                            let reason = error.as_ref().map(ToString::to_string);
                            tracing::warn!(
                                reason = reason.as_deref().unwrap_or("unknown"),
                                "connection closed, reconnecting"
                            );
                            return ControlFlow::Continue(());
                        }
                        Some(Transition::LoggedOut(error)) => {
                            tracing::error!(
                                %error,
                                "logged out, remove stored credentials and restart to pair again"
                            );
                            return ControlFlow::Break(Halt::LoggedOut(error));
                        }
                        None => {}
                    }
                }
            }
        }
        tracing::warn!("event stream ended");
        ControlFlow::Break(Halt::EventsClosed)
    }

    async fn persist(&mut self, creds: AuthCreds) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.auth.creds = creds;
        if let Err(e) = self.credentials.save(&active.auth).await {
            tracing::error!(error = %e, "failed to save credentials");
        }
    }

    async fn retire(&mut self) {
        if let Some(active) = self.active.take() {
            active.client.close().await;
            tracing::debug!(generation = active.generation, "session retired");
        }
    }
}
