//! Scriptable fake of the protocol client.

use super::{Connector, EventStream, OutgoingMedia, ProtocolClient, SendResponse, SocketConfig};
use crate::error::{Error, MediaError, PairingError, SendError};
use crate::events::{Event, InboundMessage};
use crate::store::AuthState;
use crate::types::Jid;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

pub(crate) const PNG_HEADER: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
];

#[derive(Default)]
pub(crate) struct Recorded {
    pub opens: usize,
    pub closes: usize,
    pub pairing_requests: Vec<String>,
    pub downloads: usize,
    pub sends: Vec<(Jid, OutgoingMedia)>,
    /// Senders of every opened session, so tests can push more events.
    pub senders: Vec<mpsc::UnboundedSender<Event>>,
}

pub(crate) struct MockBehavior {
    pub media: Bytes,
    pub fail_download: bool,
    pub fail_send: bool,
    pub fail_pairing: bool,
    /// Events queued on the n-th opened session.
    pub scripts: VecDeque<Vec<Event>>,
    /// Events the client emits when a pairing code is requested.
    pub on_pairing: Vec<Event>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            media: Bytes::from_static(PNG_HEADER),
            fail_download: false,
            fail_send: false,
            fail_pairing: false,
            scripts: VecDeque::new(),
            on_pairing: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    pub recorded: Arc<Mutex<Recorded>>,
    pub behavior: Arc<Mutex<MockBehavior>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, events: Vec<Event>) -> Self {
        self.behavior.lock().unwrap().scripts.push_back(events);
        self
    }

    pub fn configure(self, f: impl FnOnce(&mut MockBehavior)) -> Self {
        f(&mut self.behavior.lock().unwrap());
        self
    }

    pub fn recorded<T>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        f(&self.recorded.lock().unwrap())
    }

    /// Sessions opened and not yet closed.
    pub fn active_sessions(&self) -> usize {
        self.recorded(|r| r.opens - r.closes)
    }

    /// Poll until `cond` holds, panicking after a second.
    pub async fn wait_until(&self, cond: impl Fn(&Recorded) -> bool) {
        for _ in 0..200 {
            if self.recorded(&cond) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, config: SocketConfig) -> Result<(Arc<dyn ProtocolClient>, EventStream)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let script = self
            .behavior
            .lock()
            .unwrap()
            .scripts
            .pop_front()
            .unwrap_or_default();
        for event in script {
            tx.send(event).unwrap();
        }
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.opens += 1;
            recorded.senders.push(tx.clone());
        }
        let client = MockClient {
            auth: config.auth,
            events: tx,
            recorded: Arc::clone(&self.recorded),
            behavior: Arc::clone(&self.behavior),
        };
        Ok((Arc::new(client), rx))
    }
}

pub(crate) struct MockClient {
    auth: AuthState,
    events: mpsc::UnboundedSender<Event>,
    recorded: Arc<Mutex<Recorded>>,
    behavior: Arc<Mutex<MockBehavior>>,
}

impl MockClient {
    /// Standalone client for relay tests.
    pub fn standalone(connector: &MockConnector) -> Arc<dyn ProtocolClient> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            auth: AuthState::generate(),
            events: tx,
            recorded: Arc::clone(&connector.recorded),
            behavior: Arc::clone(&connector.behavior),
        })
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    fn auth_state(&self) -> AuthState {
        self.auth.clone()
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String> {
        self.recorded
            .lock()
            .unwrap()
            .pairing_requests
            .push(phone_number.to_string());
        let behavior = self.behavior.lock().unwrap();
        if behavior.fail_pairing {
            return Err(PairingError::Protocol("rate limited".into()).into());
        }
        for event in &behavior.on_pairing {
            let _ = self.events.send(event.clone());
        }
        Ok("ABCD1234".to_string())
    }

    async fn download_media(&self, message: &InboundMessage) -> Result<Bytes> {
        self.recorded.lock().unwrap().downloads += 1;
        let behavior = self.behavior.lock().unwrap();
        if behavior.fail_download {
            return Err(MediaError::Download("media expired".into()).into());
        }
        if message.media().is_none() {
            return Err(MediaError::NoMedia.into());
        }
        Ok(behavior.media.clone())
    }

    async fn send_message(&self, to: &Jid, media: OutgoingMedia) -> Result<SendResponse> {
        if self.behavior.lock().unwrap().fail_send {
            return Err(Error::Send(SendError::Server("503".into())));
        }
        self.recorded
            .lock()
            .unwrap()
            .sends
            .push((to.clone(), media));
        Ok(SendResponse {
            timestamp: SystemTime::now(),
            id: "3EB0MOCK".to_string(),
        })
    }

    async fn close(&self) {
        self.recorded.lock().unwrap().closes += 1;
    }
}
