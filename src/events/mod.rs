//! Event types emitted by a protocol session.

use crate::store::AuthCreds;
use crate::types::{Jid, MessageId};
use std::fmt;

/// Events delivered to the single subscriber of a session, in arrival order.
#[derive(Clone, Debug)]
pub enum Event {
    /// `connection.update`: connection phase changes and disconnect causes.
    ConnectionUpdate(ConnectionUpdate),

    /// `messages.upsert`: a batch of newly stored messages.
    MessagesUpsert(MessagesUpsert),

    /// `creds.update`: full snapshot of the credentials after a change.
    CredsUpdate(AuthCreds),
}

#[derive(Clone, Debug, Default)]
pub struct ConnectionUpdate {
    pub connection: Option<ConnectionPhase>,
    pub last_disconnect: Option<DisconnectError>,
}

impl ConnectionUpdate {
    pub fn open() -> Self {
        Self {
            connection: Some(ConnectionPhase::Open),
            last_disconnect: None,
        }
    }

    pub fn closed(error: DisconnectError) -> Self {
        Self {
            connection: Some(ConnectionPhase::Close),
            last_disconnect: Some(error),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Close,
}

/// Why a session closed. `status_code` is the structured code from the server
/// or transport; it is absent when the close had no classified cause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectError {
    pub status_code: Option<u16>,
    pub message: String,
}

impl DisconnectError {
    pub fn new(reason: DisconnectReason, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(reason.code()),
            message: message.into(),
        }
    }

    pub fn reason(&self) -> Option<DisconnectReason> {
        self.status_code.and_then(DisconnectReason::from_code)
    }

    /// Terminal close: the credentials were revoked and pairing is needed again.
    /// Every other code, and a missing code, is recoverable.
    pub fn is_logged_out(&self) -> bool {
        self.status_code == Some(DisconnectReason::LoggedOut.code())
    }
}

impl fmt::Display for DisconnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (status {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Known disconnect status codes.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DisconnectReason {
    LoggedOut = 401,
    Forbidden = 403,
    ConnectionLost = 408,
    MultideviceMismatch = 411,
    ConnectionClosed = 428,
    ConnectionReplaced = 440,
    BadSession = 500,
    UnavailableService = 503,
    RestartRequired = 515,
}

impl DisconnectReason {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            401 => Some(Self::LoggedOut),
            403 => Some(Self::Forbidden),
            408 => Some(Self::ConnectionLost),
            411 => Some(Self::MultideviceMismatch),
            428 => Some(Self::ConnectionClosed),
            440 => Some(Self::ConnectionReplaced),
            500 => Some(Self::BadSession),
            503 => Some(Self::UnavailableService),
            515 => Some(Self::RestartRequired),
            _ => None,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::LoggedOut => "logged out",
            Self::Forbidden => "forbidden",
            Self::ConnectionLost => "connection lost or timed out",
            Self::MultideviceMismatch => "multi-device mismatch",
            Self::ConnectionClosed => "connection closed",
            Self::ConnectionReplaced => "connection replaced by another session",
            Self::BadSession => "bad session",
            Self::UnavailableService => "service unavailable",
            Self::RestartRequired => "restart required",
        };
        write!(f, "{} (code {})", msg, self.code())
    }
}

/// Notification kind of an upsert batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertType {
    /// Live messages that just arrived.
    Notify,
    /// History sync and other backfill.
    Append,
}

#[derive(Clone, Debug)]
pub struct MessagesUpsert {
    pub kind: UpsertType,
    pub messages: Vec<InboundMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageKey {
    pub remote_jid: Jid,
    pub from_me: bool,
    pub id: MessageId,
}

#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub key: MessageKey,
    /// Display name the sender set for themselves.
    pub push_name: Option<String>,
    pub message: Option<MessagePayload>,
}

impl InboundMessage {
    /// First downloadable media reference, looking through view-once wrappers.
    pub fn media(&self) -> Option<&MediaRef> {
        self.message.as_ref().and_then(MessagePayload::media)
    }
}

/// Content parts of a message payload, in the order the protocol lists them.
#[derive(Clone, Debug, Default)]
pub struct MessagePayload {
    pub contents: Vec<MessageContent>,
}

impl MessagePayload {
    pub fn new(contents: Vec<MessageContent>) -> Self {
        Self { contents }
    }

    /// The content part that determines the message kind.
    pub fn primary(&self) -> Option<&MessageContent> {
        self.contents.first()
    }

    pub fn media(&self) -> Option<&MediaRef> {
        self.contents.iter().find_map(|c| match c {
            MessageContent::ViewOnceV2(inner) => inner.media(),
            other => other.media(),
        })
    }
}

/// Recognized content kinds. Anything else is carried as [`MessageContent::Other`]
/// with its protocol key so it can be logged.
#[derive(Clone, Debug)]
pub enum MessageContent {
    /// Context info that accompanies hidden (view-once) content.
    MessageContextInfo,
    /// View-once v2 wrapper around the real message.
    ViewOnceV2(Box<MessagePayload>),
    Conversation(String),
    Image(MediaRef),
    Video(MediaRef),
    Audio(MediaRef),
    Document(MediaRef),
    Other(String),
}

impl MessageContent {
    /// Protocol key of this content kind.
    pub fn kind_key(&self) -> &str {
        match self {
            Self::MessageContextInfo => "messageContextInfo",
            Self::ViewOnceV2(_) => "viewOnceMessageV2",
            Self::Conversation(_) => "conversation",
            Self::Image(_) => "imageMessage",
            Self::Video(_) => "videoMessage",
            Self::Audio(_) => "audioMessage",
            Self::Document(_) => "documentMessage",
            Self::Other(key) => key,
        }
    }

    fn media(&self) -> Option<&MediaRef> {
        match self {
            Self::Image(m) | Self::Video(m) | Self::Audio(m) | Self::Document(m) => Some(m),
            _ => None,
        }
    }
}

/// Pointer to encrypted media on the WhatsApp CDN.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaRef {
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub mimetype: Option<String>,
    pub file_length: u64,
}
