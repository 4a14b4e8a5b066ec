//! Classifies inbound message batches and forwards view-once media to the owner.

pub mod mime;

use crate::error::{Error, MediaError, SendError};
use crate::events::{InboundMessage, MessageContent, MessagesUpsert, UpsertType};
use crate::protocol::{MediaCategory, OutgoingMedia, ProtocolClient};
use crate::store::{OwnerRecord, Registry};
use crate::types::Jid;
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// Shown when the sender has no display name.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// What a content kind means to the relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentClass {
    /// `messageContextInfo`: context of a message whose content is hidden.
    HiddenContent,
    /// `viewOnceMessageV2` wrapper.
    ViewOnceV2,
    /// Anything else, with its protocol key.
    Ordinary(String),
}

impl ContentClass {
    pub fn of(content: &MessageContent) -> Self {
        match content {
            MessageContent::MessageContextInfo => Self::HiddenContent,
            MessageContent::ViewOnceV2(_) => Self::ViewOnceV2,
            other => Self::Ordinary(other.kind_key().to_string()),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::HiddenContent | Self::ViewOnceV2)
    }
}

/// Why a batch was not relayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotNotify(UpsertType),
    EmptyBatch,
    NoPayload,
    FromSelf,
    NotEphemeral(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNotify(kind) => write!(f, "batch type {:?} is not live", kind),
            Self::EmptyBatch => write!(f, "empty batch"),
            Self::NoPayload => write!(f, "first message has no payload"),
            Self::FromSelf => write!(f, "sent by this account"),
            Self::NotEphemeral(kind) => write!(f, "content kind {} is not view-once", kind),
        }
    }
}

/// Result of one batch that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Nothing to forward.
    Skipped(SkipReason),
    /// Media went out to the owner's chat.
    Relayed { to: Jid, category: MediaCategory },
}

/// Pick the message to relay from a batch, or say why there is none.
///
/// Only the first message of a live (`notify`) batch is considered.
pub fn screen(batch: &MessagesUpsert) -> std::result::Result<&InboundMessage, SkipReason> {
    if batch.kind != UpsertType::Notify {
        return Err(SkipReason::NotNotify(batch.kind));
    }
    let first = batch.messages.first().ok_or(SkipReason::EmptyBatch)?;
    let payload = first.message.as_ref().ok_or(SkipReason::NoPayload)?;
    if first.key.from_me {
        return Err(SkipReason::FromSelf);
    }
    let class = payload
        .primary()
        .map(ContentClass::of)
        .ok_or(SkipReason::NoPayload)?;
    match class {
        ContentClass::Ordinary(kind) => Err(SkipReason::NotEphemeral(kind)),
        _ => Ok(first),
    }
}

/// Caption naming who sent the original message.
pub fn caption_for(message: &InboundMessage) -> String {
    let name = message
        .push_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_SENDER);
    format!("Sent by *{}*", name)
}

/// Forwards view-once media of one session to the owner.
#[derive(Clone)]
pub struct Relay {
    client: Arc<dyn ProtocolClient>,
    registry: Registry,
}

impl Relay {
    /// Relay bound to `client`. The owner is read from `registry` per message.
    pub fn new(client: Arc<dyn ProtocolClient>, registry: Registry) -> Self {
        Self { client, registry }
    }

    /// Handle one `messages.upsert` batch.
    ///
    /// Download, owner lookup and send failures are returned as errors for this
    /// batch; nothing is retried.
    pub async fn on_upsert(&self, batch: MessagesUpsert) -> Result<RelayOutcome> {
        let message = match screen(&batch) {
            Ok(message) => message,
            Err(reason) => {
                tracing::trace!(%reason, "batch skipped");
                return Ok(RelayOutcome::Skipped(reason));
            }
        };
        tracing::debug!(
            id = %message.key.id,
            from = %message.key.remote_jid,
            "view-once message received"
        );

        let media = self.client.download_media(message).await?;
        if media.is_empty() {
            return Err(MediaError::Empty.into());
        }
        let sniffed = mime::sniff(&media);
        let category = sniffed.map_or(MediaCategory::Document, |s| s.category());

        let owner = OwnerRecord::load(self.registry.as_ref())
            .await?
            .ok_or(Error::OwnerUnknown)?;
        let to = owner
            .address()
            .ok_or_else(|| SendError::InvalidRecipient(owner.number.clone()))?;

        let file_name = (category == MediaCategory::Document).then(|| {
            format!(
                "{}.{}",
                message.key.id,
                sniffed.map_or("bin", |s| s.extension)
            )
        });
        let outgoing = OutgoingMedia {
            category,
            data: media,
            caption: Some(caption_for(message)),
            mimetype: sniffed.map(|s| s.mime.to_string()),
            file_name,
        };
        let size = outgoing.data.len();
        self.client.send_message(&to, outgoing).await?;

        tracing::info!(%to, %category, size, "view-once media relayed");
        Ok(RelayOutcome::Relayed { to, category })
    }
}
