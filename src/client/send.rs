//! Encoding of outgoing nodes handed to the transport.

use crate::protocol::OutgoingMedia;
use crate::types::{Jid, MessageId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
struct MessageNode<'a> {
    tag: &'static str,
    id: &'a str,
    to: &'a Jid,
    #[serde(rename = "type")]
    kind: &'static str,
    content: Map<String, Value>,
}

/// Media message node. The media bytes sit under the category key, base64 encoded.
pub(crate) fn encode_media_message(
    to: &Jid,
    id: &MessageId,
    media: &OutgoingMedia,
) -> serde_json::Result<Vec<u8>> {
    let mut content = Map::new();
    content.insert(
        media.category.as_str().to_string(),
        Value::String(STANDARD.encode(&media.data)),
    );
    if let Some(caption) = &media.caption {
        content.insert("caption".into(), Value::String(caption.clone()));
    }
    if let Some(mimetype) = &media.mimetype {
        content.insert("mimetype".into(), Value::String(mimetype.clone()));
    }
    if let Some(file_name) = &media.file_name {
        content.insert("fileName".into(), Value::String(file_name.clone()));
    }
    serde_json::to_vec(&MessageNode {
        tag: "message",
        id,
        to,
        kind: "media",
        content,
    })
}

#[derive(Serialize)]
struct PairingNode<'a> {
    tag: &'static str,
    xmlns: &'static str,
    jid: &'a Jid,
    code: &'a str,
    #[serde(rename = "companionPlatformDisplay")]
    platform_display: String,
    #[serde(rename = "companionEphemeralKey")]
    ephemeral_key: String,
}

/// Companion registration request for pairing-code linking.
pub(crate) fn encode_pairing_request(
    jid: &Jid,
    code: &str,
    platform_display: String,
    ephemeral_public: &[u8; 32],
) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&PairingNode {
        tag: "link_code_companion_reg",
        xmlns: "md",
        jid,
        code,
        platform_display,
        ephemeral_key: STANDARD.encode(ephemeral_public),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MediaCategory;
    use bytes::Bytes;

    #[test]
    fn media_node_keys_payload_by_category() {
        let to = Jid::new("15550001234", "s.whatsapp.net");
        let media = OutgoingMedia {
            category: MediaCategory::Video,
            data: Bytes::from_static(&[1, 2, 3]),
            caption: Some("Sent by *Alice*".into()),
            mimetype: Some("video/mp4".into()),
            file_name: None,
        };
        let bytes = encode_media_message(&to, &"3EB0X".to_string(), &media).unwrap();
        let node: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(node["to"], "15550001234@s.whatsapp.net");
        assert_eq!(node["content"]["video"], "AQID");
        assert_eq!(node["content"]["caption"], "Sent by *Alice*");
        assert!(node["content"].get("fileName").is_none());
    }
}
