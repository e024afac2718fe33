use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_core::ChannelKind;

/// Detail type carried by externally-sourced channel events; these need a
/// channel lookup before the bot set is known.
pub const EXTERNAL_MESSAGE_DETAIL_TYPE: &str = "chat.message.available";

/// Marker stamped on every outbound message so the router can recognize and
/// drop it on its next pass.
pub const ORIGIN_MARKER_PERSONA: &str = "persona";
pub const SENDER_TYPE_AGENT: &str = "agent";
pub const AGENT_MESSAGE_ID_PREFIX: &str = "agent-";

/// Raw inbound event as consumed by the router.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub detail_type: String,
    pub detail: InboundDetail,
}

impl InboundEvent {
    /// Externally-sourced events carry no bot assignment of their own.
    pub fn is_external(&self) -> bool {
        self.detail_type == EXTERNAL_MESSAGE_DETAIL_TYPE
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundDetail {
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub channel_id: String,
    /// Intended recipient of the message.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

/// Optional origin markers riding along with a message. Every field exists
/// to make bot-authored traffic recognizable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default)]
    pub origin_marker: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub is_agent_generated: Option<bool>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub original_message_id: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub channel_kind: Option<ChannelKind>,
}

/// One outbound chunk, stamped so the router drops it on re-entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub tenant_id: String,
    pub channel_id: String,
    /// The persona authoring the reply.
    pub user_id: String,
    pub user_name: String,
    pub user_type: String,
    pub message: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub sender_type: String,
    pub origin_marker: String,
    pub metadata: OutboundMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMetadata {
    pub agent_id: String,
    pub original_message_id: Option<String>,
    pub recipient_id: Option<String>,
}

pub fn agent_message_id() -> String {
    format!("{AGENT_MESSAGE_ID_PREFIX}{}", Uuid::new_v4())
}

impl OutboundMessage {
    /// Builds a persona-authored chunk message with every loop-prevention
    /// marker set.
    pub fn from_persona(
        tenant_id: impl Into<String>,
        channel_id: impl Into<String>,
        persona_id: &str,
        persona_name: impl Into<String>,
        text: impl Into<String>,
        original_message_id: Option<String>,
        recipient_id: Option<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            channel_id: channel_id.into(),
            user_id: persona_id.to_owned(),
            user_name: persona_name.into(),
            user_type: SENDER_TYPE_AGENT.to_owned(),
            message: text.into(),
            message_id: agent_message_id(),
            timestamp: Utc::now(),
            sender_id: persona_id.to_owned(),
            sender_type: SENDER_TYPE_AGENT.to_owned(),
            origin_marker: ORIGIN_MARKER_PERSONA.to_owned(),
            metadata: OutboundMetadata {
                agent_id: persona_id.to_owned(),
                original_message_id,
                recipient_id,
            },
        }
    }

    /// The inbound shape this message will have when it echoes back through
    /// the router.
    pub fn as_inbound_echo(&self) -> InboundEvent {
        InboundEvent {
            source: "parley".to_owned(),
            detail_type: EXTERNAL_MESSAGE_DETAIL_TYPE.to_owned(),
            detail: InboundDetail {
                tenant_id: Some(self.tenant_id.clone()),
                channel_id: self.channel_id.clone(),
                user_id: self.metadata.recipient_id.clone(),
                sender_id: Some(self.sender_id.clone()),
                text: self.message.clone(),
                message_id: Some(self.message_id.clone()),
                timestamp: Some(self.timestamp),
                metadata: Some(MessageMetadata {
                    origin_marker: Some(self.origin_marker.clone()),
                    sender_type: Some(self.sender_type.clone()),
                    user_type: Some(self.user_type.clone()),
                    is_agent_generated: Some(true),
                    agent_id: Some(self.metadata.agent_id.clone()),
                    original_message_id: self.metadata.original_message_id.clone(),
                    recipient_id: self.metadata.recipient_id.clone(),
                    channel_kind: None,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{agent_message_id, InboundEvent, OutboundMessage, AGENT_MESSAGE_ID_PREFIX};

    #[test]
    fn generated_message_ids_carry_the_agent_prefix() {
        let id = agent_message_id();
        assert!(id.starts_with(AGENT_MESSAGE_ID_PREFIX));
        assert!(id.len() > AGENT_MESSAGE_ID_PREFIX.len());
    }

    #[test]
    fn inbound_event_parses_the_external_wire_shape() {
        let event: InboundEvent = serde_json::from_str(
            r#"{
                "source": "channels",
                "detailType": "chat.message.available",
                "detail": {
                    "tenantId": "t1",
                    "channelId": "c1",
                    "userId": "persona-1",
                    "senderId": "visitor-9",
                    "text": "Hi",
                    "messageId": "m-1"
                }
            }"#,
        )
        .expect("parse");

        assert!(event.is_external());
        assert_eq!(event.detail.tenant_id.as_deref(), Some("t1"));
        assert_eq!(event.detail.sender_id.as_deref(), Some("visitor-9"));
        assert!(event.detail.metadata.is_none());
    }

    #[test]
    fn persona_messages_echo_back_with_all_markers() {
        let outbound = OutboundMessage::from_persona(
            "t1",
            "c1",
            "persona-1",
            "Alex",
            "Hello!",
            Some("m-1".to_owned()),
            Some("visitor-9".to_owned()),
        );
        let echo = outbound.as_inbound_echo();
        let metadata = echo.detail.metadata.expect("metadata");

        assert_eq!(metadata.origin_marker.as_deref(), Some("persona"));
        assert_eq!(metadata.agent_id.as_deref(), Some("persona-1"));
        assert_eq!(metadata.is_agent_generated, Some(true));
        assert!(echo.detail.message_id.expect("id").starts_with(AGENT_MESSAGE_ID_PREFIX));
    }
}
