use crate::events::{
    InboundDetail, AGENT_MESSAGE_ID_PREFIX, ORIGIN_MARKER_PERSONA, SENDER_TYPE_AGENT,
};

/// Who authored a message. Ambiguity resolves to `Human` so a legitimate
/// visitor message is never silently dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOrigin {
    Human,
    Bot,
}

/// OR of every bot-authorship signal; any single match means `Bot`.
pub fn classify_origin(detail: &InboundDetail, bot_ids: &[String]) -> MessageOrigin {
    if let Some(sender_id) = &detail.sender_id {
        if bot_ids.iter().any(|id| id == sender_id) {
            return MessageOrigin::Bot;
        }
    }

    if detail
        .message_id
        .as_deref()
        .is_some_and(|id| id.starts_with(AGENT_MESSAGE_ID_PREFIX))
    {
        return MessageOrigin::Bot;
    }

    let Some(metadata) = &detail.metadata else {
        return MessageOrigin::Human;
    };

    let agent_typed = metadata.sender_type.as_deref() == Some(SENDER_TYPE_AGENT)
        || metadata.user_type.as_deref() == Some(SENDER_TYPE_AGENT);
    let marked = metadata.origin_marker.as_deref() == Some(ORIGIN_MARKER_PERSONA)
        || metadata.is_agent_generated == Some(true)
        || metadata.agent_id.is_some();

    if agent_typed || marked {
        MessageOrigin::Bot
    } else {
        MessageOrigin::Human
    }
}
