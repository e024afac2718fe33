pub mod classify;
pub mod events;
pub mod router;

pub use classify::{classify_origin, MessageOrigin};
pub use events::{
    agent_message_id, InboundDetail, InboundEvent, MessageMetadata, OutboundMessage,
    OutboundMetadata, AGENT_MESSAGE_ID_PREFIX, EXTERNAL_MESSAGE_DETAIL_TYPE, ORIGIN_MARKER_PERSONA,
    SENDER_TYPE_AGENT,
};
pub use router::{
    ChannelDirectory, ChannelProfile, DirectoryError, OriginRouter, PersonaDirectory,
    PersonaInvocation, RouteOutcome, RouterError, DEFAULT_PERSONA_NAME,
};
