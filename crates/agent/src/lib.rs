pub mod llm;
pub mod pipeline;
pub mod runtime;

pub use llm::{LlmClient, ReplyRequest};
pub use pipeline::{DeliveryPipeline, DeliveryReport, MessagePublisher, PublishError};
pub use runtime::{AgentRuntime, ConversationSnapshot, GoalStore, RuntimeOutcome};
