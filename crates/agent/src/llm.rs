use anyhow::Result;
use async_trait::async_trait;

use parley_core::GoalInstruction;

/// Everything the reply generator gets to see for one turn. Prompt assembly
/// itself lives behind the client implementation.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyRequest<'a> {
    pub persona_name: &'a str,
    pub company_name: Option<&'a str>,
    pub user_message: &'a str,
    pub instruction: &'a GoalInstruction,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ReplyRequest<'_>) -> Result<String>;
}
