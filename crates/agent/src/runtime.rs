use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use parley_core::{ChannelState, Goal};
use parley_router::{
    ChannelDirectory, InboundEvent, OriginRouter, PersonaDirectory, PersonaInvocation,
    RouteOutcome,
};

use crate::llm::LlmClient;
use crate::pipeline::{DeliveryPipeline, DeliveryReport, MessagePublisher};

/// Conversation state the external store holds for one contact on one
/// channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationSnapshot {
    pub goal: Option<Goal>,
    pub channel_state: Option<ChannelState>,
}

/// External collaborator owning goal persistence. A missing record is a
/// normal answer, not an error.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn conversation(&self, invocation: &PersonaInvocation) -> Result<ConversationSnapshot>;
}

#[async_trait]
impl<T: GoalStore + ?Sized> GoalStore for std::sync::Arc<T> {
    async fn conversation(&self, invocation: &PersonaInvocation) -> Result<ConversationSnapshot> {
        (**self).conversation(invocation).await
    }
}

/// Outcome of one inbound event, with drop reasons preserved.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeOutcome {
    DroppedForHuman,
    DroppedSelfOrigin,
    Delivered(Vec<DeliveryReport>),
}

/// One event, one handler pass: route, then a full reply cycle per persona,
/// strictly in order. Persona replies never interleave within an
/// invocation.
pub struct AgentRuntime<C, P, L, M, G> {
    router: OriginRouter<C, P>,
    pipeline: DeliveryPipeline<L, M>,
    goals: G,
}

impl<C, P, L, M, G> AgentRuntime<C, P, L, M, G>
where
    C: ChannelDirectory,
    P: PersonaDirectory,
    L: LlmClient,
    M: MessagePublisher,
    G: GoalStore,
{
    pub fn new(router: OriginRouter<C, P>, pipeline: DeliveryPipeline<L, M>, goals: G) -> Self {
        Self { router, pipeline, goals }
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> Result<RuntimeOutcome> {
        let invocations = match self.router.route(event).await? {
            RouteOutcome::DroppedForHuman => return Ok(RuntimeOutcome::DroppedForHuman),
            RouteOutcome::DroppedSelfOrigin => return Ok(RuntimeOutcome::DroppedSelfOrigin),
            RouteOutcome::Routed(invocations) => invocations,
        };

        let mut reports = Vec::with_capacity(invocations.len());
        for invocation in &invocations {
            let snapshot = match self.goals.conversation(invocation).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(
                        persona_id = %invocation.persona_id,
                        error = %err,
                        "goal lookup failed; replying without goal context"
                    );
                    ConversationSnapshot::default()
                }
            };
            let goal = snapshot
                .goal
                .unwrap_or_else(|| Goal::new("ad-hoc", "open conversation", Vec::new()));

            match self
                .pipeline
                .deliver(invocation, &goal, snapshot.channel_state.as_ref())
                .await
            {
                Ok(report) => {
                    info!(
                        persona_id = %invocation.persona_id,
                        chunks_sent = report.chunks_sent,
                        "persona reply delivered"
                    );
                    reports.push(report);
                }
                Err(err) => {
                    warn!(
                        persona_id = %invocation.persona_id,
                        error = %err,
                        "persona delivery failed; continuing with remaining personas"
                    );
                }
            }
        }

        Ok(RuntimeOutcome::Delivered(reports))
    }
}
