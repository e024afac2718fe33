use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, warn};

use parley_core::{
    chunk, default_registry, detect_intent, ChannelState, DeliveryTimingModel, Goal, GoalContext,
    ResolverRegistry, TenantConfig,
};
use parley_router::{OutboundMessage, PersonaInvocation};

use crate::llm::{LlmClient, ReplyRequest};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("outbound publish failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: MessagePublisher + ?Sized> MessagePublisher for std::sync::Arc<T> {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        (**self).publish(message).await
    }
}

/// What one persona's delivery pass actually sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub persona_id: String,
    pub chunks_sent: usize,
    pub chunks_failed: usize,
}

/// One persona's full reply cycle: resolve the next question, generate the
/// reply, chunk it, and emit each chunk after its humanized delay. Once
/// delivery starts every chunk is attempted; a failed publish never stops
/// the rest.
pub struct DeliveryPipeline<L, M> {
    llm: L,
    publisher: M,
    registry: ResolverRegistry,
    config: TenantConfig,
}

impl<L, M> DeliveryPipeline<L, M>
where
    L: LlmClient,
    M: MessagePublisher,
{
    pub fn new(llm: L, publisher: M, config: TenantConfig) -> Self {
        Self { llm, publisher, registry: default_registry(), config }
    }

    pub fn config(&self) -> &TenantConfig {
        &self.config
    }

    pub async fn deliver(
        &self,
        invocation: &PersonaInvocation,
        goal: &Goal,
        channel_state: Option<&ChannelState>,
    ) -> Result<DeliveryReport> {
        let company = self.config.company_info();
        let intent = detect_intent(&invocation.text);

        let ctx = GoalContext {
            goal,
            company: Some(&company),
            channel_state,
            last_user_message: Some(&invocation.text),
            detected_intent: Some(intent),
        };
        let instruction = self.registry.resolve(&ctx);

        let request = ReplyRequest {
            persona_name: &invocation.persona_name,
            company_name: company.company_name.as_deref(),
            user_message: &invocation.text,
            instruction: &instruction,
        };
        let reply = self
            .llm
            .complete(&request)
            .await
            .with_context(|| format!("reply generation failed for {}", invocation.persona_id))?;

        let mut chunks = chunk(&reply, invocation.channel_kind, &self.config.chunking);
        for chunk in &mut chunks {
            chunk.response_to_message_id = invocation.message_id.clone();
        }

        // Delays are computed up front so the send loop only sleeps and
        // publishes, in chunk order.
        let timing = DeliveryTimingModel::new(self.config.timing);
        let mut rng = StdRng::from_entropy();
        let delays: Vec<u64> = chunks
            .iter()
            .map(|c| c.delay_ms + timing.chunk_delay_ms(&invocation.text, &c.text, c.index, &mut rng))
            .collect();

        let mut report = DeliveryReport {
            persona_id: invocation.persona_id.clone(),
            chunks_sent: 0,
            chunks_failed: 0,
        };

        for (chunk, delay_ms) in chunks.iter().zip(delays) {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            let message = OutboundMessage::from_persona(
                invocation.tenant_id.clone(),
                invocation.channel_id.clone(),
                &invocation.persona_id,
                invocation.persona_name.clone(),
                chunk.text.clone(),
                invocation.message_id.clone(),
                Some(invocation.sender_id.clone()),
            );

            match self.publisher.publish(&message).await {
                Ok(()) => {
                    debug!(
                        persona_id = %invocation.persona_id,
                        index = chunk.index,
                        total = chunk.total,
                        "chunk published"
                    );
                    report.chunks_sent += 1;
                }
                Err(err) => {
                    warn!(
                        persona_id = %invocation.persona_id,
                        index = chunk.index,
                        error = %err,
                        "chunk publish failed; continuing with remaining chunks"
                    );
                    report.chunks_failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;

    use parley_core::{
        ChannelKind, ChunkBy, ChunkPolicy, ChunkRule, Goal, TenantConfig, TimingConfig,
    };
    use parley_router::{OutboundMessage, PersonaInvocation};

    use super::{DeliveryPipeline, MessagePublisher, PublishError};
    use crate::llm::{LlmClient, ReplyRequest};

    struct ScriptedLlm(String);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &ReplyRequest<'_>) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CapturePublisher {
        sent: Mutex<Vec<OutboundMessage>>,
        fail_indices: Vec<usize>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl MessagePublisher for CapturePublisher {
        async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
            let mut calls = self.calls.lock().expect("lock");
            let index = *calls;
            *calls += 1;
            if self.fail_indices.contains(&index) {
                return Err(PublishError::Backend("boom".to_owned()));
            }
            self.sent.lock().expect("lock").push(message.clone());
            Ok(())
        }
    }

    fn instant_config() -> TenantConfig {
        let mut rules = std::collections::BTreeMap::new();
        rules.insert(ChannelKind::Chat, ChunkRule {
            chunk_by: ChunkBy::Sentence,
            max_length: 120,
            delay_between_chunks_ms: 0,
        });
        TenantConfig {
            company_name: Some("Iron Temple Gym".to_owned()),
            timing: TimingConfig {
                reading_speed: 1_000_000.0,
                typing_speed: 1_000_000.0,
                min_busy_time: 0.0,
                max_busy_time: 0.0,
                min_thinking_time: 0.0,
                max_thinking_time: 0.0,
            },
            chunking: ChunkPolicy { enabled: true, rules },
            business_hours: Default::default(),
        }
    }

    fn invocation() -> PersonaInvocation {
        PersonaInvocation {
            tenant_id: "t1".to_owned(),
            channel_id: "c1".to_owned(),
            channel_kind: ChannelKind::Chat,
            persona_id: "persona-1".to_owned(),
            persona_name: "Alex".to_owned(),
            sender_id: "visitor-9".to_owned(),
            text: "Hi".to_owned(),
            message_id: Some("m-1".to_owned()),
            timestamp: None,
        }
    }

    fn empty_goal() -> Goal {
        Goal::new("g", "chat", Vec::new())
    }

    #[tokio::test]
    async fn delivers_one_message_per_chunk() {
        let publisher = Arc::new(CapturePublisher::default());
        let pipeline = DeliveryPipeline::new(
            ScriptedLlm("One here. Two here. Three here.".to_owned()),
            Arc::clone(&publisher),
            instant_config(),
        );

        let report = pipeline.deliver(&invocation(), &empty_goal(), None).await.expect("deliver");
        assert_eq!(report.chunks_sent, 3);
        assert_eq!(report.chunks_failed, 0);

        let sent = publisher.sent.lock().expect("lock");
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m.origin_marker == "persona"));
        assert!(sent.iter().all(|m| m.sender_id == "persona-1"));
        assert!(sent.iter().all(|m| m.metadata.recipient_id.as_deref() == Some("visitor-9")));
        assert_eq!(sent[0].message, "One here.");
    }

    #[tokio::test]
    async fn one_failed_publish_does_not_stop_the_rest() {
        let publisher = Arc::new(CapturePublisher {
            fail_indices: vec![1],
            ..CapturePublisher::default()
        });
        let pipeline = DeliveryPipeline::new(
            ScriptedLlm("One here. Two here. Three here.".to_owned()),
            Arc::clone(&publisher),
            instant_config(),
        );

        let report = pipeline.deliver(&invocation(), &empty_goal(), None).await.expect("deliver");
        assert_eq!(report.chunks_sent, 2);
        assert_eq!(report.chunks_failed, 1);

        let sent = publisher.sent.lock().expect("lock");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].message, "Three here.");
    }

    #[tokio::test]
    async fn goal_instruction_reaches_the_llm() {
        struct AssertingLlm;

        #[async_trait]
        impl LlmClient for AssertingLlm {
            async fn complete(&self, request: &ReplyRequest<'_>) -> Result<String> {
                assert_eq!(request.instruction.target_fields, vec!["email", "phone"]);
                assert_eq!(request.persona_name, "Alex");
                Ok("Got it.".to_owned())
            }
        }

        let publisher = Arc::new(CapturePublisher::default());
        let pipeline =
            DeliveryPipeline::new(AssertingLlm, Arc::clone(&publisher), instant_config());
        let goal = Goal::new("g", "contact", vec!["email".to_owned(), "phone".to_owned()]);

        pipeline.deliver(&invocation(), &goal, None).await.expect("deliver");
        assert_eq!(*publisher.calls.lock().expect("lock"), 1);
    }

    #[test]
    fn empty_goal_resolves_to_no_instruction() {
        let goal = empty_goal();
        let ctx = parley_core::GoalContext::new(&goal);
        assert!(parley_core::default_registry().resolve(&ctx).is_empty());
    }
}
