use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use parley_core::ChannelKind;

use crate::classify::{classify_origin, MessageOrigin};
use crate::events::InboundEvent;

/// Display name used when a persona lookup fails or returns nothing.
pub const DEFAULT_PERSONA_NAME: &str = "Assistant";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("record not found")]
    NotFound,
    #[error("directory backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("event has no resolvable tenant id")]
    MissingTenant,
    #[error("event has no resolvable contact identity")]
    MissingContact,
}

/// Channel configuration from the external collaborator. Accepts the plural
/// `botEmployeeIds` as well as the legacy singular keys.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "RawChannelProfile")]
pub struct ChannelProfile {
    pub kind: ChannelKind,
    pub bot_employee_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawChannelProfile {
    channel_kind: Option<ChannelKind>,
    bot_employee_ids: Vec<String>,
    bot_employee_id: Option<String>,
    persona_id: Option<String>,
}

impl From<RawChannelProfile> for ChannelProfile {
    fn from(raw: RawChannelProfile) -> Self {
        let bot_employee_ids = if raw.bot_employee_ids.is_empty() {
            raw.bot_employee_id.or(raw.persona_id).into_iter().collect()
        } else {
            raw.bot_employee_ids
        };
        Self { kind: raw.channel_kind.unwrap_or_default(), bot_employee_ids }
    }
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_profile(
        &self,
        tenant_id: &str,
        channel_id: &str,
    ) -> Result<ChannelProfile, DirectoryError>;
}

#[async_trait]
pub trait PersonaDirectory: Send + Sync {
    async fn display_name(
        &self,
        tenant_id: &str,
        persona_id: &str,
    ) -> Result<Option<String>, DirectoryError>;
}

/// One reply-generation pass for one persona.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonaInvocation {
    pub tenant_id: String,
    pub channel_id: String,
    pub channel_kind: ChannelKind,
    pub persona_id: String,
    pub persona_name: String,
    pub sender_id: String,
    pub text: String,
    pub message_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Why an event did or did not produce invocations. Drops are tagged so
/// callers and tests can assert on the reason instead of inferring it from
/// silence.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    Routed(Vec<PersonaInvocation>),
    DroppedForHuman,
    DroppedSelfOrigin,
}

/// Classifies an inbound event and fans it out to every persona assigned to
/// the channel. Loop prevention runs before any side effect.
pub struct OriginRouter<C, P> {
    channels: C,
    personas: P,
}

impl<C, P> OriginRouter<C, P>
where
    C: ChannelDirectory,
    P: PersonaDirectory,
{
    pub fn new(channels: C, personas: P) -> Self {
        Self { channels, personas }
    }

    pub async fn route(&self, event: &InboundEvent) -> Result<RouteOutcome, RouterError> {
        let detail = &event.detail;
        let tenant_id = detail.tenant_id.clone().ok_or(RouterError::MissingTenant)?;

        // Only externally-sourced chat messages need the directory to learn
        // the channel's bot set; native events carry their own markers.
        let profile = if event.is_external() {
            match self.channels.channel_profile(&tenant_id, &detail.channel_id).await {
                Ok(profile) => profile,
                Err(err) => {
                    warn!(
                        channel_id = %detail.channel_id,
                        error = %err,
                        "channel lookup failed; treating channel as having no personas"
                    );
                    ChannelProfile::default()
                }
            }
        } else {
            ChannelProfile {
                kind: detail
                    .metadata
                    .as_ref()
                    .and_then(|metadata| metadata.channel_kind)
                    .unwrap_or_default(),
                bot_employee_ids: Vec::new(),
            }
        };

        if classify_origin(detail, &profile.bot_employee_ids) == MessageOrigin::Bot {
            debug!(message_id = ?detail.message_id, "bot-authored message; dropping");
            return Ok(RouteOutcome::DroppedSelfOrigin);
        }

        let recipient_is_bot = detail
            .user_id
            .as_deref()
            .is_some_and(|user_id| profile.bot_employee_ids.iter().any(|id| id == user_id));
        if !recipient_is_bot {
            debug!(message_id = ?detail.message_id, "message addressed to a human; dropping");
            return Ok(RouteOutcome::DroppedForHuman);
        }

        let sender_id = detail.sender_id.clone().ok_or(RouterError::MissingContact)?;

        let mut invocations = Vec::with_capacity(profile.bot_employee_ids.len());
        for persona_id in &profile.bot_employee_ids {
            let persona_name = self.resolve_persona_name(&tenant_id, persona_id).await;
            invocations.push(PersonaInvocation {
                tenant_id: tenant_id.clone(),
                channel_id: detail.channel_id.clone(),
                channel_kind: profile.kind,
                persona_id: persona_id.clone(),
                persona_name,
                sender_id: sender_id.clone(),
                text: detail.text.clone(),
                message_id: detail.message_id.clone(),
                timestamp: detail.timestamp,
            });
        }

        Ok(RouteOutcome::Routed(invocations))
    }

    async fn resolve_persona_name(&self, tenant_id: &str, persona_id: &str) -> String {
        match self.personas.display_name(tenant_id, persona_id).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!(persona_id, "persona has no display name; using default");
                DEFAULT_PERSONA_NAME.to_owned()
            }
            Err(err) => {
                warn!(persona_id, error = %err, "persona lookup failed; using default name");
                DEFAULT_PERSONA_NAME.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::{
        ChannelDirectory, ChannelProfile, DirectoryError, OriginRouter, PersonaDirectory,
        RouteOutcome, RouterError, DEFAULT_PERSONA_NAME,
    };
    use crate::events::{InboundDetail, InboundEvent, MessageMetadata};

    struct FixedChannels {
        profile: Result<ChannelProfile, ()>,
    }

    #[async_trait]
    impl ChannelDirectory for FixedChannels {
        async fn channel_profile(
            &self,
            _tenant_id: &str,
            _channel_id: &str,
        ) -> Result<ChannelProfile, DirectoryError> {
            self.profile
                .clone()
                .map_err(|_| DirectoryError::Backend("unavailable".to_owned()))
        }
    }

    struct FixedPersonas {
        names: HashMap<String, String>,
    }

    #[async_trait]
    impl PersonaDirectory for FixedPersonas {
        async fn display_name(
            &self,
            _tenant_id: &str,
            persona_id: &str,
        ) -> Result<Option<String>, DirectoryError> {
            Ok(self.names.get(persona_id).cloned())
        }
    }

    fn two_persona_channel() -> ChannelProfile {
        ChannelProfile {
            kind: Default::default(),
            bot_employee_ids: vec!["persona-1".to_owned(), "persona-2".to_owned()],
        }
    }

    fn router(profile: Result<ChannelProfile, ()>) -> OriginRouter<FixedChannels, FixedPersonas> {
        let mut names = HashMap::new();
        names.insert("persona-1".to_owned(), "Alex".to_owned());
        OriginRouter::new(FixedChannels { profile }, FixedPersonas { names })
    }

    fn human_event() -> InboundEvent {
        InboundEvent {
            source: "channels".to_owned(),
            detail_type: "chat.message.available".to_owned(),
            detail: InboundDetail {
                tenant_id: Some("t1".to_owned()),
                channel_id: "c1".to_owned(),
                user_id: Some("persona-1".to_owned()),
                sender_id: Some("visitor-9".to_owned()),
                text: "Hi".to_owned(),
                message_id: Some("m-1".to_owned()),
                timestamp: None,
                metadata: None,
            },
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_channel_persona() {
        let outcome =
            router(Ok(two_persona_channel())).route(&human_event()).await.expect("route");

        let RouteOutcome::Routed(invocations) = outcome else {
            panic!("expected routed outcome");
        };
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].persona_id, "persona-1");
        assert_eq!(invocations[0].persona_name, "Alex");
        assert_eq!(invocations[1].persona_name, DEFAULT_PERSONA_NAME);
        assert!(invocations.iter().all(|inv| inv.sender_id == "visitor-9"));
    }

    #[tokio::test]
    async fn bot_sender_is_always_dropped() {
        let mut event = human_event();
        event.detail.sender_id = Some("persona-2".to_owned());

        let outcome = router(Ok(two_persona_channel())).route(&event).await.expect("route");
        assert_eq!(outcome, RouteOutcome::DroppedSelfOrigin);
    }

    #[tokio::test]
    async fn persona_marked_metadata_is_dropped() {
        let mut event = human_event();
        event.detail.metadata = Some(MessageMetadata {
            origin_marker: Some("persona".to_owned()),
            ..MessageMetadata::default()
        });

        let outcome = router(Ok(two_persona_channel())).route(&event).await.expect("route");
        assert_eq!(outcome, RouteOutcome::DroppedSelfOrigin);
    }

    #[tokio::test]
    async fn message_to_a_human_recipient_is_dropped() {
        let mut event = human_event();
        event.detail.user_id = Some("visitor-7".to_owned());

        let outcome = router(Ok(two_persona_channel())).route(&event).await.expect("route");
        assert_eq!(outcome, RouteOutcome::DroppedForHuman);
    }

    struct UnreachableChannels;

    #[async_trait]
    impl ChannelDirectory for UnreachableChannels {
        async fn channel_profile(
            &self,
            _tenant_id: &str,
            _channel_id: &str,
        ) -> Result<ChannelProfile, DirectoryError> {
            panic!("native events must not trigger a channel lookup");
        }
    }

    #[tokio::test]
    async fn native_events_route_without_a_channel_lookup() {
        let router = OriginRouter::new(
            UnreachableChannels,
            FixedPersonas { names: HashMap::new() },
        );

        let mut echo = human_event();
        echo.detail_type = "parley.message.delivered".to_owned();
        echo.detail.metadata = Some(MessageMetadata {
            origin_marker: Some("persona".to_owned()),
            ..MessageMetadata::default()
        });
        let outcome = router.route(&echo).await.expect("route");
        assert_eq!(outcome, RouteOutcome::DroppedSelfOrigin);

        let mut unmarked = human_event();
        unmarked.detail_type = "parley.message.delivered".to_owned();
        let outcome = router.route(&unmarked).await.expect("route");
        assert_eq!(outcome, RouteOutcome::DroppedForHuman);
    }

    #[tokio::test]
    async fn failed_channel_lookup_degrades_to_no_personas() {
        let outcome = router(Err(())).route(&human_event()).await.expect("route");
        assert_eq!(outcome, RouteOutcome::DroppedForHuman);
    }

    #[tokio::test]
    async fn missing_tenant_is_fatal() {
        let mut event = human_event();
        event.detail.tenant_id = None;

        let err = router(Ok(two_persona_channel())).route(&event).await.expect_err("fatal");
        assert_eq!(err, RouterError::MissingTenant);
    }

    #[tokio::test]
    async fn missing_sender_is_fatal() {
        let mut event = human_event();
        event.detail.sender_id = None;

        let err = router(Ok(two_persona_channel())).route(&event).await.expect_err("fatal");
        assert_eq!(err, RouterError::MissingContact);
    }

    #[test]
    fn channel_profile_accepts_legacy_singular_keys() {
        let plural: ChannelProfile =
            serde_json::from_str(r#"{"botEmployeeIds": ["a", "b"]}"#).expect("parse");
        assert_eq!(plural.bot_employee_ids, vec!["a", "b"]);

        let singular: ChannelProfile =
            serde_json::from_str(r#"{"botEmployeeId": "a"}"#).expect("parse");
        assert_eq!(singular.bot_employee_ids, vec!["a"]);

        let legacy: ChannelProfile =
            serde_json::from_str(r#"{"personaId": "p"}"#).expect("parse");
        assert_eq!(legacy.bot_employee_ids, vec!["p"]);
    }
}
