use std::collections::HashMap;
use std::sync::Arc;

use crate::goals::{
    field_label, fields, DetectedIntent, Goal, GoalContext, GoalInstruction, GoalKind,
};
use crate::scheduling::{AvailabilitySolver, BusinessHours, SchedulingRequest};

/// Produces the next-question instruction for one goal kind.
pub trait GoalResolver: Send + Sync {
    fn kind(&self) -> GoalKind;
    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction;
}

/// Dispatches a goal to its specialized resolver, falling back to the
/// generic one for kinds nothing has claimed.
pub struct ResolverRegistry {
    resolvers: HashMap<GoalKind, Arc<dyn GoalResolver>>,
    fallback: Arc<dyn GoalResolver>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self { resolvers: HashMap::new(), fallback: Arc::new(GenericResolver) }
    }

    pub fn register<R>(&mut self, resolver: R)
    where
        R: GoalResolver + 'static,
    {
        self.resolvers.insert(resolver.kind(), Arc::new(resolver));
    }

    pub fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        match self.resolvers.get(&ctx.goal.kind) {
            Some(resolver) => resolver.resolve(ctx),
            None => self.fallback.resolve(ctx),
        }
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }
}

/// Registry with every built-in specialization wired up.
pub fn default_registry() -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    registry.register(IdentityResolver);
    registry.register(ContactInfoResolver);
    registry.register(BodyMetricsResolver);
    registry.register(InjuriesResolver);
    registry.register(SchedulingResolver);
    registry
}

/// Asks for the full name once; if only part is known, asks only for the
/// missing part and never re-asks a captured one.
pub struct IdentityResolver;

impl GoalResolver for IdentityResolver {
    fn kind(&self) -> GoalKind {
        GoalKind::Identity
    }

    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        let goal = ctx.goal;
        let first = goal.needs(fields::FIRST_NAME).then(|| goal.captured(fields::FIRST_NAME));
        let last = goal.needs(fields::LAST_NAME).then(|| goal.captured(fields::LAST_NAME));

        match (first, last) {
            (Some(None), Some(None)) => GoalInstruction {
                instruction: "Ask for their full name.".to_owned(),
                examples: vec!["Great to meet you! What's your full name?".to_owned()],
                target_fields: vec![
                    fields::FIRST_NAME.to_owned(),
                    fields::LAST_NAME.to_owned(),
                ],
            },
            (Some(Some(first_name)), Some(None)) => GoalInstruction {
                instruction: format!(
                    "You already know their first name is {first_name}. Ask only for their last name."
                ),
                examples: vec![format!("Thanks {first_name}! And your last name?")],
                target_fields: vec![fields::LAST_NAME.to_owned()],
            },
            (Some(None), _) => GoalInstruction {
                instruction: "Ask for their first name.".to_owned(),
                examples: vec!["What should I call you?".to_owned()],
                target_fields: vec![fields::FIRST_NAME.to_owned()],
            },
            (None, Some(None)) => GoalInstruction {
                instruction: "Ask for their last name.".to_owned(),
                examples: vec!["And your last name?".to_owned()],
                target_fields: vec![fields::LAST_NAME.to_owned()],
            },
            _ => GoalInstruction::none(),
        }
    }
}

/// Email and phone are asked together only when both are missing; a lone
/// missing field is asked on its own, anchored to any agreed appointment.
pub struct ContactInfoResolver;

impl GoalResolver for ContactInfoResolver {
    fn kind(&self) -> GoalKind {
        GoalKind::ContactInfo
    }

    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        let goal = ctx.goal;
        let email_missing = goal.needs(fields::EMAIL) && goal.captured(fields::EMAIL).is_none();
        let phone_missing = goal.needs(fields::PHONE) && goal.captured(fields::PHONE).is_none();

        let anchor = ctx
            .channel_state
            .and_then(|state| match (&state.scheduled_day, &state.scheduled_time) {
                (Some(day), Some(time)) => Some(format!(" to confirm {day} at {time}")),
                (Some(day), None) => Some(format!(" to confirm {day}")),
                _ => None,
            })
            .unwrap_or_default();

        match (email_missing, phone_missing) {
            (true, true) => GoalInstruction {
                instruction: format!(
                    "Ask for their email address and phone number together{anchor}."
                ),
                examples: vec![
                    "What's the best email and phone number to reach you on?".to_owned(),
                ],
                target_fields: vec![fields::EMAIL.to_owned(), fields::PHONE.to_owned()],
            },
            (true, false) => GoalInstruction {
                instruction: format!("Ask only for their email address{anchor}."),
                examples: vec![format!("What's the best email{anchor}?")],
                target_fields: vec![fields::EMAIL.to_owned()],
            },
            (false, true) => GoalInstruction {
                instruction: format!("Ask only for their phone number{anchor}."),
                examples: vec![format!("And a phone number{anchor}?")],
                target_fields: vec![fields::PHONE.to_owned()],
            },
            (false, false) => GoalInstruction::none(),
        }
    }
}

/// Height and weight travel together; body fat is a follow-up that never
/// blocks the goal.
pub struct BodyMetricsResolver;

impl GoalResolver for BodyMetricsResolver {
    fn kind(&self) -> GoalKind {
        GoalKind::BodyMetrics
    }

    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        let goal = ctx.goal;
        let missing = |field: &str| goal.needs(field) && goal.captured(field).is_none();

        let height_missing = missing(fields::HEIGHT);
        let weight_missing = missing(fields::WEIGHT);

        if height_missing && weight_missing {
            return GoalInstruction {
                instruction: "Ask for their height and weight together.".to_owned(),
                examples: vec!["Mind sharing your height and weight?".to_owned()],
                target_fields: vec![fields::HEIGHT.to_owned(), fields::WEIGHT.to_owned()],
            };
        }
        if height_missing || weight_missing {
            let field = if height_missing { fields::HEIGHT } else { fields::WEIGHT };
            return GoalInstruction {
                instruction: format!("Ask for their {}.", field_label(field)),
                target_fields: vec![field.to_owned()],
                ..GoalInstruction::default()
            };
        }
        if missing(fields::BODY_FAT_PERCENTAGE) {
            return GoalInstruction {
                instruction:
                    "Optionally ask for their body fat percentage; make clear it's fine not to know."
                        .to_owned(),
                examples: vec![
                    "If you happen to know your body fat percentage, great — no worries if not!"
                        .to_owned(),
                ],
                target_fields: vec![fields::BODY_FAT_PERCENTAGE.to_owned()],
            };
        }
        GoalInstruction::none()
    }
}

/// Single yes/no style ask; "none" is a terminal answer.
pub struct InjuriesResolver;

impl GoalResolver for InjuriesResolver {
    fn kind(&self) -> GoalKind {
        GoalKind::Injuries
    }

    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        let goal = ctx.goal;
        if goal.needs(fields::INJURIES) && goal.captured(fields::INJURIES).is_none() {
            return GoalInstruction {
                instruction:
                    "Ask whether they have any injuries or physical limitations; \"none\" is a complete answer."
                        .to_owned(),
                examples: vec![
                    "Any injuries or physical limitations I should know about?".to_owned(),
                ],
                target_fields: vec![fields::INJURIES.to_owned()],
            };
        }
        GoalInstruction::none()
    }
}

/// Delegates to the availability solver with whatever scheduling context the
/// goal has accumulated. Works without company info, degrading to a
/// preference question.
pub struct SchedulingResolver;

impl GoalResolver for SchedulingResolver {
    fn kind(&self) -> GoalKind {
        GoalKind::Scheduling
    }

    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        static EMPTY_HOURS: BusinessHours = BusinessHours::empty();
        let hours = ctx.company.map(|c| &c.business_hours).unwrap_or(&EMPTY_HOURS);

        let request = SchedulingRequest {
            captured_date: ctx.goal.captured_raw(fields::PREFERRED_DATE),
            captured_time: ctx.goal.captured_raw(fields::PREFERRED_TIME),
            last_user_message: ctx.last_user_message,
            objection: matches!(ctx.detected_intent, Some(DetectedIntent::Objection)),
        };

        AvailabilitySolver::new(hours).resolve(&request)
    }
}

/// One conversational ask covering every still-missing field, with raw
/// identifiers humanized before they reach the user.
pub struct GenericResolver;

impl GoalResolver for GenericResolver {
    fn kind(&self) -> GoalKind {
        GoalKind::Generic
    }

    fn resolve(&self, ctx: &GoalContext<'_>) -> GoalInstruction {
        let missing = ctx.goal.missing_fields();
        if missing.is_empty() {
            return GoalInstruction::none();
        }

        let labels: Vec<String> = missing.iter().map(|field| field_label(field)).collect();
        let asked = join_naturally(&labels);

        GoalInstruction {
            instruction: format!("Ask conversationally for their {asked}."),
            examples: vec![format!("Could you share your {asked}?")],
            target_fields: missing,
        }
    }
}

fn join_naturally(labels: &[String]) -> String {
    match labels {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., tail] => format!("{} and {tail}", head.join(", ")),
    }
}
