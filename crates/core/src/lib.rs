pub mod config;
pub mod delivery;
pub mod errors;
pub mod goals;
pub mod scheduling;

pub use config::{ConfigError, ConfigOverrides, LoadOptions, TenantConfig};
pub use delivery::chunker::{chunk, ChannelKind, ChunkBy, ChunkPolicy, ChunkRule, ResponseChunk};
pub use delivery::timing::{DeliveryTimingModel, TimingConfig};
pub use errors::DomainError;
pub use goals::resolvers::{default_registry, GoalResolver, ResolverRegistry};
pub use goals::{
    detect_intent, ChannelState, CompanyInfo, DetectedIntent, Goal, GoalContext, GoalInstruction,
    GoalKind,
};
pub use scheduling::parse::{parse_time_preference, BoundRelation, DayPart, TimePhrase};
pub use scheduling::{
    AvailabilitySolver, BusinessHours, HourRange, SchedulingRequest, TimeSlot, Weekday,
};
