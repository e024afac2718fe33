pub mod resolvers;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::scheduling::parse::{parse_time_preference, TimePhrase};
use crate::scheduling::{BusinessHours, Weekday};

/// Field identifiers as they appear in goal definitions. These never reach
/// the end user verbatim; see [`field_label`].
pub mod fields {
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const HEIGHT: &str = "height";
    pub const WEIGHT: &str = "weight";
    pub const BODY_FAT_PERCENTAGE: &str = "bodyFatPercentage";
    pub const INJURIES: &str = "injuries";
    pub const PREFERRED_DATE: &str = "preferredDate";
    pub const PREFERRED_TIME: &str = "preferredTime";
}

const FIELD_LABELS: &[(&str, &str)] = &[
    (fields::FIRST_NAME, "first name"),
    (fields::LAST_NAME, "last name"),
    (fields::EMAIL, "email address"),
    (fields::PHONE, "phone number"),
    (fields::HEIGHT, "height"),
    (fields::WEIGHT, "weight"),
    (fields::BODY_FAT_PERCENTAGE, "body fat percentage"),
    (fields::INJURIES, "injuries or physical limitations"),
    (fields::PREFERRED_DATE, "preferred day"),
    (fields::PREFERRED_TIME, "preferred time"),
];

/// Fields a goal may ask about without blocking completion on an answer.
const OPTIONAL_FIELDS: &[&str] = &[fields::BODY_FAT_PERCENTAGE];

/// Human wording for a field identifier, with a camelCase-to-words fallback
/// for identifiers outside the table.
pub fn field_label(field: &str) -> String {
    if let Some((_, label)) = FIELD_LABELS.iter().find(|(id, _)| *id == field) {
        return (*label).to_owned();
    }
    camel_to_words(field)
}

fn camel_to_words(field: &str) -> String {
    let mut words = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            if !words.is_empty() {
                words.push(' ');
            }
            words.push(ch.to_ascii_lowercase());
        } else {
            words.push(ch);
        }
    }
    words
}

static NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}\s*(/|-|th|st|nd|rd)").unwrap());

/// Whether a captured value actually satisfies its field. A vague time word
/// in `preferredTime` keeps the field open; a weekday or numeric date closes
/// `preferredDate`.
pub fn is_valid_capture(field: &str, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    match field {
        fields::PREFERRED_DATE => Weekday::find_in(value).is_some() || NUMERIC_DATE.is_match(value),
        fields::PREFERRED_TIME => matches!(parse_time_preference(value), TimePhrase::Specific { .. }),
        fields::EMAIL => value.contains('@') && value.contains('.'),
        fields::PHONE => value.chars().filter(char::is_ascii_digit).count() >= 7,
        _ => true,
    }
}

/// The kinds of slot-filling objectives a conversation can carry. Classified
/// once from the field set so dispatch is a match, not scattered string
/// membership checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Identity,
    ContactInfo,
    BodyMetrics,
    Injuries,
    Scheduling,
    Generic,
}

impl GoalKind {
    pub fn classify(fields_needed: &[String]) -> GoalKind {
        let has = |field: &str| fields_needed.iter().any(|f| f == field);
        if has(fields::PREFERRED_DATE) || has(fields::PREFERRED_TIME) {
            GoalKind::Scheduling
        } else if has(fields::EMAIL) || has(fields::PHONE) {
            GoalKind::ContactInfo
        } else if has(fields::FIRST_NAME) || has(fields::LAST_NAME) {
            GoalKind::Identity
        } else if has(fields::HEIGHT) || has(fields::WEIGHT) || has(fields::BODY_FAT_PERCENTAGE) {
            GoalKind::BodyMetrics
        } else if has(fields::INJURIES) {
            GoalKind::Injuries
        } else {
            GoalKind::Generic
        }
    }
}

/// One slot-filling objective within a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub goal_id: String,
    pub kind: GoalKind,
    pub name: String,
    pub fields_needed: Vec<String>,
    #[serde(default)]
    pub fields_captured: BTreeMap<String, String>,
}

impl Goal {
    pub fn new(goal_id: impl Into<String>, name: impl Into<String>, needed: Vec<String>) -> Self {
        let kind = GoalKind::classify(&needed);
        Self {
            goal_id: goal_id.into(),
            kind,
            name: name.into(),
            fields_needed: needed,
            fields_captured: BTreeMap::new(),
        }
    }

    /// Validly captured value for a field, if any.
    pub fn captured(&self, field: &str) -> Option<&str> {
        self.fields_captured
            .get(field)
            .map(String::as_str)
            .filter(|value| is_valid_capture(field, value))
    }

    /// Raw captured value regardless of validity (a vague "evening" in
    /// `preferredTime` is still useful context for the solver).
    pub fn captured_raw(&self, field: &str) -> Option<&str> {
        self.fields_captured.get(field).map(String::as_str)
    }

    pub fn capture(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields_captured.insert(field.into(), value.into());
    }

    /// Needed fields without a valid captured value, in declaration order.
    pub fn missing_fields(&self) -> Vec<String> {
        self.fields_needed
            .iter()
            .filter(|field| self.captured(field).is_none())
            .cloned()
            .collect()
    }

    pub fn needs(&self, field: &str) -> bool {
        self.fields_needed.iter().any(|f| f == field)
    }

    /// Complete once every required field holds a valid value; optional
    /// fields never block completion.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().iter().all(|field| OPTIONAL_FIELDS.contains(&field.as_str()))
    }
}

/// The next question to steer the LLM with. Produced fresh each turn, never
/// persisted. An empty instruction means no question is needed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInstruction {
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(default)]
    pub target_fields: Vec<String>,
}

impl GoalInstruction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.instruction.is_empty() && self.target_fields.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub business_hours: BusinessHours,
}

/// Already-agreed scheduling context carried by the channel, referenced when
/// asking for contact details ("to confirm Tuesday at 6pm...").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    #[serde(default)]
    pub scheduled_day: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectedIntent {
    Objection,
    Affirmation,
    Other,
}

const OBJECTION_MARKERS: &[&str] = &[
    "not interested",
    "no thanks",
    "doesn't work",
    "doesnt work",
    "won't work",
    "wont work",
    "can't",
    "cant ",
    "none of those",
    "none of these",
    "too early",
    "too late",
];

const AFFIRMATION_MARKERS: &[&str] =
    &["yes", "yep", "yeah", "sure", "sounds good", "works for me", "perfect", "okay"];

/// Coarse keyword intent detection over a user turn. Deliberately shallow;
/// upstream NLU can override it via [`GoalContext::detected_intent`].
pub fn detect_intent(text: &str) -> DetectedIntent {
    let lower = text.to_ascii_lowercase();
    if OBJECTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        DetectedIntent::Objection
    } else if AFFIRMATION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        DetectedIntent::Affirmation
    } else {
        DetectedIntent::Other
    }
}

/// Everything a resolver may consult for one turn. Optional context is
/// genuinely optional: absence never fails resolution.
#[derive(Clone, Copy, Debug)]
pub struct GoalContext<'a> {
    pub goal: &'a Goal,
    pub company: Option<&'a CompanyInfo>,
    pub channel_state: Option<&'a ChannelState>,
    pub last_user_message: Option<&'a str>,
    pub detected_intent: Option<DetectedIntent>,
}

impl<'a> GoalContext<'a> {
    pub fn new(goal: &'a Goal) -> Self {
        Self {
            goal,
            company: None,
            channel_state: None,
            last_user_message: None,
            detected_intent: None,
        }
    }
}
