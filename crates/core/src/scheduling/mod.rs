pub mod parse;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::goals::{fields, GoalInstruction};
use parse::{
    bound_hour, is_rejection, mentioned_hour, parse_time_preference, rejection_relation,
    BoundRelation, TimePhrase,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Fixed iteration order used whenever slots are offered.
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// First weekday mentioned anywhere in free text, if any.
    pub fn find_in(text: &str) -> Option<Weekday> {
        let lower = text.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| lower.contains(&day.label().to_ascii_lowercase()[..3]))
    }
}

impl std::str::FromStr for Weekday {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Weekday::find_in(value).ok_or_else(|| DomainError::UnknownWeekday(value.to_owned()))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One open interval within a day, in whole 24h hours. `from` is inclusive,
/// `to` exclusive. Serialized as the external `{from:"HH", to:"HH"}` shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    #[serde(serialize_with = "hour_to_string", deserialize_with = "hour_from_string")]
    pub from: u8,
    #[serde(serialize_with = "hour_to_string", deserialize_with = "hour_from_string")]
    pub to: u8,
}

impl HourRange {
    pub fn new(from: u8, to: u8) -> Result<Self, DomainError> {
        if from >= to || to > 24 {
            return Err(DomainError::InvalidHourRange { from, to });
        }
        Ok(Self { from, to })
    }

}

fn hour_to_string<S: Serializer>(hour: &u8, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hour.to_string())
}

fn hour_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    struct HourVisitor;

    impl de::Visitor<'_> for HourVisitor {
        type Value = u8;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an hour between 0 and 24, as a number or \"HH\" string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u8, E> {
            value
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|hour| *hour <= 24)
                .ok_or_else(|| E::custom(format!("invalid hour `{value}`")))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u8, E> {
            u8::try_from(value)
                .ok()
                .filter(|hour| *hour <= 24)
                .ok_or_else(|| E::custom(format!("invalid hour `{value}`")))
        }
    }

    deserializer.deserialize_any(HourVisitor)
}

/// Weekly opening hours, read-only to the solver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessHours {
    days: BTreeMap<Weekday, Vec<HourRange>>,
}

impl BusinessHours {
    pub fn new(days: BTreeMap<Weekday, Vec<HourRange>>) -> Self {
        Self { days }
    }

    pub const fn empty() -> Self {
        Self { days: BTreeMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }

    pub fn ranges(&self, day: Weekday) -> &[HourRange] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every open whole hour on the given day, ascending.
    pub fn open_hours(&self, day: Weekday) -> Vec<u8> {
        let mut hours: Vec<u8> =
            self.ranges(day).iter().flat_map(|range| range.from..range.to).collect();
        hours.sort_unstable();
        hours.dedup();
        hours
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for ranges in self.days.values() {
            for range in ranges {
                HourRange::new(range.from, range.to)?;
            }
        }
        Ok(())
    }
}

/// Offerable times for one day, already formatted for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSlot {
    pub day: Weekday,
    pub times: Vec<String>,
}

/// `"Xam"`/`"Xpm"` rendering used in every offer.
pub fn format_hour(hour: u8) -> String {
    match hour {
        0 => "12am".to_owned(),
        1..=11 => format!("{hour}am"),
        12 => "12pm".to_owned(),
        _ => format!("{}pm", hour - 12),
    }
}

/// Everything the solver needs from the surrounding conversation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulingRequest<'a> {
    pub captured_date: Option<&'a str>,
    pub captured_time: Option<&'a str>,
    pub last_user_message: Option<&'a str>,
    pub objection: bool,
}

const MAX_TIMES_PER_DAY: usize = 3;
const MAX_SAMPLE_TIMES: usize = 5;
const SAMPLE_STEP_HOURS: usize = 2;
const DEFAULT_REJECTION_BOUND: u8 = 18;

/// Turns business hours plus free-text preferences into concrete offers.
pub struct AvailabilitySolver<'a> {
    hours: &'a BusinessHours,
}

impl<'a> AvailabilitySolver<'a> {
    pub fn new(hours: &'a BusinessHours) -> Self {
        Self { hours }
    }

    pub fn resolve(&self, request: &SchedulingRequest<'_>) -> GoalInstruction {
        let message = request.last_user_message.unwrap_or("");
        if request.objection || is_rejection(message) {
            return self.renegotiate(message);
        }

        let day = request.captured_date.and_then(Weekday::find_in);
        let time_phrase =
            request.captured_time.map(parse_time_preference).unwrap_or(TimePhrase::None);

        match (day, &time_phrase) {
            (Some(day), TimePhrase::Specific { hour, minute }) => {
                confirmation(day, *hour, *minute)
            }
            (Some(day), _) => self.offer_times_for_day(day, &time_phrase),
            (None, TimePhrase::Vague(part)) => {
                let (from, to) = part.hour_window();
                let slots = self.slots_where(|hour| hour >= from && hour < to);
                if slots.is_empty() {
                    return no_slot_apology();
                }
                offer_slots(
                    &slots,
                    &format!("For the {}, here's what's open", part.label()),
                    vec![fields::PREFERRED_DATE, fields::PREFERRED_TIME],
                )
            }
            (None, TimePhrase::Relative { relation, hour }) => {
                let bound =
                    hour.map(|h| bound_hour(*relation, h)).unwrap_or(DEFAULT_REJECTION_BOUND);
                let slots = self.slots_where(|h| match relation {
                    BoundRelation::After => h > bound,
                    BoundRelation::Before => h < bound,
                });
                if slots.is_empty() {
                    return no_slot_apology();
                }
                offer_slots(
                    &slots,
                    "Here's what's open",
                    vec![fields::PREFERRED_DATE, fields::PREFERRED_TIME],
                )
            }
            (None, _) => ask_day_part_preference(),
        }
    }

    /// Rejection path: rebuild offers strictly past (or before) the bound the
    /// user implied. Checked ahead of every other case.
    fn renegotiate(&self, message: &str) -> GoalInstruction {
        let relation = rejection_relation(message);
        let bound = mentioned_hour(message)
            .map(|h| bound_hour(relation, h))
            .unwrap_or(DEFAULT_REJECTION_BOUND);

        let slots = self.slots_where(|hour| match relation {
            BoundRelation::After => hour > bound,
            BoundRelation::Before => hour < bound,
        });

        if slots.is_empty() {
            return no_slot_apology();
        }

        offer_slots(
            &slots,
            "No problem, these could work instead",
            vec![fields::PREFERRED_DATE, fields::PREFERRED_TIME],
        )
    }

    fn offer_times_for_day(&self, day: Weekday, phrase: &TimePhrase) -> GoalInstruction {
        let mut hours = self.hours.open_hours(day);
        match phrase {
            TimePhrase::Vague(part) => {
                let (from, to) = part.hour_window();
                hours.retain(|hour| *hour >= from && *hour < to);
            }
            TimePhrase::Relative { relation, hour } => {
                let bound =
                    hour.map(|h| bound_hour(*relation, h)).unwrap_or(DEFAULT_REJECTION_BOUND);
                hours.retain(|h| match relation {
                    BoundRelation::After => *h > bound,
                    BoundRelation::Before => *h < bound,
                });
            }
            _ => {}
        }
        if hours.is_empty() {
            return no_slot_apology();
        }

        let samples: Vec<String> = hours
            .iter()
            .step_by(SAMPLE_STEP_HOURS)
            .take(MAX_SAMPLE_TIMES)
            .map(|hour| format_hour(*hour))
            .collect();

        GoalInstruction {
            instruction: format!(
                "Offer these times on {}: {}. Ask which one works best.",
                day.label(),
                samples.join(", ")
            ),
            examples: vec![format!(
                "{} I could do {} — what suits you?",
                day.label(),
                samples.join(" or ")
            )],
            target_fields: vec![fields::PREFERRED_TIME.to_owned()],
        }
    }

    fn slots_where(&self, keep: impl Fn(u8) -> bool) -> Vec<TimeSlot> {
        Weekday::ALL
            .into_iter()
            .filter_map(|day| {
                let times: Vec<String> = self
                    .hours
                    .open_hours(day)
                    .into_iter()
                    .filter(|hour| keep(*hour))
                    .take(MAX_TIMES_PER_DAY)
                    .map(format_hour)
                    .collect();
                if times.is_empty() {
                    None
                } else {
                    Some(TimeSlot { day, times })
                }
            })
            .collect()
    }
}

fn offer_slots(slots: &[TimeSlot], lead_in: &str, targets: Vec<&str>) -> GoalInstruction {
    let listing: Vec<String> = slots
        .iter()
        .map(|slot| format!("{} at {}", slot.day.label(), slot.times.join(", ")))
        .collect();

    GoalInstruction {
        instruction: format!(
            "{}: {}. Ask which day and time works for them.",
            lead_in,
            listing.join("; ")
        ),
        examples: vec![format!("We've got {} — any of those work?", listing.join(", or "))],
        target_fields: targets.into_iter().map(str::to_owned).collect(),
    }
}

fn confirmation(day: Weekday, hour: u8, minute: u8) -> GoalInstruction {
    let time = if minute == 0 {
        format_hour(hour)
    } else {
        let base = format_hour(hour);
        let (number, suffix) = base.split_at(base.len() - 2);
        format!("{number}:{minute:02}{suffix}")
    };
    GoalInstruction {
        instruction: format!("Confirm the appointment for {} at {time}.", day.label()),
        examples: vec![format!("Perfect, you're booked for {} at {time}!", day.label())],
        target_fields: Vec::new(),
    }
}

fn ask_day_part_preference() -> GoalInstruction {
    GoalInstruction {
        instruction:
            "Ask whether mornings, afternoons, or evenings generally work best for them."
                .to_owned(),
        examples: vec!["Do mornings, afternoons, or evenings usually suit you best?".to_owned()],
        target_fields: vec![fields::PREFERRED_TIME.to_owned()],
    }
}

fn no_slot_apology() -> GoalInstruction {
    GoalInstruction {
        instruction: "Apologize that nothing fits that window and ask for a different day."
            .to_owned(),
        examples: vec![
            "Sorry, nothing opens up then — would a different day work for you?".to_owned(),
        ],
        target_fields: vec![
            fields::PREFERRED_DATE.to_owned(),
            fields::PREFERRED_TIME.to_owned(),
        ],
    }
}
