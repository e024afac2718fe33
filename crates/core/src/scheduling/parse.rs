use std::sync::LazyLock;

use regex::Regex;

static SPECIFIC_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})\s*(am|pm|:(\d{2})\s*(am|pm)?)").unwrap());

static RELATIVE_BOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(later|after|past|earlier|before)\b(?:\s+than)?\s*(\d{1,2})?").unwrap()
});

static ANY_HOUR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})\b").unwrap());

/// What part of the day a vague preference points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    /// Hour window for the day part, as a half-open 24h range.
    pub fn hour_window(self) -> (u8, u8) {
        match self {
            Self::Morning => (0, 12),
            Self::Afternoon => (12, 17),
            Self::Evening => (17, 24),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundRelation {
    After,
    Before,
}

/// Tri-state classification of a free-text time mention.
///
/// This is a best-effort heuristic, not a real parser: it mirrors the
/// observed behavior of regex classification and can misread composites
/// like "mostly evenings at 6". Callers must treat it as approximate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimePhrase {
    /// Matches a clock time at the start of the value ("6pm", "18:00").
    Specific { hour: u8, minute: u8 },
    /// A day-part word anywhere in the value ("evening", "mornings").
    Vague(DayPart),
    /// "later than 6" / "before 5" style renegotiation language.
    Relative { relation: BoundRelation, hour: Option<u8> },
    None,
}

pub fn parse_time_preference(text: &str) -> TimePhrase {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return TimePhrase::None;
    }

    if let Some(caps) = SPECIFIC_TIME.captures(trimmed) {
        let mut hour: u8 = caps[1].parse().unwrap_or(0);
        let suffix = caps[2].to_ascii_lowercase();
        let minute: u8 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let meridiem = if suffix.starts_with(':') {
            caps.get(4).map(|m| m.as_str().to_ascii_lowercase())
        } else {
            Some(suffix)
        };
        if let Some(meridiem) = meridiem {
            if meridiem == "pm" && hour < 12 {
                hour += 12;
            } else if meridiem == "am" && hour == 12 {
                hour = 0;
            }
        }
        if hour < 24 && minute < 60 {
            return TimePhrase::Specific { hour, minute };
        }
    }

    if let Some(caps) = RELATIVE_BOUND.captures(trimmed) {
        let relation = match caps[1].to_ascii_lowercase().as_str() {
            "earlier" | "before" => BoundRelation::Before,
            _ => BoundRelation::After,
        };
        let hour = caps.get(2).and_then(|m| m.as_str().parse::<u8>().ok()).filter(|h| *h < 24);
        return TimePhrase::Relative { relation, hour };
    }

    if let Some(part) = day_part(trimmed) {
        return TimePhrase::Vague(part);
    }

    TimePhrase::None
}

fn day_part(text: &str) -> Option<DayPart> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("morning") {
        Some(DayPart::Morning)
    } else if lower.contains("afternoon") || lower.contains("noon") || lower.contains("midday") {
        Some(DayPart::Afternoon)
    } else if lower.contains("evening") || lower.contains("tonight") || lower.contains("night") {
        Some(DayPart::Evening)
    } else {
        None
    }
}

const REJECTION_PHRASES: &[&str] = &[
    "later",
    "earlier",
    "too early",
    "too late",
    "doesn't work",
    "doesnt work",
    "don't work",
    "dont work",
    "won't work",
    "wont work",
    "none of those",
    "none of these",
    "can't do",
    "cant do",
    "can't make",
    "cant make",
    "another time",
    "different time",
];

/// Whether a user turn reads as rejecting the offered slots.
pub fn is_rejection(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    REJECTION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Direction implied by a rejection ("earlier"/"too late" flips the bound).
pub fn rejection_relation(text: &str) -> BoundRelation {
    let lower = text.to_ascii_lowercase();
    if lower.contains("earlier") || lower.contains("too late") || lower.contains("before") {
        BoundRelation::Before
    } else {
        BoundRelation::After
    }
}

/// First standalone hour mentioned in the text, if any.
pub fn mentioned_hour(text: &str) -> Option<u8> {
    ANY_HOUR
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<u8>().ok())
        .find(|hour| *hour < 24)
}

/// 24h normalization for a renegotiation bound. A bare 1-12 after "later
/// than" reads as PM; an "earlier than" bound keeps its morning reading.
pub fn bound_hour(relation: BoundRelation, hour: u8) -> u8 {
    match relation {
        BoundRelation::After if (1..=12).contains(&hour) => hour + 12,
        _ => hour,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        bound_hour, is_rejection, mentioned_hour, parse_time_preference, rejection_relation,
        BoundRelation, DayPart, TimePhrase,
    };

    #[test]
    fn classifies_clock_times_as_specific() {
        assert_eq!(parse_time_preference("6pm"), TimePhrase::Specific { hour: 18, minute: 0 });
        assert_eq!(parse_time_preference("6 pm"), TimePhrase::Specific { hour: 18, minute: 0 });
        assert_eq!(parse_time_preference("18:00"), TimePhrase::Specific { hour: 18, minute: 0 });
        assert_eq!(parse_time_preference("9:30 am"), TimePhrase::Specific { hour: 9, minute: 30 });
        assert_eq!(parse_time_preference("12am"), TimePhrase::Specific { hour: 0, minute: 0 });
    }

    #[test]
    fn classifies_day_parts_as_vague() {
        assert_eq!(parse_time_preference("evening"), TimePhrase::Vague(DayPart::Evening));
        assert_eq!(parse_time_preference("in the morning"), TimePhrase::Vague(DayPart::Morning));
        assert_eq!(parse_time_preference("around noon"), TimePhrase::Vague(DayPart::Afternoon));
    }

    #[test]
    fn classifies_renegotiation_language_as_relative() {
        assert_eq!(
            parse_time_preference("can we do later than 6"),
            TimePhrase::Relative { relation: BoundRelation::After, hour: Some(6) }
        );
        assert_eq!(
            parse_time_preference("earlier than 5 please"),
            TimePhrase::Relative { relation: BoundRelation::Before, hour: Some(5) }
        );
        assert_eq!(
            parse_time_preference("something later"),
            TimePhrase::Relative { relation: BoundRelation::After, hour: None }
        );
    }

    // Known-approximate: plural day-part composites still classify as vague,
    // matching the historical heuristic rather than any stricter grammar.
    #[test]
    fn composite_phrases_keep_historical_classification() {
        assert_eq!(parse_time_preference("mostly evenings"), TimePhrase::Vague(DayPart::Evening));
        assert_eq!(parse_time_preference("6ish"), TimePhrase::None);
    }

    #[test]
    fn detects_rejection_phrases() {
        assert!(is_rejection("that doesn't work for me"));
        assert!(is_rejection("none of those"));
        assert!(is_rejection("can we do later than 6"));
        assert!(!is_rejection("tuesday sounds great"));
    }

    #[test]
    fn rejection_relation_flips_for_earlier() {
        assert_eq!(rejection_relation("can we go earlier"), BoundRelation::Before);
        assert_eq!(rejection_relation("that is too late"), BoundRelation::Before);
        assert_eq!(rejection_relation("later than 6"), BoundRelation::After);
    }

    #[test]
    fn extracts_first_plausible_hour() {
        assert_eq!(mentioned_hour("later than 6 would be good"), Some(6));
        assert_eq!(mentioned_hour("no numbers here"), None);
        assert_eq!(mentioned_hour("call me at 99 or 7"), Some(7));
    }

    #[test]
    fn only_after_bounds_read_small_hours_as_pm() {
        assert_eq!(bound_hour(BoundRelation::After, 6), 18);
        assert_eq!(bound_hour(BoundRelation::After, 18), 18);
        assert_eq!(bound_hour(BoundRelation::After, 0), 0);
        assert_eq!(bound_hour(BoundRelation::Before, 10), 10);
        assert_eq!(bound_hour(BoundRelation::Before, 20), 20);
    }
}
