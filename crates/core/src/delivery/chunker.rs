use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// The kind of channel a conversation runs over; chunking rules are keyed by
/// this, not by channel instance.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Chat,
    Sms,
    Email,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBy {
    Sentence,
    Paragraph,
    #[default]
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRule {
    pub chunk_by: ChunkBy,
    pub max_length: usize,
    #[serde(default)]
    pub delay_between_chunks_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPolicy {
    pub enabled: bool,
    #[serde(default)]
    pub rules: BTreeMap<ChannelKind, ChunkRule>,
}

impl ChunkPolicy {
    pub fn rule_for(&self, channel: ChannelKind) -> Option<&ChunkRule> {
        self.rules.get(&channel)
    }
}

/// One piece of a reply, delivered as its own message. `delay_ms` here is
/// only the static per-rule spacing; humanized pacing is layered on by the
/// timing model at send time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseChunk {
    pub text: String,
    pub index: usize,
    pub total: usize,
    pub delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to_message_id: Option<String>,
}

/// Splits a reply into bounded chunks per the channel's rule. Disabled
/// policy, missing rule, or `ChunkBy::None` all mean one chunk.
pub fn chunk(text: &str, channel: ChannelKind, policy: &ChunkPolicy) -> Vec<ResponseChunk> {
    let rule = policy.rule_for(channel).filter(|_| policy.enabled);
    let Some(rule) = rule.filter(|rule| rule.chunk_by != ChunkBy::None) else {
        return vec![ResponseChunk {
            text: text.to_owned(),
            index: 0,
            total: 1,
            delay_ms: 0,
            response_to_message_id: None,
        }];
    };

    let units: Vec<&str> = match rule.chunk_by {
        ChunkBy::Sentence => split_sentences(text),
        ChunkBy::Paragraph => PARAGRAPH_BREAK.split(text).collect(),
        ChunkBy::None => unreachable!("filtered above"),
    };

    let mut texts: Vec<String> = Vec::new();
    pack_units(&units, rule.max_length, &mut texts);

    let texts: Vec<String> = texts
        .into_iter()
        .map(|chunk| chunk.trim().to_owned())
        .filter(|chunk| !chunk.is_empty())
        .collect();

    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| ResponseChunk {
            text,
            index,
            total,
            delay_ms: if index == 0 { 0 } else { rule.delay_between_chunks_ms },
            response_to_message_id: None,
        })
        .collect()
}

/// Greedily packs consecutive units while the running chunk stays within
/// `max_length`; a unit that alone exceeds the bound is split by words.
fn pack_units(units: &[&str], max_length: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    for unit in units {
        let unit = unit.trim();
        if unit.is_empty() {
            continue;
        }
        if unit.chars().count() > max_length {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let words: Vec<&str> = unit.split_whitespace().collect();
            pack_words(&words, max_length, out);
            continue;
        }
        let candidate_len =
            current.chars().count() + if current.is_empty() { 0 } else { 1 } + unit.chars().count();
        if current.is_empty() || candidate_len <= max_length {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(unit);
        } else {
            out.push(std::mem::take(&mut current));
            current.push_str(unit);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

fn pack_words(words: &[&str], max_length: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    for word in words {
        let candidate_len =
            current.chars().count() + if current.is_empty() { 0 } else { 1 } + word.chars().count();
        if current.is_empty() || candidate_len <= max_length {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Splits after `.`, `!`, or `?` followed by whitespace, keeping the
/// punctuation with the preceding sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let Some((boundary, next)) = chars.peek().copied() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }
        units.push(&text[start..boundary]);
        while chars.peek().is_some_and(|(_, w)| w.is_whitespace()) {
            chars.next();
        }
        start = chars.peek().map_or(text.len(), |(idx, _)| *idx);
    }

    if start < text.len() {
        units.push(&text[start..]);
    }
    units
}
