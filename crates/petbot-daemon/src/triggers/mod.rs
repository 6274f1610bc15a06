//! Free-text chat triggers. One pattern table serves both plain chat lines
//! and `/me` actions; only the anchoring differs between the two.

use std::sync::LazyLock;

use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Beckon,
    Affection,
    Feed,
    Play,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub kind: TriggerKind,
    /// Name of the pet being addressed.
    pub target: String,
}

struct Trigger {
    kind: TriggerKind,
    pattern: Regex,
}

// Table order is match priority.
static TRIGGERS: LazyLock<Vec<Trigger>> = LazyLock::new(|| {
    [
        (TriggerKind::Beckon, r"(?i)(?:come here|here|hey|beckons) (\w+)"),
        (TriggerKind::Affection, r"(?i)(?:pets|rubs|scratches|boops) (\w+)"),
        (
            TriggerKind::Feed,
            r"(?i)feeds (\w+)|fills (\w+)(?:'s)? (?:food|bowl|dish)|gives (\w+) (?:some )?food",
        ),
        (
            TriggerKind::Play,
            r"(?i)(?:plays with|throws (?:a|the) (?:ball|stick) (?:for|to)) (\w+)",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| Trigger {
        kind,
        pattern: Regex::new(pattern).unwrap(),
    })
    .collect()
});

/// Plain chat: a trigger may appear anywhere in the line. Every candidate is
/// returned in priority order so the caller can pick the first one naming a
/// real pet ("hey there, pets Fido" yields `there` then `Fido`).
pub fn match_chat(text: &str) -> Vec<TriggerMatch> {
    find(text, false)
}

/// `/me` payloads must start with the trigger ("pets Fido", not "wants to pet Fido").
pub fn match_action(text: &str) -> Vec<TriggerMatch> {
    find(text, true)
}

fn find(text: &str, anchored: bool) -> Vec<TriggerMatch> {
    TRIGGERS
        .iter()
        .flat_map(|trigger| {
            trigger
                .pattern
                .captures_iter(text)
                .filter(move |caps| !anchored || caps.get(0).is_some_and(|m| m.start() == 0))
                .filter_map(move |caps| {
                    Some(TriggerMatch {
                        kind: trigger.kind,
                        target: first_target(&caps)?,
                    })
                })
        })
        .collect()
}

/// First participating capture group; multi-alternative patterns only fill one.
fn first_target(caps: &Captures<'_>) -> Option<String> {
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .find(|name| !name.is_empty())
        .map(str::to_string)
}
