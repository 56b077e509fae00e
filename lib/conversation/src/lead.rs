//! Heuristic lead-detail extraction.
//!
//! Pulls booking details (name, event type, date, guest count, budget band)
//! out of free-form customer text so the agent can be given them as context.
//! Matching is deliberately shallow: first match wins within one message,
//! later messages override earlier ones.

use crate::turn::{Turn, TurnRole};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)my name is (\w+)",
        r"(?i)\bi'm (\w+)",
        r"(?i)\bthis is (\w+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b\d{1,2}/\d{1,2}/\d{4}\b",
        r"\b\d{1,2}/\d{1,2}/\d{2}\b",
        r"(?i)\b(?:june|july|august|september) \d{1,2}\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static GUEST_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:guests?|people|attendees?)").ok());

static BUDGET_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\$?(\d+(?:\.\d+)?)\s*(k)?\s*(?:budget|spend|price)").ok());

const EVENT_KEYWORDS: &[(&str, &[&str])] = &[
    ("wedding", &["wedding"]),
    ("corporate", &["corporate", "business"]),
    ("birthday", &["birthday", "party"]),
    ("school", &["school", "dance"]),
];

/// Booking details recognized in customer messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDetails {
    pub first_name: Option<String>,
    pub event_type: Option<String>,
    pub event_date: Option<String>,
    pub guest_count: Option<u32>,
    /// Budget band, e.g. `$1k-$2.5k`.
    pub budget: Option<String>,
}

impl LeadDetails {
    /// Extracts details from one message.
    #[must_use]
    pub fn extract(message: &str) -> Self {
        let lower = message.to_lowercase();

        let first_name = NAME_PATTERNS
            .iter()
            .find_map(|re| re.captures(message))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let event_type = EVENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(kind, _)| (*kind).to_string());

        let event_date = DATE_PATTERNS
            .iter()
            .find_map(|re| re.find(message))
            .map(|m| m.as_str().to_string());

        let guest_count = GUEST_PATTERN
            .as_ref()
            .and_then(|re| re.captures(message))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let budget = BUDGET_PATTERN
            .as_ref()
            .and_then(|re| re.captures(message))
            .and_then(|c| {
                let amount = c.get(1)?.as_str().parse::<f64>().ok()?;
                let scale = if c.get(2).is_some() { 1000.0 } else { 1.0 };
                budget_band((amount * scale).round() as u64)
            });

        Self {
            first_name,
            event_type,
            event_date,
            guest_count,
            budget,
        }
    }

    /// Merges details from every customer turn, oldest first.
    #[must_use]
    pub fn from_turns(turns: &[Turn]) -> Self {
        turns
            .iter()
            .filter(|t| t.role == TurnRole::Customer)
            .fold(Self::default(), |acc, turn| {
                acc.merge(Self::extract(&turn.text))
            })
    }

    /// Returns `self` with any field present in `newer` replaced.
    #[must_use]
    pub fn merge(self, newer: Self) -> Self {
        Self {
            first_name: newer.first_name.or(self.first_name),
            event_type: newer.event_type.or(self.event_type),
            event_date: newer.event_date.or(self.event_date),
            guest_count: newer.guest_count.or(self.guest_count),
            budget: newer.budget.or(self.budget),
        }
    }

    /// Returns true if nothing was recognized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renders the details as prompt context, one `label: value` per line.
    #[must_use]
    pub fn to_context(&self) -> Option<String> {
        let mut lines = Vec::new();
        if let Some(name) = &self.first_name {
            lines.push(format!("Name: {name}"));
        }
        if let Some(kind) = &self.event_type {
            lines.push(format!("Event type: {kind}"));
        }
        if let Some(date) = &self.event_date {
            lines.push(format!("Event date: {date}"));
        }
        if let Some(count) = self.guest_count {
            lines.push(format!("Guest count: {count}"));
        }
        if let Some(budget) = &self.budget {
            lines.push(format!("Budget: {budget}"));
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

fn budget_band(amount: u64) -> Option<String> {
    match amount {
        0..1000 => None,
        1000..2500 => Some("$1k-$2.5k".to_string()),
        _ => Some("$2.5k-$5k".to_string()),
    }
}
