//! Calendar event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Kind of calendar entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Class,
    Exam,
    Quiz,
    Assignment,
    #[default]
    Event,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Class => "class",
            EventType::Exam => "exam",
            EventType::Quiz => "quiz",
            EventType::Assignment => "assignment",
            EventType::Event => "event",
            EventType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "class" => EventType::Class,
            "exam" => EventType::Exam,
            "quiz" => EventType::Quiz,
            "assignment" => EventType::Assignment,
            "event" => EventType::Event,
            _ => EventType::Other,
        }
    }
}

/// Who an event is published to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventScope {
    /// Everyone on campus
    Global,
    /// One faculty/batch cohort
    Targeted,
    /// Only the author
    Personal,
    /// Stored value this build does not recognize; never visible
    #[serde(other)]
    Unknown,
}

impl EventScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventScope::Global => "global",
            EventScope::Targeted => "targeted",
            EventScope::Personal => "personal",
            EventScope::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "global" => EventScope::Global,
            "targeted" => EventScope::Targeted,
            "personal" => EventScope::Personal,
            _ => EventScope::Unknown,
        }
    }
}

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub location: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub scope: EventScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_faculty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_batch: Option<String>,
    pub is_pinned: bool,
    pub author_id: String,
    pub author_name: String,
    pub author_role: Role,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating an event. Author fields come from the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    pub scope: EventScope,
    #[serde(default)]
    pub target_faculty: Option<String>,
    #[serde(default)]
    pub target_batch: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

/// Cohort an admin previews targeted events for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminOverrideTarget {
    pub faculty: String,
    pub batch: String,
}
