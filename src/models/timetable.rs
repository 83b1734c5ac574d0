//! Weekly class timetable model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Teaching day of the week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<chrono::Weekday> for Day {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Day::Mon,
            chrono::Weekday::Tue => Day::Tue,
            chrono::Weekday::Wed => Day::Wed,
            chrono::Weekday::Thu => Day::Thu,
            chrono::Weekday::Fri => Day::Fri,
            chrono::Weekday::Sat => Day::Sat,
            chrono::Weekday::Sun => Day::Sun,
        }
    }
}

/// One recurring class in the week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSlot {
    pub day: Day,
    /// "HH:MM", 24-hour
    pub start: String,
    /// "HH:MM", 24-hour
    pub end: String,
    pub course: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// The timetable of one faculty/batch cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    /// Composite key, see [`timetable_id`]
    pub id: String,
    pub faculty: String,
    pub batch: String,
    pub slots: Vec<ClassSlot>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for replacing a cohort timetable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimetableRequest {
    /// Defaults to the caller's cohort; only admins may name another
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    pub slots: Vec<ClassSlot>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Document key for a cohort timetable, e.g. `"cs_32"`.
pub fn timetable_id(faculty: &str, batch: &str) -> String {
    format!(
        "{}_{}",
        crate::visibility::normalize_faculty(faculty),
        crate::visibility::normalize_batch(batch)
    )
}
