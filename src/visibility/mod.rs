//! Event visibility rules.
//!
//! Decides which events a viewer may see from the event scope and the
//! viewer's cohort. Anything the rules do not explicitly allow is hidden.

use crate::models::{AdminOverrideTarget, Event, EventScope, Role, Viewer};

/// Normalize a faculty name for comparison.
pub fn normalize_faculty(faculty: &str) -> String {
    faculty.trim().to_lowercase()
}

/// Normalize a batch label for comparison: `"Batch 32"`, `"batch-32"` and `"32"` are equal.
pub fn normalize_batch(batch: &str) -> String {
    let lowered = batch.trim().to_lowercase();
    match lowered.strip_prefix("batch") {
        Some(rest) => rest
            .trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .to_string(),
        None => lowered,
    }
}

/// Whether two cohorts are the same after normalization. Blank cohorts never match.
pub fn same_cohort(faculty_a: &str, batch_a: &str, faculty_b: &str, batch_b: &str) -> bool {
    let (fa, ba) = (normalize_faculty(faculty_a), normalize_batch(batch_a));
    if fa.is_empty() || ba.is_empty() {
        return false;
    }
    fa == normalize_faculty(faculty_b) && ba == normalize_batch(batch_b)
}

/// Cohort used to match targeted events.
///
/// An override is honored only for admins and only when both fields are set;
/// otherwise the viewer's own cohort applies.
pub fn effective_cohort<'a>(
    viewer: &'a Viewer,
    override_target: Option<&'a AdminOverrideTarget>,
) -> (&'a str, &'a str) {
    match override_target {
        Some(target)
            if viewer.role == Role::Admin
                && !target.faculty.trim().is_empty()
                && !target.batch.trim().is_empty() =>
        {
            (target.faculty.as_str(), target.batch.as_str())
        }
        _ => (viewer.faculty.as_str(), viewer.batch.as_str()),
    }
}

/// Whether `viewer` may see `event`.
pub fn is_visible(
    event: &Event,
    viewer: &Viewer,
    override_target: Option<&AdminOverrideTarget>,
) -> bool {
    match event.scope {
        EventScope::Personal => event.author_id == viewer.uid,
        EventScope::Global => true,
        EventScope::Targeted => {
            let (Some(faculty), Some(batch)) = (&event.target_faculty, &event.target_batch) else {
                return false;
            };
            let (viewer_faculty, viewer_batch) = effective_cohort(viewer, override_target);
            same_cohort(faculty, batch, viewer_faculty, viewer_batch)
        }
        EventScope::Unknown => false,
    }
}

/// Keep only the events `viewer` may see, preserving order.
pub fn filter_visible(
    events: Vec<Event>,
    viewer: &Viewer,
    override_target: Option<&AdminOverrideTarget>,
) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| is_visible(event, viewer, override_target))
        .collect()
}
