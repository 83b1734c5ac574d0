//! Calendar aggregation over already-filtered events.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::models::Event;

/// Sort for display: pinned events first, then ascending start time.
///
/// The sort is stable, so events with equal keys keep their input order.
pub fn sort_for_display(events: &mut [Event]) {
    events.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
}

/// Calendar date of an event in the campus timezone.
pub fn local_date(start_time: &DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    start_time.with_timezone(offset).date_naive()
}

/// Events of one displayed month, keyed by day of month.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: BTreeMap<u32, Vec<Event>>,
}

/// Bucket events by day of `year`/`month`. Events outside the month are dropped.
pub fn month_view(events: &[Event], year: i32, month: u32, offset: &FixedOffset) -> MonthView {
    let mut days: BTreeMap<u32, Vec<Event>> = BTreeMap::new();
    for event in events {
        let date = local_date(&event.start_time, offset);
        if date.year() == year && date.month() == month {
            days.entry(date.day()).or_default().push(event.clone());
        }
    }
    for bucket in days.values_mut() {
        sort_for_display(bucket);
    }
    MonthView { year, month, days }
}

/// Events falling on `date`, display-sorted.
pub fn events_on(events: &[Event], date: NaiveDate, offset: &FixedOffset) -> Vec<Event> {
    let mut on_day: Vec<Event> = events
        .iter()
        .filter(|e| local_date(&e.start_time, offset) == date)
        .cloned()
        .collect();
    sort_for_display(&mut on_day);
    on_day
}

/// Events starting at or after `now`, display-sorted.
pub fn upcoming(events: &[Event], now: DateTime<Utc>) -> Vec<Event> {
    let mut ahead: Vec<Event> = events
        .iter()
        .filter(|e| e.start_time >= now)
        .cloned()
        .collect();
    sort_for_display(&mut ahead);
    ahead
}
