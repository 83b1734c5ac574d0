//! Event API endpoints.
//!
//! Every read is filtered through the caller's visibility before it leaves
//! the server.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{error, require_text, success, ApiResult};
use crate::auth::{check_publish_rights, Session};
use crate::calendar::{self, MonthView};
use crate::errors::AppError;
use crate::feed::WaitOutcome;
use crate::models::{AdminOverrideTarget, CreateEventRequest, Event, EventScope};
use crate::visibility::{filter_visible, is_visible};
use crate::AppState;

/// Optional cohort preview for admins.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideQuery {
    #[serde(default)]
    pub override_faculty: Option<String>,
    #[serde(default)]
    pub override_batch: Option<String>,
}

impl OverrideQuery {
    /// Both fields are needed for an override; a partial one is dropped.
    fn target(&self) -> Option<AdminOverrideTarget> {
        match (&self.override_faculty, &self.override_batch) {
            (Some(faculty), Some(batch)) => Some(AdminOverrideTarget {
                faculty: faculty.clone(),
                batch: batch.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    /// `eventRevision` from the client's previous watch response
    #[serde(default)]
    pub since: Option<i64>,
}

/// Long-poll result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub changed: bool,
    /// Revision of the last events write; pass back as `since`
    pub event_revision: i64,
    pub events: Vec<Event>,
}

const MAX_TITLE_LEN: usize = 120;

async fn visible_events(
    state: &AppState,
    session: &Session,
    query: &OverrideQuery,
) -> Result<Vec<Event>, AppError> {
    let events = state.repo.list_events().await?;
    let target = query.target();
    Ok(filter_visible(events, &session.viewer(), target.as_ref()))
}

/// GET /api/events - List visible events by start time.
pub async fn list_events(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OverrideQuery>,
) -> ApiResult<Vec<Event>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match visible_events(&state, &session, &query).await {
        Ok(events) => success(events, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/upcoming - Visible events from now on, pinned first.
pub async fn upcoming_events(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OverrideQuery>,
) -> ApiResult<Vec<Event>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match visible_events(&state, &session, &query).await {
        Ok(events) => success(calendar::upcoming(&events, Utc::now()), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/calendar?year&month - Month grid of visible events.
pub async fn month_calendar(
    State(state): State<AppState>,
    session: Session,
    Query(month): Query<MonthQuery>,
    Query(query): Query<OverrideQuery>,
) -> ApiResult<MonthView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if !(1..=12).contains(&month.month) {
        return error(
            AppError::Validation("Month must be between 1 and 12".to_string()),
            revision_id,
        );
    }

    match visible_events(&state, &session, &query).await {
        Ok(events) => success(
            calendar::month_view(
                &events,
                month.year,
                month.month,
                &state.config.campus_offset(),
            ),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/day?date=YYYY-MM-DD - Visible events on one day.
pub async fn day_events(
    State(state): State<AppState>,
    session: Session,
    Query(day): Query<DayQuery>,
    Query(query): Query<OverrideQuery>,
) -> ApiResult<Vec<Event>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match visible_events(&state, &session, &query).await {
        Ok(events) => success(
            calendar::events_on(&events, day.date, &state.config.campus_offset()),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/watch?since - Wait for the events collection to change.
///
/// `since` is compared with the events revision, which only moves on event
/// writes. Returns at once when the client's revision is stale or missing,
/// otherwise after the next event write or the configured timeout.
pub async fn watch_events(
    State(state): State<AppState>,
    session: Session,
    Query(watch): Query<WatchQuery>,
    Query(query): Query<OverrideQuery>,
) -> ApiResult<WatchResponse> {
    let changed = match watch.since {
        Some(since) => {
            let mut subscription = state.feed.subscribe();
            let timeout = Duration::from_secs(state.config.watch_timeout_secs);
            matches!(
                subscription.wait_past(since, timeout).await,
                WaitOutcome::Changed(_)
            )
        }
        None => true,
    };

    let event_revision = state.feed.current();
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    match visible_events(&state, &session, &query).await {
        Ok(events) => success(
            WatchResponse {
                changed,
                event_revision,
                events,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/:id - Get a single visible event.
pub async fn get_event(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Query(query): Query<OverrideQuery>,
) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let target = query.target();

    match state.repo.get_event(&id).await {
        Ok(Some(event)) if is_visible(&event, &session.viewer(), target.as_ref()) => {
            success(event, revision_id)
        }
        // Hidden events are reported exactly like missing ones
        Ok(_) => error(
            AppError::NotFound(format!("Event {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

fn validate_event(request: &CreateEventRequest) -> Result<(), AppError> {
    require_text(&request.title, "Title", MAX_TITLE_LEN)?;
    if request.scope == EventScope::Targeted {
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().is_empty();
        if blank(&request.target_faculty) || blank(&request.target_batch) {
            return Err(AppError::Validation(
                "Targeted events need a faculty and a batch".to_string(),
            ));
        }
    }
    Ok(())
}

/// POST /api/events - Create a new event.
pub async fn create_event(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateEventRequest>,
) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let checks = session
        .require_verified()
        .and_then(|_| validate_event(&request))
        .and_then(|_| check_publish_rights(&session.profile, &request));
    if let Err(e) = checks {
        return error(e, revision_id);
    }

    match state.repo.create_event(&request, &session.profile).await {
        Ok(event) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            tracing::info!(
                id = %event.id,
                scope = event.scope.as_str(),
                author = %event.author_id,
                "Event created"
            );
            state.feed.publish(new_revision);
            success(event, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/events/:id - Delete an event (author or admin).
pub async fn delete_event(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let event = match state.repo.get_event(&id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Event {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };
    if let Err(e) = session.require_owner_or_admin(&event.author_id) {
        return error(e, revision_id);
    }

    match state.repo.delete_event(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            tracing::info!(id = %id, by = %session.uid(), "Event deleted");
            state.feed.publish(new_revision);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
