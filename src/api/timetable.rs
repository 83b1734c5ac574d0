//! Timetable endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveTime;
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{ClassSlot, Day, Role, Timetable, UpdateTimetableRequest};
use crate::visibility::same_cohort;
use crate::AppState;

const MAX_SLOTS: usize = 80;

#[derive(Debug, Deserialize)]
pub struct TimetableQuery {
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    /// Only return slots on this day
    #[serde(default)]
    pub day: Option<Day>,
}

fn parse_time(value: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppError::Validation(format!("Invalid time {:?}, expected HH:MM", value)))
}

/// Slots need a course and a start strictly before the end.
fn validate_slots(slots: &[ClassSlot]) -> Result<(), AppError> {
    if slots.len() > MAX_SLOTS {
        return Err(AppError::Validation(format!(
            "A timetable holds at most {} classes",
            MAX_SLOTS
        )));
    }
    for slot in slots {
        if slot.course.trim().is_empty() {
            return Err(AppError::Validation("Course is required".to_string()));
        }
        if parse_time(&slot.start)? >= parse_time(&slot.end)? {
            return Err(AppError::Validation(format!(
                "{} must start before it ends",
                slot.course
            )));
        }
    }
    Ok(())
}

/// Sort by day, then start time.
fn sort_slots(slots: &mut [ClassSlot]) {
    slots.sort_by(|a, b| {
        a.day
            .cmp(&b.day)
            .then_with(|| parse_time(&a.start).ok().cmp(&parse_time(&b.start).ok()))
    });
}

/// GET /api/timetable?faculty&batch&day - A cohort timetable, the caller's own by default.
pub async fn get_timetable(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<TimetableQuery>,
) -> ApiResult<Option<Timetable>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let faculty = query.faculty.as_deref().unwrap_or(session.profile.faculty.as_str());
    let batch = query.batch.as_deref().unwrap_or(session.profile.batch.as_str());

    match state.repo.get_timetable(faculty, batch).await {
        Ok(Some(mut timetable)) => {
            if let Some(day) = query.day {
                timetable.slots.retain(|slot| slot.day == day);
            }
            sort_slots(&mut timetable.slots);
            success(Some(timetable), revision_id)
        }
        Ok(None) => success(None, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/timetable - Replace a cohort timetable.
///
/// CRs edit their own cohort; admins may name any cohort.
pub async fn update_timetable(
    State(state): State<AppState>,
    session: Session,
    Json(mut request): Json<UpdateTimetableRequest>,
) -> ApiResult<Timetable> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let profile = &session.profile;
    let faculty = request
        .faculty
        .clone()
        .unwrap_or_else(|| profile.faculty.clone());
    let batch = request.batch.clone().unwrap_or_else(|| profile.batch.clone());

    let allowed = match profile.role {
        Role::Admin => Ok(()),
        Role::Cr if same_cohort(&faculty, &batch, &profile.faculty, &profile.batch) => Ok(()),
        Role::Cr => Err(AppError::Forbidden(
            "Class representatives can only edit their own timetable".to_string(),
        )),
        Role::Student => Err(AppError::Forbidden(
            "Only class representatives can edit timetables".to_string(),
        )),
    };
    let checks = session
        .require_verified()
        .and(allowed)
        .and_then(|_| validate_slots(&request.slots));
    if let Err(e) = checks {
        return error(e, revision_id);
    }
    if faculty.trim().is_empty() || batch.trim().is_empty() {
        return error(
            AppError::Validation("Faculty and batch are required".to_string()),
            revision_id,
        );
    }

    sort_slots(&mut request.slots);
    match state
        .repo
        .upsert_timetable(
            &faculty,
            &batch,
            &request.slots,
            session.uid(),
            request.expected_version,
        )
        .await
    {
        Ok(timetable) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            tracing::info!(id = %timetable.id, version = timetable.version, "Timetable updated");
            success(timetable, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
