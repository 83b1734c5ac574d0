//! Food venue, review and recommendation endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::genie::{self, GenieQuery, GenieResult};
use crate::menu::rate_venue;
use crate::models::{CreateReviewRequest, RatedVenue, Review};
use crate::AppState;

const MAX_REVIEW_LEN: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    #[serde(default)]
    pub item_id: Option<String>,
}

/// GET /api/venues - All venues with rated menus.
pub async fn list_venues(State(state): State<AppState>) -> ApiResult<Vec<RatedVenue>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.rating_summaries().await {
        Ok(ratings) => success(
            state
                .catalog
                .venues()
                .iter()
                .map(|venue| rate_venue(venue, &ratings))
                .collect(),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/venues/:id - One venue with its rated menu.
pub async fn get_venue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RatedVenue> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(venue) = state.catalog.venue(&id) else {
        return error(
            AppError::NotFound(format!("Venue {} not found", id)),
            revision_id,
        );
    };

    match state.repo.rating_summaries().await {
        Ok(ratings) => success(rate_venue(venue, &ratings), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/reviews?itemId - Reviews, newest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Vec<Review>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_reviews(query.item_id.as_deref()).await {
        Ok(reviews) => success(reviews, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/reviews - Review a menu item.
pub async fn create_review(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<Review> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = session.require_verified() {
        return error(e, revision_id);
    }
    if !(1..=5).contains(&request.rating) {
        return error(
            AppError::Validation("Rating must be between 1 and 5".to_string()),
            revision_id,
        );
    }
    if request.comment.trim().chars().count() > MAX_REVIEW_LEN {
        return error(
            AppError::Validation(format!(
                "Comment must be at most {} characters",
                MAX_REVIEW_LEN
            )),
            revision_id,
        );
    }
    if state.catalog.find_item(&request.item_id).is_none() {
        return error(
            AppError::NotFound(format!("Menu item {} not found", request.item_id)),
            revision_id,
        );
    }

    match state.repo.create_review(&request, &session.profile).await {
        Ok(review) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(review, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/reviews/:id - Delete a review (author or admin).
pub async fn delete_review(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let review = match state.repo.get_review(&id).await {
        Ok(Some(review)) => review,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Review {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };
    if let Err(e) = session.require_owner_or_admin(&review.author_id) {
        return error(e, revision_id);
    }

    match state.repo.delete_review(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/genie?budget&people&category - Food recommendations.
pub async fn genie_recommend(
    State(state): State<AppState>,
    Query(query): Query<GenieQuery>,
) -> ApiResult<GenieResult> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let ratings = match state.repo.rating_summaries().await {
        Ok(ratings) => ratings,
        Err(e) => return error(e, revision_id),
    };

    match genie::recommend(&state.catalog, &ratings, &query) {
        Ok(result) => success(result, revision_id),
        Err(e) => error(e, revision_id),
    }
}
