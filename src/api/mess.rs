//! Mess comment endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, require_text, success, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{CreateMessCommentRequest, MessComment};
use crate::AppState;

const MAX_COMMENT_LEN: usize = 500;

/// GET /api/mess/comments - Mess comments, newest first.
pub async fn list_mess_comments(State(state): State<AppState>) -> ApiResult<Vec<MessComment>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_mess_comments().await {
        Ok(comments) => success(comments, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/mess/comments - Post a mess comment.
pub async fn create_mess_comment(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateMessCommentRequest>,
) -> ApiResult<MessComment> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let checks = session
        .require_verified()
        .and_then(|_| require_text(&request.comment, "Comment", MAX_COMMENT_LEN));
    if let Err(e) = checks {
        return error(e, revision_id);
    }

    match state
        .repo
        .create_mess_comment(&request, &session.profile)
        .await
    {
        Ok(comment) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(comment, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/mess/comments/:id - Delete a mess comment (author or admin).
pub async fn delete_mess_comment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let comment = match state.repo.get_mess_comment(&id).await {
        Ok(Some(comment)) => comment,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Comment {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };
    if let Err(e) = session.require_owner_or_admin(&comment.author_id) {
        return error(e, revision_id);
    }

    match state.repo.delete_mess_comment(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
