//! User profile endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, require_text, success, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{CreateUserRequest, Role, SetRoleRequest, UpdateProfileRequest, UserProfile};
use crate::AppState;

const MAX_NAME_LEN: usize = 60;

fn validate_new_user(request: &CreateUserRequest) -> Result<(), AppError> {
    require_text(&request.display_name, "Display name", MAX_NAME_LEN)?;
    require_text(&request.faculty, "Faculty", MAX_NAME_LEN)?;
    require_text(&request.batch, "Batch", MAX_NAME_LEN)?;
    Ok(())
}

/// POST /api/users - Register a new (unverified) account.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let email = match state.otp.validate_email(&request.email) {
        Ok(email) => email,
        Err(e) => return error(e, revision_id),
    };
    if let Err(e) = validate_new_user(&request) {
        return error(e, revision_id);
    }

    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::Student
    };

    match state.repo.create_user(&request, role).await {
        Ok(profile) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            tracing::info!(uid = %profile.uid, role = profile.role.as_str(), "User registered");
            success(profile, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/users/me - The caller's profile.
pub async fn get_me(State(state): State<AppState>, session: Session) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    success(session.profile, revision_id)
}

/// PUT /api/users/me - Update the caller's profile.
pub async fn update_me(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let fields = [
        (&request.display_name, "Display name"),
        (&request.faculty, "Faculty"),
        (&request.batch, "Batch"),
    ];
    for (value, field) in fields {
        if let Some(value) = value {
            if let Err(e) = require_text(value, field, MAX_NAME_LEN) {
                return error(e, revision_id);
            }
        }
    }

    match state.repo.update_profile(session.uid(), &request).await {
        Ok(profile) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(profile, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/users/:uid - Read a profile.
pub async fn get_user(
    State(state): State<AppState>,
    _session: Session,
    Path(uid): Path<String>,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_user(&uid).await {
        Ok(Some(profile)) => success(profile, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("User {} not found", uid)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/users/:uid/role - Change a user's role (admin only).
pub async fn set_user_role(
    State(state): State<AppState>,
    session: Session,
    Path(uid): Path<String>,
    Json(request): Json<SetRoleRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.set_role(&uid, request.role).await {
        Ok(profile) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            tracing::info!(
                uid = %profile.uid,
                role = profile.role.as_str(),
                by = %session.uid(),
                "Role changed"
            );
            success(profile, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
