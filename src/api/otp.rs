//! OTP onboarding endpoints.

use axum::{extract::State, Json};

use super::{error, success, ApiResult};
use crate::models::{OtpIssued, SendOtpRequest, UserProfile, VerifyOtpRequest};
use crate::AppState;

/// POST /api/otp/send - Issue and email a verification code.
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> ApiResult<OtpIssued> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.otp.issue(&request.email).await {
        Ok(issued) => success(issued, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/otp/verify - Verify a code and mark the account verified.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.otp.verify(&request.email, &request.code).await {
        Ok(profile) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(profile, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
