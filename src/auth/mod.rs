//! Authentication and permissions.
//!
//! Two layers: a PSK check on every API request (constant-time comparison to
//! mitigate timing attacks), and a per-request [`Session`] resolving the
//! calling user from the `x-user-id` header.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, ErrorDetails, ErrorResponse};
use crate::models::{CreateEventRequest, EventScope, Role, UserProfile, Viewer};
use crate::visibility::same_cohort;
use crate::AppState;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the calling user's UID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key")
            }
        }
        None => {
            // Also accept the key as a bearer token
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key"),
            }
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// The signed-in user for the duration of one request.
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: UserProfile,
}

impl Session {
    pub fn uid(&self) -> &str {
        &self.profile.uid
    }

    pub fn viewer(&self) -> Viewer {
        self.profile.viewer()
    }

    pub fn is_admin(&self) -> bool {
        self.profile.role == Role::Admin
    }

    /// Writes are reserved for accounts that completed OTP verification.
    pub fn require_verified(&self) -> Result<(), AppError> {
        if self.profile.email_verified {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Verify your email before posting".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }

    /// Authors may delete their own records; admins may delete anything.
    pub fn require_owner_or_admin(&self, author_id: &str) -> Result<(), AppError> {
        if self.is_admin() || self.profile.uid == author_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the author or an admin can delete this".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let uid = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))?;

        let profile = state
            .repo
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

        Ok(Session { profile })
    }
}

/// Check that `author` may publish `request` as written.
///
/// Students publish personal events only. Class representatives may also
/// target their own cohort. Admins may publish anything. Pinning is for
/// admins and CRs.
pub fn check_publish_rights(
    author: &UserProfile,
    request: &CreateEventRequest,
) -> Result<(), AppError> {
    if request.is_pinned && author.role == Role::Student {
        return Err(AppError::Forbidden("Students cannot pin events".to_string()));
    }

    match (author.role, request.scope) {
        (_, EventScope::Unknown) => Err(AppError::Validation("Unknown event scope".to_string())),
        (_, EventScope::Personal) | (Role::Admin, _) => Ok(()),
        (Role::Cr, EventScope::Targeted) => {
            let faculty = request.target_faculty.as_deref().unwrap_or_default();
            let batch = request.target_batch.as_deref().unwrap_or_default();
            if same_cohort(faculty, batch, &author.faculty, &author.batch) {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "Class representatives can only target their own batch".to_string(),
                ))
            }
        }
        (Role::Cr, EventScope::Global) => Err(AppError::Forbidden(
            "Only admins can publish global events".to_string(),
        )),
        (Role::Student, _) => Err(AppError::Forbidden(
            "Students can only add personal events".to_string(),
        )),
    }
}
