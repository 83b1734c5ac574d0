//! One-time password records and requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending verification code, keyed by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Wrong codes submitted against this record
    #[serde(default)]
    pub attempts: u32,
}

/// Request body for POST /api/otp/send.
#[derive(Debug, Clone, Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

/// Request body for POST /api/otp/verify.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

/// Response for a successfully issued code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}
