//! Email one-time-password onboarding.
//!
//! Issuing stores a 6-digit code per email with a fixed lifetime and mails it.
//! Verifying checks the code, marks the account verified and consumes the code.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::config::{Config, OTP_TTL_RANGE};
use crate::db::Repository;
use crate::errors::{AppError, OtpFailure};
use crate::models::{OtpIssued, OtpRecord, UserProfile};

const CODE_DIGITS: usize = 6;
/// Wrong codes allowed before the pending code is revoked.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Outbound delivery of verification codes.
#[derive(Debug, Clone)]
pub enum Mailer {
    /// Write the code to the log (development)
    Log,
    /// POST the message as JSON to a mail relay
    Webhook { client: reqwest::Client, url: String },
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        match &config.mail_webhook {
            Some(url) => Mailer::Webhook {
                client: reqwest::Client::new(),
                url: url.clone(),
            },
            None => Mailer::Log,
        }
    }

    pub async fn send_code(&self, email: &str, code: &str, ttl_minutes: i64) -> Result<(), AppError> {
        let subject = "Your GIKonnect verification code";
        let text = format!(
            "Your verification code is {}. It expires in {} minutes.",
            code, ttl_minutes
        );

        match self {
            Mailer::Log => {
                tracing::info!(to = %email, "Mail outbox: {} / {}", subject, text);
                Ok(())
            }
            Mailer::Webhook { client, url } => {
                client
                    .post(url)
                    .json(&json!({ "to": email, "subject": subject, "text": text }))
                    .send()
                    .await?
                    .error_for_status()?;
                tracing::info!(to = %email, "Verification code sent");
                Ok(())
            }
        }
    }
}

/// Random zero-padded 6-digit code.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", n, width = CODE_DIGITS)
}

/// Check a submitted code against the stored record at time `now`.
///
/// Digits are compared before expiry, so an expired record with a wrong
/// code reports a mismatch.
pub fn check_code(
    record: Option<&OtpRecord>,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpFailure> {
    let record = record.ok_or(OtpFailure::Missing)?;
    let matches: bool = record
        .code
        .as_bytes()
        .ct_eq(submitted.trim().as_bytes())
        .into();
    if !matches {
        return Err(OtpFailure::Mismatch);
    }
    if now > record.expires_at {
        return Err(OtpFailure::Expired);
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issues and verifies codes against the `otp_codes` collection.
pub struct OtpService {
    repo: Arc<Repository>,
    mailer: Mailer,
    ttl: Duration,
    email_domain: Option<String>,
}

impl OtpService {
    pub fn new(repo: Arc<Repository>, mailer: Mailer, config: &Config) -> Self {
        Self {
            repo,
            mailer,
            ttl: Duration::minutes(
                config
                    .otp_ttl_minutes
                    .clamp(*OTP_TTL_RANGE.start(), *OTP_TTL_RANGE.end()),
            ),
            email_domain: config.email_domain.clone(),
        }
    }

    /// Validate an address and, if configured, its campus domain.
    pub fn validate_email(&self, email: &str) -> Result<String, AppError> {
        let email = normalize_email(email);
        let Some((local, domain)) = email.split_once('@') else {
            return Err(AppError::Validation("A valid email is required".to_string()));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        if let Some(allowed) = &self.email_domain {
            if domain != allowed {
                return Err(AppError::Validation(format!(
                    "Only @{} addresses can sign up",
                    allowed
                )));
            }
        }
        Ok(email)
    }

    /// Issue a fresh code for a registered email, replacing any pending one.
    pub async fn issue(&self, email: &str) -> Result<OtpIssued, AppError> {
        let email = self.validate_email(email)?;
        if self.repo.get_user_by_email(&email).await?.is_none() {
            return Err(AppError::NotFound(format!("No account for {}", email)));
        }

        let now = Utc::now();
        let record = OtpRecord {
            email: email.clone(),
            code: generate_code(),
            created_at: now,
            expires_at: now + self.ttl,
            attempts: 0,
        };
        self.repo.put_otp(&record).await?;

        if let Err(e) = self
            .mailer
            .send_code(&email, &record.code, self.ttl.num_minutes())
            .await
        {
            // An undeliverable code must not stay redeemable
            self.repo.delete_otp(&email).await?;
            return Err(e);
        }

        tracing::info!(email = %email, "Issued verification code");
        Ok(OtpIssued {
            email,
            expires_at: record.expires_at,
        })
    }

    /// Verify a code. On success the account is marked verified and the code consumed.
    pub async fn verify(&self, email: &str, code: &str) -> Result<UserProfile, AppError> {
        self.verify_at(email, code, Utc::now()).await
    }

    async fn verify_at(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AppError> {
        let email = normalize_email(email);
        let record = self.repo.get_otp(&email).await?;

        if let Err(failure) = check_code(record.as_ref(), code, now) {
            tracing::info!(email = %email, code = failure.code(), "Rejected verification code");
            if failure == OtpFailure::Mismatch {
                let attempts = self.repo.record_otp_failure(&email).await?;
                if attempts.is_some_and(|n| n >= MAX_FAILED_ATTEMPTS) {
                    self.repo.delete_otp(&email).await?;
                    tracing::warn!(email = %email, "Too many wrong codes, verification code revoked");
                }
            }
            return Err(AppError::Otp(failure));
        }

        let profile = self
            .repo
            .mark_email_verified(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No account for {}", email)))?;
        self.repo.delete_otp(&email).await?;

        tracing::info!(uid = %profile.uid, "Email verified");
        Ok(profile)
    }
}
