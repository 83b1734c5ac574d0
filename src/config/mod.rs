//! Configuration module for the GIKonnect backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};

/// Campus timezone (PKT, UTC+05:00).
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 300;

/// Offsets must stay within one day either side of UTC.
const UTC_OFFSET_RANGE: RangeInclusive<i32> = -1439..=1439;

/// An OTP lives between one minute and one day.
pub const OTP_TTL_RANGE: RangeInclusive<i64> = 1..=1440;

const WATCH_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Lifetime of an issued OTP code
    pub otp_ttl_minutes: i64,
    /// Accounts registered with these emails start as admins
    pub admin_emails: Vec<String>,
    /// Only addresses in this domain may request OTP codes
    pub email_domain: Option<String>,
    /// Mail relay endpoint; codes are written to the log when unset
    pub mail_webhook: Option<String>,
    /// Menu catalog JSON file; the built-in catalog is used when unset
    pub menu_path: Option<PathBuf>,
    /// Offset used to place events on calendar days
    pub utc_offset_minutes: i32,
    /// How long a watch request waits for a change
    pub watch_timeout_secs: u64,
    /// Problems found while loading, logged once tracing is up
    pub warnings: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("GIK_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("GIK_DB_PATH")
            .unwrap_or_else(|_| "./data/gikonnect.sqlite".to_string())
            .into();

        let bind_addr = env::var("GIK_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| format!("Invalid GIK_BIND_ADDR format: {}", e))?;

        let log_level = env::var("GIK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let email_domain = env::var("GIK_EMAIL_DOMAIN")
            .ok()
            .map(|d| d.trim().trim_start_matches('@').to_lowercase())
            .filter(|d| !d.is_empty());

        let admin_emails = env::var("GIK_ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mail_webhook = env::var("GIK_MAIL_WEBHOOK").ok().filter(|s| !s.is_empty());
        let menu_path = env::var("GIK_MENU_PATH").ok().map(PathBuf::from);

        let mut warnings = Vec::new();
        let otp_ttl_minutes = parse_in_range(
            "GIK_OTP_TTL_MINUTES",
            env::var("GIK_OTP_TTL_MINUTES").ok(),
            15,
            OTP_TTL_RANGE,
            &mut warnings,
        );
        let utc_offset_minutes = parse_in_range(
            "GIK_UTC_OFFSET_MINUTES",
            env::var("GIK_UTC_OFFSET_MINUTES").ok(),
            DEFAULT_UTC_OFFSET_MINUTES,
            UTC_OFFSET_RANGE,
            &mut warnings,
        );
        let watch_timeout_secs = parse_in_range(
            "GIK_WATCH_TIMEOUT_SECS",
            env::var("GIK_WATCH_TIMEOUT_SECS").ok(),
            25,
            WATCH_TIMEOUT_RANGE,
            &mut warnings,
        );

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            otp_ttl_minutes,
            admin_emails,
            email_domain,
            mail_webhook,
            menu_path,
            utc_offset_minutes,
            watch_timeout_secs,
            warnings,
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }

    /// Campus timezone used for calendar bucketing.
    pub fn campus_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "UTC offset of {} minutes is out of range, using UTC",
                    self.utc_offset_minutes
                );
                Utc.fix()
            })
    }
}

/// Parse an optional numeric variable.
///
/// Unparseable or out-of-range values fall back to `default` and leave a
/// message in `warnings`.
fn parse_in_range<T>(
    key: &str,
    raw: Option<String>,
    default: T,
    range: RangeInclusive<T>,
    warnings: &mut Vec<String>,
) -> T
where
    T: FromStr + PartialOrd + Copy + Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => value,
        Ok(_) => {
            warnings.push(format!(
                "Ignoring out-of-range {}={:?} (allowed {}..={}), using {}",
                key,
                raw,
                range.start(),
                range.end(),
                default
            ));
            default
        }
        Err(_) => {
            warnings.push(format!("Ignoring invalid {}={:?}, using {}", key, raw, default));
            default
        }
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by the test suite.
    pub fn for_tests(db_path: PathBuf, api_psk: Option<String>) -> Self {
        Self {
            api_psk,
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            otp_ttl_minutes: 15,
            admin_emails: Vec::new(),
            email_domain: None,
            mail_webhook: None,
            menu_path: None,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            watch_timeout_secs: 1,
            warnings: Vec::new(),
        }
    }
}
