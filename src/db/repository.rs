//! Database repository for CRUD operations.
//!
//! Every write bumps the global revision so that clients watching for changes
//! can tell their copy is stale.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    timetable_id, ClassSlot, CreateEventRequest, CreateMessCommentRequest, CreateReviewRequest,
    CreateUserRequest, Event, EventScope, EventType, Meal, MessComment, OtpRecord, RatingSummary,
    Review, RevisionInfo, Role, Timetable, UpdateProfileRequest, UserProfile,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn ts(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("revision_id")?)
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.try_get("revision_id")?,
            generated_at: row.try_get("generated_at")?,
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    // ==================== USER OPERATIONS ====================

    /// Get a user by UID.
    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query(
            "SELECT uid, email, display_name, role, faculty, batch, email_verified, created_at, updated_at FROM users WHERE uid = ?"
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    /// Get a user by (lowercased) email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query(
            "SELECT uid, email, display_name, role, faculty, batch, email_verified, created_at, updated_at FROM users WHERE email = ?"
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    /// Register a new, unverified user.
    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
        role: Role,
    ) -> Result<UserProfile, AppError> {
        let email = request.email.trim().to_lowercase();
        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::Validation(format!(
                "Email {} is already registered",
                email
            )));
        }

        let uid = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (uid, email, display_name, role, faculty, batch, email_verified, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)"
        )
        .bind(&uid)
        .bind(&email)
        .bind(request.display_name.trim())
        .bind(role.as_str())
        .bind(request.faculty.trim())
        .bind(request.batch.trim())
        .bind(ts(&now))
        .bind(ts(&now))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            // Lost a race with a concurrent registration
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::Validation(format!(
                    "Email {} is already registered",
                    email
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.increment_revision().await?;

        Ok(UserProfile {
            uid,
            email,
            display_name: request.display_name.trim().to_string(),
            role,
            faculty: request.faculty.trim().to_string(),
            batch: request.batch.trim().to_string(),
            email_verified: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Update display name, faculty or batch of a user.
    pub async fn update_profile(
        &self,
        uid: &str,
        request: &UpdateProfileRequest,
    ) -> Result<UserProfile, AppError> {
        let existing = self
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        let now = Utc::now();
        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.display_name)
            .to_string();
        let faculty = request
            .faculty
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.faculty)
            .to_string();
        let batch = request
            .batch
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.batch)
            .to_string();

        sqlx::query(
            "UPDATE users SET display_name = ?, faculty = ?, batch = ?, updated_at = ? WHERE uid = ?",
        )
        .bind(&display_name)
        .bind(&faculty)
        .bind(&batch)
        .bind(ts(&now))
        .bind(uid)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(UserProfile {
            display_name,
            faculty,
            batch,
            updated_at: now,
            ..existing
        })
    }

    /// Change the role of a user.
    pub async fn set_role(&self, uid: &str, role: Role) -> Result<UserProfile, AppError> {
        let existing = self
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        let now = Utc::now();
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE uid = ?")
            .bind(role.as_str())
            .bind(ts(&now))
            .bind(uid)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(UserProfile {
            role,
            updated_at: now,
            ..existing
        })
    }

    /// Mark the user owning `email` as verified. Returns `None` for an unknown email.
    pub async fn mark_email_verified(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        let Some(existing) = self.get_user_by_email(email).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        sqlx::query("UPDATE users SET email_verified = 1, updated_at = ? WHERE uid = ?")
            .bind(ts(&now))
            .bind(&existing.uid)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Some(UserProfile {
            email_verified: true,
            updated_at: now,
            ..existing
        }))
    }

    // ==================== EVENT OPERATIONS ====================

    /// List all events ordered by start time.
    pub async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, title, description, start_time, location, event_type, scope,
                      target_faculty, target_batch, is_pinned, author_id, author_name,
                      author_role, created_at
               FROM events ORDER BY start_time, created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(event_from_row).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    /// Get an event by ID.
    pub async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, title, description, start_time, location, event_type, scope,
                      target_faculty, target_batch, is_pinned, author_id, author_name,
                      author_role, created_at
               FROM events WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(event_from_row).transpose()?)
    }

    /// Create an event authored by `author`. The request must already be validated.
    pub async fn create_event(
        &self,
        request: &CreateEventRequest,
        author: &UserProfile,
    ) -> Result<Event, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let (target_faculty, target_batch) = match request.scope {
            EventScope::Targeted => (
                request.target_faculty.as_deref().map(str::trim).map(String::from),
                request.target_batch.as_deref().map(str::trim).map(String::from),
            ),
            _ => (None, None),
        };

        sqlx::query(
            r#"INSERT INTO events (
                id, title, description, start_time, location, event_type, scope,
                target_faculty, target_batch, is_pinned, author_id, author_name,
                author_role, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(ts(&request.start_time))
        .bind(request.location.trim())
        .bind(request.event_type.as_str())
        .bind(request.scope.as_str())
        .bind(&target_faculty)
        .bind(&target_batch)
        .bind(request.is_pinned as i32)
        .bind(&author.uid)
        .bind(&author.display_name)
        .bind(author.role.as_str())
        .bind(ts(&now))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Event {
            id,
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            start_time: request.start_time,
            location: request.location.trim().to_string(),
            event_type: request.event_type,
            scope: request.scope,
            target_faculty,
            target_batch,
            is_pinned: request.is_pinned,
            author_id: author.uid.clone(),
            author_name: author.display_name.clone(),
            author_role: author.role,
            created_at: now,
        })
    }

    /// Delete an event.
    pub async fn delete_event(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== REVIEW OPERATIONS ====================

    /// List reviews, newest first, optionally for a single item.
    pub async fn list_reviews(&self, item_id: Option<&str>) -> Result<Vec<Review>, AppError> {
        let rows = match item_id {
            Some(item_id) => {
                sqlx::query(
                    "SELECT id, item_id, rating, comment, author_id, author_name, created_at FROM reviews WHERE item_id = ? ORDER BY created_at DESC"
                )
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, item_id, rating, comment, author_id, author_name, created_at FROM reviews ORDER BY created_at DESC"
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(review_from_row).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    /// Get a review by ID.
    pub async fn get_review(&self, id: &str) -> Result<Option<Review>, AppError> {
        let row = sqlx::query(
            "SELECT id, item_id, rating, comment, author_id, author_name, created_at FROM reviews WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(review_from_row).transpose()?)
    }

    /// Create a review authored by `author`.
    pub async fn create_review(
        &self,
        request: &CreateReviewRequest,
        author: &UserProfile,
    ) -> Result<Review, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO reviews (id, item_id, rating, comment, author_id, author_name, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.item_id)
        .bind(i64::from(request.rating))
        .bind(request.comment.trim())
        .bind(&author.uid)
        .bind(&author.display_name)
        .bind(ts(&now))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Review {
            id,
            item_id: request.item_id.clone(),
            rating: request.rating,
            comment: request.comment.trim().to_string(),
            author_id: author.uid.clone(),
            author_name: author.display_name.clone(),
            created_at: now,
        })
    }

    /// Delete a review.
    pub async fn delete_review(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    /// Mean rating per item, computed from the stored reviews.
    pub async fn rating_summaries(&self) -> Result<HashMap<String, RatingSummary>, AppError> {
        let rows = sqlx::query("SELECT item_id, rating FROM reviews")
            .fetch_all(&self.pool)
            .await?;

        let mut by_item: HashMap<String, Vec<u8>> = HashMap::new();
        for row in &rows {
            let item_id: String = row.try_get("item_id")?;
            let rating: i64 = row.try_get("rating")?;
            by_item
                .entry(item_id)
                .or_default()
                .push(rating.clamp(1, 5) as u8);
        }

        Ok(by_item
            .into_iter()
            .map(|(item_id, ratings)| (item_id, RatingSummary::from_ratings(&ratings)))
            .collect())
    }

    // ==================== MESS COMMENT OPERATIONS ====================

    /// List mess comments, newest first.
    pub async fn list_mess_comments(&self) -> Result<Vec<MessComment>, AppError> {
        let rows = sqlx::query(
            "SELECT id, meal, comment, author_id, author_name, created_at FROM mess_comments ORDER BY created_at DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(mess_comment_from_row).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    /// Get a mess comment by ID.
    pub async fn get_mess_comment(&self, id: &str) -> Result<Option<MessComment>, AppError> {
        let row = sqlx::query(
            "SELECT id, meal, comment, author_id, author_name, created_at FROM mess_comments WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(mess_comment_from_row).transpose()?)
    }

    /// Create a mess comment authored by `author`.
    pub async fn create_mess_comment(
        &self,
        request: &CreateMessCommentRequest,
        author: &UserProfile,
    ) -> Result<MessComment, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO mess_comments (id, meal, comment, author_id, author_name, created_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(request.meal.as_str())
        .bind(request.comment.trim())
        .bind(&author.uid)
        .bind(&author.display_name)
        .bind(ts(&now))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(MessComment {
            id,
            meal: request.meal,
            comment: request.comment.trim().to_string(),
            author_id: author.uid.clone(),
            author_name: author.display_name.clone(),
            created_at: now,
        })
    }

    /// Delete a mess comment.
    pub async fn delete_mess_comment(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM mess_comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== TIMETABLE OPERATIONS ====================

    /// Get the timetable of a cohort.
    pub async fn get_timetable(
        &self,
        faculty: &str,
        batch: &str,
    ) -> Result<Option<Timetable>, AppError> {
        let row = sqlx::query(
            "SELECT id, faculty, batch, slots, updated_by, updated_at, version FROM timetables WHERE id = ?"
        )
        .bind(timetable_id(faculty, batch))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(timetable_from_row).transpose()?)
    }

    /// Replace a cohort timetable with optimistic concurrency control.
    ///
    /// A missing timetable counts as version 0.
    pub async fn upsert_timetable(
        &self,
        faculty: &str,
        batch: &str,
        slots: &[ClassSlot],
        updated_by: &str,
        expected_version: Option<i64>,
    ) -> Result<Timetable, AppError> {
        let id = timetable_id(faculty, batch);
        let existing = self.get_timetable(faculty, batch).await?;
        let current_version = existing.as_ref().map(|t| t.version).unwrap_or(0);

        if let Some(expected) = expected_version {
            if current_version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, current_version
                    ),
                    current_version,
                });
            }
        }

        let now = Utc::now();
        let new_version = current_version + 1;
        let slots_json = serde_json::to_string(slots)?;

        let rows_affected = if existing.is_some() {
            // Conditional UPDATE with version check to prevent race conditions
            sqlx::query(
                "UPDATE timetables SET faculty = ?, batch = ?, slots = ?, updated_by = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
            )
            .bind(faculty.trim())
            .bind(batch.trim())
            .bind(&slots_json)
            .bind(updated_by)
            .bind(ts(&now))
            .bind(new_version)
            .bind(&id)
            .bind(current_version)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                "INSERT OR IGNORE INTO timetables (id, faculty, batch, slots, updated_by, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, 1)"
            )
            .bind(&id)
            .bind(faculty.trim())
            .bind(batch.trim())
            .bind(&slots_json)
            .bind(updated_by)
            .bind(ts(&now))
            .execute(&self.pool)
            .await?
            .rows_affected()
        };

        if rows_affected == 0 {
            let current = self.get_timetable(faculty, batch).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|t| t.version).unwrap_or(0),
            });
        }

        self.increment_revision().await?;

        Ok(Timetable {
            id,
            faculty: faculty.trim().to_string(),
            batch: batch.trim().to_string(),
            slots: slots.to_vec(),
            updated_by: updated_by.to_string(),
            updated_at: now,
            version: new_version,
        })
    }

    // ==================== OTP OPERATIONS ====================

    /// Store a code for an email, replacing any earlier one.
    pub async fn put_otp(&self, record: &OtpRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR REPLACE INTO otp_codes (email, code, created_at, expires_at, attempts) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.email)
        .bind(&record.code)
        .bind(ts(&record.created_at))
        .bind(ts(&record.expires_at))
        .bind(i64::from(record.attempts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the pending code for an email.
    pub async fn get_otp(&self, email: &str) -> Result<Option<OtpRecord>, AppError> {
        let row = sqlx::query(
            "SELECT email, code, created_at, expires_at, attempts FROM otp_codes WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .as_ref()
            .map(|row| -> Result<OtpRecord, sqlx::Error> {
                let attempts: i64 = row.try_get("attempts")?;
                Ok(OtpRecord {
                    email: row.try_get("email")?,
                    code: row.try_get("code")?,
                    created_at: row.try_get("created_at")?,
                    expires_at: row.try_get("expires_at")?,
                    attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
                })
            })
            .transpose()?)
    }

    /// Count a wrong code against the pending record. Returns the new count,
    /// or `None` when no code is pending.
    pub async fn record_otp_failure(&self, email: &str) -> Result<Option<u32>, AppError> {
        let attempts: Option<i64> = sqlx::query_scalar(
            "UPDATE otp_codes SET attempts = attempts + 1 WHERE email = ? RETURNING attempts",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts.map(|n| u32::try_from(n).unwrap_or(u32::MAX)))
    }

    /// Remove the pending code for an email.
    pub async fn delete_otp(&self, email: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM otp_codes WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// Helper functions for row conversion

fn user_from_row(row: &SqliteRow) -> Result<UserProfile, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let email_verified: i32 = row.try_get("email_verified")?;
    Ok(UserProfile {
        uid: row.try_get("uid")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        // Unrecognized roles get the least privilege
        role: Role::parse(&role).unwrap_or_default(),
        faculty: row.try_get("faculty")?,
        batch: row.try_get("batch")?,
        email_verified: email_verified != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<Event, sqlx::Error> {
    let event_type: String = row.try_get("event_type")?;
    let scope: String = row.try_get("scope")?;
    let author_role: String = row.try_get("author_role")?;
    let is_pinned: i32 = row.try_get("is_pinned")?;
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        start_time: row.try_get("start_time")?,
        location: row.try_get("location")?,
        event_type: EventType::parse(&event_type),
        scope: EventScope::parse(&scope),
        target_faculty: row.try_get("target_faculty")?,
        target_batch: row.try_get("target_batch")?,
        is_pinned: is_pinned != 0,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        author_role: Role::parse(&author_role).unwrap_or_default(),
        created_at: row.try_get("created_at")?,
    })
}

fn review_from_row(row: &SqliteRow) -> Result<Review, sqlx::Error> {
    let rating: i64 = row.try_get("rating")?;
    Ok(Review {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        rating: rating.clamp(1, 5) as u8,
        comment: row.try_get("comment")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn mess_comment_from_row(row: &SqliteRow) -> Result<MessComment, sqlx::Error> {
    let meal: String = row.try_get("meal")?;
    Ok(MessComment {
        id: row.try_get("id")?,
        meal: Meal::parse(&meal),
        comment: row.try_get("comment")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn timetable_from_row(row: &SqliteRow) -> Result<Timetable, sqlx::Error> {
    let slots: String = row.try_get("slots")?;
    Ok(Timetable {
        id: row.try_get("id")?,
        faculty: row.try_get("faculty")?,
        batch: row.try_get("batch")?,
        slots: serde_json::from_str(&slots).unwrap_or_default(),
        updated_by: row.try_get("updated_by")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
    })
}
