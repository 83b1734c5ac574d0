//! Food venue catalog, reviews and mess comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A priced variant of a menu item, e.g. "Half" / "Full".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceVariant {
    pub label: String,
    pub price: u32,
}

/// An item on a venue's menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub variations: Vec<PriceVariant>,
}

impl MenuItem {
    /// Cheapest variant price, `None` for an item without prices.
    pub fn min_price(&self) -> Option<u32> {
        self.variations.iter().map(|v| v.price).min()
    }
}

/// A food venue and its menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub items: Vec<MenuItem>,
}

/// Mean rating of an item, recomputed from its reviews on every read.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    pub count: u32,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[u8]) -> Self {
        if ratings.is_empty() {
            return Self {
                average: None,
                count: 0,
            };
        }
        let total: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
        Self {
            average: Some(f64::from(total) / ratings.len() as f64),
            count: ratings.len() as u32,
        }
    }

    /// Ordering key; unrated items sort as zero.
    pub fn rank_value(&self) -> f64 {
        self.average.unwrap_or(0.0)
    }

    /// "New" for unrated items, otherwise the mean to one decimal.
    pub fn label(&self) -> String {
        match self.average {
            Some(avg) => format!("{:.1}", avg),
            None => "New".to_string(),
        }
    }
}

/// Menu item annotated with its rating, as served to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedMenuItem {
    #[serde(flatten)]
    pub item: MenuItem,
    pub rating: RatingSummary,
    pub rating_label: String,
}

/// Venue with every item rated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedVenue {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub items: Vec<RatedMenuItem>,
}

/// A review of one menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub item_id: String,
    pub rating: u8,
    pub comment: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for posting a review.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub item_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

/// Which mess service a comment is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    General,
}

impl Meal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Meal::Breakfast => "breakfast",
            Meal::Lunch => "lunch",
            Meal::Dinner => "dinner",
            Meal::General => "general",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "breakfast" => Meal::Breakfast,
            "lunch" => Meal::Lunch,
            "dinner" => Meal::Dinner,
            _ => Meal::General,
        }
    }
}

/// Feedback about the mess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessComment {
    pub id: String,
    pub meal: Meal,
    pub comment: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for posting a mess comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessCommentRequest {
    #[serde(default)]
    pub meal: Meal,
    pub comment: String,
}
