//! "Genie" food recommendations.
//!
//! Filters the menu catalog down to items the party can afford per head in the
//! preferred category, then ranks them by mean review rating.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::menu::Catalog;
use crate::models::RatingSummary;

/// Below this per-person budget the mess meal is suggested first.
pub const MESS_MEAL_THRESHOLD: f64 = 150.0;
/// Price of a mess meal, in rupees.
pub const MESS_MEAL_PRICE: u32 = 120;
/// Category preference that matches everything.
pub const ANY_CATEGORY: &str = "Any";

const MAX_SUGGESTIONS: usize = 3;

/// Query parameters for a recommendation.
#[derive(Debug, Clone, Deserialize)]
pub struct GenieQuery {
    /// Total budget for the party
    pub budget: f64,
    /// Party size
    #[serde(default = "default_people")]
    pub people: u32,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_people() -> u32 {
    1
}

fn default_category() -> String {
    ANY_CATEGORY.to_string()
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionKind {
    MessMeal,
    MenuItem,
}

/// One recommended dish.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: SuggestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub name: String,
    pub venue_name: String,
    pub category: String,
    pub price: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub rating_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenieResult {
    pub per_person_budget: f64,
    pub suggestions: Vec<Suggestion>,
}

fn category_matches(preference: &str, category: &str) -> bool {
    preference.eq_ignore_ascii_case(ANY_CATEGORY) || preference.eq_ignore_ascii_case(category)
}

fn mess_meal() -> Suggestion {
    Suggestion {
        kind: SuggestionKind::MessMeal,
        item_id: None,
        name: "Mess Meal".to_string(),
        venue_name: "Mess".to_string(),
        category: "Desi".to_string(),
        price: MESS_MEAL_PRICE,
        rating: None,
        rating_label: "Mess".to_string(),
    }
}

/// Recommend up to three affordable dishes, best rated first.
pub fn recommend(
    catalog: &Catalog,
    ratings: &HashMap<String, RatingSummary>,
    query: &GenieQuery,
) -> Result<GenieResult, AppError> {
    if !query.budget.is_finite() || query.budget <= 0.0 {
        return Err(AppError::Validation(
            "Budget must be a positive amount".to_string(),
        ));
    }
    if query.people == 0 {
        return Err(AppError::Validation(
            "Number of people must be at least 1".to_string(),
        ));
    }

    let category = query.category.trim();
    let category = if category.is_empty() {
        ANY_CATEGORY
    } else {
        category
    };
    let per_person = query.budget / f64::from(query.people);

    let mut ranked: Vec<(f64, Suggestion)> = catalog
        .items()
        .filter_map(|(venue, item)| {
            let price = item.min_price()?;
            if f64::from(price) > per_person || !category_matches(category, &item.category) {
                return None;
            }
            let rating = ratings
                .get(&item.id)
                .copied()
                .unwrap_or_else(|| RatingSummary::from_ratings(&[]));
            let suggestion = Suggestion {
                kind: SuggestionKind::MenuItem,
                item_id: Some(item.id.clone()),
                name: item.name.clone(),
                venue_name: venue.name.clone(),
                category: item.category.clone(),
                price,
                rating: rating.average,
                rating_label: rating.label(),
            };
            Some((rating.rank_value(), suggestion))
        })
        .collect();

    // Stable, so equally rated items keep catalog order.
    ranked.sort_by(|(a, _), (b, _)| b.total_cmp(a));
    ranked.truncate(MAX_SUGGESTIONS);

    let mut suggestions = Vec::with_capacity(ranked.len() + 1);
    if per_person < MESS_MEAL_THRESHOLD && category_matches(category, "Desi") {
        suggestions.push(mess_meal());
    }
    suggestions.extend(ranked.into_iter().map(|(_, suggestion)| suggestion));

    tracing::debug!(
        per_person,
        category,
        count = suggestions.len(),
        "Genie recommendation computed"
    );

    Ok(GenieResult {
        per_person_budget: per_person,
        suggestions,
    })
}
