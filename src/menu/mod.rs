//! Static food venue catalog.
//!
//! The catalog is read once at startup, either from `GIK_MENU_PATH` or from
//! the copy compiled into the binary. Ratings are not part of the catalog;
//! they are joined from reviews on every read.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::errors::AppError;
use crate::models::{MenuItem, RatedMenuItem, RatedVenue, RatingSummary, Venue};

const BUILTIN_MENU: &str = include_str!("menu.json");

/// All venues and their menus.
#[derive(Debug, Clone)]
pub struct Catalog {
    venues: Vec<Venue>,
}

impl Catalog {
    /// Load the catalog from `path`, or the built-in one when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Internal(format!("Failed to read menu {:?}: {}", path, e))
                })?;
                Self::from_json(&raw)
            }
            None => Self::from_json(BUILTIN_MENU),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let venues: Vec<Venue> = serde_json::from_str(raw)?;
        Self::new(venues)
    }

    /// Build a catalog, rejecting unpriced items and duplicate item ids.
    pub fn new(venues: Vec<Venue>) -> Result<Self, AppError> {
        let mut seen: HashSet<String> = HashSet::new();
        for item in venues.iter().flat_map(|v| v.items.iter()) {
            if item.variations.is_empty() {
                return Err(AppError::Validation(format!(
                    "Menu item {} has no price",
                    item.id
                )));
            }
            if !seen.insert(item.id.clone()) {
                return Err(AppError::Validation(format!(
                    "Duplicate menu item id {}",
                    item.id
                )));
            }
        }
        Ok(Self { venues })
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    pub fn venue(&self, id: &str) -> Option<&Venue> {
        self.venues.iter().find(|v| v.id == id)
    }

    /// Every item paired with the venue serving it, in catalog order.
    pub fn items(&self) -> impl Iterator<Item = (&Venue, &MenuItem)> {
        self.venues
            .iter()
            .flat_map(|venue| venue.items.iter().map(move |item| (venue, item)))
    }

    pub fn find_item(&self, item_id: &str) -> Option<(&Venue, &MenuItem)> {
        self.items().find(|(_, item)| item.id == item_id)
    }

    pub fn item_count(&self) -> usize {
        self.venues.iter().map(|v| v.items.len()).sum()
    }
}

/// Attach rating summaries to a venue's items.
pub fn rate_venue(venue: &Venue, ratings: &HashMap<String, RatingSummary>) -> RatedVenue {
    RatedVenue {
        id: venue.id.clone(),
        name: venue.name.clone(),
        location: venue.location.clone(),
        items: venue
            .items
            .iter()
            .map(|item| {
                let rating = ratings
                    .get(&item.id)
                    .copied()
                    .unwrap_or_else(|| RatingSummary::from_ratings(&[]));
                RatedMenuItem {
                    item: item.clone(),
                    rating,
                    rating_label: rating.label(),
                }
            })
            .collect(),
    }
}
