//! Watchlist item domain model.
//!
//! # Responsibility
//! - Define the canonical record for one movie/series/anime entry.
//! - Own title normalization and field validation rules.
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - `title` is non-empty after trimming on every write path.
//! - `rating`, when set on a write path, is within `1..=10`.
//! - Stored ratings load leniently: any JSON number is accepted, rounded to
//!   a whole number, and dropped when it cannot be a `u8`.

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Lowest accepted rating value.
pub const RATING_MIN: u8 = 1;
/// Highest accepted rating value.
pub const RATING_MAX: u8 = 10;

/// Opaque, globally unique item identifier.
///
/// Stored as a string so blobs written by earlier app builds (which used
/// UUID v4 strings) load without conversion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generates a fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an identifier obtained from storage or the UI boundary.
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Watchlist category. Serialized as its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Movie", alias = "Movies")]
    Movie,
    #[serde(rename = "Series")]
    Series,
    #[serde(rename = "Anime", alias = "Animes")]
    Anime,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Movie, Category::Series, Category::Anime];

    /// Display label, identical to the persisted value.
    pub fn label(self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Series => "Series",
            Self::Anime => "Anime",
        }
    }

    /// Parses a UI/storage label, case-insensitively. Plural forms are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Some(Self::Movie),
            "series" => Some(Self::Series),
            "anime" | "animes" => Some(Self::Anime),
            _ => None,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Watch progress. Serialized as its display label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatchStatus {
    #[default]
    #[serde(rename = "Plan to Watch")]
    PlanToWatch,
    #[serde(rename = "Watching")]
    Watching,
    #[serde(rename = "Completed")]
    Completed,
}

impl WatchStatus {
    pub const ALL: [WatchStatus; 3] = [
        WatchStatus::PlanToWatch,
        WatchStatus::Watching,
        WatchStatus::Completed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::PlanToWatch => "Plan to Watch",
            Self::Watching => "Watching",
            Self::Completed => "Completed",
        }
    }

    /// Parses a status label. Accepts the display label and snake/camel forms.
    pub fn parse(value: &str) -> Option<Self> {
        let folded: String = value
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "plantowatch" => Some(Self::PlanToWatch),
            "watching" => Some(Self::Watching),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl Display for WatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Field-level validation failures for item writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Title is empty after trimming.
    EmptyTitle,
    /// Rating is outside `RATING_MIN..=RATING_MAX`.
    RatingOutOfRange(u8),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::RatingOutOfRange(value) => write!(
                f,
                "rating {value} is out of range; expected {RATING_MIN}..={RATING_MAX}"
            ),
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical watchlist entry.
///
/// Field order matches the persisted object layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// Serialized as `type` to stay compatible with stored collections.
    #[serde(rename = "type")]
    pub category: Category,
    pub status: WatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_stored_rating",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<u8>,
}

impl Item {
    /// Builds an item from a draft with a freshly generated id.
    ///
    /// The title is stored trimmed. No validation is performed here; callers
    /// go through [`ItemDraft::validate`] first.
    pub fn from_draft(draft: ItemDraft) -> Self {
        Self {
            id: ItemId::generate(),
            title: draft.title.trim().to_string(),
            category: draft.category,
            status: draft.status,
            notes: draft.notes,
            rating: draft.rating,
        }
    }

    /// Checks write-path field rules.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_fields(&self.title, self.rating)
    }

    /// Key used for duplicate detection: category plus normalized title.
    pub fn duplicate_key(&self) -> (Category, String) {
        (self.category, normalize_title(&self.title))
    }
}

/// Candidate for `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub category: Category,
    pub status: WatchStatus,
    pub notes: Option<String>,
    pub rating: Option<u8>,
}

impl ItemDraft {
    /// Creates a draft with default status `Plan to Watch` and no notes/rating.
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            category,
            status: WatchStatus::default(),
            notes: None,
            rating: None,
        }
    }

    pub fn with_status(mut self, status: WatchStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_fields(&self.title, self.rating)
    }
}

/// Details-screen edit applied over an existing item.
///
/// `id` and `category` are never part of an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEdit {
    pub title: String,
    pub status: WatchStatus,
    pub notes: Option<String>,
    pub rating: Option<u8>,
}

impl ItemEdit {
    /// Produces the full replacement item, carrying identity over from `current`.
    pub fn apply_to(self, current: &Item) -> Item {
        Item {
            id: current.id.clone(),
            title: self.title,
            category: current.category,
            status: self.status,
            notes: self.notes,
            rating: self.rating,
        }
    }
}

/// Normalizes a title for duplicate comparison: trim + lowercase.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Reads a persisted rating.
///
/// Earlier app builds stored whatever the numeric text field produced, so
/// negatives and fractions occur. Fractions round to the nearest whole
/// number; values outside `0..=255` become `None`. Range rules belong to the
/// write paths.
fn deserialize_stored_rating<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let rounded = raw.round();
    if !rounded.is_finite() || !(0.0..=f64::from(u8::MAX)).contains(&rounded) {
        warn!("event=item_decode module=model status=fallback field=rating action=dropped raw={raw}");
        return Ok(None);
    }
    if rounded != raw {
        warn!(
            "event=item_decode module=model status=fallback field=rating action=rounded raw={raw} value={rounded}"
        );
    }
    // In range and integral after the checks above.
    Ok(Some(rounded as u8))
}

fn validate_fields(title: &str, rating: Option<u8>) -> Result<(), ItemValidationError> {
    if title.trim().is_empty() {
        return Err(ItemValidationError::EmptyTitle);
    }
    if let Some(value) = rating {
        if !(RATING_MIN..=RATING_MAX).contains(&value) {
            return Err(ItemValidationError::RatingOutOfRange(value));
        }
    }
    Ok(())
}
