//! Collection blob encoding.
//!
//! # Responsibility
//! - Encode the full collection as one JSON array of item objects.
//! - Decode stored blobs and reject structurally corrupt collections.
//!
//! # Invariants
//! - `decode_collection(&encode_collection(items)?)? == items` for every valid
//!   collection; the empty collection encodes as `[]`.
//! - Decoding never drops or reorders items.

use crate::model::item::{Item, ItemId};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Blob encode/decode failure.
#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    EmptyId { index: usize },
    DuplicateId(ItemId),
    EmptyTitle(ItemId),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed collection json: {err}"),
            Self::EmptyId { index } => write!(f, "item at index {index} has an empty id"),
            Self::DuplicateId(id) => write!(f, "duplicate item id `{id}` in collection"),
            Self::EmptyTitle(id) => write!(f, "item `{id}` has an empty title"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Encodes the whole collection as a compact JSON array.
pub fn encode_collection(items: &[Item]) -> Result<String, CodecError> {
    Ok(serde_json::to_string(items)?)
}

/// Decodes a stored blob into an ordered collection.
///
/// Ratings are not range-checked here so collections written before the
/// rating bound existed still load. Fractional or negative ratings are
/// rounded or dropped per item instead of failing the whole collection.
pub fn decode_collection(blob: &str) -> Result<Vec<Item>, CodecError> {
    let items: Vec<Item> = serde_json::from_str(blob)?;

    let mut seen = HashSet::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if item.id.is_empty() {
            return Err(CodecError::EmptyId { index });
        }
        if !seen.insert(&item.id) {
            return Err(CodecError::DuplicateId(item.id.clone()));
        }
        if item.title.trim().is_empty() {
            return Err(CodecError::EmptyTitle(item.id.clone()));
        }
    }

    Ok(items)
}
