//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level watchlist functions to Dart via FRB.
//! - Own the single process-wide repository instance.
//! - Translate repository errors into user-facing messages.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - All calls share one repository; it is opened on first use.

use log::{error, warn};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use watchvault_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Category, Item, ItemDraft, ItemEdit, ItemId, ItemValidationError, RepoError,
    RepositoryOptions, SqliteKvStore, VaultRepository, WatchStatus, WatchlistFilter,
    WatchlistService, WriteMode, RATING_MAX, RATING_MIN,
};

const VAULT_DB_FILE_NAME: &str = "watchvault.sqlite3";
const VAULT_DB_PATH_ENV: &str = "WATCHVAULT_DB_PATH";
const VAULT_WRITE_MODE_ENV: &str = "WATCHVAULT_WRITE_MODE";

static VAULT: OnceCell<WatchlistService<Arc<VaultRepository>>> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and an error message otherwise.
/// Repeating the call with the same `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One watchlist entry in UI-friendly form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultItem {
    pub id: String,
    pub title: String,
    /// `Movie|Series|Anime`.
    pub category: String,
    /// `Plan to Watch|Watching|Completed`.
    pub status: String,
    pub notes: Option<String>,
    pub rating: Option<u8>,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultListResponse {
    pub ok: bool,
    pub items: Vec<VaultItem>,
    pub message: String,
}

/// Home-screen counts envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultCountsResponse {
    pub ok: bool,
    pub movie: u32,
    pub series: u32,
    pub anime: u32,
    pub message: String,
}

/// Mutation response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultActionResponse {
    pub ok: bool,
    /// Dialog title for the UI (`Success`, `Duplicate Entry`, ...).
    pub title: String,
    pub message: String,
    pub item: Option<VaultItem>,
}

impl VaultActionResponse {
    fn success(title: &str, message: impl Into<String>, item: Option<VaultItem>) -> Self {
        Self {
            ok: true,
            title: title.to_string(),
            message: message.into(),
            item,
        }
    }

    fn failure(title: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            title: title.to_string(),
            message: message.into(),
            item: None,
        }
    }
}

/// Lists items, optionally filtered. `None` or `"All"` disables a filter.
#[flutter_rust_bridge::frb(sync)]
pub fn vault_list(category: Option<String>, status: Option<String>) -> VaultListResponse {
    let filter = match parse_filter(category.as_deref(), status.as_deref()) {
        Ok(filter) => filter,
        Err(message) => {
            return VaultListResponse {
                ok: false,
                items: Vec::new(),
                message,
            }
        }
    };

    match vault() {
        Ok(service) => {
            let items = service
                .list_items(&filter)
                .into_iter()
                .map(to_vault_item)
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No items found.".to_string()
            } else {
                format!("{} item(s).", items.len())
            };
            VaultListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(message) => VaultListResponse {
            ok: false,
            items: Vec::new(),
            message,
        },
    }
}

/// Returns per-category counts for the home screen.
#[flutter_rust_bridge::frb(sync)]
pub fn vault_counts() -> VaultCountsResponse {
    match vault() {
        Ok(service) => {
            let counts = service.category_counts();
            VaultCountsResponse {
                ok: true,
                movie: saturating_u32(counts.movie),
                series: saturating_u32(counts.series),
                anime: saturating_u32(counts.anime),
                message: String::new(),
            }
        }
        Err(message) => VaultCountsResponse {
            ok: false,
            movie: 0,
            series: 0,
            anime: 0,
            message,
        },
    }
}

/// Adds an entry from the add-item form.
///
/// `rating` is the raw text field; empty means no rating.
#[flutter_rust_bridge::frb(sync)]
pub fn vault_add(
    title: String,
    category: String,
    status: String,
    notes: Option<String>,
    rating: Option<String>,
) -> VaultActionResponse {
    let Some(category) = Category::parse(&category) else {
        return VaultActionResponse::failure("Invalid Type", format!("Unknown type `{category}`."));
    };
    let Some(status) = WatchStatus::parse(&status) else {
        return VaultActionResponse::failure(
            "Invalid Status",
            format!("Unknown status `{status}`."),
        );
    };
    let rating = match parse_rating(rating.as_deref()) {
        Ok(rating) => rating,
        Err(response) => return response,
    };

    let draft = ItemDraft {
        title,
        category,
        status,
        notes,
        rating,
    };
    match vault().map(|service| service.add_item(draft)) {
        Ok(Ok(item)) => VaultActionResponse::success(
            "Success",
            format!("{} added to your WatchVault!", item.title),
            Some(to_vault_item(item)),
        ),
        Ok(Err(err)) => repo_failure(&err),
        Err(message) => VaultActionResponse::failure("Error", message),
    }
}

/// Saves a details-screen edit. The item's type and id never change.
#[flutter_rust_bridge::frb(sync)]
pub fn vault_update(
    id: String,
    title: String,
    status: String,
    notes: Option<String>,
    rating: Option<String>,
) -> VaultActionResponse {
    let Some(status) = WatchStatus::parse(&status) else {
        return VaultActionResponse::failure(
            "Invalid Status",
            format!("Unknown status `{status}`."),
        );
    };
    let rating = match parse_rating(rating.as_deref()) {
        Ok(rating) => rating,
        Err(response) => return response,
    };

    let edit = ItemEdit {
        title,
        status,
        notes,
        rating,
    };
    let id = ItemId::from_raw(id);
    match vault().map(|service| service.edit_item(&id, edit)) {
        Ok(Ok(item)) => VaultActionResponse::success(
            "Saved!",
            format!("{} has been updated.", item.title),
            Some(to_vault_item(item)),
        ),
        Ok(Err(err)) => repo_failure(&err),
        Err(message) => VaultActionResponse::failure("Error", message),
    }
}

/// Deletes one entry by id.
#[flutter_rust_bridge::frb(sync)]
pub fn vault_delete(id: String) -> VaultActionResponse {
    let id = ItemId::from_raw(id);
    match vault().map(|service| service.delete_item(&id)) {
        Ok(Ok(())) => VaultActionResponse::success("Deleted", "Item removed.", None),
        Ok(Err(err)) => repo_failure(&err),
        Err(message) => VaultActionResponse::failure("Error", message),
    }
}

/// Waits for pending writes; retries the last snapshot if it had failed.
#[flutter_rust_bridge::frb(sync)]
pub fn vault_flush() -> VaultActionResponse {
    let service = match vault() {
        Ok(service) => service,
        Err(message) => return VaultActionResponse::failure("Error", message),
    };
    let repo = service.repository();
    let result = if repo.persistence_status().last_error.is_some() {
        repo.retry_persist()
    } else {
        repo.flush()
    };
    match result {
        Ok(()) => VaultActionResponse::success("Saved", "All changes are saved.", None),
        Err(err) => repo_failure(&err),
    }
}

fn vault() -> Result<&'static WatchlistService<Arc<VaultRepository>>, String> {
    VAULT.get_or_try_init(|| {
        let db_path = resolve_vault_db_path();
        let store = SqliteKvStore::open(&db_path).map_err(|err| {
            error!(
                "event=vault_open module=ffi status=error error_code=store_open_failed error={err}"
            );
            format!("vault storage open failed: {err}")
        })?;
        let options = RepositoryOptions {
            write_mode: resolve_write_mode(),
            ..RepositoryOptions::default()
        };
        let repo = VaultRepository::open_with(Arc::new(store), options)
            .map_err(|err| format!("vault load failed: {err}"))?;
        Ok(WatchlistService::new(Arc::new(repo)))
    })
}

fn resolve_vault_db_path() -> PathBuf {
    if let Ok(raw) = std::env::var(VAULT_DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(VAULT_DB_FILE_NAME)
}

fn resolve_write_mode() -> WriteMode {
    match std::env::var(VAULT_WRITE_MODE_ENV) {
        Ok(raw) => WriteMode::parse(&raw).unwrap_or_else(|| {
            warn!("event=config module=ffi status=fallback key={VAULT_WRITE_MODE_ENV} value={raw}");
            WriteMode::default()
        }),
        Err(_) => WriteMode::default(),
    }
}

fn parse_filter(category: Option<&str>, status: Option<&str>) -> Result<WatchlistFilter, String> {
    let category = match category.map(str::trim) {
        None | Some("") => None,
        Some(value) if value.eq_ignore_ascii_case("all") => None,
        Some(value) => {
            Some(Category::parse(value).ok_or_else(|| format!("Unknown type `{value}`."))?)
        }
    };
    let status = match status.map(str::trim) {
        None | Some("") => None,
        Some(value) if value.eq_ignore_ascii_case("all") => None,
        Some(value) => {
            Some(WatchStatus::parse(value).ok_or_else(|| format!("Unknown status `{value}`."))?)
        }
    };
    Ok(WatchlistFilter { category, status })
}

fn parse_rating(raw: Option<&str>) -> Result<Option<u8>, VaultActionResponse> {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    text.parse::<u8>().map(Some).map_err(|_| {
        VaultActionResponse::failure(
            "Invalid Rating",
            format!("Rating must be a number from {RATING_MIN} to {RATING_MAX}."),
        )
    })
}

fn repo_failure(err: &RepoError) -> VaultActionResponse {
    match err {
        RepoError::Validation(ItemValidationError::EmptyTitle) => VaultActionResponse::failure(
            "Missing Title",
            "Please enter a title before saving.",
        ),
        RepoError::Validation(ItemValidationError::RatingOutOfRange(_)) => {
            VaultActionResponse::failure(
                "Invalid Rating",
                format!("Rating must be a number from {RATING_MIN} to {RATING_MAX}."),
            )
        }
        RepoError::Duplicate { category, .. } => VaultActionResponse::failure(
            "Duplicate Entry",
            format!(
                "This {} is already in your WatchVault!",
                category.label().to_lowercase()
            ),
        ),
        RepoError::NotFound(_) => {
            VaultActionResponse::failure("Item not found", "This item no longer exists.")
        }
        RepoError::Storage(_) | RepoError::InvalidData(_) => {
            error!("event=vault_action module=ffi status=error error={err}");
            VaultActionResponse::failure(
                "Storage Error",
                format!("Your change is kept but could not be saved yet: {err}"),
            )
        }
    }
}

fn to_vault_item(item: Item) -> VaultItem {
    VaultItem {
        id: item.id.to_string(),
        title: item.title,
        category: item.category.label().to_string(),
        status: item.status.label().to_string(),
        notes: item.notes,
        rating: item.rating,
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
