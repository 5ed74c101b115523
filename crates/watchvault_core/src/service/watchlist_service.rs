//! Watchlist use-case service.
//!
//! # Responsibility
//! - Provide stable add/edit/delete entry points for UI callers.
//! - Compute filtered list views and per-category/per-status counts.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or persistence.
//! - Filtered views keep collection (insertion) order.
//! - `edit_item` never changes an item's id or category.

use crate::model::item::{Category, Item, ItemDraft, ItemEdit, ItemId, WatchStatus};
use crate::repo::item_repo::{ItemRepository, RepoError, RepoResult};

/// List-screen filter. `None` means "All".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchlistFilter {
    pub category: Option<Category>,
    pub status: Option<WatchStatus>,
}

impl WatchlistFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.category.map_or(true, |category| item.category == category)
            && self.status.map_or(true, |status| item.status == status)
    }
}

/// Home-screen item counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub movie: usize,
    pub series: usize,
    pub anime: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Movie => self.movie,
            Category::Series => self.series,
            Category::Anime => self.anime,
        }
    }

    pub fn total(&self) -> usize {
        self.movie + self.series + self.anime
    }
}

/// Item counts per watch status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub plan_to_watch: usize,
    pub watching: usize,
    pub completed: usize,
}

/// Service facade over any item repository.
pub struct WatchlistService<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> WatchlistService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn add_item(&self, draft: ItemDraft) -> RepoResult<Item> {
        self.repo.add(draft)
    }

    pub fn get_item(&self, id: &ItemId) -> Option<Item> {
        self.repo.get(id)
    }

    /// Full replacement update. Returns repository errors unchanged.
    pub fn update_item(&self, item: Item) -> RepoResult<Item> {
        self.repo.update(item)
    }

    /// Applies a details-screen edit, carrying id and category over.
    pub fn edit_item(&self, id: &ItemId, edit: ItemEdit) -> RepoResult<Item> {
        let current = self
            .repo
            .get(id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        self.repo.update(edit.apply_to(&current))
    }

    /// Changes only the watch status of one item.
    pub fn set_status(&self, id: &ItemId, status: WatchStatus) -> RepoResult<Item> {
        let mut item = self
            .repo
            .get(id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        item.status = status;
        self.repo.update(item)
    }

    pub fn delete_item(&self, id: &ItemId) -> RepoResult<()> {
        self.repo.delete(id)
    }

    /// Lists items matching `filter`, in collection order.
    pub fn list_items(&self, filter: &WatchlistFilter) -> Vec<Item> {
        self.repo
            .list()
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect()
    }

    pub fn category_counts(&self) -> CategoryCounts {
        self.repo
            .list()
            .iter()
            .fold(CategoryCounts::default(), |mut counts, item| {
                match item.category {
                    Category::Movie => counts.movie += 1,
                    Category::Series => counts.series += 1,
                    Category::Anime => counts.anime += 1,
                }
                counts
            })
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.repo
            .list()
            .iter()
            .fold(StatusCounts::default(), |mut counts, item| {
                match item.status {
                    WatchStatus::PlanToWatch => counts.plan_to_watch += 1,
                    WatchStatus::Watching => counts.watching += 1,
                    WatchStatus::Completed => counts.completed += 1,
                }
                counts
            })
    }
}
