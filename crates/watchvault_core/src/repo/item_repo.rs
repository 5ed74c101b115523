//! Item repository contract and the vault-backed implementation.
//!
//! # Responsibility
//! - Own the canonical ordered collection of watchlist items.
//! - Enforce identity, title and duplicate rules on writes.
//! - Persist the full collection after every successful mutation.
//!
//! # Invariants
//! - Item ids are unique at all times.
//! - `add` rejects a (category, normalized title) pair that already exists;
//!   `update` does not re-check it.
//! - The in-memory collection is updated before the snapshot write is issued,
//!   and snapshots are written in mutation order.
//! - A storage failure never rolls back the in-memory mutation; it is
//!   reported and stays visible in `persistence_status()` until a later write
//!   succeeds.
//! - Change events reach observers in revision order, one delivery at a time.

use crate::codec::{decode_collection, encode_collection};
use crate::model::item::{normalize_title, Category, Item, ItemDraft, ItemId, ItemValidationError};
use crate::repo::writer::{SnapshotWriter, WriteMode};
use crate::store::{KeyValueStore, StoreError, STORAGE_KEY};
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// A snapshot write that did not complete.
///
/// The mutation at `revision` is already applied in memory.
#[derive(Debug)]
pub struct StorageFailure {
    pub revision: u64,
    pub error: StoreError,
}

impl Display for StorageFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to persist collection revision {}: {}",
            self.revision, self.error
        )
    }
}

impl Error for StorageFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Repository error for item reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Duplicate { category: Category, title: String },
    NotFound(ItemId),
    Storage(StorageFailure),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate { category, title } => write!(
                f,
                "{} `{title}` is already in the watchlist",
                category.label().to_lowercase()
            ),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::Storage(failure) => write!(f, "{failure}"),
            Self::InvalidData(message) => write!(f, "invalid stored collection: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(failure) => Some(failure),
            Self::Duplicate { .. } | Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageFailure> for RepoError {
    fn from(value: StorageFailure) -> Self {
        Self::Storage(value)
    }
}

/// Repository interface consumed by services and the UI boundary.
pub trait ItemRepository {
    fn list(&self) -> Vec<Item>;
    fn get(&self, id: &ItemId) -> Option<Item>;
    fn add(&self, draft: ItemDraft) -> RepoResult<Item>;
    fn update(&self, item: Item) -> RepoResult<Item>;
    fn delete(&self, id: &ItemId) -> RepoResult<()>;
}

impl<R: ItemRepository + ?Sized> ItemRepository for Arc<R> {
    fn list(&self) -> Vec<Item> {
        (**self).list()
    }

    fn get(&self, id: &ItemId) -> Option<Item> {
        (**self).get(id)
    }

    fn add(&self, draft: ItemDraft) -> RepoResult<Item> {
        (**self).add(draft)
    }

    fn update(&self, item: Item) -> RepoResult<Item> {
        (**self).update(item)
    }

    fn delete(&self, id: &ItemId) -> RepoResult<()> {
        (**self).delete(id)
    }
}

/// Repository construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Store key holding the serialized collection.
    pub storage_key: String,
    pub write_mode: WriteMode,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.to_string(),
            write_mode: WriteMode::default(),
        }
    }
}

/// What a mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added(ItemId),
    Updated(ItemId),
    Deleted(ItemId),
}

/// Notification delivered to observers after each applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: u64,
    pub kind: ChangeKind,
}

/// Handle returned by [`VaultRepository::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Memory-vs-durable consistency report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceStatus {
    /// Revision of the in-memory collection. Starts at 0 on open.
    pub revision: u64,
    /// Newest revision known to be written to the store.
    pub durable_revision: u64,
    /// Message of the latest unresolved write failure.
    pub last_error: Option<String>,
}

impl PersistenceStatus {
    pub fn is_durable(&self) -> bool {
        self.durable_revision >= self.revision
    }
}

struct CollectionState {
    items: Vec<Item>,
    revision: u64,
    /// Events recorded under the lock and not yet handed to observers.
    undelivered: Vec<ChangeEvent>,
}

/// Vault repository: in-memory collection mirrored to a key-value store.
pub struct VaultRepository {
    state: Mutex<CollectionState>,
    writer: SnapshotWriter,
    observers: Mutex<BTreeMap<SubscriptionId, Observer>>,
    delivery: Mutex<()>,
    next_subscription: AtomicU64,
}

impl VaultRepository {
    /// Loads the collection from `store` with default options.
    pub fn open(store: Arc<dyn KeyValueStore>) -> RepoResult<Self> {
        Self::open_with(store, RepositoryOptions::default())
    }

    /// Loads the collection from `store`.
    ///
    /// A missing key yields an empty collection. A blob that fails to decode
    /// is reported as `InvalidData` and never replaced.
    pub fn open_with(store: Arc<dyn KeyValueStore>, options: RepositoryOptions) -> RepoResult<Self> {
        let started_at = Instant::now();
        let key = options.storage_key;

        let stored = store.get(&key).map_err(|err| {
            error!(
                "event=repo_open module=repo status=error duration_ms={} error_code=store_read_failed error={err}",
                started_at.elapsed().as_millis()
            );
            RepoError::Storage(StorageFailure {
                revision: 0,
                error: err,
            })
        })?;

        let items = match stored {
            Some(blob) => decode_collection(&blob).map_err(|err| {
                error!(
                    "event=repo_open module=repo status=error duration_ms={} error_code=decode_failed error={err}",
                    started_at.elapsed().as_millis()
                );
                RepoError::InvalidData(err.to_string())
            })?,
            None => Vec::new(),
        };

        let writer = SnapshotWriter::new(store, key, options.write_mode).map_err(|err| {
            RepoError::Storage(StorageFailure {
                revision: 0,
                error: err,
            })
        })?;

        info!(
            "event=repo_open module=repo status=ok item_count={} write_mode={} duration_ms={}",
            items.len(),
            options.write_mode.as_str(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            state: Mutex::new(CollectionState {
                items,
                revision: 0,
                undelivered: Vec::new(),
            }),
            writer,
            observers: Mutex::new(BTreeMap::new()),
            delivery: Mutex::new(()),
            next_subscription: AtomicU64::new(1),
        })
    }

    pub fn write_mode(&self) -> WriteMode {
        self.writer.mode()
    }

    pub fn len(&self) -> usize {
        self.lock_state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().items.is_empty()
    }

    /// Registers an observer called after every applied mutation.
    ///
    /// Observers run after the collection lock is released, so they may read
    /// or mutate the repository. Events arrive strictly in revision order;
    /// under concurrent writers an event may be delivered on another
    /// mutating thread, after the call that caused it has returned.
    pub fn subscribe(
        &self,
        observer: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_observers().insert(id, Arc::new(observer));
        id
    }

    /// Removes an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_observers().remove(&id).is_some()
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        let revision = self.lock_state().revision;
        PersistenceStatus {
            revision,
            durable_revision: self.writer.durable_revision(),
            last_error: self.writer.last_error(),
        }
    }

    /// Waits until the current revision is durable.
    pub fn flush(&self) -> RepoResult<()> {
        let revision = self.lock_state().revision;
        self.writer
            .wait_durable(revision, 0)
            .map_err(|error| RepoError::Storage(StorageFailure { revision, error }))
    }

    /// Re-issues a write of the current collection and waits for it.
    ///
    /// Used after a `Storage` error once the store is expected to work again.
    /// Only the outcome of this retry (or a newer write) is reported; earlier
    /// failures of the same revision are ignored.
    pub fn retry_persist(&self) -> RepoResult<()> {
        let (revision, attempt) = {
            let state = self.lock_state();
            info!(
                "event=persist_retry module=repo status=start revision={}",
                state.revision
            );
            let attempt = self.persist_locked(&state)?;
            (state.revision, attempt)
        };
        self.writer
            .wait_durable(revision, attempt)
            .map_err(|error| RepoError::Storage(StorageFailure { revision, error }))
    }

    fn lock_state(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, BTreeMap<SubscriptionId, Observer>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encodes and submits the current collection. Caller holds the state lock.
    ///
    /// Returns the writer's attempt number for the submitted snapshot.
    fn persist_locked(&self, state: &CollectionState) -> Result<u64, StorageFailure> {
        let revision = state.revision;
        let blob = match encode_collection(&state.items) {
            Ok(blob) => blob,
            Err(err) => {
                let message = format!("snapshot encode failed: {err}");
                self.writer.record_failure(revision, message.clone());
                return Err(StorageFailure {
                    revision,
                    error: StoreError::Unavailable(message),
                });
            }
        };

        self.writer
            .submit(revision, blob)
            .map_err(|error| StorageFailure { revision, error })
    }

    /// Bumps the revision, queues the change event and persists after an
    /// in-memory mutation.
    fn commit_locked(
        &self,
        state: &mut CollectionState,
        kind: ChangeKind,
    ) -> (u64, Result<(), StorageFailure>) {
        state.revision += 1;
        state.undelivered.push(ChangeEvent {
            revision: state.revision,
            kind,
        });
        let result = self.persist_locked(state).map(|_| ());
        (state.revision, result)
    }

    /// Hands queued events to observers in revision order.
    ///
    /// Only one thread delivers at a time. A caller that finds delivery busy
    /// (including an observer mutating the repository) leaves its events to
    /// the active deliverer, which drains the queue before letting go.
    fn deliver_pending(&self) {
        loop {
            let guard = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let batch = std::mem::take(&mut self.lock_state().undelivered);
                if batch.is_empty() {
                    break;
                }
                let observers: Vec<Observer> = self.lock_observers().values().cloned().collect();
                for event in &batch {
                    for observer in &observers {
                        (**observer)(event);
                    }
                }
            }
            drop(guard);

            // Events queued after the last drain but before the unlock.
            if self.lock_state().undelivered.is_empty() {
                return;
            }
        }
    }
}

impl ItemRepository for VaultRepository {
    fn list(&self) -> Vec<Item> {
        self.lock_state().items.clone()
    }

    fn get(&self, id: &ItemId) -> Option<Item> {
        self.lock_state()
            .items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
    }

    fn add(&self, draft: ItemDraft) -> RepoResult<Item> {
        if let Err(err) = draft.validate() {
            debug!("event=item_add module=repo status=rejected reason=validation error={err}");
            return Err(err.into());
        }

        let normalized = normalize_title(&draft.title);
        let (item, persisted) = {
            let mut state = self.lock_state();
            let duplicate = state.items.iter().any(|existing| {
                existing.category == draft.category && normalize_title(&existing.title) == normalized
            });
            if duplicate {
                info!(
                    "event=item_add module=repo status=rejected reason=duplicate category={}",
                    draft.category
                );
                return Err(RepoError::Duplicate {
                    category: draft.category,
                    title: draft.title.trim().to_string(),
                });
            }

            let mut item = Item::from_draft(draft);
            // A v4 collision is not expected, but the id invariant is absolute.
            while state.items.iter().any(|existing| existing.id == item.id) {
                item.id = ItemId::generate();
            }
            state.items.push(item.clone());
            let (revision, persisted) =
                self.commit_locked(&mut state, ChangeKind::Added(item.id.clone()));
            info!(
                "event=item_add module=repo status=ok item_id={} category={} revision={revision} item_count={}",
                item.id,
                item.category,
                state.items.len()
            );
            (item, persisted)
        };

        self.deliver_pending();
        persisted?;
        Ok(item)
    }

    fn update(&self, mut item: Item) -> RepoResult<Item> {
        if let Err(err) = item.validate() {
            debug!(
                "event=item_update module=repo status=rejected reason=validation item_id={} error={err}",
                item.id
            );
            return Err(err.into());
        }
        item.title = item.title.trim().to_string();

        let persisted = {
            let mut state = self.lock_state();
            let Some(slot) = state.items.iter_mut().find(|existing| existing.id == item.id) else {
                info!(
                    "event=item_update module=repo status=rejected reason=not_found item_id={}",
                    item.id
                );
                return Err(RepoError::NotFound(item.id.clone()));
            };
            *slot = item.clone();
            let (revision, persisted) =
                self.commit_locked(&mut state, ChangeKind::Updated(item.id.clone()));
            info!(
                "event=item_update module=repo status=ok item_id={} revision={revision}",
                item.id
            );
            persisted
        };

        self.deliver_pending();
        persisted?;
        Ok(item)
    }

    fn delete(&self, id: &ItemId) -> RepoResult<()> {
        let persisted = {
            let mut state = self.lock_state();
            let Some(index) = state.items.iter().position(|existing| &existing.id == id) else {
                info!("event=item_delete module=repo status=rejected reason=not_found item_id={id}");
                return Err(RepoError::NotFound(id.clone()));
            };
            state.items.remove(index);
            let (revision, persisted) =
                self.commit_locked(&mut state, ChangeKind::Deleted(id.clone()));
            info!(
                "event=item_delete module=repo status=ok item_id={id} revision={revision} item_count={}",
                state.items.len()
            );
            persisted
        };

        self.deliver_pending();
        persisted?;
        Ok(())
    }
}
