//! Ordered snapshot writer.
//!
//! # Responsibility
//! - Persist full-collection snapshots to a `KeyValueStore` in issue order.
//! - Track which revision is durable and the latest write failure.
//! - Number every write attempt so a retry is judged only by its own outcome.
//!
//! # Invariants
//! - A snapshot is never written after a newer one has become durable.
//! - In background mode a single thread owns all store writes; queued
//!   snapshots are coalesced so only the newest pending one is written.
//! - Dropping the writer drains the queue before the thread exits.

use crate::store::{KeyValueStore, StoreError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

const WRITER_THREAD_NAME: &str = "watchvault-writer";

/// How snapshot writes are scheduled relative to the mutating call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Write on the calling thread before the mutation returns.
    #[default]
    Blocking,
    /// Hand snapshots to a dedicated writer thread.
    Background,
}

impl WriteMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blocking" | "sync" => Some(Self::Blocking),
            "background" | "async" => Some(Self::Background),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Background => "background",
        }
    }
}

/// One full-collection snapshot tagged with its mutation revision.
#[derive(Debug, Clone)]
struct Snapshot {
    revision: u64,
    attempt: u64,
    blob: String,
}

#[derive(Debug, Clone)]
struct WriteFailure {
    revision: u64,
    attempt: u64,
    message: String,
}

#[derive(Debug, Default)]
struct DurableState {
    durable_revision: u64,
    failure: Option<WriteFailure>,
    stopped: bool,
}

impl DurableState {
    fn record_success(&mut self, revision: u64) {
        self.durable_revision = self.durable_revision.max(revision);
        if self
            .failure
            .as_ref()
            .is_some_and(|failure| failure.revision <= revision)
        {
            self.failure = None;
        }
    }

    fn record_failure(&mut self, revision: u64, attempt: u64, message: String) {
        self.failure = Some(WriteFailure {
            revision,
            attempt,
            message,
        });
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<DurableState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DurableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Backend {
    Blocking,
    Background {
        sender: Option<Sender<Snapshot>>,
        handle: Option<JoinHandle<()>>,
    },
}

pub(crate) struct SnapshotWriter {
    store: Arc<dyn KeyValueStore>,
    key: String,
    shared: Arc<Shared>,
    backend: Backend,
    next_attempt: AtomicU64,
}

impl SnapshotWriter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: String,
        mode: WriteMode,
    ) -> Result<Self, StoreError> {
        let shared = Arc::new(Shared::default());
        let backend = match mode {
            WriteMode::Blocking => Backend::Blocking,
            WriteMode::Background => {
                let (sender, receiver) = unbounded();
                let thread_store = Arc::clone(&store);
                let thread_key = key.clone();
                let thread_shared = Arc::clone(&shared);
                let handle = std::thread::Builder::new()
                    .name(WRITER_THREAD_NAME.to_string())
                    .spawn(move || {
                        run_writer(receiver, thread_store.as_ref(), &thread_key, &thread_shared)
                    })
                    .map_err(|err| {
                        StoreError::Unavailable(format!("failed to spawn snapshot writer: {err}"))
                    })?;
                Backend::Background {
                    sender: Some(sender),
                    handle: Some(handle),
                }
            }
        };

        Ok(Self {
            store,
            key,
            shared,
            backend,
            next_attempt: AtomicU64::new(1),
        })
    }

    pub fn mode(&self) -> WriteMode {
        match self.backend {
            Backend::Blocking => WriteMode::Blocking,
            Backend::Background { .. } => WriteMode::Background,
        }
    }

    /// Issues a snapshot write and returns its attempt number.
    ///
    /// Blocking mode returns the store result directly. Background mode only
    /// fails when the writer thread is gone.
    ///
    /// Callers must submit snapshots in revision order.
    pub fn submit(&self, revision: u64, blob: String) -> Result<u64, StoreError> {
        let attempt = self.next_attempt();
        let snapshot = Snapshot {
            revision,
            attempt,
            blob,
        };
        match &self.backend {
            Backend::Blocking => {
                write_snapshot(self.store.as_ref(), &self.key, &self.shared, &snapshot)
                    .map(|()| attempt)
            }
            Backend::Background { sender, .. } => {
                let sent = sender
                    .as_ref()
                    .map(|sender| sender.send(snapshot).is_ok())
                    .unwrap_or(false);
                if sent {
                    debug!(
                        "event=snapshot_enqueue module=writer status=ok revision={revision} attempt={attempt}"
                    );
                    Ok(attempt)
                } else {
                    let mut state = self.shared.lock();
                    state.stopped = true;
                    state.record_failure(revision, attempt, StoreError::WriterStopped.to_string());
                    Err(StoreError::WriterStopped)
                }
            }
        }
    }

    /// Records a failure that happened before a snapshot could be submitted.
    pub fn record_failure(&self, revision: u64, message: String) {
        let attempt = self.next_attempt();
        self.shared.lock().record_failure(revision, attempt, message);
        self.shared.changed.notify_all();
    }

    /// Blocks until `revision` (or something newer) is durable.
    ///
    /// Fails as soon as a write of `revision` or newer fails, counting only
    /// attempts numbered `since_attempt` or later. Pass `0` to count any
    /// recorded failure.
    pub fn wait_durable(&self, revision: u64, since_attempt: u64) -> Result<(), StoreError> {
        let mut state = self.shared.lock();
        loop {
            if state.durable_revision >= revision {
                return Ok(());
            }
            if let Some(failure) = state
                .failure
                .as_ref()
                .filter(|failure| failure.revision >= revision && failure.attempt >= since_attempt)
            {
                return Err(StoreError::WriteFailed(failure.message.clone()));
            }
            if state.stopped {
                return Err(StoreError::WriterStopped);
            }
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn durable_revision(&self) -> u64 {
        self.shared.lock().durable_revision
    }

    fn next_attempt(&self) -> u64 {
        self.next_attempt.fetch_add(1, Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared
            .lock()
            .failure
            .as_ref()
            .map(|failure| failure.message.clone())
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        if let Backend::Background { sender, handle } = &mut self.backend {
            // Closing the channel lets the thread drain and exit.
            sender.take();
            if let Some(handle) = handle.take() {
                if handle.join().is_err() {
                    error!("event=writer_stop module=writer status=error error_code=writer_panicked");
                }
            }
        }
    }
}

fn run_writer(receiver: Receiver<Snapshot>, store: &dyn KeyValueStore, key: &str, shared: &Shared) {
    info!("event=writer_start module=writer status=ok");
    while let Ok(mut snapshot) = receiver.recv() {
        let mut coalesced = 0usize;
        while let Ok(newer) = receiver.try_recv() {
            snapshot = newer;
            coalesced += 1;
        }
        if coalesced > 0 {
            debug!(
                "event=snapshot_coalesce module=writer status=ok skipped={coalesced} revision={}",
                snapshot.revision
            );
        }

        if snapshot.revision <= shared.lock().durable_revision {
            continue;
        }
        // Failures are recorded in shared state and surfaced through flush().
        let _ = write_snapshot(store, key, shared, &snapshot);
    }

    shared.lock().stopped = true;
    shared.changed.notify_all();
    info!("event=writer_stop module=writer status=ok");
}

fn write_snapshot(
    store: &dyn KeyValueStore,
    key: &str,
    shared: &Shared,
    snapshot: &Snapshot,
) -> Result<(), StoreError> {
    let started_at = Instant::now();
    let result = store.set(key, &snapshot.blob);
    {
        let mut state = shared.lock();
        match &result {
            Ok(()) => {
                state.record_success(snapshot.revision);
                debug!(
                    "event=snapshot_write module=writer status=ok revision={} bytes={} duration_ms={}",
                    snapshot.revision,
                    snapshot.blob.len(),
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                state.record_failure(snapshot.revision, snapshot.attempt, err.to_string());
                error!(
                    "event=snapshot_write module=writer status=error revision={} attempt={} durable_revision={} duration_ms={} error_code=store_write_failed error={err}",
                    snapshot.revision,
                    snapshot.attempt,
                    state.durable_revision,
                    started_at.elapsed().as_millis()
                );
            }
        }
    }
    shared.changed.notify_all();
    result
}

#[cfg(test)]
mod tests {
    use super::WriteMode;

    #[test]
    fn write_mode_parse_accepts_aliases() {
        assert_eq!(WriteMode::parse(" Background "), Some(WriteMode::Background));
        assert_eq!(WriteMode::parse("sync"), Some(WriteMode::Blocking));
        assert_eq!(WriteMode::parse("lazy"), None);
        assert_eq!(WriteMode::default(), WriteMode::Blocking);
    }
}
