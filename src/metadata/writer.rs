//! Background persistence with supersede-latest semantics.
//!
//! At most one write is in flight. A snapshot submitted while another is
//! being written replaces any snapshot still waiting, so the last submitted
//! state is always the last one written.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::MetadataSnapshot;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone)]
struct Pending {
    generation: u64,
    snapshot: MetadataSnapshot,
}

/// Write counters, readable from any thread.
#[derive(Debug, Default)]
pub struct PersistStats {
    written: AtomicU64,
    failed: AtomicU64,
}

impl PersistStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

pub struct PersistQueue {
    pending: watch::Sender<Option<Pending>>,
    completed: watch::Receiver<u64>,
    submitted: u64,
    stats: Arc<PersistStats>,
}

impl PersistQueue {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(backend: Arc<dyn KeyValueStore>) -> Self {
        let (pending_tx, pending_rx) = watch::channel(None);
        let (completed_tx, completed_rx) = watch::channel(0);
        let stats = Arc::new(PersistStats::default());

        tokio::spawn(run_writer(backend, pending_rx, completed_tx, Arc::clone(&stats)));

        Self {
            pending: pending_tx,
            completed: completed_rx,
            submitted: 0,
            stats,
        }
    }

    /// Queue `snapshot` for writing and return its generation number.
    ///
    /// Takes `&mut self` so generations are published in the order they
    /// are numbered.
    pub fn submit(&mut self, snapshot: MetadataSnapshot) -> u64 {
        self.submitted += 1;
        let generation = self.submitted;
        self.pending.send_replace(Some(Pending {
            generation,
            snapshot,
        }));
        generation
    }

    /// Wait until the most recently submitted snapshot has been handled,
    /// whether the write succeeded or not.
    pub async fn flush(&self) {
        let target = self.submitted;
        if target == 0 {
            return;
        }
        let mut completed = self.completed.clone();
        if completed.wait_for(|done| *done >= target).await.is_err() {
            tracing::warn!("Persist writer stopped before flushing");
        }
    }

    pub fn stats(&self) -> &PersistStats {
        &self.stats
    }
}

async fn run_writer(
    backend: Arc<dyn KeyValueStore>,
    mut pending: watch::Receiver<Option<Pending>>,
    completed: watch::Sender<u64>,
    stats: Arc<PersistStats>,
) {
    while pending.changed().await.is_ok() {
        let Some(Pending {
            generation,
            snapshot,
        }) = pending.borrow_and_update().clone()
        else {
            continue;
        };

        let store = Arc::clone(&backend);
        let result = tokio::task::spawn_blocking(move || snapshot.write_to(store.as_ref())).await;

        match result {
            Ok(Ok(())) => {
                stats.written.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(generation, backend = backend.name(), "Persisted photo metadata");
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(generation, error = %e, "Failed to persist photo metadata");
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(generation, error = %e, "Persist task panicked");
            }
        }

        completed.send_replace(generation);
    }

    tracing::debug!("Persist writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::PhotoRef;
    use crate::metadata::{MetadataStore, DESCRIPTIONS_KEY};
    use crate::storage::{MemoryStore, StorageError};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    /// Backend that records every batch and can be told to fail.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        batches: Mutex<Vec<String>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for RecordingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Write {
                    key: key.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            if key == DESCRIPTIONS_KEY {
                self.batches.lock().unwrap().push(value.to_string());
            }
            self.inner.set(key, value)
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_last_submitted_snapshot_wins() {
        let backend = Arc::new(RecordingStore::default());
        let mut queue = PersistQueue::spawn(backend.clone());

        let mut store = MetadataStore::new();
        let photo = PhotoRef::new("a");
        for i in 0..20 {
            store.set_description(&photo, &format!("v{}", i));
            queue.submit(store.snapshot());
        }
        queue.flush().await;

        let batches = backend.batches.lock().unwrap();
        assert_eq!(batches.last().map(String::as_str), Some(r#"{"a":"v19"}"#));
        assert!(batches.len() <= 20);
        assert_eq!(queue.stats().written(), batches.len() as u64);
    }

    #[tokio::test]
    async fn test_failed_write_is_counted_and_later_writes_still_run() {
        let backend = Arc::new(RecordingStore::default());
        let mut queue = PersistQueue::spawn(backend.clone());
        let mut store = MetadataStore::new();
        let photo = PhotoRef::new("a");

        backend.fail.store(true, Ordering::SeqCst);
        store.set_description(&photo, "lost");
        queue.submit(store.snapshot());
        queue.flush().await;
        assert_eq!(queue.stats().failed(), 1);
        assert_eq!(backend.get(DESCRIPTIONS_KEY).unwrap(), None);

        backend.fail.store(false, Ordering::SeqCst);
        store.set_description(&photo, "kept");
        queue.submit(store.snapshot());
        queue.flush().await;
        assert_eq!(queue.stats().written(), 1);
        assert_eq!(
            backend.get(DESCRIPTIONS_KEY).unwrap().as_deref(),
            Some(r#"{"a":"kept"}"#)
        );
    }

    /// Backend whose description writes block until released.
    struct GatedStore {
        inner: MemoryStore,
        batches: Mutex<Vec<String>>,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedStore {
        fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let store = Arc::new(Self {
                inner: MemoryStore::new(),
                batches: Mutex::new(Vec::new()),
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            });
            (store, entered_rx, release_tx)
        }
    }

    impl KeyValueStore for GatedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == DESCRIPTIONS_KEY {
                self.batches.lock().unwrap().push(value.to_string());
                let _ = self.entered.lock().unwrap().send(());
                let _ = self
                    .release
                    .lock()
                    .unwrap()
                    .recv_timeout(Duration::from_secs(5));
            }
            self.inner.set(key, value)
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    fn wait_entered(entered: &mpsc::Receiver<()>) {
        entered
            .recv_timeout(Duration::from_secs(5))
            .expect("writer never reached the backend");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submissions_during_slow_write_collapse_to_latest() {
        let (backend, entered, release) = GatedStore::new();
        let mut queue = PersistQueue::spawn(backend.clone());
        let mut store = MetadataStore::new();
        let photo = PhotoRef::new("a");

        store.set_description(&photo, "v1");
        queue.submit(store.snapshot());
        tokio::task::block_in_place(|| wait_entered(&entered));

        store.set_description(&photo, "v2");
        queue.submit(store.snapshot());
        store.set_description(&photo, "v3");
        queue.submit(store.snapshot());

        release.send(()).unwrap();
        release.send(()).unwrap();
        queue.flush().await;

        let batches = backend.batches.lock().unwrap().clone();
        assert_eq!(batches, vec![r#"{"a":"v1"}"#, r#"{"a":"v3"}"#]);
        assert_eq!(queue.stats().written(), 2);
        assert_eq!(
            backend.get(DESCRIPTIONS_KEY).unwrap().as_deref(),
            Some(r#"{"a":"v3"}"#)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_queue_drains_pending_snapshot() {
        let (backend, entered, release) = GatedStore::new();
        let mut queue = PersistQueue::spawn(backend.clone());
        let mut store = MetadataStore::new();
        let photo = PhotoRef::new("a");

        store.set_description(&photo, "v1");
        queue.submit(store.snapshot());
        tokio::task::block_in_place(|| wait_entered(&entered));

        store.set_description(&photo, "v2");
        queue.submit(store.snapshot());
        drop(queue);

        release.send(()).unwrap();
        release.send(()).unwrap();

        for _ in 0..500 {
            if backend.get(DESCRIPTIONS_KEY).unwrap().as_deref() == Some(r#"{"a":"v2"}"#) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "pending snapshot was not written after drop, stored: {:?}",
            backend.get(DESCRIPTIONS_KEY).unwrap()
        );
    }

    #[tokio::test]
    async fn test_flush_without_submissions_returns() {
        let queue = PersistQueue::spawn(Arc::new(MemoryStore::new()));
        queue.flush().await;
        assert_eq!(queue.stats().written(), 0);
    }
}
