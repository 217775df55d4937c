//! Sync coordinator: output-tree events → remote store → reload.
//!
//! Every key gets its own lane, a task draining an unbounded queue, so
//! events for one file reach the store in the order they were observed
//! while different files sync concurrently with no cap. The lane owns the
//! file's [`FileState`]; nothing is shared between lanes.
//!
//! A lane retires once it has unsynced its key and drained its queue. The
//! next event for that key starts a successor lane, which waits for the
//! retiring one and inherits its state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use slate_core::{AssetKey, FileEvent, FileEventKind};
use slate_sync::{hash, RemoteStore};

use crate::paths::RELOAD_EVENT;
use crate::reload::ReloadChannel;

/// What a single sync/unsync call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No-op event (empty key).
    Skipped,
    /// Content identical to the last successful push.
    Unchanged,
    Synced,
    Unsynced,
    /// Logged and swallowed.
    Failed(String),
}

/// Per-key state, owned by the key's lane.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileState {
    synced_digest: Option<String>,
}

impl FileState {
    pub fn synced_digest(&self) -> Option<&str> {
        self.synced_digest.as_deref()
    }
}

#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn RemoteStore>,
    reload: Arc<dyn ReloadChannel>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn RemoteStore>, reload: Arc<dyn ReloadChannel>) -> Self {
        Self { store, reload }
    }

    /// Push `event.dest_path` to the store under `event.key`, then notify
    /// reload clients. Never fails: errors are logged and reported as
    /// [`SyncOutcome::Failed`].
    pub async fn sync(&self, event: &FileEvent, state: &mut FileState) -> SyncOutcome {
        if event.is_noop() {
            return SyncOutcome::Skipped;
        }

        let store = self.store.clone();
        let key = event.key.clone();
        let path = event.dest_path.clone();
        let previous = state.synced_digest.clone();
        let pushed = tokio::task::spawn_blocking(move || {
            let digest = hash::file_digest(&path)?;
            if previous.as_deref() == Some(digest.as_str()) {
                return Ok(None);
            }
            store.sync(&key, &path)?;
            Ok::<_, slate_sync::SyncError>(Some(digest))
        })
        .await;

        match pushed {
            Ok(Ok(None)) => {
                tracing::debug!(key = %event.key, "unchanged, not syncing");
                SyncOutcome::Unchanged
            }
            Ok(Ok(Some(digest))) => {
                state.synced_digest = Some(digest);
                self.reload.emit(RELOAD_EVENT);
                tracing::info!("synced {}", event.key);
                SyncOutcome::Synced
            }
            Ok(Err(err)) => {
                tracing::error!(key = %event.key, error = %err, "syncing {} failed", event.key);
                SyncOutcome::Failed(err.to_string())
            }
            Err(err) => {
                tracing::error!(key = %event.key, error = %err, "syncing {} failed", event.key);
                SyncOutcome::Failed(err.to_string())
            }
        }
    }

    /// Remove `event.key` from the store, then notify reload clients.
    pub async fn unsync(&self, event: &FileEvent, state: &mut FileState) -> SyncOutcome {
        if event.is_noop() {
            return SyncOutcome::Skipped;
        }

        let store = self.store.clone();
        let key = event.key.clone();
        let removed = tokio::task::spawn_blocking(move || store.unsync(&key)).await;

        match removed {
            Ok(Ok(())) => {
                state.synced_digest = None;
                self.reload.emit(RELOAD_EVENT);
                tracing::info!("unsynced {}", event.key);
                SyncOutcome::Unsynced
            }
            Ok(Err(err)) => {
                tracing::error!(key = %event.key, error = %err, "unsyncing {} failed", event.key);
                SyncOutcome::Failed(err.to_string())
            }
            Err(err) => {
                tracing::error!(key = %event.key, error = %err, "unsyncing {} failed", event.key);
                SyncOutcome::Failed(err.to_string())
            }
        }
    }

    /// Route one event to [`sync`](Self::sync) or [`unsync`](Self::unsync).
    pub async fn apply(&self, event: &FileEvent, state: &mut FileState) -> SyncOutcome {
        match event.kind {
            FileEventKind::Added | FileEventKind::Changed => self.sync(event, state).await,
            FileEventKind::Removed => self.unsync(event, state).await,
        }
    }
}

struct Lane {
    tx: mpsc::UnboundedSender<FileEvent>,
    handle: JoinHandle<FileState>,
}

/// Single-threaded front door of the coordinator: receives bus events in
/// order and hands each to its key's lane.
pub struct Dispatcher {
    coordinator: SyncCoordinator,
    lanes: HashMap<AssetKey, Lane>,
}

impl Dispatcher {
    pub fn new(coordinator: SyncCoordinator) -> Self {
        Self {
            coordinator,
            lanes: HashMap::new(),
        }
    }

    /// Lanes still running.
    pub fn lane_count(&self) -> usize {
        self.lanes
            .values()
            .filter(|lane| !lane.handle.is_finished())
            .count()
    }

    /// Queue `event` on its lane, spawning the lane on first use. No-op
    /// events are dropped here.
    pub fn dispatch(&mut self, event: FileEvent) {
        if event.is_noop() {
            return;
        }
        self.lanes.retain(|_, lane| !lane.handle.is_finished());

        let event = match self.lanes.get(&event.key) {
            Some(lane) => match lane.tx.send(event) {
                Ok(()) => return,
                // Lane retired (or panicked); its successor is spawned below.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let previous = self.lanes.remove(&event.key).map(|lane| lane.handle);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_lane(self.coordinator.clone(), rx, previous));
        let key = event.key.clone();
        if tx.send(event).is_err() {
            tracing::error!(%key, "sync lane closed before first event");
        }
        self.lanes.insert(key, Lane { tx, handle });
    }

    /// Consume the output bus until shutdown or until every producer is gone.
    pub async fn run(
        mut self,
        mut bus_rx: mpsc::UnboundedReceiver<FileEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                event = bus_rx.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event);
                }
            }
        }
    }

    /// Close every lane and wait for the queued events to finish.
    pub async fn drain(self) {
        for (key, lane) in self.lanes {
            drop(lane.tx);
            if let Err(err) = lane.handle.await {
                tracing::error!(%key, error = %err, "sync lane failed");
            }
        }
    }
}

async fn run_lane(
    coordinator: SyncCoordinator,
    mut rx: mpsc::UnboundedReceiver<FileEvent>,
    previous: Option<JoinHandle<FileState>>,
) -> FileState {
    // Events still queued on the retiring lane come first.
    let mut state = match previous {
        Some(handle) => handle.await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "previous sync lane failed");
            FileState::default()
        }),
        None => FileState::default(),
    };
    while let Some(event) = rx.recv().await {
        if coordinator.apply(&event, &mut state).await == SyncOutcome::Unsynced {
            // Already-queued events are still delivered; later sends fail.
            rx.close();
        }
    }
    state
}
