//! Best-effort side channel for the action history and terminal snapshots.
//!
//! Records are queued on an unbounded channel and written by a background
//! task, so a slow or failing store never holds up a game transition. Store
//! errors are logged and the record is dropped.

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use shared::{GameEvent, PlayerId, SessionId, SessionState};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One accepted transition, as kept in the action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub session_id: SessionId,
    pub player_id: Option<PlayerId>,
    pub action_type: String,
    pub payload: serde_json::Value,
    pub timestamp: u64,
}

impl HistoryRecord {
    /// Builds the history entry for `event`, if the event is one that is logged.
    pub fn from_event(session_id: SessionId, event: &GameEvent, timestamp: u64) -> Option<Self> {
        let action_type = event.history_action()?;
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode {} for history: {}", event.name(), e);
                return None;
            }
        };
        Some(Self {
            session_id,
            player_id: event.actor(),
            action_type: action_type.to_string(),
            payload,
            timestamp,
        })
    }
}

/// Terminal state of a session, handed over for replay and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub session_id: SessionId,
    pub finished_at: u64,
    pub state: SessionState,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of history records and snapshots.
pub trait HistoryStore: Send + Sync + 'static {
    fn append(&self, record: &HistoryRecord) -> Result<(), SinkError>;
    fn save_snapshot(&self, snapshot: &SnapshotRecord) -> Result<(), SinkError>;
}

/// Keeps everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<HistoryRecord>>,
    snapshots: Mutex<Vec<SnapshotRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HistoryStore for MemoryStore {
    fn append(&self, record: &HistoryRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Unavailable("history lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn save_snapshot(&self, snapshot: &SnapshotRecord) -> Result<(), SinkError> {
        self.snapshots
            .lock()
            .map_err(|_| SinkError::Unavailable("snapshot lock poisoned".to_string()))?
            .push(snapshot.clone());
        Ok(())
    }
}

/// Only logs what it receives. Used when no history file is configured.
pub struct LogStore;

impl HistoryStore for LogStore {
    fn append(&self, record: &HistoryRecord) -> Result<(), SinkError> {
        debug!(
            "History {} {} by {:?}",
            record.session_id, record.action_type, record.player_id
        );
        Ok(())
    }

    fn save_snapshot(&self, snapshot: &SnapshotRecord) -> Result<(), SinkError> {
        debug!(
            "Snapshot of {} at {} ({} moves)",
            snapshot.session_id,
            snapshot.finished_at,
            snapshot.state.total_moves()
        );
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredLine<'a> {
    Action(&'a HistoryRecord),
    Snapshot(&'a SnapshotRecord),
}

/// Appends one JSON document per line to a file.
pub struct JsonLinesStore {
    file: Mutex<File>,
}

impl JsonLinesStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, line: &StoredLine<'_>) -> Result<(), SinkError> {
        let mut encoded = serde_json::to_vec(line)?;
        encoded.push(b'\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| SinkError::Unavailable("history file lock poisoned".to_string()))?;
        file.write_all(&encoded)?;
        Ok(())
    }
}

impl HistoryStore for JsonLinesStore {
    fn append(&self, record: &HistoryRecord) -> Result<(), SinkError> {
        self.write_line(&StoredLine::Action(record))
    }

    fn save_snapshot(&self, snapshot: &SnapshotRecord) -> Result<(), SinkError> {
        self.write_line(&StoredLine::Snapshot(snapshot))
    }
}

enum SinkMessage {
    Record(HistoryRecord),
    Snapshot(SnapshotRecord),
    Flush(oneshot::Sender<()>),
}

/// Cheap, cloneable handle that queues records for the background writer.
#[derive(Clone)]
pub struct SideChannel {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl SideChannel {
    /// Spawns the writer task draining into `store`.
    pub fn spawn(store: Arc<dyn HistoryStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    SinkMessage::Record(record) => {
                        if let Err(e) = store.append(&record) {
                            error!(
                                "Dropping history record {} for session {}: {}",
                                record.action_type, record.session_id, e
                            );
                        }
                    }
                    SinkMessage::Snapshot(snapshot) => {
                        if let Err(e) = store.save_snapshot(&snapshot) {
                            error!("Dropping snapshot of session {}: {}", snapshot.session_id, e);
                        }
                    }
                    SinkMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("History writer stopped");
        });

        (Self { tx }, handle)
    }

    pub fn record(&self, record: HistoryRecord) {
        if self.tx.send(SinkMessage::Record(record)).is_err() {
            warn!("History writer is gone, record dropped");
        }
    }

    pub fn snapshot(&self, snapshot: SnapshotRecord) {
        if self.tx.send(SinkMessage::Snapshot(snapshot)).is_err() {
            warn!("History writer is gone, snapshot dropped");
        }
    }

    /// Waits until everything queued before this call has been handed to
    /// the store.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SinkMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
