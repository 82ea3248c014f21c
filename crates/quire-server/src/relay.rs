//! Relay rooms: per-document text replayed from client diffs and fanned out
//! to every connection editing that document.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quire_sync::{MalformedDiff, SyncEnvelope, diff};
use smol_str::SmolStr;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info};

#[derive(Debug)]
struct RoomState {
    name: SmolStr,
    markdown: String,
    modified: DateTime<Utc>,
}

/// What the relay did with an update envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Room text changed and the envelope went out to `receivers` connections.
    Broadcast { receivers: usize },
    /// No insert or delete in the diff.
    Unchanged,
    /// The envelope names another document; the room is untouched.
    WrongDocument,
}

/// Shared state for one document.
#[derive(Debug)]
pub struct Room {
    doc_id: i64,
    state: Mutex<RoomState>,
    tx: broadcast::Sender<String>,
    connections: AtomicUsize,
}

impl Room {
    fn new(doc_id: i64, name: SmolStr, markdown: String, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            doc_id,
            state: Mutex::new(RoomState {
                name,
                markdown,
                modified: Utc::now(),
            }),
            tx,
            connections: AtomicUsize::new(0),
        }
    }

    pub fn doc_id(&self) -> i64 {
        self.doc_id
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Receive every frame broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub async fn markdown(&self) -> String {
        self.state.lock().await.markdown.clone()
    }

    pub async fn name(&self) -> SmolStr {
        self.state.lock().await.name.clone()
    }

    pub async fn modified(&self) -> DateTime<Utc> {
        self.state.lock().await.modified
    }

    /// Replay an update against the room text and broadcast it.
    ///
    /// The caller has already checked that `envelope` is an update. A diff
    /// that overruns the room text leaves the room untouched.
    pub async fn apply_update(
        &self,
        envelope: &SyncEnvelope,
    ) -> Result<RelayOutcome, MalformedDiff> {
        if envelope.document_id != self.doc_id {
            return Ok(RelayOutcome::WrongDocument);
        }
        let mut state = self.state.lock().await;
        state.name = envelope.document_name.clone();

        let Some(diffs) = envelope.diff() else {
            return Ok(RelayOutcome::Unchanged);
        };
        let markdown = diff::apply(&state.markdown, diffs.segments())?;
        if !diffs.has_changes() {
            return Ok(RelayOutcome::Unchanged);
        }

        state.markdown = markdown;
        state.modified = Utc::now();

        // Sent under the lock: frames go out in the order they were applied.
        let frame = match envelope.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                error!(doc_id = self.doc_id, error = %e, "failed to encode envelope");
                return Ok(RelayOutcome::Unchanged);
            }
        };
        let receivers = self.tx.send(frame).unwrap_or(0);
        debug!(doc_id = self.doc_id, receivers, segments = diffs.len(), "relayed update");
        Ok(RelayOutcome::Broadcast { receivers })
    }
}

/// All active rooms.
#[derive(Debug)]
pub struct RelayHub {
    rooms: DashMap<i64, Arc<Room>>,
    capacity: usize,
}

impl RelayHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Join the room for `doc_id`, creating it from `seed` on first join.
    pub fn join(
        &self,
        doc_id: i64,
        name: &str,
        seed: impl FnOnce() -> Option<String>,
    ) -> Arc<Room> {
        let entry = self.rooms.entry(doc_id).or_insert_with(|| {
            info!(doc_id, name, "opening relay room");
            Arc::new(Room::new(
                doc_id,
                name.into(),
                seed().unwrap_or_default(),
                self.capacity,
            ))
        });
        // Counted under the shard lock so `leave` never removes a room
        // someone is joining.
        entry.connections.fetch_add(1, Ordering::AcqRel);
        let room = entry.clone();
        drop(entry);

        metrics::gauge!("quire_relay_connections").increment(1.0);
        room
    }

    /// Leave a room, removing it when the last connection is gone.
    pub fn leave(&self, room: &Room) {
        room.connections.fetch_sub(1, Ordering::AcqRel);
        metrics::gauge!("quire_relay_connections").decrement(1.0);
        let removed = self
            .rooms
            .remove_if(&room.doc_id, |_, r| r.connections() == 0);
        if removed.is_some() {
            info!(doc_id = room.doc_id, "closed relay room");
        }
    }

    pub fn room(&self, doc_id: i64) -> Option<Arc<Room>> {
        self.rooms.get(&doc_id).map(|r| r.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.rooms.iter().map(|r| r.connections()).sum()
    }
}
