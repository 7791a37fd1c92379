//! Per-room relay state.
//!
//! All mutation of a room goes through its log mutex: joining (subscribe +
//! history snapshot) and publishing (stamp + append + persist + broadcast).
//! A joiner therefore sees every event exactly once, either in its replay or
//! live, and every peer observes the same order.
//!
//! The history cache only lives while the room has peers. When the last one
//! leaves the room closes and drops it; the next join builds a fresh room
//! from storage.

use crate::persist::Persistence;
use inkroom_core::sync::{SyncResult, WireEvent};
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info};

/// Default capacity of each room's live broadcast channel.
pub const CHANNEL_CAPACITY: usize = 256;

/// A stamped frame travelling through a room's broadcast channel.
#[derive(Debug, Clone)]
pub struct RelayFrame {
    /// Peer that sent it; it is not echoed back to them.
    pub from: String,
    /// Encoded envelope, ready to write to a socket.
    pub text: String,
}

#[derive(Default)]
struct RoomLog {
    /// History has been read from storage.
    loaded: bool,
    /// The last peer left; this room takes no more joins.
    closed: bool,
    /// Every accepted frame, encoded, in acceptance order.
    history: Vec<String>,
    /// Last timestamp handed out.
    last_stamp: i64,
    peers: HashSet<String>,
}

pub struct Room {
    name: String,
    tx: broadcast::Sender<RelayFrame>,
    log: Mutex<RoomLog>,
    persistence: Arc<Persistence>,
}

impl Room {
    pub fn new(name: impl Into<String>, persistence: Arc<Persistence>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            tx,
            log: Mutex::new(RoomLog::default()),
            persistence,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a peer. Returns its live receiver and the history to replay
    /// before anything read from that receiver, or `None` if the room has
    /// already closed.
    pub async fn join(&self, peer: &str) -> Option<(broadcast::Receiver<RelayFrame>, Vec<String>)> {
        let mut log = self.log.lock().await;
        if log.closed {
            return None;
        }
        if !log.loaded {
            self.load_history(&mut log).await;
        }
        log.peers.insert(peer.to_string());
        let rx = self.tx.subscribe();
        Some((rx, log.history.clone()))
    }

    /// Remove a peer. Returns true if it was the last one and the room closed.
    pub async fn leave(&self, peer: &str) -> bool {
        let mut log = self.log.lock().await;
        log.peers.remove(peer);
        debug!(room = %self.name, peer, remaining = log.peers.len(), "peer left");
        if log.peers.is_empty() && !log.closed {
            log.closed = true;
            log.history = Vec::new();
            return true;
        }
        false
    }

    pub async fn peer_count(&self) -> usize {
        self.log.lock().await.peers.len()
    }

    /// Number of events cached for replay, including ones loaded from storage.
    pub async fn history_len(&self) -> usize {
        self.log.lock().await.history.len()
    }

    /// Accept an event from `peer`: stamp it, record it, queue it for
    /// storage and hand it to every other connection.
    pub async fn publish(&self, peer: &str, mut event: WireEvent) -> SyncResult<i64> {
        let mut log = self.log.lock().await;

        let stamp = now_millis().max(log.last_stamp);
        event.stamp(stamp);
        let text = event.to_json()?;

        log.last_stamp = stamp;
        if !log.closed {
            log.history.push(text.clone());
        }
        self.persistence.enqueue(&self.name, event);

        // No receivers is fine: the sender may be alone in the room.
        let _ = self.tx.send(RelayFrame {
            from: peer.to_string(),
            text,
        });

        Ok(stamp)
    }

    async fn load_history(&self, log: &mut RoomLog) {
        match self.persistence.load(&self.name).await {
            Ok(events) => {
                for event in events {
                    match event.to_json() {
                        Ok(text) => {
                            if let Some(stamp) = event.timestamp() {
                                log.last_stamp = log.last_stamp.max(stamp);
                            }
                            log.history.push(text);
                        }
                        Err(e) => error!(room = %self.name, error = %e, "dropping stored event"),
                    }
                }
                info!(room = %self.name, events = log.history.len(), "loaded room history");
            }
            Err(e) => {
                error!(room = %self.name, error = %e, "failed to load room history, starting empty");
            }
        }
        log.loaded = true;
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkroom_core::storage::{
        BoxFuture, EventStore, MemoryEventStore, StorageError, StorageResult,
    };
    use serde_json::json;

    fn pen(x: f64) -> WireEvent {
        WireEvent::from_parts(
            "pen",
            json!({"x0": x, "y0": 0.0, "x1": x, "y1": 1.0, "color": "red", "timestamp": 1}),
        )
        .unwrap()
    }

    fn room(store: Arc<dyn EventStore>) -> Room {
        Room::new("r", Persistence::start(store), CHANNEL_CAPACITY)
    }

    #[tokio::test]
    async fn test_publish_stamps_and_broadcasts() {
        let room = room(Arc::new(MemoryEventStore::new()));
        let (mut rx, history) = room.join("a").await.unwrap();
        assert!(history.is_empty());

        let before = now_millis();
        let stamp = room.publish("b", pen(0.1)).await.unwrap();
        assert!(stamp >= before);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.from, "b");
        let event = WireEvent::from_json(&frame.text).unwrap();
        assert_eq!(event.timestamp(), Some(stamp));
    }

    #[tokio::test]
    async fn test_stamps_never_decrease() {
        let room = room(Arc::new(MemoryEventStore::new()));
        let mut last = 0;
        for i in 0..20 {
            let stamp = room.publish("a", pen(i as f64 / 20.0)).await.unwrap();
            assert!(stamp >= last);
            last = stamp;
        }
    }

    #[tokio::test]
    async fn test_late_joiner_gets_history_and_persistence_follows() {
        let store = Arc::new(MemoryEventStore::new());
        let persistence = Persistence::start(store.clone());
        let room = Room::new("r", persistence.clone(), CHANNEL_CAPACITY);
        room.join("a").await.unwrap();
        room.publish("a", pen(0.1)).await.unwrap();
        room.publish("a", pen(0.2)).await.unwrap();

        let (_rx, history) = room.join("b").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(room.peer_count().await, 2);

        persistence.flushed().await;
        let stored = store.load("r").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(WireEvent::from_json(&history[1]).unwrap(), stored[1]);
    }

    #[tokio::test]
    async fn test_history_loaded_from_storage_once() {
        let store = Arc::new(MemoryEventStore::new());
        let mut old = pen(0.5);
        old.stamp(now_millis() + 60_000);
        store.append("r", &old).await.unwrap();

        let room = room(store.clone());
        let (_rx, history) = room.join("a").await.unwrap();
        assert_eq!(history.len(), 1);

        // clock skew in storage keeps the order monotonic
        let stamp = room.publish("a", pen(0.6)).await.unwrap();
        assert_eq!(Some(stamp), old.timestamp());

        let (_rx, history) = room.join("b").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_last_leave_closes_and_drops_cache() {
        let room = room(Arc::new(MemoryEventStore::new()));
        room.join("a").await.unwrap();
        room.join("b").await.unwrap();
        room.publish("a", pen(0.1)).await.unwrap();

        assert!(!room.leave("a").await);
        assert_eq!(room.history_len().await, 1);
        assert!(room.leave("b").await);
        assert_eq!(room.history_len().await, 0);
        assert!(room.join("c").await.is_none());
        assert!(!room.leave("b").await);
    }

    struct BrokenStore;

    impl EventStore for BrokenStore {
        fn append(&self, _room: &str, _event: &WireEvent) -> BoxFuture<'_, StorageResult<()>> {
            Box::pin(async { Err(StorageError::Io("disk full".to_string())) })
        }

        fn load(&self, _room: &str) -> BoxFuture<'_, StorageResult<Vec<WireEvent>>> {
            Box::pin(async { Err(StorageError::Io("unreadable".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_block_relay() {
        let persistence = Persistence::start(Arc::new(BrokenStore));
        let room = Room::new("r", persistence.clone(), CHANNEL_CAPACITY);
        let (mut rx, history) = room.join("a").await.unwrap();
        assert!(history.is_empty());

        room.publish("b", pen(0.3)).await.unwrap();
        assert!(rx.recv().await.is_ok());
        persistence.flushed().await;
        assert_eq!(room.history_len().await, 1);
    }
}
