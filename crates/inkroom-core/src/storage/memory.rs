//! In-memory event store.

use super::{BoxFuture, EventStore, StorageError, StorageResult};
use crate::sync::WireEvent;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral servers.
#[derive(Default)]
pub struct MemoryEventStore {
    rooms: RwLock<HashMap<String, Vec<WireEvent>>>,
}

impl MemoryEventStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn append(&self, room: &str, event: &WireEvent) -> BoxFuture<'_, StorageResult<()>> {
        let room = room.to_string();
        let event = event.clone();
        Box::pin(async move {
            let mut rooms = self
                .rooms
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            rooms.entry(room).or_default().push(event);
            Ok(())
        })
    }

    fn load(&self, room: &str) -> BoxFuture<'_, StorageResult<Vec<WireEvent>>> {
        let room = room.to_string();
        Box::pin(async move {
            let rooms = self
                .rooms
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(rooms.get(&room).cloned().unwrap_or_default())
        })
    }
}
