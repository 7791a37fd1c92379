//! Shared application state.

use crate::config::{ChannelSet, ServerConfig};
use crate::persist::Persistence;
use crate::room::{CHANNEL_CAPACITY, RelayFrame, Room};
use dashmap::DashMap;
use inkroom_core::storage::EventStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// Rooms with at least one peer, or about to get one.
    rooms: DashMap<String, Arc<Room>>,
    persistence: Arc<Persistence>,
    channel_capacity: usize,
    pub channels: ChannelSet,
    pub default_room: String,
}

impl AppState {
    /// Must be called inside a tokio runtime.
    pub fn new(storage: Arc<dyn EventStore>, channels: ChannelSet, default_room: String) -> Self {
        Self {
            rooms: DashMap::new(),
            persistence: Persistence::start(storage),
            channel_capacity: CHANNEL_CAPACITY,
            channels,
            default_room,
        }
    }

    pub fn from_config(config: &ServerConfig, storage: Arc<dyn EventStore>) -> Self {
        Self::new(storage, config.channels.clone(), config.default_room.clone())
            .with_channel_capacity(config.channel_capacity)
    }

    /// Set how many live frames a slow peer may fall behind before it is dropped.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Get or create a room.
    pub fn room(&self, name: &str) -> Arc<Room> {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Room::new(
                    name,
                    self.persistence.clone(),
                    self.channel_capacity,
                ))
            })
            .clone()
    }

    /// Join a room, replacing it first if it closed under us.
    pub async fn join(
        &self,
        name: &str,
        peer: &str,
    ) -> (Arc<Room>, broadcast::Receiver<RelayFrame>, Vec<String>) {
        loop {
            let room = self.room(name);
            if let Some((rx, history)) = room.join(peer).await {
                return (room, rx, history);
            }
            self.evict(&room);
        }
    }

    /// Leave a room; the last peer out evicts it.
    pub async fn leave(&self, room: &Arc<Room>, peer: &str) {
        if room.leave(peer).await {
            self.evict(room);
            debug!(room = %room.name(), "room evicted");
        }
    }

    fn evict(&self, room: &Arc<Room>) {
        self.rooms
            .remove_if(room.name(), |_, current| Arc::ptr_eq(current, room));
    }
}
