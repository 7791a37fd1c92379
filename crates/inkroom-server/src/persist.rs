//! Background persistence of accepted events.
//!
//! One writer drains a queue of stamped events into the store in acceptance
//! order. Rooms never wait on storage while publishing; a room that needs to
//! read its history back first waits for the queue to drain.

use inkroom_core::storage::{EventStore, StorageResult};
use inkroom_core::sync::WireEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

struct Job {
    room: String,
    event: WireEvent,
}

pub struct Persistence {
    storage: Arc<dyn EventStore>,
    queue: mpsc::UnboundedSender<Job>,
    /// Jobs handed to the writer so far.
    queued: AtomicU64,
    /// Jobs the writer has finished, successfully or not.
    written: watch::Receiver<u64>,
}

impl Persistence {
    /// Start the writer task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(storage: Arc<dyn EventStore>) -> Arc<Self> {
        let (queue, jobs) = mpsc::unbounded_channel();
        let (done, written) = watch::channel(0);
        tokio::spawn(write_events(storage.clone(), jobs, done));
        Arc::new(Self {
            storage,
            queue,
            queued: AtomicU64::new(0),
            written,
        })
    }

    /// Queue an event for storage. Never blocks.
    pub fn enqueue(&self, room: &str, event: WireEvent) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            room: room.to_string(),
            event,
        };
        if self.queue.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            error!(room, "persistence writer stopped, event not stored");
        }
    }

    /// Wait until everything queued before this call has been written.
    pub async fn flushed(&self) {
        let target = self.queued.load(Ordering::SeqCst);
        let mut written = self.written.clone();
        if written.wait_for(|&n| n >= target).await.is_err() {
            debug!("persistence writer gone, not waiting");
        }
    }

    /// Read a room's stored history once pending writes have landed.
    pub async fn load(&self, room: &str) -> StorageResult<Vec<WireEvent>> {
        self.flushed().await;
        self.storage.load(room).await
    }
}

/// Drain the queue in order. Failures are logged, not retried.
async fn write_events(
    storage: Arc<dyn EventStore>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    done: watch::Sender<u64>,
) {
    while let Some(Job { room, event }) = jobs.recv().await {
        if let Err(e) = storage.append(&room, &event).await {
            error!(room = %room, channel = %event.channel(), error = %e, "failed to persist event");
        }
        done.send_modify(|n| *n += 1);
    }
    debug!("persistence writer finished");
}
