//! Storage abstraction for room history persistence.
//!
//! A store holds, per room, the ordered list of stamped events the relay has
//! accepted. Order of `append` calls is the replay order.

mod file;
mod memory;

pub use file::FileEventStore;
pub use memory::MemoryEventStore;

use crate::sync::WireEvent;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Append-only per-room event log.
pub trait EventStore: Send + Sync {
    /// Append one stamped event to a room's log.
    fn append(&self, room: &str, event: &WireEvent) -> BoxFuture<'_, StorageResult<()>>;

    /// Every event stored for a room, in append order. Unknown rooms are empty.
    fn load(&self, room: &str) -> BoxFuture<'_, StorageResult<Vec<WireEvent>>>;
}

/// Open a store from a URL.
///
/// * `memory://` keeps everything in process memory.
/// * `file:///some/dir` writes one JSON-lines file per room under that directory.
pub fn open_storage(url: &str) -> StorageResult<Arc<dyn EventStore>> {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("memory://") {
        if !rest.is_empty() {
            log::debug!("Ignoring memory storage path {:?}", rest);
        }
        return Ok(Arc::new(MemoryEventStore::new()));
    }
    if let Some(path) = url.strip_prefix("file://") {
        if path.is_empty() {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }
        return Ok(Arc::new(FileEventStore::new(PathBuf::from(path))?));
    }
    Err(StorageError::InvalidUrl(url.to_string()))
}

/// Minimal executor for driving store futures in unit tests.
#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
