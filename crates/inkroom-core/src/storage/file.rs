//! File-based event store.

use super::{BoxFuture, EventStore, StorageError, StorageResult};
use crate::sync::WireEvent;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Stores each room as a JSON-lines file (`<room>.jsonl`), one frame per line.
///
/// File I/O runs on tokio's blocking pool, so the futures must be driven by a
/// tokio runtime.
pub struct FileEventStore {
    /// Base directory for room logs.
    base_path: PathBuf,
}

impl FileEventStore {
    /// Create a new file store with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Get the file path for a room.
    fn room_path(&self, room: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", encode_room(room)))
    }
}

/// Map a room name to a file stem, one-to-one.
///
/// ASCII letters, digits, `-` and `_` are kept; every other byte becomes `%XX`.
fn encode_room(room: &str) -> String {
    let mut stem = String::with_capacity(room.len());
    for byte in room.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            let _ = write!(stem, "%{:02X}", byte);
        }
    }
    stem
}

impl EventStore for FileEventStore {
    fn append(&self, room: &str, event: &WireEvent) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.room_path(room);
        let line = match event.to_json() {
            Ok(line) => line + "\n",
            Err(e) => {
                return Box::pin(async move { Err(StorageError::Serialization(e.to_string())) });
            }
        };

        Box::pin(async move {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| StorageError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
            file.flush()
                .await
                .map_err(|e| StorageError::Io(format!("Failed to flush {}: {}", path.display(), e)))
        })
    }

    fn load(&self, room: &str) -> BoxFuture<'_, StorageResult<Vec<WireEvent>>> {
        let path = self.room_path(room);

        Box::pin(async move {
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => {
                    return Err(StorageError::Io(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )));
                }
            };

            let mut events = Vec::new();
            for (number, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match WireEvent::from_json(line) {
                    Ok(event) => events.push(event),
                    Err(e) => log::warn!(
                        "Skipping bad record {}:{}: {}",
                        path.display(),
                        number + 1,
                        e
                    ),
                }
            }
            Ok(events)
        })
    }
}
