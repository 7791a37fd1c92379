//! InkRoom Core Library
//!
//! Shape model, local interaction state machine, wire protocol and storage for
//! shared InkRoom drawing boards. Rendering and windowing live with the host.

pub mod canvas;
pub mod collaboration;
pub mod input;
pub mod render;
pub mod session;
pub mod shapes;
pub mod storage;
pub mod sync;
pub mod tools;
pub mod viewport;

pub use canvas::CanvasState;
pub use collaboration::SyncClient;
pub use input::{PointerEvent, Throttle};
pub use render::{DisplayList, DrawCommand, Renderer};
pub use session::{ClientSession, REDRAW_INTERVAL};
pub use shapes::{Annotation, Shape, ShapeKind, Stroke};
pub use storage::{EventStore, StorageError, StorageResult, open_storage};
pub use sync::{Channel, ConnectionState, NativeWebSocket, SyncError, SyncEvent, Transport, WireEvent};
pub use tools::{Action, ToolKind, ToolManager};
pub use viewport::Viewport;
