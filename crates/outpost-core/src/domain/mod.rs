//! Domain model (ids, items, events, state, errors, persisted format).

pub mod errors;
pub mod events;
pub mod ids;
pub mod item;
pub mod snapshot;
pub mod state;

pub use self::errors::{ErrorKind, ExecutorError, QueueError, StoreError};
pub use self::events::{QueueEvent, QueueEventKind};
pub use self::ids::ItemId;
pub use self::item::{EnqueueOptions, Method, QueueItem};
pub use self::state::ItemState;
