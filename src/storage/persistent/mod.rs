//! Durable measurement storage.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │        PersistentMeasurementStore         │
//! ├───────────────────────────────────────────┤
//! │  RwLock<MeasurementState>  (read index)   │
//! │  WriteAheadLog             (append-only)  │
//! │  DirectoryLock             (flock)        │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Mutations are appended to the log before they reach the index, and the
//! index is rebuilt from the log on open.

mod codec;
mod file_lock;
mod store;
mod wal;

pub use file_lock::{DirectoryLock, LOCK_FILE};
pub use store::{PersistentMeasurementStore, WAL_FILE};
pub use wal::{WalEntry, WalEntryKind, WriteAheadLog};
