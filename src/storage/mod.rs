//! Measurement storage backends.
//!
//! [`MeasurementStore`] is the contract; [`InMemoryMeasurementStore`] is the
//! default backend and, with the `persistent` feature,
//! [`persistent::PersistentMeasurementStore`] adds a write-ahead log.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryMeasurementStore;
pub(crate) use memory::lock_err;
pub use traits::{MeasurementStore, StorageError};
