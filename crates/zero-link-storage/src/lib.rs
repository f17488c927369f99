//! # zero-link-storage
//!
//! Storage abstraction layer for zero-link using RocksDB.
//!
//! Besides plain get/put/delete and atomic write batches, the storage
//! exposes two compare-style primitives the OAuth engine relies on:
//! [`Storage::take`] (read-and-delete exactly once) and
//! [`Storage::put_if_absent`].

#![warn(clippy::all)]

pub mod column_families;
pub mod errors;
pub mod rocksdb_impl;
pub mod traits;

pub use column_families::*;
pub use errors::{Result, StorageError};
pub use rocksdb_impl::RocksDbStorage;
pub use traits::{Batch, BatchExt, Storage};
