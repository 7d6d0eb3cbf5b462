//! SiltDB Core - LSM Write-Path Storage Engine
//!
//! The write half of a log-structured-merge engine: one generation of
//! memtable + WAL + flush, the reusable unit the rest of an LSM engine is
//! built from.
//!
//! # Architecture
//!
//! - **WAL (Write-Ahead Log)**: every mutation is appended and fsynced before
//!   it is applied
//! - **Ordered index**: red-black tree keyed by length-then-lexicographic
//!   byte order
//! - **MemTable**: index + WAL behind one reader/writer lock
//! - **Immutable tables**: sorted flush output, committed by rename

pub mod index;
pub mod memtable;
pub mod record;
pub mod table;
pub mod wal;

mod error;
mod fsutil;

pub use error::{Result, SiltError};
pub use index::{compare_keys, Entry, OrderedIndex, RbTree};
pub use memtable::MemTable;
pub use record::RecordKind;
pub use wal::Wal;

/// SiltDB version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Default memtable flush threshold (64MB)
    pub const FLUSH_THRESHOLD: u64 = 64 * 1024 * 1024;
}
