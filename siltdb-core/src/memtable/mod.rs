//! MemTable: the ordered index and its WAL under one lock
//!
//! Every mutation is appended (and fsynced) to the WAL before it is applied
//! to the index, while holding the write half of a single reader/writer lock.
//! Durable log order therefore matches the order in which changes become
//! visible to readers. The index, the WAL handle and the size counter live
//! behind the same lock and must not be split apart.

use crate::index::{OrderedIndex, RbTree};
use crate::record::RecordKind;
use crate::table::TableBuilder;
use crate::wal::Wal;
use crate::{Result, SiltError};
use parking_lot::RwLock;
use std::path::Path;
use tracing::info;

/// Write-path state guarded by the lock
struct State<I> {
    index: I,
    wal: Wal,
    size: u64,
}

/// In-memory sorted store absorbing writes ahead of a flush
///
/// Opened once, closed once; there is no reopen. Reads take the lock shared,
/// mutations take it exclusive. Blocking is only on the lock and on
/// synchronous file I/O; there is no async variant and no timeout.
pub struct MemTable<I: OrderedIndex = RbTree> {
    state: RwLock<State<I>>,
    threshold: u64,
}

impl MemTable<RbTree> {
    /// Open a memtable with the default flush threshold
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_threshold(path, crate::config::FLUSH_THRESHOLD)
    }
}

impl<I: OrderedIndex + Default> MemTable<I> {
    /// Open a memtable backed by the WAL at `path`
    ///
    /// A non-empty WAL is replayed into a fresh index before first use:
    /// ADD and PUT frames upsert, DEL frames delete, last writer wins.
    pub fn open_with_threshold(path: impl AsRef<Path>, threshold: u64) -> Result<Self> {
        let mut wal = Wal::open(path)?;
        let mut index = I::default();

        if wal.size() > 0 {
            let mut frames = 0usize;
            wal.replay(&mut |kind, key, value| {
                frames += 1;
                match kind {
                    RecordKind::Add | RecordKind::Put => {
                        index.put(key.to_vec(), value.to_vec());
                    }
                    RecordKind::Del => {
                        index.del(key);
                    }
                }
            })?;
            info!(
                "replayed {} frames ({} live entries) from {:?}",
                frames,
                index.len(),
                wal.path()
            );
        }

        let size = index.size();
        Ok(Self {
            state: RwLock::new(State { index, wal, size }),
            threshold,
        })
    }

    /// Insert or overwrite a key
    ///
    /// The WAL append happens first; if it fails the index is untouched.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        state.wal.append_put(key, value)?;
        state.index.put(key.to_vec(), value.to_vec());
        state.size = state.index.size();
        Ok(())
    }

    /// Get the value for a key
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.read();
        state
            .index
            .get(key)
            .map(|v| v.to_vec())
            .ok_or(SiltError::NotFound)
    }

    /// Check whether a key is present
    pub fn has(&self, key: &[u8]) -> bool {
        self.state.read().index.has(key)
    }

    /// Remove a key
    ///
    /// The delete is logged even when the key is absent, mirroring the wire
    /// history rather than the index state.
    pub fn del(&self, key: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        state.wal.append_del(key)?;
        state.index.del(key);
        state.size = state.index.size();
        Ok(())
    }

    /// Approximate byte size of the stored entries
    pub fn size(&self) -> u64 {
        self.state.read().size
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    /// Check if the memtable holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether the size has reached 90% of the flush threshold
    pub fn should_flush(&self) -> bool {
        self.state.read().size > self.threshold - self.threshold / 10
    }

    /// Write the current contents to a new immutable table and start a fresh
    /// generation
    ///
    /// The table is committed by rename after a sync; a failure before that
    /// point leaves the memtable exactly as it was. A crash between the
    /// rename and the WAL rotation can leave both the table and a non-empty
    /// WAL behind, double-applying entries on the next open; reconciling that
    /// window needs a manifest and is left to the surrounding system.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();

        let dir = state
            .wal
            .path()
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| SiltError::Path("write-ahead log has no parent directory".into()))?;
        let stamp = chrono::Utc::now().timestamp();
        let mut builder = TableBuilder::create(&dir, stamp)?;

        let mut write_err: Option<SiltError> = None;
        state.index.scan_front(&mut |entry| {
            match builder.add(&entry.key, &entry.value) {
                Ok(()) => true,
                Err(e) => {
                    write_err = Some(e);
                    false
                }
            }
        });
        if let Some(e) = write_err {
            return Err(e);
        }

        let written = builder.entry_count();
        let table = builder.finish()?;

        // the table is durable past this point; retire the current generation
        state.index.clear();
        state.wal.rotate()?;
        state.size = 0;

        info!("flushed {} entries to {:?}", written, table);
        Ok(())
    }

    /// Sync and close the WAL and release the index
    ///
    /// No further calls are valid afterwards; the memtable is consumed.
    pub fn close(self) -> Result<()> {
        let state = self.state.into_inner();
        state.wal.close()
    }
}
