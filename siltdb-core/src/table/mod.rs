//! Immutable table files produced by memtable flushes
//!
//! A table holds every index entry at flush time, serialized as ADD-tagged
//! record frames in ascending key order. The file is written once and never
//! mutated afterwards; readers and compaction belong to the surrounding
//! system.

use crate::record::{self, RecordKind};
use crate::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name for a table flushed at `stamp` (unix seconds)
pub fn table_file_name(stamp: i64) -> String {
    format!("dat-{stamp}.sst")
}

/// Writes one immutable table file
///
/// Entries must be added in ascending key order. Frames accumulate in a
/// temporary file; `finish` syncs it and renames it into place, so a crash
/// mid-write leaves no partially visible table.
pub struct TableBuilder {
    writer: BufWriter<File>,
    tmp_path: PathBuf,
    path: PathBuf,
    entry_count: usize,
}

impl TableBuilder {
    /// Start a table under `dir` named from `stamp`
    pub fn create(dir: &Path, stamp: i64) -> Result<Self> {
        let path = dir.join(table_file_name(stamp));
        let tmp_path = path.with_extension("sst.tmp");
        let file = File::create(&tmp_path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            tmp_path,
            path,
            entry_count: 0,
        })
    }

    /// Append one entry as an ADD frame
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writer
            .write_all(&record::encode(RecordKind::Add, key, value))?;
        self.entry_count += 1;
        Ok(())
    }

    /// Entries written so far
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Sync and commit the table; the rename is the commit point
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        fs::rename(&self.tmp_path, &self.path)?;
        Ok(self.path)
    }
}
