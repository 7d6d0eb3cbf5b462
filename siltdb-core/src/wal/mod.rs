//! Write-Ahead Log (WAL) implementation
//!
//! An append-only sequence of record frames backed by one file. Every append
//! is fsynced before it returns, so a successful append survives a crash.
//! On startup the file can be replayed sequentially to rebuild the in-memory
//! state; a torn frame at the tail (crash mid-append) ends replay at the last
//! complete frame instead of failing startup.

use crate::fsutil;
use crate::record::{self, RecordKind};
use crate::{Result, SiltError};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append-only durable log of record frames
pub struct Wal {
    file: fs::File,
    path: PathBuf,
    size: u64,
}

impl Wal {
    /// Open the log at `path`, creating it (and missing parent directories)
    /// if absent
    ///
    /// `size()` afterwards reports the existing on-disk bytes, so the caller
    /// knows whether replay is needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (file, path) = fsutil::open_or_create(path.as_ref())?;
        let size = file.metadata()?.len();
        Ok(Self { file, path, size })
    }

    /// Resolved path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently in the log
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append an insert frame
    pub fn append_add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(RecordKind::Add, key, value)
    }

    /// Append an update frame
    pub fn append_put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(RecordKind::Put, key, value)
    }

    /// Append a delete frame
    pub fn append_del(&mut self, key: &[u8]) -> Result<()> {
        self.append(RecordKind::Del, key, &[])
    }

    fn append(&mut self, kind: RecordKind, key: &[u8], value: &[u8]) -> Result<()> {
        let frame = record::encode(kind, key, value);
        self.file.write_all(&frame)?;
        // the durability boundary: a successful append survives a crash
        self.file.sync_data()?;
        self.size += frame.len() as u64;
        Ok(())
    }

    /// Decode the log from the start, invoking `visit` for each frame
    ///
    /// A truncated frame at the tail is logged and ignored; the log is valid
    /// up to the last complete frame. Any other decode failure is fatal.
    pub fn replay(&mut self, visit: &mut dyn FnMut(RecordKind, &[u8], &[u8])) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut data = Vec::with_capacity(self.size as usize);
        self.file.read_to_end(&mut data)?;

        let mut offset = 0;
        while offset < data.len() {
            match record::decode(&data[offset..]) {
                Ok((frame, consumed)) => {
                    visit(frame.kind, frame.key, frame.value);
                    offset += consumed;
                }
                Err(SiltError::TruncatedRecord { .. }) => {
                    warn!(
                        "torn record at offset {} in {:?}, ignoring tail",
                        offset, self.path
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Retire the current file and start an empty log at the same path
    pub fn rotate(&mut self) -> Result<()> {
        self.file.sync_all()?;
        fs::remove_file(&self.path)?;
        let (file, _) = fsutil::open_or_create(&self.path)?;
        self.file = file;
        self.size = 0;
        Ok(())
    }

    /// Sync and close the log
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn collect(wal: &mut Wal) -> Vec<(RecordKind, Vec<u8>, Vec<u8>)> {
        let mut frames = Vec::new();
        wal.replay(&mut |kind, key, value| {
            frames.push((kind, key.to_vec(), value.to_vec()));
        })
        .unwrap();
        frames
    }

    #[test]
    fn test_append_replay() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wal.log");

        let mut wal = Wal::open(&path).unwrap();
        assert_eq!(wal.size(), 0);
        wal.append_add(b"one", b"1").unwrap();
        wal.append_put(b"two", b"22").unwrap();
        wal.append_del(b"one").unwrap();

        let frames = collect(&mut wal);
        assert_eq!(
            frames,
            vec![
                (RecordKind::Add, b"one".to_vec(), b"1".to_vec()),
                (RecordKind::Put, b"two".to_vec(), b"22".to_vec()),
                (RecordKind::Del, b"one".to_vec(), Vec::new()),
            ]
        );
    }

    #[test]
    fn test_size_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wal.log");

        let written = {
            let mut wal = Wal::open(&path).unwrap();
            wal.append_put(b"key", b"value").unwrap();
            let size = wal.size();
            wal.close().unwrap();
            size
        };
        assert!(written > 0);

        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.size(), written);
    }

    #[test]
    fn test_replay_tolerates_torn_tail() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wal.log");

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append_put(b"alpha", b"1").unwrap();
            wal.append_put(b"beta", b"2").unwrap();
            wal.close().unwrap();
        }

        // simulate a crash mid-append: a complete header, half the payload
        let torn = record::encode(RecordKind::Put, b"gamma", b"3");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&torn[..torn.len() - 3]).unwrap();
        drop(file);

        let mut wal = Wal::open(&path).unwrap();
        let frames = collect(&mut wal);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].1, b"beta");
    }

    #[test]
    fn test_replay_twice() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wal.log");

        let mut wal = Wal::open(&path).unwrap();
        wal.append_put(b"key", b"value").unwrap();
        assert_eq!(collect(&mut wal).len(), 1);
        assert_eq!(collect(&mut wal).len(), 1);
    }

    #[test]
    fn test_append_after_replay_goes_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wal.log");

        let mut wal = Wal::open(&path).unwrap();
        wal.append_put(b"first", b"1").unwrap();
        let _ = collect(&mut wal);
        wal.append_put(b"second", b"2").unwrap();

        let frames = collect(&mut wal);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].1, b"second");
    }

    #[test]
    fn test_rotate_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wal.log");

        let mut wal = Wal::open(&path).unwrap();
        wal.append_put(b"key", b"value").unwrap();
        wal.rotate().unwrap();
        assert_eq!(wal.size(), 0);
        assert!(collect(&mut wal).is_empty());

        // the fresh log is writable at the same path
        wal.append_put(b"later", b"entry").unwrap();
        assert_eq!(collect(&mut wal).len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), wal.size());
    }
}
