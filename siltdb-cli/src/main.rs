//! SiltDB demonstration driver
//!
//! Seeds a memtable through its public write path (put/get/has) against a
//! WAL on disk. Run it twice at the same path to watch recovery replay the
//! log.

use clap::Parser;
use siltdb_core::MemTable;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// SiltDB write-path demo
#[derive(Parser, Debug)]
#[command(name = "siltdb-cli")]
#[command(about = "Demonstration driver for the SiltDB write path")]
struct Args {
    /// Write-ahead log path
    #[arg(short, long, default_value = "data/memtable.wal")]
    wal: PathBuf,

    /// Number of keys to seed
    #[arg(short, long, default_value_t = 10)]
    count: usize,

    /// Flush to an immutable table before closing
    #[arg(short, long)]
    flush: bool,
}

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("opening memtable at {:?}", args.wal);
    let mem = MemTable::open(&args.wal)?;
    if !mem.is_empty() {
        info!("recovered {} entries from a previous run", mem.len());
    }

    for i in 0..args.count {
        let key = format!("testkey-{i:06}");
        let val = format!("this is test value number {i}");
        mem.put(key.as_bytes(), val.as_bytes())?;
    }
    info!(
        "seeded {} keys, memtable holds {} entries ({} bytes)",
        args.count,
        mem.len(),
        mem.size()
    );

    for i in 0..args.count {
        let key = format!("testkey-{i:06}");
        anyhow::ensure!(mem.has(key.as_bytes()), "missing key {key}");
        let val = mem.get(key.as_bytes())?;
        info!("{} = {}", key, String::from_utf8_lossy(&val));
    }

    if args.flush {
        mem.flush()?;
        info!("flushed; memtable size is now {} bytes", mem.size());
    }

    mem.close()?;
    Ok(())
}
