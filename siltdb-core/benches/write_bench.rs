use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use siltdb_core::MemTable;
use tempfile::tempdir;

const N: usize = 1_000;
const VAL_SIZE: usize = 100;

fn key(i: usize) -> Vec<u8> {
    format!("key-{i:06}").into_bytes()
}

fn memtable_put(c: &mut Criterion) {
    c.bench_function("memtable_put_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mem = MemTable::open(dir.path().join("memtable.wal")).unwrap();
                (dir, mem)
            },
            |(_dir, mem)| {
                for i in 0..N {
                    mem.put(&key(i), &vec![b'x'; VAL_SIZE]).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn memtable_get(c: &mut Criterion) {
    c.bench_function("memtable_get_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mem = MemTable::open(dir.path().join("memtable.wal")).unwrap();
                for i in 0..N {
                    mem.put(&key(i), &vec![b'x'; VAL_SIZE]).unwrap();
                }
                let mut order: Vec<usize> = (0..N).collect();
                order.shuffle(&mut rand::rngs::StdRng::seed_from_u64(7));
                (dir, mem, order)
            },
            |(_dir, mem, order)| {
                for &i in &order {
                    mem.get(&key(i)).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn memtable_recovery(c: &mut Criterion) {
    c.bench_function("memtable_recovery_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("memtable.wal");
                {
                    let mem = MemTable::open(&path).unwrap();
                    for i in 0..N {
                        mem.put(&key(i), &vec![b'x'; VAL_SIZE]).unwrap();
                    }
                    mem.close().unwrap();
                }
                (dir, path)
            },
            |(_dir, path)| {
                let mem = MemTable::open(&path).unwrap();
                assert_eq!(mem.len(), N);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, memtable_put, memtable_get, memtable_recovery);
criterion_main!(benches);
