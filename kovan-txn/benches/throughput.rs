//! Throughput benchmarks for kovan-txn

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kovan_txn::{
    Config, KeyStore, LocalTimestampOracle, Percolator, TimestampOracle, TxnKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

fn bench_keystore_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("keystore");
    let oracle = Arc::new(LocalTimestampOracle::new());
    let store = KeyStore::new(oracle.clone());
    let none = BTreeSet::new();

    group.bench_function("prewrite_commit", |b| {
        b.iter(|| {
            let start_ts = oracle.get_timestamp();
            store.prewrite_optimistic("hot", start_ts, "hot", &none);
            black_box(store.commit("hot", start_ts, oracle.get_timestamp()));
        });
    });

    group.bench_function("prewrite_rollback", |b| {
        b.iter(|| {
            let start_ts = oracle.get_timestamp();
            store.prewrite_optimistic("gc", start_ts, "gc", &none);
            black_box(store.rollback("gc", start_ts));
        });
    });

    group.finish();
}

fn bench_engine_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_commit");
    let db = Percolator::with_config(Config::new().with_workers(4));
    let next = AtomicU64::new(0);

    for (name, kind) in [
        ("optimistic", TxnKind::Optimistic),
        ("pessimistic", TxnKind::Pessimistic),
    ] {
        for width in [1usize, 4].iter() {
            group.throughput(Throughput::Elements(*width as u64));
            group.bench_with_input(BenchmarkId::new(name, width), width, |b, &width| {
                b.iter(|| {
                    let id = next.fetch_add(1, Ordering::Relaxed);
                    let mut txn = db.begin(kind);
                    for k in 0..width {
                        txn.write(format!("{id}/{k}"));
                    }
                    black_box(txn.commit().unwrap());
                });
            });
        }
    }

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    let db = Arc::new(Percolator::with_config(Config::new().with_workers(8)));

    for threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("hot_keys", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let db = db.clone();
                            thread::spawn(move || {
                                for i in 0..20 {
                                    let mut txn = db.begin(TxnKind::Pessimistic);
                                    txn.write(format!("hot{}", (t + i) % 4));
                                    txn.write(format!("hot{}", (t + i + 1) % 4));
                                    let _ = black_box(txn.commit());
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keystore_commit,
    bench_engine_commit,
    bench_contended
);
criterion_main!(benches);
