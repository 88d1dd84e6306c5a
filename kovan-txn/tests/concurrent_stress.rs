use kovan_txn::{Config, Percolator, TxnError, TxnKind};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::thread;

const KEYS: [&str; 6] = ["k0", "k1", "k2", "k3", "k4", "k5"];

/// Random transactions over a small hot key set. Which transactions win is
/// left to the scheduler; only the safety properties are asserted.
fn run_random(db: Arc<Percolator>, threads: usize, txns_per_thread: usize) -> (usize, usize) {
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let (mut committed, mut aborted) = (0, 0);
                for _ in 0..txns_per_thread {
                    let kind = if rng.gen_bool(0.5) {
                        TxnKind::Optimistic
                    } else {
                        TxnKind::Pessimistic
                    };
                    let width = rng.gen_range(1..=3);
                    let mut txn = db.begin(kind);
                    for key in KEYS.choose_multiple(&mut rng, width) {
                        txn.write(*key);
                    }
                    match txn.commit() {
                        Ok(_) => committed += 1,
                        Err(TxnError::Aborted { .. }) => aborted += 1,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                    if rng.gen_bool(0.2) {
                        let key = KEYS[rng.gen_range(0..KEYS.len())];
                        let _ = db.read(key);
                    }
                }
                (committed, aborted)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .fold((0, 0), |acc, (c, a)| (acc.0 + c, acc.1 + a))
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_random_transactions_preserve_invariants() {
    let db = Arc::new(Percolator::with_config(Config::new().with_workers(8)));
    let (committed, aborted) = run_random(db.clone(), 4, 50);
    assert_eq!(committed + aborted, 200);

    db.wait_idle();
    db.check_invariants().unwrap();
    assert_eq!(db.outcomes().committed().len(), committed);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_random_transactions_with_duplicate_delivery() {
    let config = Config::new()
        .with_workers(8)
        .with_duplicate_probability(0.3);
    let db = Arc::new(Percolator::with_config(config));
    let (committed, aborted) = run_random(db.clone(), 4, 50);
    assert_eq!(committed + aborted, 200);

    db.wait_idle();
    db.check_invariants().unwrap();
    // Duplicated commits still yield one decision per transaction.
    assert_eq!(db.outcomes().committed().len(), committed);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_disjoint_keys_all_commit() {
    let db = Arc::new(Percolator::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let mut txn = db.begin(if i % 2 == 0 {
                        TxnKind::Optimistic
                    } else {
                        TxnKind::Pessimistic
                    });
                    txn.write(format!("t{t}_{i}_a")).write(format!("t{t}_{i}_b"));
                    txn.commit().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    db.wait_idle();
    db.check_invariants().unwrap();
    assert_eq!(db.outcomes().committed().len(), 200);
    for t in 0..4 {
        for i in 0..50 {
            assert!(db.read(&format!("t{t}_{i}_b")).unwrap().is_some());
        }
    }
}
