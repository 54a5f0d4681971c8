use std::sync::{Arc, Barrier};
use std::thread;

use allocledger_core::{FaultyAllocator, LeakReporting, LedgerConfig, Registry};

fn shared_registry() -> Arc<Registry<FaultyAllocator>> {
    let registry = Registry::with_config(
        FaultyAllocator::default(),
        LedgerConfig::default().with_leak_reporting(LeakReporting::Off),
    );
    registry.initialize().expect("initialize");
    Arc::new(registry)
}

#[test]
fn concurrent_inserts_are_not_lost() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let registry = shared_registry();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|i| {
                        let size = t * PER_THREAD + i + 1;
                        let p = registry.allocate(size).expect("insert");
                        (p.as_ptr().addr(), size)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut granted = Vec::with_capacity(THREADS * PER_THREAD);
    for handle in handles {
        granted.extend(handle.join().expect("worker panicked"));
    }

    assert_eq!(registry.live_count(), THREADS * PER_THREAD);
    for &(addr, size) in &granted {
        assert_eq!(
            registry.size_of(std::ptr::with_exposed_provenance(addr)),
            size,
            "address {addr:#x} lost or corrupted"
        );
    }

    let report = registry.teardown();
    assert_eq!(report.released, THREADS * PER_THREAD);
    assert_eq!(registry.heap().outstanding(), 0);
}

#[test]
fn concurrent_churn_keeps_table_consistent() {
    const THREADS: usize = 6;
    const ROUNDS: usize = 400;

    let registry = shared_registry();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut mine = Vec::new();
                for round in 0..ROUNDS {
                    let size = (t + 1) * 8 + round % 16;
                    let p = registry.allocate(size).expect("insert");
                    mine.push((p, size));
                    if round % 3 == 2 {
                        let (victim, _) = mine.remove(0);
                        assert!(registry.remove(victim.as_ptr()));
                    }
                    if round % 5 == 4 {
                        let (old, _) = mine.pop().expect("non-empty");
                        let grown = registry.resize(old.as_ptr(), 512).expect("resize");
                        mine.push((grown, 512));
                    }
                }
                mine.into_iter()
                    .map(|(p, size)| (p.as_ptr().addr(), size))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut survivors = Vec::new();
    for handle in handles {
        survivors.extend(handle.join().expect("worker panicked"));
    }

    assert_eq!(registry.live_count(), survivors.len());
    for &(addr, size) in &survivors {
        assert_eq!(registry.size_of(std::ptr::with_exposed_provenance(addr)), size);
    }
    assert!(registry.live_count() <= registry.capacity());
}
