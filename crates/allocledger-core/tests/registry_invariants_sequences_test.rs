use std::collections::HashMap;

use allocledger_core::{
    DEFAULT_CAPACITY, FaultyAllocator, LeakReporting, LedgerConfig, Registry,
};

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

fn registry() -> Registry<FaultyAllocator> {
    let registry = Registry::with_config(
        FaultyAllocator::default(),
        LedgerConfig::default().with_leak_reporting(LeakReporting::Off),
    );
    registry.initialize().expect("initialize");
    registry
}

#[test]
fn deterministic_sequences_match_shadow_model() {
    // Deterministic, bounded invariant pressure against a HashMap shadow.
    const SEEDS: [u64; 4] = [1, 2, 3, 4];
    const STEPS: usize = 3_000;

    for seed in SEEDS {
        let registry = registry();
        let mut rng = XorShift64::new(seed);
        let mut shadow: HashMap<usize, usize> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();

        for step in 0..STEPS {
            let op = rng.gen_range_usize(0, 99);
            match op {
                // insert (biased so the table grows past several doublings)
                0..=49 => {
                    let len = rng.gen_range_usize(0, 64);
                    let elem = rng.gen_range_usize(1, 8);
                    let zeroed = rng.next_u64() & 1 == 0;
                    match registry.insert(len, elem, zeroed) {
                        Some(p) => {
                            assert_ne!(len * elem, 0, "seed={seed} step={step}");
                            let addr = p.as_ptr().addr();
                            assert!(
                                shadow.insert(addr, len * elem).is_none(),
                                "seed={seed} step={step}: duplicate live address"
                            );
                            order.push(addr);
                        }
                        None => assert_eq!(len * elem, 0, "seed={seed} step={step}"),
                    }
                }
                // resize
                50..=64 => {
                    if order.is_empty() {
                        continue;
                    }
                    let idx = rng.gen_range_usize(0, order.len() - 1);
                    let old = order[idx];
                    let new_len = rng.gen_range_usize(1, 256);
                    let moved = registry
                        .resize(std::ptr::with_exposed_provenance_mut(old), new_len)
                        .expect("resize of tracked block");
                    shadow.remove(&old);
                    shadow.insert(moved.as_ptr().addr(), new_len);
                    order[idx] = moved.as_ptr().addr();
                }
                // remove
                65..=94 => {
                    if order.is_empty() {
                        continue;
                    }
                    let idx = rng.gen_range_usize(0, order.len() - 1);
                    let addr = order.remove(idx);
                    assert!(
                        registry.remove(std::ptr::with_exposed_provenance_mut(addr)),
                        "seed={seed} step={step}: tracked remove must succeed"
                    );
                    shadow.remove(&addr);
                    assert_eq!(registry.size_of(std::ptr::with_exposed_provenance(addr)), 0);
                }
                // query
                _ => {
                    for (&addr, &size) in &shadow {
                        assert_eq!(
                            registry.size_of(std::ptr::with_exposed_provenance(addr)),
                            size,
                            "seed={seed} step={step}: size mismatch"
                        );
                    }
                }
            }

            let count = registry.live_count();
            let capacity = registry.capacity();
            assert_eq!(count, shadow.len(), "seed={seed} step={step}: count drift");
            assert!(count <= capacity, "seed={seed} step={step}: count > capacity");
            assert!(
                capacity >= DEFAULT_CAPACITY,
                "seed={seed} step={step}: capacity below floor"
            );
        }

        let expected_bytes: usize = shadow.values().sum();
        let report = registry.teardown();
        assert_eq!(report.released, shadow.len(), "seed={seed}");
        assert_eq!(report.released_bytes, expected_bytes, "seed={seed}");
        assert_eq!(registry.heap().outstanding(), 0, "seed={seed}: heap leak");
    }
}

#[test]
fn shrink_after_mass_removal_keeps_survivors() {
    let registry = registry();
    let ptrs: Vec<_> = (1..=65)
        .map(|i| registry.allocate(i).expect("insert"))
        .collect();
    assert_eq!(registry.capacity(), 128);

    // Keep the last ten.
    for p in &ptrs[..55] {
        assert!(registry.remove(p.as_ptr()));
    }
    assert_eq!(registry.live_count(), 10);
    assert_eq!(registry.capacity(), 128, "removal alone never resizes");

    let extra = registry.allocate(99).expect("insert");
    assert_eq!(registry.capacity(), 64);
    assert_eq!(registry.metrics().snapshot().table_shrinks, 1);

    for (i, p) in ptrs.iter().enumerate().skip(55) {
        assert_eq!(registry.size_of(p.as_ptr()), i + 1);
    }
    assert_eq!(registry.size_of(extra.as_ptr()), 99);

    // Drain to nothing; the table never goes below the floor.
    for p in ptrs[55..].iter().chain(std::iter::once(&extra)) {
        assert!(registry.remove(p.as_ptr()));
    }
    for _ in 0..4 {
        let p = registry.allocate(1).expect("insert");
        assert!(registry.capacity() >= DEFAULT_CAPACITY);
        assert!(registry.remove(p.as_ptr()));
    }
}

#[test]
fn teardown_then_reinitialize_forgets_everything() {
    let registry = registry();
    let ptrs: Vec<_> = (0..40)
        .map(|_| registry.allocate(16).expect("insert"))
        .collect();

    let report = registry.teardown();
    assert_eq!(report.released, 40);
    assert_eq!(report.released_bytes, 640);
    assert_eq!(registry.heap().outstanding(), 0);

    registry.initialize().expect("reinitialize");
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.capacity(), DEFAULT_CAPACITY);
    for p in &ptrs {
        assert_eq!(registry.size_of(p.as_ptr()), 0);
    }
}
