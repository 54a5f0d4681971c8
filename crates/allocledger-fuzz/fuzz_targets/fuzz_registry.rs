#![no_main]
use std::collections::HashMap;

use allocledger_core::{FaultyAllocator, LeakReporting, LedgerConfig, Registry};
use libfuzzer_sys::fuzz_target;

// Each 4-byte chunk is one operation: opcode, 16-bit size, slot selector.
fuzz_target!(|data: &[u8]| {
    let registry = Registry::with_config(
        FaultyAllocator::default(),
        LedgerConfig::default().with_leak_reporting(LeakReporting::On),
    );
    if registry.initialize().is_err() {
        return;
    }
    let mut shadow: HashMap<usize, usize> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let size = usize::from(u16::from_le_bytes([chunk[1], chunk[2]])) % 4096;
        let pick = usize::from(chunk[3]);

        match chunk[0] % 6 {
            0 | 1 => {
                let zeroed = chunk[0] & 0x80 != 0;
                match registry.insert(size, 1, zeroed) {
                    Some(p) => {
                        assert!(size > 0);
                        shadow.insert(p.as_ptr().addr(), size);
                        order.push(p.as_ptr().addr());
                    }
                    None => assert_eq!(size, 0),
                }
            }
            2 => {
                if order.is_empty() {
                    continue;
                }
                let addr = order.swap_remove(pick % order.len());
                assert!(registry.remove(std::ptr::with_exposed_provenance_mut(addr)));
                shadow.remove(&addr);
            }
            3 => {
                if order.is_empty() {
                    continue;
                }
                let idx = pick % order.len();
                let addr = order[idx];
                match registry.resize(std::ptr::with_exposed_provenance_mut(addr), size) {
                    Some(p) => {
                        shadow.remove(&addr);
                        shadow.insert(p.as_ptr().addr(), size);
                        order[idx] = p.as_ptr().addr();
                    }
                    None => assert_eq!(
                        registry.size_of(std::ptr::with_exposed_provenance(addr)),
                        shadow[&addr]
                    ),
                }
            }
            4 => {
                let foreign = [0_u8; 4];
                assert!(!registry.remove(foreign.as_ptr().cast_mut()));
            }
            _ => {
                if let Some(&addr) = order.get(pick % order.len().max(1)) {
                    assert_eq!(
                        registry.size_of(std::ptr::with_exposed_provenance(addr)),
                        shadow[&addr]
                    );
                }
            }
        }
        assert_eq!(registry.live_count(), shadow.len());
        assert!(registry.capacity() >= registry.live_count());
    }

    let report = registry.teardown();
    assert_eq!(report.released, shadow.len());
    assert_eq!(report.leaks.len(), shadow.len());
    assert_eq!(registry.heap().outstanding(), 0);
});
