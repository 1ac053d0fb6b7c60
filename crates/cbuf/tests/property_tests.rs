//! Property-based tests for the six-counter reservation/release state
//! machine: one `proptest!` block per invariant, driving the public `Ring`
//! API only, since these are integration tests and can't reach the crate's
//! private counters directly — each property is rephrased as an
//! externally-observable consequence of the same invariant.

use cbuf_rs::{Config, Ring};
use proptest::prelude::*;

// =============================================================================
// Property 1: conservation of bytes.
// Externally observable as: after a full reserve-then-drain round trip, the
// ring's producer pool holds exactly `block_count` blocks again — no bytes
// were created or lost along the way.
// =============================================================================

proptest! {
    #[test]
    fn prop_full_round_trip_restores_capacity(block_count in 1u32..32) {
        let ring = Ring::new(Config::new(32, block_count, false)).unwrap();
        let cap = ring.block_count();

        let tx = ring.reserve_tx(cap).unwrap();
        prop_assert!(ring.reserve_tx(1).is_none(), "pool should be fully drained");
        tx.commit();

        let rx = ring.reserve_rx(cap).unwrap();
        prop_assert!(ring.reserve_rx(1).is_none());
        rx.commit();

        // Capacity round-tripped back to the producer pool.
        let again = ring.reserve_tx(cap);
        prop_assert!(again.is_some(), "full capacity should be reservable again after a full drain");
    }
}

// =============================================================================
// Property 2: counters are bounded multiples of block_size.
// Externally observable as: reserve_cap never grants more than requested,
// never grants more than the ring's total capacity, and only ever grants
// whole blocks.
// =============================================================================

proptest! {
    #[test]
    fn prop_reserve_cap_is_bounded(
        block_count in 1u32..16,
        request in 0u32..64,
    ) {
        let ring = Ring::new(Config::new(16, block_count, false)).unwrap();
        let cap = ring.block_count();

        match ring.reserve_tx_cap(request) {
            Some(res) => {
                prop_assert!(res.len() as u32 <= request);
                prop_assert!(res.len() as u32 <= cap);
                prop_assert!(res.len() > 0);
                res.commit();
            }
            None => prop_assert!(request == 0 || cap == 0),
        }
    }
}

// =============================================================================
// Property 4: block addresses from one reservation are pairwise
// disjoint and fall entirely within the buffer span.
// =============================================================================

proptest! {
    #[test]
    fn prop_reservation_blocks_are_disjoint_and_in_span(
        block_count in 1u32..16,
        take in 1u32..16,
    ) {
        let ring = Ring::new(Config::new(16, block_count, false)).unwrap();
        let n = take.min(ring.block_count());
        let Some(res) = ring.reserve_tx(n) else { return Ok(()); };

        let mut offsets = Vec::new();
        for i in 0..res.len() as u32 {
            let off = ring.offset(res.pos(), i);
            prop_assert!(off + ring.block_size() <= ring.total_bytes());
            offsets.push(off);
        }
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), offsets.len(), "block offsets must be pairwise disjoint");
        res.commit();
    }
}

// =============================================================================
// Property 3 (small-scale): the multiset of values written by the
// producer equals the multiset read by the consumer.
// =============================================================================

proptest! {
    #[test]
    fn prop_values_round_trip_unchanged(values in prop::collection::vec(0u8..=255, 1..64)) {
        let block_count = (values.len() as u32).next_power_of_two();
        let ring = Ring::new(Config::new(8, block_count, false)).unwrap();

        let mut res = ring.reserve_tx(values.len() as u32).unwrap();
        for (i, v) in values.iter().enumerate() {
            res.block_mut(i)[0] = *v;
        }
        res.commit();

        let rx = ring.reserve_rx(values.len() as u32).unwrap();
        let mut got: Vec<u8> = (0..values.len()).map(|i| rx.block(i)[0]).collect();
        rx.commit();

        let mut expected = values.clone();
        expected.sort_unstable();
        got.sort_unstable();
        prop_assert_eq!(expected, got);
    }
}
