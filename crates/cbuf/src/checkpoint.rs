//! Snapshot-and-verify drain detection.
//!
//! A producer that has released everything it reserved wants to know "has
//! the consumer drained past where I stood, regardless of what other
//! producers do afterward and regardless of counter wraparound?" The trick is
//! to snapshot not an absolute position but a *distance*: how far the
//! consumer still has to travel. Re-measuring that distance later, with
//! wrapping unsigned subtraction, is correct under wraparound as long as the
//! buffer fits inside the counter width — which the 64-bit widening here
//! guarantees for any ring this crate can construct.

use crate::ring::Ring;

/// A producer-side drain token, returned by value.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    c0: u64,
    d: u64,
}

impl Checkpoint {
    /// Captures the current "actual consumer" position and the distance the
    /// consumer must still travel to reach the current "actual producer"
    /// position.
    ///
    /// Caller contract: call this only after releasing everything you intend
    /// to wait for.
    #[must_use]
    pub fn snapshot(ring: &Ring) -> Self {
        let c0 = actual_consumer(ring);
        let actual_producer = actual_producer(ring);
        Self {
            c0,
            d: actual_producer.wrapping_sub(c0),
        }
    }

    /// Returns true once the consumer has drained at least as far as the
    /// producer stood at snapshot time.
    ///
    /// Lock-free and idempotent: call it as many times as you like. If the
    /// consumer never drains, this never returns true — callers that need a
    /// timeout must supervise the call themselves.
    #[must_use]
    pub fn verify(&self, ring: &Ring) -> bool {
        let c1 = actual_consumer(ring);
        c1.wrapping_sub(self.c0) >= self.d
    }
}

/// The furthest byte the consumer has fully drained: `snd_pos + sz_unused`,
/// widened to 64 bits before adding so the arithmetic never wraps within the
/// width used for comparisons.
fn actual_consumer(ring: &Ring) -> u64 {
    u64::from(ring.snd_pos_raw()) + ring.sz_unused_raw().max(0) as u64
}

/// The furthest byte the producer has fully committed (reserved, released,
/// and migrated): `rcv_pos + sz_ready`.
fn actual_producer(ring: &Ring) -> u64 {
    u64::from(ring.rcv_pos_raw()) + ring.sz_ready_raw().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn verify_true_once_consumer_drains() {
        let ring = Ring::new(Config::new(64, 8, false)).unwrap();
        let res = ring.reserve_tx(4).unwrap();
        res.commit();

        let checkpoint = Checkpoint::snapshot(&ring);
        assert!(!checkpoint.verify(&ring), "nothing drained yet");

        let rx = ring.reserve_rx(4).unwrap();
        rx.commit();

        assert!(checkpoint.verify(&ring));
    }

    #[test]
    fn verify_survives_further_producer_activity() {
        let ring = Ring::new(Config::new(64, 8, false)).unwrap();
        let first = ring.reserve_tx(2).unwrap();
        first.commit();
        let checkpoint = Checkpoint::snapshot(&ring);

        // More production after the snapshot shouldn't raise the bar.
        let second = ring.reserve_tx(2).unwrap();
        second.commit();

        let rx_first = ring.reserve_rx(2).unwrap();
        rx_first.commit();
        assert!(checkpoint.verify(&ring));
    }

    #[test]
    fn verify_false_until_fully_drained() {
        let ring = Ring::new(Config::new(64, 4, false)).unwrap();
        let res = ring.reserve_tx(4).unwrap();
        res.commit();
        let checkpoint = Checkpoint::snapshot(&ring);

        let rx = ring.reserve_rx(3).unwrap();
        rx.commit();
        assert!(!checkpoint.verify(&ring));

        let rx2 = ring.reserve_rx(1).unwrap();
        rx2.commit();
        assert!(checkpoint.verify(&ring));
    }
}
