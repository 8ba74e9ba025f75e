//! Reader-slot table and epoch counter (spec.md §4.A.3, §5).
//!
//! Readers register in a fixed-size slot array before traversing the graph
//! and release on exit. A tombstoned node's payload is only handed to the
//! caller's disposer once every active slot has recorded an epoch newer
//! than the deletion's epoch, guaranteeing no in-flight reader can still be
//! looking at it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::hnsw::error::IndexError;

/// `u64::MAX` means the slot is free.
const FREE: u64 = u64::MAX;

/// Fixed-size table of reader epochs.
pub struct SlotTable {
    slots: Vec<AtomicU64>,
}

impl SlotTable {
    /// Create a table with `capacity` slots, all free.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { slots: (0..capacity).map(|_| AtomicU64::new(FREE)).collect() }
    }

    /// Claim the first free slot, recording `epoch`. `trace!`s on success.
    pub fn acquire(&self, epoch: u64) -> Result<usize, IndexError> {
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.compare_exchange(FREE, epoch, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                log::trace!("acquired read slot {i} at epoch {epoch}");
                return Ok(i);
            }
        }
        Err(IndexError::NoFreeReadSlot { capacity: self.slots.len() })
    }

    /// Release a slot acquired via [`Self::acquire`].
    pub fn release(&self, slot: usize) {
        if let Some(s) = self.slots.get(slot) {
            s.store(FREE, Ordering::Release);
        }
    }

    /// The smallest epoch recorded by any occupied slot, or `u64::MAX` if
    /// every slot is free (nothing is being read).
    #[must_use]
    pub fn min_active_epoch(&self) -> u64 {
        self.slots.iter().map(|s| s.load(Ordering::Acquire)).min().unwrap_or(FREE)
    }

    /// Number of slots in the table.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Global, monotonically increasing deletion epoch counter.
#[derive(Default)]
pub struct Epoch(AtomicU64);

impl Epoch {
    /// Current epoch value (number of deletions committed so far).
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Bump and return the new epoch, called once per tombstone.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_round_trips() {
        let table = SlotTable::new(2);
        let a = table.acquire(5).unwrap();
        let b = table.acquire(7).unwrap();
        assert_eq!(table.min_active_epoch(), 5);
        table.release(a);
        assert_eq!(table.min_active_epoch(), 7);
        table.release(b);
        assert_eq!(table.min_active_epoch(), u64::MAX);
    }

    #[test]
    fn exhausted_table_errors() {
        let table = SlotTable::new(1);
        let _slot = table.acquire(0).unwrap();
        assert!(matches!(table.acquire(1), Err(IndexError::NoFreeReadSlot { capacity: 1 })));
    }

    #[test]
    fn epoch_advances_monotonically() {
        let epoch = Epoch::default();
        assert_eq!(epoch.advance(), 1);
        assert_eq!(epoch.advance(), 2);
        assert_eq!(epoch.current(), 2);
    }
}
