//! The HNSW index: arena, entry point, and concurrency state
//! (spec.md §3, §4.A, §5).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::concurrency::{Epoch, SlotTable};
use super::config::HnswConfig;
use super::error::IndexError;
use super::node::{NodeIdx, NodeSlot};
use super::vector::StoredVector;

/// Default reader-slot table capacity, generous enough for the recall
/// self-test's parallel brute-force half plus ordinary concurrent readers.
pub const DEFAULT_SLOT_CAPACITY: usize = 256;

/// An in-memory HNSW vector index, generic over a caller payload `V`
/// carried alongside each vector and handed back to a disposer on delete.
pub struct HnswIndex<V> {
    pub(crate) config: HnswConfig,
    pub(crate) nodes: RwLock<Vec<Arc<NodeSlot<V>>>>,
    pub(crate) id_index: RwLock<HashMap<u64, NodeIdx>>,
    pub(crate) entry: RwLock<Option<NodeIdx>>,
    pub(crate) enum_head: Mutex<Option<NodeIdx>>,
    pub(crate) enum_tail: Mutex<Option<NodeIdx>>,
    pub(crate) write_lock: Mutex<()>,
    pub(crate) slots: SlotTable,
    pub(crate) epoch: Epoch,
    pub(crate) pending_free: Mutex<VecDeque<(NodeIdx, u64)>>,
    pub(crate) rng: Mutex<ChaCha8Rng>,
    node_count: AtomicU64,
}

impl<V> HnswIndex<V> {
    /// Create an empty index, seeding level sampling from OS entropy.
    #[must_use]
    pub fn new(config: HnswConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Create an empty index with a deterministic RNG seed, for
    /// reproducible tests.
    #[must_use]
    pub fn with_seed(config: HnswConfig, seed: u64) -> Self {
        Self {
            config,
            nodes: RwLock::new(Vec::new()),
            id_index: RwLock::new(HashMap::new()),
            entry: RwLock::new(None),
            enum_head: Mutex::new(None),
            enum_tail: Mutex::new(None),
            write_lock: Mutex::new(()),
            slots: SlotTable::new(DEFAULT_SLOT_CAPACITY),
            epoch: Epoch::default(),
            pending_free: Mutex::new(VecDeque::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            node_count: AtomicU64::new(0),
        }
    }

    /// Configuration this index was built with.
    #[must_use]
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Number of live (non-tombstoned) nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.node_count.load(Ordering::Acquire) as usize
    }

    /// Whether the index has no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone out an `Arc` handle to a node, behind a brief arena read lock.
    pub(crate) fn node(&self, idx: NodeIdx) -> Arc<NodeSlot<V>> {
        Arc::clone(&self.nodes.read().unwrap()[idx.0 as usize])
    }

    pub(crate) fn node_count(&self) -> &AtomicU64 {
        &self.node_count
    }

    /// Arena identity for a caller id, if present (regardless of
    /// tombstone state — callers that need liveness should also check
    /// `is_tombstoned`).
    #[must_use]
    pub fn id_to_idx(&self, id: u64) -> Option<NodeIdx> {
        self.id_index.read().unwrap().get(&id).copied()
    }

    pub(crate) fn validate_dims(&self, v: &[f32]) -> Result<(), IndexError> {
        if v.len() as u32 != self.config.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: v.len() as u32,
            });
        }
        Ok(())
    }

    /// Register a reader. Must be paired with [`Self::release_read_slot`].
    pub fn acquire_read_slot(&self) -> Result<usize, IndexError> {
        self.slots.acquire(self.epoch.current())
    }

    /// Release a slot acquired via [`Self::acquire_read_slot`].
    pub fn release_read_slot(&self, slot: usize) {
        self.slots.release(slot);
    }

    pub(crate) fn encode_and_link_new_slot(
        &self,
        id: u64,
        value: V,
        vector: StoredVector,
        norm: f32,
        level: u8,
    ) -> NodeIdx {
        let slot = Arc::new(NodeSlot::new(id, value, vector, norm, level));
        let mut nodes = self.nodes.write().unwrap();
        let idx = NodeIdx(nodes.len() as u32);
        nodes.push(slot);
        drop(nodes);

        let mut tail = self.enum_tail.lock().unwrap();
        if let Some(prev_tail) = *tail {
            *self.node(prev_tail).enum_next.lock().unwrap() = Some(idx);
            *self.node(idx).enum_prev.lock().unwrap() = Some(prev_tail);
        } else {
            *self.enum_head.lock().unwrap() = Some(idx);
        }
        *tail = Some(idx);
        drop(tail);

        self.id_index.write().unwrap().insert(id, idx);
        self.node_count.fetch_add(1, Ordering::AcqRel);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::super::config::Quantization;
    use super::*;

    fn cfg() -> HnswConfig {
        HnswConfig::new(4, Quantization::F32)
    }

    #[test]
    fn new_index_is_empty() {
        let idx: HnswIndex<()> = HnswIndex::new(cfg());
        assert!(idx.is_empty());
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let idx: HnswIndex<()> = HnswIndex::new(cfg());
        assert!(idx.validate_dims(&[1.0, 2.0]).is_err());
        assert!(idx.validate_dims(&[1.0, 2.0, 3.0, 4.0]).is_ok());
    }
}
