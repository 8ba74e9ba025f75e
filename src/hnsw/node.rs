//! Arena node storage (spec.md §3).
//!
//! Nodes live behind `Arc` inside the graph's arena `Vec` so a reader can
//! clone a handle out under a brief read lock and keep using it after the
//! lock is dropped (see `hnsw::graph::HnswIndex::node`). Every field a
//! concurrent writer might touch is individually interior-mutable; the
//! vector payload and caller value are immutable after construction except
//! for the one-time take at reclamation time.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Mutex, RwLock};

use crate::hnsw::vector::StoredVector;

/// Stable internal identity for a node, distinct from the caller's `u64`
/// id. Never reused within an index's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub u32);

/// Sentinel meaning "not tombstoned".
pub const NOT_DELETED: u64 = u64::MAX;

/// One arena slot. Always wrapped in `Arc<NodeSlot<V>>`.
pub struct NodeSlot<V> {
    /// Caller-supplied id.
    pub id: u64,
    /// Caller payload, taken (leaving `None`) only at reclamation time.
    pub value: Mutex<Option<V>>,
    /// Quantized or exact vector storage.
    pub vector: StoredVector,
    /// Cached norm of the decoded vector.
    pub norm: f32,
    /// Highest layer this node participates in.
    pub level: u8,
    /// Per-layer neighbor lists, `neighbors[l]` for layer `l <= level`.
    pub neighbors: Vec<RwLock<Vec<NodeIdx>>>,
    /// Bumped on every structural change to this node (neighbor relinking,
    /// tombstoning). Used by the optimistic commit protocol.
    pub version: AtomicU64,
    /// Set once, at delete time.
    pub tombstoned: AtomicBool,
    /// Epoch at which this node was tombstoned, or [`NOT_DELETED`].
    pub deletion_epoch: AtomicU64,
    /// Enumeration-list previous pointer (insertion order).
    pub enum_prev: Mutex<Option<NodeIdx>>,
    /// Enumeration-list next pointer (insertion order).
    pub enum_next: Mutex<Option<NodeIdx>>,
}

impl<V> NodeSlot<V> {
    pub(crate) fn new(id: u64, value: V, vector: StoredVector, norm: f32, level: u8) -> Self {
        let neighbors = (0..=level).map(|_| RwLock::new(Vec::new())).collect();
        Self {
            id,
            value: Mutex::new(Some(value)),
            vector,
            norm,
            level,
            neighbors,
            version: AtomicU64::new(0),
            tombstoned: AtomicBool::new(false),
            deletion_epoch: AtomicU64::new(NOT_DELETED),
            enum_prev: Mutex::new(None),
            enum_next: Mutex::new(None),
        }
    }

    pub(crate) fn is_tombstoned(&self) -> bool {
        self.tombstoned.load(std::sync::atomic::Ordering::Acquire)
    }
}
