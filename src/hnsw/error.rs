use thiserror::Error;

/// Errors returned by [`crate::hnsw::graph::HnswIndex`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The query or inserted vector's length didn't match the index's
    /// configured dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality the index was configured with.
        expected: u32,
        /// Dimensionality of the offending vector.
        actual: u32,
    },

    /// `insert`/`try_commit_insert` was called with an `id` already present
    /// in the index.
    #[error("duplicate id: {id}")]
    DuplicateId {
        /// The id that was already present.
        id: u64,
    },

    /// A read operation (e.g. `search`) was attempted on an index with no
    /// live nodes.
    #[error("index is empty")]
    EmptyIndex,

    /// `delete_node`/lookup referenced a node id that isn't in the index.
    #[error("unknown id: {id}")]
    UnknownId {
        /// The id that could not be found.
        id: u64,
    },

    /// No free reader slot was available in the concurrency controller's
    /// fixed-size slot table.
    #[error("no free read slot available (capacity {capacity})")]
    NoFreeReadSlot {
        /// Configured slot table capacity.
        capacity: usize,
    },
}
