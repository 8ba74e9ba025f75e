use serde::{Deserialize, Serialize};

use crate::metric::DistanceMetric;

/// Vector storage/quantization mode for an index (spec.md §3, §4.A.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantization {
    /// Exact `f32` storage, no compression.
    F32,
    /// Per-vector max-abs scalar quantization to signed bytes.
    Q8,
    /// Sign-bit packing.
    Bin,
}

/// HNSW algorithm parameters.
///
/// # Parameter guidelines (from the original paper)
/// - `m`: 12-48 for high recall, 4-8 for speed.
/// - `ef_construction`: higher means better build quality, slower build.
/// - `ef_search`: higher means better recall, slower search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max connections per node in layers above 0. Typical: 16.
    pub m: u32,
    /// Construction-time candidate list size. Typical: 200.
    pub ef_construction: u32,
    /// Search-time candidate list size. Typical: 50.
    pub ef_search: u32,
    /// Vector dimensionality.
    pub dimensions: u32,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Vector storage/quantization mode.
    pub quantization: Quantization,
    /// Highest layer a node may be sampled into.
    pub max_level: u8,
}

impl HnswConfig {
    /// Creates a default configuration for the given dimensionality and
    /// quantization mode: `m = 16`, `ef_construction = 200`, `ef_search =
    /// 50`, cosine metric, `max_level = 16`.
    #[must_use]
    pub fn new(dimensions: u32, quantization: Quantization) -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            dimensions,
            metric: DistanceMetric::Cosine,
            quantization,
            max_level: 16,
        }
    }

    /// Builder-style override of `ef_search`.
    #[must_use]
    pub fn with_ef_search(mut self, ef_search: u32) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Builder-style override of `ef_construction`.
    #[must_use]
    pub fn with_ef_construction(mut self, ef_construction: u32) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    /// Builder-style override of `m`.
    #[must_use]
    pub fn with_m(mut self, m: u32) -> Self {
        self.m = m;
        self
    }

    /// Builder-style override of the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Neighbor cap for a given layer: `2*m` at layer 0, `m` above it.
    #[must_use]
    pub fn neighbor_cap(&self, layer: u8) -> usize {
        if layer == 0 {
            (self.m * 2) as usize
        } else {
            self.m as usize
        }
    }

    /// `1 / ln(m)`, the level-sampling multiplier.
    #[must_use]
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}
