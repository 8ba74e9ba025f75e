//! Vector storage and distance computation (spec.md §4.A.1).
//!
//! [`StoredVector`] is the `F32`/`Q8`/`Bin` union a node's vector is held as.
//! Distance is always computed against the caller's exact `f32` query: for
//! quantized storage the stored vector is dequantized first, trading a
//! little accuracy for the memory savings.

use crate::hnsw::config::Quantization;
use crate::metric::{cosine_distance, l2_squared, norm, DistanceMetric};
use crate::quantization::{BinVector, Q8Vector};

/// `F32`, `Q8`, or `Bin`-encoded storage for one vector, plus its cached
/// norm (meaningful for `F32`/`Q8` under cosine distance; `Bin` distance
/// never needs it).
#[derive(Clone, Debug)]
pub enum StoredVector {
    /// Exact storage.
    F32(Vec<f32>),
    /// Scalar-quantized storage.
    Q8(Q8Vector),
    /// Sign-bit-quantized storage.
    Bin(BinVector),
}

impl StoredVector {
    /// Encode `v` per `mode`.
    #[must_use]
    pub fn encode(v: &[f32], mode: Quantization) -> Self {
        match mode {
            Quantization::F32 => Self::F32(v.to_vec()),
            Quantization::Q8 => Self::Q8(Q8Vector::encode(v)),
            Quantization::Bin => Self::Bin(BinVector::encode(v)),
        }
    }

    /// Reconstruct an (approximate, for `Q8`/`Bin`) `f32` vector.
    #[must_use]
    pub fn decode(&self) -> Vec<f32> {
        match self {
            Self::F32(v) => v.clone(),
            Self::Q8(q) => q.decode(),
            Self::Bin(b) => b.decode(),
        }
    }

    /// `||v||`, used to cache a node's norm for cosine distance.
    #[must_use]
    pub fn norm(&self) -> f32 {
        match self {
            Self::F32(v) => norm(v),
            Self::Q8(q) => norm(&q.decode()),
            Self::Bin(_) => 0.0,
        }
    }

    /// Distance between an exact `f32` query and this stored vector.
    ///
    /// `Bin` storage always uses the Hamming-fraction proxy regardless of
    /// `metric`, since binary codes carry no usable magnitude information.
    #[must_use]
    pub fn distance(&self, query: &[f32], query_norm: f32, metric: DistanceMetric) -> f32 {
        match self {
            Self::Bin(b) => {
                let q = BinVector::encode(query);
                b.approx_distance(&q)
            }
            other => {
                let decoded = other.decode();
                match metric {
                    DistanceMetric::Cosine => {
                        cosine_distance(query, &decoded, query_norm, other.norm())
                    }
                    DistanceMetric::L2Squared => l2_squared(query, &decoded),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_roundtrips_exactly() {
        let v = vec![1.0, 2.0, 3.0];
        let sv = StoredVector::encode(&v, Quantization::F32);
        assert_eq!(sv.decode(), v);
    }

    #[test]
    fn q8_distance_to_self_is_near_zero() {
        let v = vec![1.0, -2.0, 3.0, 0.5];
        let sv = StoredVector::encode(&v, Quantization::Q8);
        let qn = norm(&v);
        let d = sv.distance(&v, qn, DistanceMetric::Cosine);
        assert!(d < 0.01, "distance was {d}");
    }

    #[test]
    fn bin_distance_to_self_is_zero() {
        let v = vec![1.0, -2.0, 3.0, -0.5];
        let sv = StoredVector::encode(&v, Quantization::Bin);
        let d = sv.distance(&v, norm(&v), DistanceMetric::Cosine);
        assert_eq!(d, 0.0);
    }
}
