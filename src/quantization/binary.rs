//! `BIN` quantization: sign-bit packing for any dimension.
//!
//! Bit ordering follows a `binary_semantic_cache`-style layout (Little-Endian
//! within each packed byte: bit 0 of byte 0 is dimension 0), generalized from
//! a fixed 768 dimensions to any `D` via [`bitvec`].
//!
//! # Algorithm
//!
//! For each dimension `i`: bit `i` is `1` if `vector[i] > 0.0`, else `0`.
//! Hamming distance between two packed vectors is an approximate proxy for
//! cosine distance (spec.md §4.A.1): the fraction of differing sign bits.

use bitvec::prelude::{BitVec, Lsb0};

use crate::metric::hamming_distance;

/// A sign-bit-packed vector of arbitrary dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct BinVector {
    bits: BitVec<u8, Lsb0>,
    dim: usize,
}

impl BinVector {
    /// Quantize `v` by sign.
    #[must_use]
    pub fn encode(v: &[f32]) -> Self {
        let mut bits = BitVec::<u8, Lsb0>::with_capacity(v.len());
        for &x in v {
            bits.push(x > 0.0);
        }
        Self { bits, dim: v.len() }
    }

    /// Reconstruct a `+1.0`/`-1.0` vector from the stored sign bits. This is
    /// lossy: magnitude information is not recoverable.
    #[must_use]
    pub fn decode(&self) -> Vec<f32> {
        self.bits.iter().map(|b| if *b { 1.0 } else { -1.0 }).collect()
    }

    /// Source dimension (number of sign bits).
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Packed byte storage, for Hamming distance against another `BinVector`.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// Approximate cosine distance proxy: fraction of differing sign bits,
    /// in `[0.0, 1.0]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn approx_distance(&self, other: &Self) -> f32 {
        debug_assert_eq!(self.dim, other.dim, "dimension mismatch: {} != {}", self.dim, other.dim);
        hamming_distance(self.as_bytes(), other.as_bytes()) as f32 / self.dim as f32
    }
}
