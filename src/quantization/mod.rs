//! Vector quantization for memory-efficient storage (spec.md §4.A.1).
//!
//! - [`scalar::Q8Vector`]: per-vector max-abs scalar quantization to signed
//!   bytes, 4x compression.
//! - [`binary::BinVector`]: sign-bit packing, any dimension, 32x compression.

/// Sign-bit (`BIN`) quantization.
pub mod binary;

/// Scalar (`Q8`) quantization.
pub mod scalar;

pub use binary::BinVector;
pub use scalar::Q8Vector;
