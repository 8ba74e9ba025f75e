//! `Q8` scalar quantization: per-vector max-abs normalization to signed bytes.

use serde::{Deserialize, Serialize};

/// A vector quantized to signed 8-bit codes with a per-vector scale.
///
/// # Algorithm
///
/// `scale = max(|v_i|) / 127`, `code_i = round(v_i / scale)` clamped to
/// `[-127, 127]`. Decoding is `v_i ≈ scale * code_i` (spec.md §4.A.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Q8Vector {
    scale: f32,
    codes: Vec<i8>,
}

impl Q8Vector {
    /// Quantize `v` to `Q8`. A zero vector yields `scale = 0.0` and all-zero
    /// codes; decoding such a vector always returns zeros.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(v: &[f32]) -> Self {
        let max_abs = v.iter().fold(0.0_f32, |acc, x| acc.max(x.abs()));
        if max_abs <= f32::EPSILON {
            return Self { scale: 0.0, codes: vec![0; v.len()] };
        }
        let scale = max_abs / 127.0;
        let codes = v
            .iter()
            .map(|x| (x / scale).round().clamp(-127.0, 127.0) as i8)
            .collect();
        Self { scale, codes }
    }

    /// Reconstruct an approximate `f32` vector.
    #[must_use]
    pub fn decode(&self) -> Vec<f32> {
        self.codes.iter().map(|&q| self.scale * f32::from(q)).collect()
    }

    /// Number of quantized components.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.codes.len()
    }

    /// Per-vector scale factor used to reconstruct components.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Raw signed codes.
    #[must_use]
    pub fn codes(&self) -> &[i8] {
        &self.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_stays_close_to_original() {
        let v = vec![0.5, -1.0, 3.25, -0.1, 0.0];
        let q = Q8Vector::encode(&v);
        let d = q.decode();
        for (orig, dec) in v.iter().zip(d.iter()) {
            assert!((orig - dec).abs() < 0.05, "{orig} vs {dec}");
        }
    }

    #[test]
    fn max_component_maps_to_127() {
        let v = vec![2.0, -4.0, 1.0];
        let q = Q8Vector::encode(&v);
        assert_eq!(q.codes()[1], -127);
    }

    #[test]
    fn zero_vector_is_safe() {
        let v = vec![0.0; 8];
        let q = Q8Vector::encode(&v);
        assert_eq!(q.scale(), 0.0);
        assert_eq!(q.decode(), v);
    }
}
