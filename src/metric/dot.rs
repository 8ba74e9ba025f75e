//! Dot product, the kernel shared by cosine distance and `Q8` rescoring.

/// `sum(a_i * b_i)`.
#[inline]
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch: {} != {}", a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
