//! # vecindex
//!
//! An in-memory HNSW vector index with `F32`/`Q8`/`Bin` quantization and
//! optimistic-commit concurrency, plus an independent filter-expression
//! compiler.
//!
//! The two halves of this crate don't share types: [`hnsw`] is a
//! self-contained vector index, [`filter`] is a self-contained expression
//! compiler a caller can use to post-filter search results against their
//! own object model.
//!
//! ## Example
//!
//! ```rust
//! use vecindex::hnsw::{HnswConfig, HnswIndex, Quantization};
//!
//! let config = HnswConfig::new(4, Quantization::F32);
//! let index: HnswIndex<&str> = HnswIndex::new(config);
//!
//! index.insert(&[1.0, 0.0, 0.0, 0.0], "first", 1).expect("insert");
//! index.insert(&[0.0, 1.0, 0.0, 0.0], "second", 2).expect("insert");
//!
//! let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, None, None).expect("search");
//! assert_eq!(results[0].id, 1);
//! ```
//!
//! ## Filter example
//!
//! ```rust
//! use vecindex::filter::{compile, eval, Resolver, Value};
//!
//! struct NoFields;
//! impl Resolver for NoFields {
//!     fn resolve(&self, _path: &str) -> Option<Value> { None }
//! }
//!
//! let program = compile(".price < 500 and .in_stock").unwrap();
//! assert!(program.tokens().len() > 1);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

/// Filter expression lexer, compiler, and VM (spec.md §4.B).
pub mod filter;
/// In-memory HNSW vector index (spec.md §4.A).
pub mod hnsw;
/// Distance metrics shared by the index's vector storage.
pub mod metric;
/// Vector quantization (`Q8`, `Bin`).
pub mod quantization;

pub use filter::{compile, CompileError, EvalError, Program};
pub use hnsw::{HnswConfig, HnswIndex, IndexError, Quantization};

/// The crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
///
/// # Example
///
/// ```rust
/// let version = vecindex::version();
/// assert!(!version.is_empty());
/// ```
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
