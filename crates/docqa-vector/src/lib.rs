//! docqa-vector
//!
//! Exact cosine-similarity index over chunk embeddings. Scores are mapped
//! from `[-1, 1]` to `[0, 1]` so they can be fused with keyword scores.

pub mod index;

pub use index::{VectorHit, VectorIndex, VectorSnapshot};
