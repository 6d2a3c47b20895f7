//! docqa-embed
//!
//! `Embedder` implementations: BGE-M3 via candle, and a hashing embedder for
//! tests and machines without the model files.

use anyhow::Result;
use std::sync::Arc;

use docqa_core::traits::Embedder;

mod device;
mod hash;
mod model;
mod pool;
mod tokenize;

pub use hash::HashEmbedder;
pub use model::{resolve_model_dir, BgeM3Embedder, DEFAULT_MAX_LEN};
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// BGE-M3 output dimension.
pub const BGE_M3_DIM: usize = 1024;

/// BGE-M3 unless `APP_USE_FAKE_EMBEDDINGS` is `1`/`true`, in which case a
/// [`HashEmbedder`] of the same dimension.
pub fn get_default_embedder() -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        tracing::info!("using hashing embedder");
        return Ok(Arc::new(HashEmbedder::new(BGE_M3_DIM)));
    }
    Ok(Arc::new(BgeM3Embedder::new()?))
}
