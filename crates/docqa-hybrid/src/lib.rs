//! docqa-hybrid
//!
//! Ties the vector and keyword/date indexes together: query classification,
//! score fusion, the thread-safe [`Database`] with batch ingestion, and
//! snapshot persistence.

pub mod classify;
pub mod database;
pub mod ranker;
pub mod snapshot;
pub mod store;

pub use classify::classify;
pub use database::{Database, IngestFailure, IngestReport, Retrieval, RetrievedChunk, SearchOutcome};
pub use ranker::{FusionWeights, HybridRanker};
pub use store::FileStore;
