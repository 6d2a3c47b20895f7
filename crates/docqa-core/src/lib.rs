//! docqa-core
//!
//! Domain types, the error taxonomy, capability traits (`Embedder`,
//! `Generator`, `DocumentParser`, `Store`), configuration, date rules and the
//! chunker shared by every other crate in the workspace.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod dates;
pub mod error;
pub mod parser;
pub mod traits;
pub mod types;
