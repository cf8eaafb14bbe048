//! # PDF QA Core
//!
//! Retrieval and ranking engine for question answering over uploaded PDFs:
//! query classification, recency resolution, recency-aware multi-document
//! ranking, chunk selection, and the search strategy orchestrator that ties
//! them together.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network code.
//! Storage and embedding are reached through the [`index::VectorIndex`] and
//! [`embedding::Embedder`] traits, so callers inject real backends and tests
//! inject fakes.
//!
//! ```text
//! query → classify → resolve most recent → query index → rank → select
//!       → SearchResult
//! ```

pub mod chunk;
pub mod classify;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod ranking;
pub mod recency;
pub mod search;
pub mod select;

pub use error::{EmbedError, IndexError, SearchError};
pub use search::{SearchEngine, SearchParams};
