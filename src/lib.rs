//! # PDF Q&A
//!
//! Question answering over uploaded PDF documents.
//!
//! Uploaded PDFs are split into overlapping chunks, embedded, and stored in
//! a SQLite-backed vector index. Questions are answered by the retrieval
//! engine in [`pdf_qa_core`]: it classifies the question, prefers the most
//! recently uploaded document, escalates to the whole corpus when that
//! document does not cover the topic, and hands a bounded context to an
//! LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload  │──▶│ Extract+Chunk │──▶│  SQLite  │
//! │  (PDF)   │   │    +Embed     │   │ vectors  │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │
//!                              ┌─────────▼────────┐
//!                              │  SearchEngine    │
//!                              │ (pdf-qa-core)    │
//!                              └─────────┬────────┘
//!                        ┌───────────────┤
//!                        ▼               ▼
//!                  ┌──────────┐    ┌──────────┐
//!                  │   CLI    │    │   HTTP   │
//!                  │ (pdfqa)  │    │  (axum)  │
//!                  └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfqa init
//! pdfqa ingest report.pdf
//! pdfqa ask "what were the main findings?"
//! pdfqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_index`] | Vector index over SQLite |
//! | [`embedding`] | Embedding providers |
//! | [`extract`] | PDF validation and text extraction |
//! | [`ingest`] | Upload pipeline |
//! | [`search`] / [`ask`] / [`documents`] | Commands |
//! | [`generate`] | LLM answer generation |
//! | [`server`] | HTTP API |
//! | [`services`] | Service graph shared by CLI and server |

pub mod ask;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod retry;
pub mod search;
pub mod server;
pub mod services;
pub mod sqlite_index;
