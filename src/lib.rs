//! # Ragline
//!
//! A local-first retrieval pipeline: turn plain-text documents into a
//! searchable vector index and answer natural-language queries by
//! retrieving relevant passages before generating a summarized answer.
//!
//! External extractors (PDF, CSV, web) hand the core plain text; the
//! core normalizes, chunks, embeds, and indexes it in SQLite, then
//! serves two retrieval strategies and assembles generation requests
//! for an external LLM endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ Extractors │──▶│ Normalize+Chunk+Embed │──▶│  SQLite  │
//! │ (external) │   │      (ingest)         │   │ vectors  │
//! └────────────┘   └──────────────────────┘   └────┬─────┘
//!                                                  │
//!                              ┌───────────────────┤
//!                              ▼                   ▼
//!                      ┌──────────────┐     ┌────────────┐
//!                      │  retrieval   │────▶│  assemble  │──▶ LLM
//!                      │ simple/complex│     │ + citations│
//!                      └──────────────┘     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag init                          # create database
//! rag ingest ./docs                 # chunk + embed + index plain text
//! rag query "deployment process"    # threshold retrieval
//! rag query "deployment" --strategy complex
//! rag ask "how do we deploy?"       # retrieve + summarize with citations
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Text normalization |
//! | [`chunk`] | Fixed-size overlapping chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | SQLite vector store |
//! | [`retrieve`] | The two retrieval strategies |
//! | [`session`] | Per-session query history |
//! | [`assemble`] | Answer assembly + generation service |
//! | [`ingest`] | Ingestion pipeline |
//! | [`db`] | Database connection and migrations |

pub mod assemble;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod retrieve;
pub mod session;
pub mod stats;
pub mod store;
