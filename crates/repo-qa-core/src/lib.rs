//! # Repo QA Core
//!
//! Shared, WASM-safe logic for Repo QA: the overlapping chunker, the
//! embedding trait, the in-memory vector index, repository ingestion, and
//! the retrieval-augmented answer engine.
//!
//! This crate contains no tokio, HTTP clients, filesystem I/O, or other
//! native-only dependencies. Everything that talks to the outside world
//! (file trees, embedding models, generative models) is reached through
//! the traits in [`ingest`], [`embedding`], and [`answer`], which the
//! `repo-qa` application crate implements.
//!
//! ## Data Flow
//!
//! ```text
//! FileTreeProvider ──▶ chunk ──▶ Embedder ──▶ VectorIndex
//!                                                 │
//!           question ──▶ Embedder ──▶ query ◀─────┘
//!                                       │
//!                                       ▼
//!                              prompt ──▶ Generator ──▶ Answer
//! ```
//!
//! A [`session::RepoSession`] owns one index and drives both phases.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod ingest;
pub mod models;
pub mod session;
pub mod store;
