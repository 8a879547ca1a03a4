//! # Repo QA
//!
//! Ask natural-language questions about a source repository and get
//! concise answers with file references.
//!
//! Each question runs one retrieval-augmented cycle: walk the repository,
//! chunk and embed every text file, retrieve the chunks nearest to the
//! question, and hand them to a generative model. The pipeline itself
//! lives in [`repo_qa_core`]; this crate supplies the concrete
//! collaborators and the two front ends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ File trees   │──▶│  RepoSession  │──▶│  Generators  │
//! │ GitHub/Local │   │ chunk+embed+k │   │ Gemini/OpenAI│
//! └──────────────┘   └───────┬───────┘   │ /Ollama      │
//!                            │           └──────────────┘
//!                  ┌─────────┴─────────┐
//!                  ▼                   ▼
//!             ┌──────────┐       ┌──────────┐
//!             │   CLI    │       │   HTTP   │
//!             │  (rqa)   │       │  server  │
//!             └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=... GEMINI_API_KEY=...
//! rqa ingest octo/hello                       # what would be indexed
//! rqa ask octo/hello "where is the entry point?"
//! rqa ask ./my-checkout "how is config loaded?" --source local
//! rqa serve                                   # POST /api/repo-qa
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | OpenAI, Ollama, fastembed and hashing embedders |
//! | [`generation`] | Gemini, OpenAI and Ollama generators |
//! | [`connector_github`] | GitHub contents API file tree |
//! | [`connector_fs`] | Local directory file tree |
//! | [`qa`] | Per-request ingest-then-answer orchestration |
//! | [`server`] | HTTP server |

pub mod config;
pub mod connector_fs;
pub mod connector_github;
pub mod embedding;
pub mod generation;
pub mod qa;
pub mod server;
