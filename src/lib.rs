//! Embedding gateway — pluggable embedding providers and vector document
//! storage behind one HTTP API.
//!
//! vecgate manages a registry of loadable embedding providers (local ONNX
//! model, remote Ollama proxy) and forwards their vectors to a vector store
//! for document upsert and similarity queries. Callers address providers by a
//! deterministically derived model id; documents without an explicit
//! embedding get one synthesized through the store's default provider.
//!
//! # Architecture
//!
//! - **Providers**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//!   or a remote Ollama `/api/embeddings` proxy
//! - **Storage**: embedded SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for KNN queries, or an in-memory store for development
//! - **Transport**: plain HTTP (axum), including an Ollama-wire-compatible
//!   embedding endpoint
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`registry`] — Model id derivation and the provider lifecycle registry
//! - [`provider`] — The `EmbeddingProvider` contract and its implementations
//! - [`store`] — The `VectorStore` contract and its backends
//! - [`gateway`] — The orchestrator wiring registry, providers, and store together
//! - [`outcome`] — Error taxonomy and the uniform result carrier
//! - [`http`] — Router and request/response mapping

pub mod cli;
pub mod config;
pub mod gateway;
pub mod http;
pub mod outcome;
pub mod provider;
pub mod registry;
pub mod store;
