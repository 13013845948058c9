//! Per-conversation retrieval-augmented chat core.
//!
//! Documents are ingested into isolated per-conversation scopes,
//! chunked with overlap, embedded remotely, and indexed for cosine
//! similarity search. Chat requests retrieve the nearest passages,
//! optionally add web results, compose a sectioned prompt, and dispatch
//! it through a normalized multi-provider LLM gateway.
//!
//! Module map:
//!
//! - [`config`] — TOML configuration with defaults and validation
//! - [`error`] — the crate error taxonomy
//! - [`models`] — shared domain types (chunks, citations, metadata, turns)
//! - [`chunk`] — overlapping text splitter
//! - [`extract`] — document text extraction (PDF)
//! - [`embedding`] — remote embedding client behind the [`embedding::Embedder`] trait
//! - [`index`] — append-only in-memory vector index with JSON snapshots
//! - [`store`] — per-scope blob persistence (filesystem / in-memory)
//! - [`history`] — append-only conversation log
//! - [`engine`] — ingestion and retrieval orchestration with a bounded scope cache
//! - [`prompt`] — sectioned prompt composition
//! - [`provider`] — three-shape LLM provider gateway and registry
//! - [`websearch`] — optional Google Programmable Search grounding
//! - [`chat`] — end-to-end chat orchestration

pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod history;
pub mod index;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod websearch;

pub use error::{Error, Result};
