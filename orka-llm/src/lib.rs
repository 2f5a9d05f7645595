//! Completion and embedding client traits consumed by the OrKa runtime.
//!
//! Concrete providers are explicitly out of scope for the core runtime:
//! nodes depend only on [`CompletionClient`] and [`Embedder`]. This crate
//! ships those traits, a thin Ollama-compatible reference client so the
//! contract is exercised end to end, and in-memory mocks for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod ollama;

pub use client::{CompletionClient, Embedder};
pub use config::HttpClientConfig;
pub use error::{LlmError, Result};
pub use mock::{MockCompletionClient, MockEmbedder};
pub use ollama::OllamaClient;
