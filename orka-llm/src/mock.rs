//! In-memory [`CompletionClient`]/[`Embedder`] implementations for tests
//! and for workflows that want a deterministic stand-in.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{CompletionClient, Embedder};
use crate::error::Result;

/// Returns a fixed response, or echoes the prompt back if none was
/// configured. Records every prompt it was called with so tests can
/// assert on what the node actually sent.
pub struct MockCompletionClient {
    response: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockCompletionClient {
    pub fn echo() -> Self {
        Self {
            response: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.lock().await.push(prompt.to_string());
        Ok(self.response.clone().unwrap_or_else(|| prompt.to_string()))
    }
}

/// Deterministic embedder: hashes the text into a fixed-size vector.
/// Not semantically meaningful, only useful for exercising cosine
/// similarity and ranking code paths in tests without a real model.
pub struct MockEmbedder {
    dims: usize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            let slot = i % self.dims;
            vec[slot] += (byte as f32) / 255.0;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vec)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_client_returns_prompt() {
        let client = MockCompletionClient::echo();
        let out = client.complete("hello").await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(client.calls().await, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn fixed_client_ignores_prompt_content() {
        let client = MockCompletionClient::fixed("canned");
        assert_eq!(client.complete("anything").await.unwrap(), "canned");
    }

    #[tokio::test]
    async fn mock_embedder_produces_unit_vector_of_requested_size() {
        let embedder = MockEmbedder::new(8);
        let vec = embedder.embed("some text").await.unwrap();
        assert_eq!(vec.len(), 8);
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(4);
        let a = embedder.embed("repeatable").await.unwrap();
        let b = embedder.embed("repeatable").await.unwrap();
        assert_eq!(a, b);
    }
}
