//! Traits the runtime core depends on. Deliberately minimal: the core
//! never needs to know which provider it is talking to, only that it can
//! get a completion and, optionally, stream one chunk at a time.

use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;

/// A single-shot text completion client.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Stream a completion chunk by chunk. The default implementation
    /// falls back to a single-chunk stream built from [`complete`], so
    /// implementors only need to override this when the provider has a
    /// real streaming endpoint.
    async fn stream_complete(&self, prompt: &str) -> Result<ReceiverStream<String>> {
        let text = self.complete(prompt).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx.send(text).await;
        Ok(ReceiverStream::new(rx))
    }
}

/// An embedding client: turns text into a fixed-length vector for
/// similarity search in the memory store.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}
