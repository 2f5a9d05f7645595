//! Lazily-initializing registry of shared resources, named by string key
//! (§4, "Registry" row; grounded on the original's `ResourceRegistry`).
//!
//! A resource is anything a node needs a shared, long-lived handle to: the
//! memory store, an embedder, an LLM client, a custom tool. Each is
//! registered with a factory closure; the first `get::<T>("name")` call
//! runs the factory and caches the result, subsequent calls return the
//! cached `Arc` without re-running it.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{CoreError, Result};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type Factory = Box<dyn Fn() -> BoxFuture<Arc<dyn Any + Send + Sync>> + Send + Sync>;

#[derive(Default)]
struct Inner {
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
    factories: HashMap<String, Factory>,
}

/// Process-scoped resource registry. Cheap to clone (an `Arc` around a
/// mutex-guarded map); intended to be constructed once per process and
/// shared across the orchestrator, its nodes, and the decay sweeper.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lazy factory under `name`. Registering twice under the
    /// same name replaces the factory (and drops any previously cached
    /// instance so the next `get` re-initializes).
    pub async fn register<T, F, Fut>(&self, name: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let name = name.into();
        let boxed: Factory = Box::new(move || {
            let fut = factory();
            Box::pin(async move {
                let value: Arc<dyn Any + Send + Sync> = Arc::new(fut.await);
                value
            })
        });
        let mut inner = self.inner.lock().await;
        inner.resources.remove(&name);
        inner.factories.insert(name, boxed);
    }

    /// Register an already-constructed resource — used for resources the
    /// caller wants eager (e.g. injecting a fake store in tests).
    pub async fn register_value<T>(&self, name: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        let mut inner = self.inner.lock().await;
        inner.resources.insert(name.into(), Arc::new(value));
    }

    /// Resolve a resource by name, running its factory on first access.
    pub async fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.resources.get(name) {
            return existing
                .clone()
                .downcast::<T>()
                .map_err(|_| CoreError::ResourceUnavailable(format!("type mismatch for '{name}'")));
        }

        let factory = inner
            .factories
            .get(name)
            .ok_or_else(|| CoreError::ResourceUnavailable(name.to_string()))?;
        let built = (factory)().await;
        inner.resources.insert(name.to_string(), built.clone());
        built
            .downcast::<T>()
            .map_err(|_| CoreError::ResourceUnavailable(format!("type mismatch for '{name}'")))
    }

    pub async fn contains(&self, name: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.resources.contains_key(name) || inner.factories.contains_key(name)
    }

    /// Drop all cached resources, forcing re-initialization on next `get`.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.resources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lazy_factory_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();

        let calls2 = calls.clone();
        registry
            .register("counter", move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    42u32
                }
            })
            .await;

        let a = registry.get::<u32>("counter").await.unwrap();
        let b = registry.get::<u32>("counter").await.unwrap();
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_resource_errors() {
        let registry = Registry::new();
        let result = registry.get::<u32>("nope").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn register_value_is_eager() {
        let registry = Registry::new();
        registry.register_value("name", "handle".to_string()).await;
        assert!(registry.contains("name").await);
        let v = registry.get::<String>("name").await.unwrap();
        assert_eq!(*v, "handle");
    }
}
