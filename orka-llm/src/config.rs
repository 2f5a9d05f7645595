//! Connection configuration for the reference HTTP clients.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
