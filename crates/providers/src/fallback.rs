//! Dialogue fallback chain.
//!
//! Entries get the same request in order until one answers. The whole chain
//! runs inside one time budget (the dialogue timeout): an entry with its own
//! configured timeout gets at most what is left of the budget, and an entry
//! without one gets an even share of the remainder. The answering entry's
//! name travels back in [`ProviderResponse::provider`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mindscope_core::error::ProviderError;
use mindscope_core::provider::*;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct FallbackProvider {
    name: String,
    budget: Duration,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    provider: Arc<dyn Provider>,
    /// `None` takes an even share of the remaining budget.
    timeout: Option<Duration>,
}

impl FallbackProvider {
    /// Create an empty chain that answers within `budget`.
    pub fn new(name: impl Into<String>, budget: Duration) -> Self {
        Self {
            name: name.into(),
            budget,
            chain: Vec::new(),
        }
    }

    /// Append a provider, optionally with its own attempt timeout.
    pub fn add(mut self, provider: Arc<dyn Provider>, timeout: Option<Duration>) -> Self {
        self.chain.push(FallbackEntry { provider, timeout });
        self
    }

    /// Names of the chain entries, in the order they are tried.
    pub fn entries(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.name()).collect()
    }

    fn attempt_timeout(&self, index: usize, remaining: Duration) -> Duration {
        match self.chain[index].timeout {
            Some(limit) => limit.min(remaining),
            None => remaining / (self.chain.len() - index) as u32,
        }
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let started = Instant::now();
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name();
            let remaining = self.budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!(
                    chain = %self.name,
                    skipped = self.chain.len() - i,
                    "Dialogue budget spent before the chain was exhausted"
                );
                break;
            }
            let limit = self.attempt_timeout(i, remaining);

            debug!(
                provider = %provider_name,
                attempt = i + 1,
                total = self.chain.len(),
                timeout_ms = limit.as_millis() as u64,
                "Trying dialogue provider"
            );

            match tokio::time::timeout(limit, entry.provider.complete(request.clone())).await {
                Ok(Ok(mut response)) => {
                    if i > 0 {
                        info!(provider = %provider_name, attempt = i + 1, "Fallback provider answered");
                    }
                    response.provider = provider_name.to_string();
                    return Ok(response);
                }
                Ok(Err(e)) => {
                    warn!(provider = %provider_name, error = %e, "Dialogue provider failed, trying next");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %provider_name,
                        timeout_ms = limit.as_millis() as u64,
                        "Dialogue provider timed out, trying next"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{provider_name}' timed out after {}ms",
                        limit.as_millis()
                    ));
                }
            }
        }

        Err(last_error)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        for entry in &self.chain {
            if let Ok(true) = entry.provider.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
