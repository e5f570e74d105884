//! Provider router — selects the dialogue backend based on config.
//!
//! Builds one provider per configured entry, then wraps the default provider
//! and any `fallback_providers` into a [`FallbackProvider`] chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mindscope_config::AppConfig;
use mindscope_core::provider::Provider;
use tracing::{debug, warn};

use crate::fallback::FallbackProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes dialogue requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// The dialogue backends in the order they are tried: the default provider,
/// then each configured `fallback_providers` entry. Unknown names are skipped.
pub fn dialogue_chain(config: &AppConfig) -> Vec<Arc<dyn Provider>> {
    let router = build_from_config(config);
    let mut chain: Vec<Arc<dyn Provider>> = router.default().into_iter().collect();

    for name in &config.fallback_providers {
        match router.get(name) {
            Some(provider) => {
                debug!(provider = %name, "Adding fallback provider");
                chain.push(provider);
            }
            None => warn!(provider = %name, "Fallback provider is not configured, skipping"),
        }
    }
    chain
}

/// Resolve the provider the orchestrator should talk to.
///
/// A single backend is returned as is. Otherwise the backends are wrapped
/// in a [`FallbackProvider`] sharing the dialogue timeout as its budget.
pub fn dialogue_provider(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let mut chain = dialogue_chain(config);
    if chain.len() <= 1 {
        return chain.pop();
    }

    let budget = Duration::from_secs(config.dialogue.timeout_secs);
    let fallback = chain.into_iter().fold(
        FallbackProvider::new("dialogue", budget),
        |fallback, provider| {
            let timeout = config
                .providers
                .get(provider.name())
                .and_then(|p| p.timeout_secs)
                .map(Duration::from_secs);
            fallback.add(provider, timeout)
        },
    );
    debug!(entries = ?fallback.entries(), budget_secs = budget.as_secs(), "Built dialogue fallback chain");
    Some(Arc::new(fallback))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
