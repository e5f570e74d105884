//! Per-session dialogue handles.
//!
//! Providers are stateless, so a handle keeps the session's conversation and
//! replays it on every send. A directive only joins the history once the
//! backend has answered it; a failed send leaves the history untouched.

use std::time::Duration;

use mindscope_config::AppConfig;
use mindscope_core::error::ProviderError;
use mindscope_core::message::{Conversation, Message};
use mindscope_core::provider::{Provider, ProviderRequest};
use tracing::{debug, info};

/// Model parameters shared by every dialogue call.
#[derive(Debug, Clone)]
pub struct DialogueSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    /// Most recent messages replayed per call; 0 replays everything.
    pub max_history_messages: usize,
}

impl DialogueSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        Self {
            model,
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            timeout: Duration::from_secs(config.dialogue.timeout_secs),
            max_history_messages: config.dialogue.max_history_messages,
        }
    }
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The backend's answer to one directive.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueAnswer {
    pub text: String,
    /// Backend that answered; a chain entry name when fallbacks are configured.
    pub provider: String,
}

/// A session's stateful conversation with the dialogue backend.
#[derive(Debug)]
pub struct DialogueHandle {
    session_id: String,
    history: Conversation,
}

impl DialogueHandle {
    pub fn new(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        info!(session_id = %session_id, "Started new dialogue");
        Self {
            session_id,
            history: Conversation::new(),
        }
    }

    /// Send a directive and return the backend's answer.
    ///
    /// The replayed window always starts on a directive, so a limit that
    /// would split an exchange drops the whole exchange.
    pub async fn send(
        &mut self,
        provider: &dyn Provider,
        settings: &DialogueSettings,
        directive: &str,
    ) -> Result<DialogueAnswer, ProviderError> {
        self.history.push(Message::user(directive));

        let skip = match settings.max_history_messages {
            0 => 0,
            limit => {
                let skip = self.history.len().saturating_sub(limit);
                skip + skip % 2
            }
        };
        let request = ProviderRequest {
            model: settings.model.clone(),
            messages: self.history.messages[skip..].to_vec(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };

        debug!(
            session_id = %self.session_id,
            provider = provider.name(),
            messages = request.messages.len(),
            "Continuing dialogue"
        );

        let result = match tokio::time::timeout(settings.timeout, provider.complete(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Dialogue call timed out after {}s",
                settings.timeout.as_secs()
            ))),
        };

        match result {
            Ok(response) => {
                let answer = DialogueAnswer {
                    text: response.message.content.clone(),
                    provider: response.provider,
                };
                self.history.push(response.message);
                Ok(answer)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// Number of completed exchanges.
    pub fn exchanges(&self) -> usize {
        self.history.len() / 2
    }

    /// Tear the dialogue down, discarding its history.
    pub fn close(self) {
        info!(
            session_id = %self.session_id,
            exchanges = self.exchanges(),
            "Closed dialogue"
        );
    }
}
