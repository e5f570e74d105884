pub mod analyze;
pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod status;

use mindscope_config::AppConfig;
use mindscope_engine::{Adapters, TurnPipeline};

/// Build the turn pipeline for CLI commands.
///
/// No modality adapters ship with the CLI, so every turn fuses to neutral
/// unless records are supplied pre-classified.
pub(crate) fn build_pipeline(config: &AppConfig) -> Result<TurnPipeline, Box<dyn std::error::Error>> {
    let provider = mindscope_providers::dialogue_provider(config)
        .ok_or("No default provider configured")?;
    Ok(TurnPipeline::from_config(config, provider, Adapters::none()))
}

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
