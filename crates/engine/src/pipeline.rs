//! Turn pipeline — one multimodal turn from raw inputs to the caller-facing
//! result.
//!
//! Inputs are routed to the configured adapters, the resulting records are
//! fused, and the orchestrator produces the reply. A modality without a
//! configured adapter is skipped.

use std::sync::Arc;

use chrono::Utc;
use mindscope_config::AppConfig;
use mindscope_core::error::{AdapterError, FusionError};
use mindscope_core::event::{DomainEvent, EventBus};
use mindscope_core::modality::{
    AudioSentiment, ImageAnalyzer, ImageSentiment, MediaExtractor, MediaRef, ModalityResult,
    ModalitySource, SpeechEmotionAnalyzer, TextAnalyzer,
};
use mindscope_core::provider::Provider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assessment::AssessmentProgress;
use crate::dialogue::DialogueSettings;
use crate::directive::{TurnContext, UserContext};
use crate::fusion::{FusionEngine, FusionOutcome, ModalityRecords};
use crate::orchestrator::Orchestrator;
use crate::session::SessionStore;

/// Errors that abort a turn.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Fusion(#[from] FusionError),
}

/// Raw inputs for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<MediaRef>,
    #[serde(default)]
    pub audio: Option<MediaRef>,
    #[serde(default)]
    pub video: Option<MediaRef>,
    #[serde(default)]
    pub user_context: Option<UserContext>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub assessment_mode: bool,
}

/// A turn whose modalities were already classified elsewhere.
///
/// Records use the adapter JSON shapes and are validated during fusion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifiedTurn {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub text_sentiment: Option<serde_json::Value>,
    #[serde(default)]
    pub image_sentiments: Option<serde_json::Value>,
    #[serde(default)]
    pub audio_sentiment: Option<serde_json::Value>,
    #[serde(default)]
    pub user_context: Option<UserContext>,
    #[serde(default)]
    pub assessment_mode: bool,
}

/// Caller-facing result of a turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub session_id: String,
    pub text_sentiment: Option<ModalityResult>,
    pub image_sentiments: Vec<ImageSentiment>,
    pub audio_sentiment: Option<AudioSentiment>,
    pub combined_sentiment: FusionOutcome,
    pub llm_response: String,
    pub assessment_progress: AssessmentProgress,
}

/// The modality adapters available to the pipeline.
#[derive(Clone, Default)]
pub struct Adapters {
    pub text: Option<Arc<dyn TextAnalyzer>>,
    pub image: Option<Arc<dyn ImageAnalyzer>>,
    pub speech: Option<Arc<dyn SpeechEmotionAnalyzer>>,
    pub extractor: Option<Arc<dyn MediaExtractor>>,
}

impl Adapters {
    pub fn none() -> Self {
        Self::default()
    }
}

pub struct TurnPipeline {
    adapters: Adapters,
    fusion: FusionEngine,
    orchestrator: Orchestrator,
}

impl TurnPipeline {
    pub fn new(adapters: Adapters, fusion: FusionEngine, orchestrator: Orchestrator) -> Self {
        Self {
            adapters,
            fusion,
            orchestrator,
        }
    }

    /// Wire a pipeline from config around the given dialogue backend.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>, adapters: Adapters) -> Self {
        let events = Arc::new(EventBus::default());
        let sessions =
            Arc::new(SessionStore::from_config(&config.sessions).with_events(events.clone()));
        let orchestrator = Orchestrator::new(
            provider,
            DialogueSettings::from_config(config),
            sessions,
            events,
        );
        Self::new(adapters, FusionEngine::from_config(&config.fusion), orchestrator)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.orchestrator.sessions()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.orchestrator.events()
    }

    /// Classify, fuse, and answer one turn.
    pub async fn process_turn(&self, input: TurnInput) -> Result<TurnResult, PipelineError> {
        let session_id = resolve_session_id(input.session_id.as_deref());
        let text = input.text.as_deref().unwrap_or("");

        let mut sources = Vec::new();
        if !text.is_empty() {
            sources.push(ModalitySource::Text);
        }
        if !input.images.is_empty() {
            sources.push(ModalitySource::Images);
        }
        if input.audio.is_some() {
            sources.push(ModalitySource::Audio);
        }
        if input.video.is_some() {
            sources.push(ModalitySource::Video);
        }

        let records = self.classify(&input, text).await?;
        self.finish(
            session_id,
            text,
            records,
            &sources,
            input.user_context.as_ref(),
            input.assessment_mode,
        )
        .await
    }

    /// Fuse and answer a turn whose records are already known.
    pub async fn process_classified(&self, turn: ClassifiedTurn) -> Result<TurnResult, PipelineError> {
        let session_id = resolve_session_id(turn.session_id.as_deref());
        let text = turn.text.as_deref().unwrap_or("");
        let records = ModalityRecords::from_json(
            turn.text_sentiment.as_ref(),
            turn.image_sentiments.as_ref(),
            turn.audio_sentiment.as_ref(),
        )?;

        let mut sources = Vec::new();
        if !text.is_empty() {
            sources.push(ModalitySource::Text);
        }
        if !records.images.is_empty() {
            sources.push(ModalitySource::Images);
        }
        if records.audio.is_some() {
            sources.push(ModalitySource::Audio);
        }

        self.finish(
            session_id,
            text,
            records,
            &sources,
            turn.user_context.as_ref(),
            turn.assessment_mode,
        )
        .await
    }

    async fn classify(&self, input: &TurnInput, text: &str) -> Result<ModalityRecords, AdapterError> {
        let mut records = ModalityRecords::default();

        if !text.is_empty() {
            if let Some(analyzer) = &self.adapters.text {
                records.text = Some(analyzer.analyze_text(text).await?);
            } else {
                debug!("No text analyzer configured, skipping text");
            }
        }

        // Video supersedes explicit audio and images.
        if let Some(video) = &input.video {
            let Some(extractor) = &self.adapters.extractor else {
                debug!(video = %video, "No media extractor configured, skipping video");
                return Ok(records);
            };
            match extractor.extract_audio(video).await? {
                Some(track) => records.audio = self.predict_audio(&track).await?,
                None => {
                    debug!(video = %video, "No audio in video, analyzing frames");
                    let frames = extractor.extract_frames(video).await?;
                    records.images = self.analyze_images(&frames).await?;
                }
            }
            return Ok(records);
        }

        if let Some(audio) = &input.audio {
            records.audio = self.predict_audio(audio).await?;
        }
        if !input.images.is_empty() {
            records.images = self.analyze_images(&input.images).await?;
        }
        Ok(records)
    }

    async fn predict_audio(&self, audio: &MediaRef) -> Result<Option<AudioSentiment>, AdapterError> {
        match &self.adapters.speech {
            Some(analyzer) => Ok(Some(analyzer.predict(audio).await?)),
            None => {
                debug!(audio = %audio, "No speech analyzer configured, skipping audio");
                Ok(None)
            }
        }
    }

    async fn analyze_images(&self, images: &[MediaRef]) -> Result<Vec<ImageSentiment>, AdapterError> {
        let Some(analyzer) = &self.adapters.image else {
            debug!(count = images.len(), "No image analyzer configured, skipping images");
            return Ok(Vec::new());
        };
        let mut results = Vec::with_capacity(images.len());
        for image in images {
            results.push(analyzer.analyze_image(image).await?);
        }
        Ok(results)
    }

    async fn finish(
        &self,
        session_id: String,
        text: &str,
        records: ModalityRecords,
        sources: &[ModalitySource],
        user_context: Option<&UserContext>,
        assessment_mode: bool,
    ) -> Result<TurnResult, PipelineError> {
        let combined = if records.has_signal() {
            self.fusion.fuse_records(&records)?
        } else {
            FusionOutcome::neutral()
        };

        let reply = self
            .orchestrator
            .respond(
                &session_id,
                assessment_mode,
                TurnContext {
                    user_text: text,
                    fusion: &combined,
                    sources,
                    user_context,
                },
            )
            .await;

        info!(
            session_id = %session_id,
            final_sentiment = %combined.final_sentiment,
            confidence = combined.confidence,
            answered_by = reply.answered_by.as_deref().unwrap_or("fallback"),
            "Processed turn"
        );
        self.events().publish(DomainEvent::TurnProcessed {
            session_id: session_id.clone(),
            final_sentiment: combined.final_sentiment.clone(),
            confidence: combined.confidence,
            answered_by: reply.answered_by.clone(),
            timestamp: Utc::now(),
        });

        Ok(TurnResult {
            session_id,
            text_sentiment: records.text,
            image_sentiments: records.images,
            audio_sentiment: records.audio,
            combined_sentiment: combined,
            llm_response: reply.text,
            assessment_progress: reply.progress,
        })
    }
}

fn resolve_session_id(requested: Option<&str>) -> String {
    match requested {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = uuid::Uuid::new_v4().to_string();
            debug!(session_id = %id, "Generated new session id");
            id
        }
    }
}
