//! Shared test doubles for engine tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mindscope_core::error::{AdapterError, ProviderError};
use mindscope_core::message::Message;
use mindscope_core::modality::{
    AudioSentiment, ImageAnalyzer, ImageSentiment, MediaExtractor, MediaRef, ModalityResult,
    SpeechEmotionAnalyzer, TextAnalyzer,
};
use mindscope_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        provider: "mock".into(),
    }
}

/// Answers every call with the same text and keeps every request it saw.
pub struct RecordingProvider {
    reply: String,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl RecordingProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Content of the newest message in the most recent request.
    pub fn last_directive(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.messages.last())
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        Ok(make_text_response(&self.reply))
    }
}

/// Fails every call with a fixed error.
pub struct FailingProvider {
    error: ProviderError,
    call_count: Mutex<usize>,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self {
            error,
            call_count: Mutex::new(0),
        }
    }

    pub fn network() -> Self {
        Self::new(ProviderError::Network("connection refused".into()))
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        Err(self.error.clone())
    }
}

/// Never answers within any reasonable timeout.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(make_text_response("too late"))
    }
}

/// Text analyzer returning a fixed verdict.
pub struct StaticTextAnalyzer(pub ModalityResult);

#[async_trait]
impl TextAnalyzer for StaticTextAnalyzer {
    fn name(&self) -> &str {
        "static_text"
    }

    async fn analyze_text(&self, _text: &str) -> Result<ModalityResult, AdapterError> {
        Ok(self.0.clone())
    }
}

/// Text analyzer that always errors.
pub struct BrokenTextAnalyzer;

#[async_trait]
impl TextAnalyzer for BrokenTextAnalyzer {
    fn name(&self) -> &str {
        "broken_text"
    }

    async fn analyze_text(&self, _text: &str) -> Result<ModalityResult, AdapterError> {
        Err(AdapterError::failed("text", "model not loaded"))
    }
}

/// Image analyzer returning a fixed verdict, or the failure sentinel for any
/// media ref containing "corrupt".
pub struct StaticImageAnalyzer(pub ImageSentiment);

#[async_trait]
impl ImageAnalyzer for StaticImageAnalyzer {
    fn name(&self) -> &str {
        "static_image"
    }

    async fn analyze_image(&self, image: &MediaRef) -> Result<ImageSentiment, AdapterError> {
        if image.as_str().contains("corrupt") {
            return Ok(ImageSentiment::failed("could not decode image"));
        }
        Ok(self.0.clone())
    }
}

/// Speech analyzer returning a fixed verdict and recording what it was fed.
pub struct StaticSpeechAnalyzer {
    verdict: AudioSentiment,
    seen: Mutex<Vec<MediaRef>>,
}

impl StaticSpeechAnalyzer {
    pub fn new(verdict: AudioSentiment) -> Self {
        Self {
            verdict,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<MediaRef> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEmotionAnalyzer for StaticSpeechAnalyzer {
    fn name(&self) -> &str {
        "static_speech"
    }

    async fn predict(&self, audio: &MediaRef) -> Result<AudioSentiment, AdapterError> {
        self.seen.lock().unwrap().push(audio.clone());
        Ok(self.verdict.clone())
    }
}

/// Extractor with canned outputs for any video.
pub struct StaticExtractor {
    pub audio: Option<MediaRef>,
    pub frames: Vec<MediaRef>,
}

#[async_trait]
impl MediaExtractor for StaticExtractor {
    async fn extract_audio(&self, _video: &MediaRef) -> Result<Option<MediaRef>, AdapterError> {
        Ok(self.audio.clone())
    }

    async fn extract_frames(&self, _video: &MediaRef) -> Result<Vec<MediaRef>, AdapterError> {
        Ok(self.frames.clone())
    }
}
