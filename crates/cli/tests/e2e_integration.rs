//! End-to-end integration tests for the MindScope turn engine.
//!
//! These tests drive the full pipeline from raw turn input to the
//! caller-facing result: adapters, fusion, assessment state, dialogue
//! backend, and fallback behaviour.

use std::sync::Arc;
use std::time::Duration;

use mindscope_config::AppConfig;
use mindscope_core::error::{AdapterError, ProviderError};
use mindscope_core::event::DomainEvent;
use mindscope_core::message::Message;
use mindscope_core::modality::{
    AudioSentiment, ImageAnalyzer, ImageSentiment, MediaRef, ModalityResult,
    SpeechEmotionAnalyzer, TextAnalyzer,
};
use mindscope_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use mindscope_engine::{
    Adapters, AssessmentPhase, ClassifiedTurn, QUESTION_BANK, TurnInput, TurnPipeline,
};
use mindscope_providers::FallbackProvider;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Numbers its replies so tests can tell calls apart.
struct ScriptedProvider {
    call_count: std::sync::Mutex<usize>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            call_count: std::sync::Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        Ok(text_response(&format!("reply #{count}")))
    }
}

struct DownProvider;

#[async_trait::async_trait]
impl Provider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "service unavailable".into(),
        })
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
        provider: "e2e_mock".into(),
    }
}

// ── Stub adapters ────────────────────────────────────────────────────────

struct FixedText(&'static str, f64);

#[async_trait::async_trait]
impl TextAnalyzer for FixedText {
    fn name(&self) -> &str {
        "fixed_text"
    }

    async fn analyze_text(&self, _text: &str) -> Result<ModalityResult, AdapterError> {
        Ok(ModalityResult::new(self.0, self.1))
    }
}

struct FixedImage(&'static str, f64);

#[async_trait::async_trait]
impl ImageAnalyzer for FixedImage {
    fn name(&self) -> &str {
        "fixed_image"
    }

    async fn analyze_image(&self, _image: &MediaRef) -> Result<ImageSentiment, AdapterError> {
        Ok(ImageSentiment::Single(ModalityResult::new(self.0, self.1)))
    }
}

struct FixedSpeech(&'static str, f64);

#[async_trait::async_trait]
impl SpeechEmotionAnalyzer for FixedSpeech {
    fn name(&self) -> &str {
        "fixed_speech"
    }

    async fn predict(&self, _audio: &MediaRef) -> Result<AudioSentiment, AdapterError> {
        Ok(AudioSentiment::Single(ModalityResult::new(self.0, self.1)))
    }
}

fn text_turn(session: &str, text: &str, assessment: bool) -> TurnInput {
    TurnInput {
        text: Some(text.into()),
        session_id: Some(session.into()),
        assessment_mode: assessment,
        ..TurnInput::default()
    }
}

// ── E2E: Guided assessment ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_assessment_runs_to_completion() {
    let provider = Arc::new(ScriptedProvider::new());
    let pipeline = TurnPipeline::from_config(&AppConfig::default(), provider.clone(), Adapters::none());
    let mut rx = pipeline.events().subscribe();

    let intro = pipeline.process_turn(text_turn("s-1", "", true)).await.unwrap();
    assert_eq!(intro.llm_response, "reply #1");
    assert_eq!(intro.assessment_progress.current_phase, AssessmentPhase::Initial);

    let answers = [
        "I wake up a lot",
        "pretty drained",
        "not hungry",
        "not really",
        "walks help",
    ];
    let mut last = None;
    for answer in answers {
        last = Some(pipeline.process_turn(text_turn("s-1", answer, true)).await.unwrap());
    }
    let last = last.unwrap();

    assert_eq!(last.assessment_progress.questions_asked, 5);
    assert!(last.assessment_progress.assessment_complete);
    assert_eq!(last.assessment_progress.current_phase, AssessmentPhase::Complete);
    assert_eq!(provider.calls(), 6);

    let mut completed = false;
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::AssessmentCompleted { responses, .. } = event.as_ref() {
            assert_eq!(*responses, 5);
            completed = true;
        }
    }
    assert!(completed);
}

#[tokio::test]
async fn e2e_total_backend_failure_still_progresses() {
    let pipeline =
        TurnPipeline::from_config(&AppConfig::default(), Arc::new(DownProvider), Adapters::none());

    let intro = pipeline.process_turn(text_turn("s-1", "", true)).await.unwrap();
    assert!(intro.llm_response.contains(QUESTION_BANK[0]));

    for (i, answer) in ["a", "b", "c", "d"].into_iter().enumerate() {
        let result = pipeline.process_turn(text_turn("s-1", answer, true)).await.unwrap();
        assert!(result.llm_response.contains(QUESTION_BANK[i + 1]));
    }

    let last = pipeline.process_turn(text_turn("s-1", "e", true)).await.unwrap();
    assert!(last.assessment_progress.assessment_complete);
    assert!(!QUESTION_BANK.iter().any(|q| last.llm_response.contains(q)));
}

#[tokio::test]
async fn e2e_leaving_assessment_discards_progress() {
    let pipeline = TurnPipeline::from_config(
        &AppConfig::default(),
        Arc::new(ScriptedProvider::new()),
        Adapters::none(),
    );

    pipeline.process_turn(text_turn("s-1", "fine", true)).await.unwrap();
    pipeline.process_turn(text_turn("s-1", "tired", true)).await.unwrap();
    let chat = pipeline.process_turn(text_turn("s-1", "anyway", false)).await.unwrap();

    assert_eq!(chat.assessment_progress.questions_asked, 0);
    assert_eq!(chat.assessment_progress.current_phase, AssessmentPhase::None);

    let back = pipeline.process_turn(text_turn("s-1", "", true)).await.unwrap();
    assert_eq!(back.assessment_progress.current_phase, AssessmentPhase::Initial);
    assert!(!back.assessment_progress.assessment_complete);
}

// ── E2E: Provider fallback chain ─────────────────────────────────────────

#[tokio::test]
async fn e2e_fallback_chain_hides_primary_outage() {
    let secondary = Arc::new(ScriptedProvider::new());
    let chain = FallbackProvider::new("dialogue", Duration::from_secs(10))
        .add(Arc::new(DownProvider), None)
        .add(secondary.clone(), Some(Duration::from_secs(5)));

    let pipeline = TurnPipeline::from_config(&AppConfig::default(), Arc::new(chain), Adapters::none());
    let mut rx = pipeline.events().subscribe();

    let result = pipeline.process_turn(text_turn("s-1", "hello", false)).await.unwrap();

    assert_eq!(result.llm_response, "reply #1");
    assert_eq!(secondary.calls(), 1);
    let mut answered_by = None;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event.as_ref(), DomainEvent::DialogueFallback { .. }));
        if let DomainEvent::TurnProcessed { answered_by: who, .. } = event.as_ref() {
            answered_by = who.clone();
        }
    }
    assert_eq!(answered_by.as_deref(), Some("e2e_mock"));
}

// ── E2E: Multimodal fusion ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_multimodal_turn_fuses_all_channels() {
    let adapters = Adapters {
        text: Some(Arc::new(FixedText("joy", 0.9))),
        image: Some(Arc::new(FixedImage("sad", 0.5))),
        speech: Some(Arc::new(FixedSpeech("joy", 0.6))),
        extractor: None,
    };
    let pipeline =
        TurnPipeline::from_config(&AppConfig::default(), Arc::new(ScriptedProvider::new()), adapters);

    let result = pipeline
        .process_turn(TurnInput {
            text: Some("mixed feelings".into()),
            images: vec![MediaRef::new("selfie.jpg")],
            audio: Some(MediaRef::new("voice.wav")),
            ..TurnInput::default()
        })
        .await
        .unwrap();

    // sad: 0.5 / 0.2 * 0.5 = 1.25; joy: 0.3 * 0.9 + 0.5 * 0.6 = 0.57
    let combined = &result.combined_sentiment;
    assert_eq!(combined.final_sentiment, "sad");
    assert!((combined.confidence - 1.25 / 1.82).abs() < 1e-9);
    assert!((combined.distribution.sum() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn e2e_config_weights_reach_fusion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[fusion]\ntext_weight = 0.9\nimage_weight = 0.2\naudio_weight = 0.1\n",
    )
    .unwrap();
    let config = AppConfig::load_from(&path).unwrap();

    let adapters = Adapters {
        text: Some(Arc::new(FixedText("calm", 0.5))),
        speech: Some(Arc::new(FixedSpeech("anger", 0.5))),
        ..Adapters::none()
    };
    let pipeline = TurnPipeline::from_config(&config, Arc::new(ScriptedProvider::new()), adapters);

    let result = pipeline
        .process_turn(TurnInput {
            text: Some("ok".into()),
            audio: Some(MediaRef::new("voice.wav")),
            ..TurnInput::default()
        })
        .await
        .unwrap();

    assert_eq!(result.combined_sentiment.final_sentiment, "calm");
}

// ── E2E: Pre-classified turns ────────────────────────────────────────────

#[tokio::test]
async fn e2e_classified_turn_produces_caller_json() {
    let pipeline = TurnPipeline::from_config(
        &AppConfig::default(),
        Arc::new(ScriptedProvider::new()),
        Adapters::none(),
    );

    let turn: ClassifiedTurn = serde_json::from_str(
        r#"{
            "session_id": "s-42",
            "text": "It was a long day",
            "text_sentiment": {"label": "sadness", "score": 0.7},
            "image_sentiments": [
                [{"label": "sadness", "score": 0.6}, {"label": "neutral", "score": 0.2}],
                {"error": "no face detected", "emotion": "unknown"}
            ],
            "audio_sentiment": [{"label": "neutral", "score": 0.4}]
        }"#,
    )
    .unwrap();

    let result = pipeline.process_classified(turn).await.unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["session_id"], "s-42");
    assert_eq!(value["image_sentiments"].as_array().unwrap().len(), 2);
    assert_eq!(value["combined_sentiment"]["final_sentiment"], "sadness");
    assert_eq!(value["llm_response"], "reply #1");
    assert_eq!(value["assessment_progress"]["total_questions"], 5);
}

// ── E2E: Concurrency ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_sessions_are_isolated_under_concurrency() {
    let pipeline = Arc::new(TurnPipeline::from_config(
        &AppConfig::default(),
        Arc::new(ScriptedProvider::new()),
        Adapters::none(),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let session = format!("s-{i}");
            pipeline
                .process_turn(text_turn(&session, "first answer", true))
                .await
                .unwrap();
            pipeline
                .process_turn(text_turn(&session, "second answer", true))
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.assessment_progress.questions_asked, 2);
    }
    assert_eq!(pipeline.sessions().len(), 8);
}

#[tokio::test]
async fn e2e_same_session_turns_are_serialized() {
    let pipeline = Arc::new(TurnPipeline::from_config(
        &AppConfig::default(),
        Arc::new(ScriptedProvider::new()),
        Adapters::none(),
    ));

    let mut handles = Vec::new();
    for i in 0..5 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .process_turn(text_turn("shared", &format!("answer {i}"), true))
                .await
                .unwrap()
        }));
    }

    let mut seen: Vec<usize> = Vec::new();
    for handle in handles {
        seen.push(handle.await.unwrap().assessment_progress.questions_asked);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}
