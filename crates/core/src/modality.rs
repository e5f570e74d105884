//! Modality records and adapter traits.
//!
//! Each input channel (text, image, audio, video) is classified by an
//! external model. The engine only sees the classifier's output contract: a
//! `{label, score}` record or an ordered list of them.
//!
//! Implementations live outside this workspace (Python services, ONNX
//! runtimes, hosted APIs). Tests use small in-process stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// A single classifier verdict: an emotion label and its score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityResult {
    pub label: String,
    pub score: f64,
}

impl ModalityResult {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// The output of an image classifier for one image or video frame.
///
/// Classifiers usually return a ranked list of labels per image; only the
/// first (top) entry contributes to fusion. An adapter that cannot read its
/// input reports a `Failed` sentinel instead of raising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSentiment {
    /// Ranked per-frame results, best first.
    Frames(Vec<ModalityResult>),
    /// A single verdict.
    Single(ModalityResult),
    /// Adapter failure sentinel: `{"error": "...", "emotion": "unknown"}`.
    Failed { error: String, emotion: String },
}

impl ImageSentiment {
    /// Build the failure sentinel an image adapter returns instead of raising.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            emotion: "unknown".into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The output of a speech-emotion classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioSentiment {
    /// One verdict per utterance/segment.
    Sequence(Vec<ModalityResult>),
    /// A single verdict for the whole clip.
    Single(ModalityResult),
}

/// An opaque reference to a media input (local path or URL).
///
/// The engine never opens media itself; references are handed to adapters
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which input channels were present on a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalitySource {
    Text,
    Images,
    Audio,
    Video,
}

impl ModalitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Images => "images",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for ModalitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text sentiment classifier.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze_text(&self, text: &str) -> Result<ModalityResult, AdapterError>;
}

/// Facial-emotion classifier for still images and video frames.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Classify one image. Unreadable inputs should be reported as
    /// [`ImageSentiment::Failed`] rather than as an error.
    async fn analyze_image(&self, image: &MediaRef) -> Result<ImageSentiment, AdapterError>;
}

/// Speech-emotion classifier for audio clips.
#[async_trait]
pub trait SpeechEmotionAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    async fn predict(&self, audio: &MediaRef) -> Result<AudioSentiment, AdapterError>;
}

/// Splits a video into an audio track and sampled frames.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Extract the audio track. `Ok(None)` means the video has no audio.
    async fn extract_audio(&self, video: &MediaRef) -> Result<Option<MediaRef>, AdapterError>;

    /// Sample frames from the video (about one per second).
    async fn extract_frames(&self, video: &MediaRef) -> Result<Vec<MediaRef>, AdapterError>;
}
