//! # MindScope Core
//!
//! Domain types, traits, and error definitions for the MindScope multimodal
//! companion. This crate has **no framework dependencies** — it defines the
//! domain model that the engine, providers, and CLI implement against.
//!
//! ## Layout
//!
//! - [`modality`] — per-modality classifier records and the adapter traits
//!   that produce them (text, image, speech, video extraction)
//! - [`provider`] — the LLM backend abstraction used for dialogue
//! - [`message`] — conversation history replayed to the backend
//! - [`event`] — domain events published while turns are processed
//! - [`error`] — the error taxonomy shared by every crate

pub mod error;
pub mod event;
pub mod message;
pub mod modality;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{AdapterError, FusionError, ProviderError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Message, Role};
pub use modality::{
    AudioSentiment, ImageAnalyzer, ImageSentiment, MediaExtractor, MediaRef, ModalityResult,
    ModalitySource, SpeechEmotionAnalyzer, TextAnalyzer,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
