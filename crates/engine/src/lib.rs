//! The MindScope turn engine.
//!
//! A turn flows through four stages:
//!
//! 1. **Classify** each modality with the configured adapters ([`pipeline`])
//! 2. **Fuse** the records into one emotion distribution ([`fusion`])
//! 3. **Advance** the session's assessment state ([`assessment`], [`session`])
//! 4. **Respond** through the session's dialogue handle, falling back to a
//!    canned reply when the backend is unavailable ([`orchestrator`],
//!    [`directive`], [`dialogue`])

pub mod assessment;
pub mod dialogue;
pub mod directive;
pub mod fusion;
pub mod orchestrator;
pub mod pipeline;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assessment::{
    AssessmentPhase, AssessmentProgress, QUESTION_BANK, SessionState, Step, TOTAL_QUESTIONS,
    Transition,
};
pub use dialogue::{DialogueAnswer, DialogueHandle, DialogueSettings};
pub use directive::UserContext;
pub use fusion::{FusionEngine, FusionOutcome, FusionWeights, ModalityRecords, SentimentDistribution};
pub use orchestrator::{Orchestrator, Reply};
pub use pipeline::{Adapters, ClassifiedTurn, PipelineError, TurnInput, TurnPipeline, TurnResult};
pub use session::{SessionEntry, SessionRef, SessionStore};
