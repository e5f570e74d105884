//! Orchestrator — turns a fused verdict into the assistant's reply.
//!
//! Each call advances the session's assessment state, picks a directive,
//! and sends it through the session's dialogue handle. Backend failures
//! never escape: the caller always gets a reply, and a running assessment
//! always gets its pending question.

use std::sync::Arc;

use chrono::Utc;
use mindscope_core::event::{DomainEvent, EventBus};
use mindscope_core::provider::Provider;
use tracing::{debug, warn};

use crate::assessment::{AssessmentProgress, SessionState, Step, TOTAL_QUESTIONS, Transition};
use crate::dialogue::DialogueSettings;
use crate::directive::{self, AssessmentDirective, TurnContext};
use crate::session::SessionStore;

/// The orchestrator's answer for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub progress: AssessmentProgress,
    pub transition: Transition,
    /// Whether `text` is a canned fallback rather than a backend reply.
    pub fell_back: bool,
    /// Backend that produced `text`; `None` for a fallback reply.
    pub answered_by: Option<String>,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    settings: DialogueSettings,
    sessions: Arc<SessionStore>,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: DialogueSettings,
        sessions: Arc<SessionStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            settings,
            sessions,
            events,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    /// Produce the reply for one turn of `session_id`.
    ///
    /// The session entry stays locked until the reply is ready, so concurrent
    /// turns for the same session run one after another.
    pub async fn respond(&self, session_id: &str, requested_mode: bool, turn: TurnContext<'_>) -> Reply {
        let (entry, _) = self.sessions.get_or_create(session_id, requested_mode);
        let mut entry = entry.lock().await;

        let step = entry.state_mut().advance(turn.user_text, requested_mode);
        self.publish_step(session_id, &step, entry.state());

        let directive = if entry.state().is_assessment_mode() {
            let kind = AssessmentDirective::select(entry.state(), &step);
            debug!(session_id = %session_id, directive = ?kind, "Assessment turn");
            directive::assessment(&turn, entry.state(), kind)
        } else {
            directive::free_chat(&turn)
        };

        let result = entry
            .dialogue()
            .send(self.provider.as_ref(), &self.settings, &directive)
            .await;

        let (text, answered_by) = match result {
            Ok(answer) => (answer.text, Some(answer.provider)),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    provider = self.provider.name(),
                    error = %e,
                    "Dialogue backend failed, using fallback reply"
                );
                self.events.publish(DomainEvent::DialogueFallback {
                    session_id: session_id.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                (directive::fallback_reply(entry.state()), None)
            }
        };

        Reply {
            text,
            progress: entry.state().progress(),
            transition: step.transition,
            fell_back: answered_by.is_none(),
            answered_by,
        }
    }

    fn publish_step(&self, session_id: &str, step: &Step, state: &SessionState) {
        if step.transition.is_reset() {
            self.events.publish(DomainEvent::ModeReset {
                session_id: session_id.to_string(),
                assessment_mode: state.is_assessment_mode(),
                timestamp: Utc::now(),
            });
        }
        if step.answer_recorded {
            self.events.publish(DomainEvent::AssessmentAnswered {
                session_id: session_id.to_string(),
                questions_asked: state.questions_asked(),
                total_questions: TOTAL_QUESTIONS,
                timestamp: Utc::now(),
            });
        }
        if step.completed_now {
            self.events.publish(DomainEvent::AssessmentCompleted {
                session_id: session_id.to_string(),
                responses: state.responses().len(),
                timestamp: Utc::now(),
            });
        }
    }
}
