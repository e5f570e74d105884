//! Directive construction — the instruction text sent to the dialogue
//! backend for a turn, plus the canned replies used when it is unreachable.

use mindscope_core::modality::ModalitySource;
use serde::{Deserialize, Serialize};

use crate::assessment::{QUESTION_BANK, SessionState, Step, TOTAL_QUESTIONS};
use crate::fusion::FusionOutcome;

const PERSONA: &str = "You are MindScope, a calm and compassionate AI that helps users \
understand and regulate emotions.\nSpeak naturally, like a thoughtful therapist and caring friend.";

/// Reply used for free chat when the backend fails.
pub const FREE_CHAT_FALLBACK: &str =
    "I'm here to listen. Could you tell me a bit more about how you've been feeling lately?";

const ASSESSMENT_FALLBACK_PREFIX: &str = "I'm here to listen and support you.";

/// Optional caller-supplied context about the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mental_health_history: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Everything about the turn that a directive mentions.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub user_text: &'a str,
    pub fusion: &'a FusionOutcome,
    pub sources: &'a [ModalitySource],
    pub user_context: Option<&'a UserContext>,
}

/// Which assessment directive a turn needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentDirective {
    /// Introduce the persona and open with the first question.
    Introduction,
    /// Ask the next unanswered question.
    Question { question_index: usize },
    /// All questions answered; summarize supportively.
    Summary { responses: usize },
}

impl AssessmentDirective {
    pub fn select(state: &SessionState, step: &Step) -> Self {
        if state.is_complete() {
            Self::Summary {
                responses: state.responses().len(),
            }
        } else if step.first_interaction {
            Self::Introduction
        } else {
            Self::Question {
                question_index: state.current_question_index(),
            }
        }
    }
}

fn header(turn: &TurnContext<'_>) -> String {
    let text = turn.user_text.trim();
    let sources: Vec<&str> = turn.sources.iter().map(|s| s.as_str()).collect();

    let mut out = format!("{PERSONA}\n\n");
    out.push_str(&format!(
        "User input: {}\n",
        if text.is_empty() { "(No text input)" } else { text }
    ));
    out.push_str(&format!(
        "Detected sentiment: {} (confidence: {:.2})\n",
        turn.fusion.final_sentiment, turn.fusion.confidence
    ));
    out.push_str(&format!("Input sources: {}\n", sources.join(", ")));
    if let Some(user_id) = turn.user_context.and_then(|c| c.user_id.as_deref()) {
        out.push_str(&format!("User: {user_id}\n"));
    }
    out
}

/// Directive for a free-chat turn.
pub fn free_chat(turn: &TurnContext<'_>) -> String {
    let mut out = header(turn);
    out.push_str(
        "\nThis is a regular chat conversation (not mental health assessment mode).\n\n\
         Respond naturally to the user's input as a supportive AI companion. Provide helpful, \
         empathetic responses without initiating any structured assessment questions.\n\n\
         Guidelines:\n\
         - Be warm, empathetic, and supportive\n\
         - Respond directly to what the user is sharing\n\
         - Don't ask assessment questions unless the user specifically requests it\n\
         - Keep responses conversational and natural\n\n\
         Respond below:\n",
    );
    out
}

/// Directive for an assessment-mode turn.
pub fn assessment(turn: &TurnContext<'_>, state: &SessionState, kind: AssessmentDirective) -> String {
    let mut out = header(turn);
    out.push_str(&format!("\nASSESSMENT PHASE: {}\n", state.phase()));
    out.push_str(&format!(
        "Questions asked so far: {} out of {TOTAL_QUESTIONS}\n",
        state.questions_asked()
    ));
    out.push_str(&format!("Assessment complete: {}\n\n", state.is_complete()));

    match kind {
        AssessmentDirective::Introduction => {
            out.push_str(&format!(
                "This is our first interaction. Start the mental health assessment.\n\n\
                 YOUR TASK:\n\
                 1. Briefly introduce yourself as MindScope\n\
                 2. Ask the first assessment question naturally\n\n\
                 FIRST QUESTION: {}\n\n\
                 Keep your response to 2-3 sentences max. Just ask the question.\n",
                QUESTION_BANK[0]
            ));
        }
        AssessmentDirective::Question { question_index } => {
            let index = question_index.min(TOTAL_QUESTIONS - 1);
            out.push_str(&format!(
                "Continue the mental health assessment. Ask the next question.\n\n\
                 NEXT QUESTION ({}/{TOTAL_QUESTIONS}): {}\n\n\
                 Keep your response to 1-2 sentences. Just ask the question naturally.\n",
                index + 1,
                QUESTION_BANK[index]
            ));
        }
        AssessmentDirective::Summary { responses } => {
            out.push_str(&format!(
                "Assessment complete. Provide a concise summary and supportive response.\n\n\
                 Key points: {}\n\n\
                 Provide a warm, supportive summary in 3-4 sentences. Offer 1-2 practical suggestions.\n",
                completion_summary(responses)
            ));
        }
    }
    out
}

pub fn completion_summary(responses: usize) -> String {
    format!("Completed {responses} questions in mental health assessment.")
}

/// The deterministic reply used when the dialogue backend fails.
///
/// A running assessment always gets its pending question back so the guided
/// flow never stalls.
pub fn fallback_reply(state: &SessionState) -> String {
    match state.pending_question() {
        Some(question) => format!("{ASSESSMENT_FALLBACK_PREFIX} {question}"),
        None => FREE_CHAT_FALLBACK.to_string(),
    }
}
