//! Guided assessment state machine.
//!
//! A session is either in free chat (`phase = none`) or working through the
//! fixed [`QUESTION_BANK`]:
//!
//! ```text
//! none ──enter──▶ initial ──answer──▶ in_progress ──Nth answer──▶ complete
//!   ▲                │                     │                         │
//!   └──────leave─────┴─────────────────────┴─────────────────────────┘
//! ```
//!
//! Toggling the requested mode always hard-resets the session; the reset is
//! reported as an explicit [`Transition`] rather than happening silently.

use serde::{Deserialize, Serialize};

/// The fixed assessment questions, asked in order.
pub const QUESTION_BANK: [&str; 5] = [
    "How have you been sleeping lately? Have you noticed any changes in your sleep patterns?",
    "What's your energy level been like recently? Have you felt more tired or fatigued than usual?",
    "How is your appetite? Have there been any significant changes in your eating habits?",
    "Have you been able to enjoy activities that usually bring you pleasure?",
    "How have you been coping with stress recently? What helps you feel better when you're struggling?",
];

pub const TOTAL_QUESTIONS: usize = QUESTION_BANK.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentPhase {
    None,
    Initial,
    InProgress,
    Complete,
}

impl AssessmentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Initial => "initial",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for AssessmentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a turn changed the session's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// First turn of a freshly created session.
    Created,
    /// Free chat → assessment; progress was reset.
    ModeEntered,
    /// Assessment → free chat; progress was discarded.
    ModeLeft,
    /// Same mode as the previous turn.
    Continued,
}

impl Transition {
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::ModeEntered | Self::ModeLeft)
    }
}

/// What a single [`SessionState::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub transition: Transition,
    /// Whether this was the first assessment-mode turn since creation or the
    /// last reset (read before the flag is cleared).
    pub first_interaction: bool,
    /// Whether the turn's text was recorded as an answer.
    pub answer_recorded: bool,
    /// Whether this turn recorded the final answer.
    pub completed_now: bool,
}

/// Caller-facing snapshot of assessment progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentProgress {
    pub questions_asked: usize,
    pub total_questions: usize,
    pub assessment_complete: bool,
    pub current_phase: AssessmentPhase,
}

/// Per-session conversation/assessment state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    is_assessment_mode: bool,
    phase: AssessmentPhase,
    questions_asked: usize,
    responses: Vec<String>,
    current_question_index: usize,
    complete: bool,
    is_first_interaction: bool,
    #[serde(skip)]
    turns: u64,
}

impl SessionState {
    /// State for a session seen for the first time.
    pub fn new(assessment_mode: bool) -> Self {
        Self {
            is_assessment_mode: assessment_mode,
            phase: if assessment_mode {
                AssessmentPhase::Initial
            } else {
                AssessmentPhase::None
            },
            questions_asked: 0,
            responses: Vec::new(),
            current_question_index: 0,
            complete: false,
            is_first_interaction: true,
            turns: 0,
        }
    }

    /// Apply one turn: reset on a mode toggle, then record `user_text` as the
    /// answer to the pending question when the assessment is still running.
    pub fn advance(&mut self, user_text: &str, requested_mode: bool) -> Step {
        let transition = if self.turns == 0 {
            Transition::Created
        } else {
            Transition::Continued
        };
        self.turns += 1;

        let transition = if requested_mode != self.is_assessment_mode {
            self.reset(requested_mode);
            if requested_mode {
                Transition::ModeEntered
            } else {
                Transition::ModeLeft
            }
        } else {
            transition
        };

        if !self.is_assessment_mode {
            return Step {
                transition,
                first_interaction: false,
                answer_recorded: false,
                completed_now: false,
            };
        }

        let first_interaction = self.is_first_interaction;
        let answer = user_text.trim();
        let mut answer_recorded = false;
        let mut completed_now = false;

        if !answer.is_empty() && !self.complete {
            self.responses.push(answer.to_string());
            self.questions_asked = self.responses.len();
            answer_recorded = true;

            if self.questions_asked >= TOTAL_QUESTIONS {
                self.complete = true;
                self.phase = AssessmentPhase::Complete;
                completed_now = true;
            } else {
                self.current_question_index = self.questions_asked;
                self.phase = AssessmentPhase::InProgress;
            }
        }

        self.is_first_interaction = false;

        Step {
            transition,
            first_interaction,
            answer_recorded,
            completed_now,
        }
    }

    fn reset(&mut self, assessment_mode: bool) {
        self.is_assessment_mode = assessment_mode;
        self.questions_asked = 0;
        self.responses.clear();
        self.current_question_index = 0;
        self.is_first_interaction = true;
        if assessment_mode {
            self.phase = AssessmentPhase::Initial;
            self.complete = false;
        } else {
            // A partially completed assessment is moot once the user leaves.
            self.phase = AssessmentPhase::None;
            self.complete = true;
        }
    }

    /// The question the session is waiting on, if an assessment is running.
    pub fn pending_question(&self) -> Option<&'static str> {
        if self.is_assessment_mode && !self.complete {
            QUESTION_BANK.get(self.current_question_index).copied()
        } else {
            None
        }
    }

    pub fn progress(&self) -> AssessmentProgress {
        AssessmentProgress {
            questions_asked: self.questions_asked,
            total_questions: TOTAL_QUESTIONS,
            assessment_complete: self.complete,
            current_phase: self.phase,
        }
    }

    pub fn is_assessment_mode(&self) -> bool {
        self.is_assessment_mode
    }

    pub fn phase(&self) -> AssessmentPhase {
        self.phase
    }

    pub fn questions_asked(&self) -> usize {
        self.questions_asked
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_first_interaction(&self) -> bool {
        self.is_first_interaction
    }
}
