//! Conversation state machine: request lifecycle plus the transcript.
//!
//! ```text
//!            begin()           mark_submitting()      mark_streaming()
//!   Idle ───────────▶ Preparing ───────────▶ Submitting ───────────▶ Streaming
//!                         │                       │                     │
//!                         └──────── fail() ───────┴──────── fail() ─────┤
//!                                                                       ▼
//!                                                          Completed | Failed
//! ```
//!
//! A finished state re-enters `Preparing` on the next [`ConversationState::begin`].
//!
//! Text accumulation is a pure reducer ([`ConversationState::apply`]) over
//! [`ProtocolEvent`]s, so routing rules are testable without a network.

use crate::error::ExplainError;
use crate::prompts::{DEFAULT_PROMPT, MSG_DONE, MSG_IDLE, MSG_PREPARING, MSG_STREAMING, MSG_SUBMITTING};
use crate::stream::ProtocolEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationRequest {
    pub prompt_text: String,
    /// Ask the backend for the slower, model-based page parse.
    pub parse_with_deep_analysis: bool,
    pub is_follow_up: bool,
}

impl ExplanationRequest {
    /// A fresh explanation; resets the conversation when submitted.
    pub fn explain(prompt: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt.into(),
            parse_with_deep_analysis: false,
            is_follow_up: false,
        }
    }

    /// A follow-up question appended to the current conversation.
    pub fn follow_up(prompt: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt.into(),
            parse_with_deep_analysis: false,
            is_follow_up: true,
        }
    }

    pub fn deep_analysis(mut self, enabled: bool) -> Self {
        self.parse_with_deep_analysis = enabled;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.prompt_text.trim().is_empty()
    }
}

impl Default for ExplanationRequest {
    fn default() -> Self {
        Self::explain(DEFAULT_PROMPT)
    }
}

/// Lifecycle of the current (or last) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestStatus {
    #[default]
    Idle,
    Preparing,
    Submitting,
    Streaming,
    Completed,
    Failed,
}

impl RequestStatus {
    /// `true` while a request owns the conversation.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RequestStatus::Preparing | RequestStatus::Submitting | RequestStatus::Streaming
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Idle => "idle",
            RequestStatus::Preparing => "preparing",
            RequestStatus::Submitting => "submitting",
            RequestStatus::Streaming => "streaming",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Question,
    Answer,
}

/// One follow-up exchange entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: u64,
    pub role: Role,
    pub text: String,
}

/// Where a content event's text ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTarget {
    InitialAnswer,
    /// An `Answer` turn, by id.
    Turn(u64),
}

/// Outcome of feeding one event to [`ConversationState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Text was appended.
    Appended(ContentTarget),
    /// Nothing to do (sentinel).
    Skipped,
    /// Stop reading: the request failed, or no request is streaming.
    Halted,
}

impl Applied {
    pub fn is_halted(self) -> bool {
        matches!(self, Applied::Halted)
    }
}

/// The single mutable session object for one open document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    status: RequestStatus,
    initial_answer: String,
    turns: Vec<ConversationTurn>,
    error_flag: bool,
    last_status_message: String,
    can_follow_up: bool,
    #[serde(skip)]
    active_follow_up: bool,
    #[serde(skip)]
    next_turn_id: u64,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            status: RequestStatus::Idle,
            initial_answer: String::new(),
            turns: Vec::new(),
            error_flag: false,
            last_status_message: MSG_IDLE.to_string(),
            can_follow_up: false,
            active_follow_up: false,
            next_turn_id: 1,
        }
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn initial_answer(&self) -> &str {
        &self.initial_answer
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn error_flag(&self) -> bool {
        self.error_flag
    }

    pub fn last_status_message(&self) -> &str {
        &self.last_status_message
    }

    /// Whether an initial explanation has completed, so follow-ups make sense.
    pub fn can_follow_up(&self) -> bool {
        self.can_follow_up
    }

    /// Whether the active (or last) request is a follow-up.
    pub fn is_follow_up_active(&self) -> bool {
        self.active_follow_up
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Start a request, entering `Preparing`.
    ///
    /// A non-follow-up request clears the answer and all turns; a follow-up
    /// appends its `Question` turn here, before any asynchronous work.
    /// Blank prompts and overlapping requests are rejected without touching
    /// the state.
    pub fn begin(&mut self, request: &ExplanationRequest) -> Result<(), ExplainError> {
        if request.is_blank() {
            return Err(ExplainError::BlankPrompt);
        }
        if self.status.is_active() {
            return Err(ExplainError::RequestInFlight);
        }

        if request.is_follow_up {
            let id = self.take_turn_id();
            self.turns.push(ConversationTurn {
                id,
                role: Role::Question,
                text: request.prompt_text.clone(),
            });
        } else {
            self.initial_answer.clear();
            self.turns.clear();
            self.can_follow_up = false;
        }

        self.active_follow_up = request.is_follow_up;
        self.error_flag = false;
        self.status = RequestStatus::Preparing;
        self.last_status_message = MSG_PREPARING.to_string();
        Ok(())
    }

    /// Page extracted; the request is about to go out.
    pub fn mark_submitting(&mut self) {
        self.status = RequestStatus::Submitting;
        self.last_status_message = MSG_SUBMITTING.to_string();
    }

    /// Success status received; body events follow.
    pub fn mark_streaming(&mut self) {
        self.status = RequestStatus::Streaming;
        self.last_status_message = MSG_STREAMING.to_string();
    }

    /// Reduce one decoded event into the conversation.
    pub fn apply(&mut self, event: &ProtocolEvent) -> Applied {
        if self.status != RequestStatus::Streaming {
            return Applied::Halted;
        }
        match event {
            ProtocolEvent::Content(text) => Applied::Appended(self.append_content(text)),
            ProtocolEvent::Sentinel => Applied::Skipped,
            ProtocolEvent::Error(message) => {
                self.fail(&ExplainError::Remote {
                    message: message.clone(),
                });
                Applied::Halted
            }
        }
    }

    /// Body ended without an error event.
    pub fn complete(&mut self) {
        self.status = RequestStatus::Completed;
        self.last_status_message = MSG_DONE.to_string();
        if !self.active_follow_up {
            self.can_follow_up = true;
        }
    }

    /// Terminal failure. Accumulated text and turns are kept.
    pub fn fail(&mut self, error: &ExplainError) {
        self.status = RequestStatus::Failed;
        self.error_flag = true;
        self.last_status_message = error.user_message();
    }

    fn append_content(&mut self, text: &str) -> ContentTarget {
        if !self.active_follow_up {
            self.initial_answer.push_str(text);
            return ContentTarget::InitialAnswer;
        }

        if let Some(last) = self.turns.last_mut() {
            if last.role == Role::Answer {
                last.text.push_str(text);
                return ContentTarget::Turn(last.id);
            }
        }

        let id = self.take_turn_id();
        self.turns.push(ConversationTurn {
            id,
            role: Role::Answer,
            text: text.to_string(),
        });
        ContentTarget::Turn(id)
    }

    fn take_turn_id(&mut self) -> u64 {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(s: &str) -> ProtocolEvent {
        ProtocolEvent::Content(s.to_string())
    }

    fn streaming(request: &ExplanationRequest, state: &mut ConversationState) {
        state.begin(request).expect("begin");
        state.mark_submitting();
        state.mark_streaming();
    }

    fn completed_initial(answer: &str) -> ConversationState {
        let mut state = ConversationState::new();
        streaming(&ExplanationRequest::default(), &mut state);
        state.apply(&content(answer));
        state.complete();
        state
    }

    #[test]
    fn new_state_is_idle() {
        let state = ConversationState::new();
        assert_eq!(state.status(), RequestStatus::Idle);
        assert_eq!(state.last_status_message(), "Idle");
        assert!(!state.error_flag());
        assert!(!state.can_follow_up());
    }

    #[test]
    fn blank_prompt_is_rejected_without_change() {
        let mut state = completed_initial("kept");
        let err = state.begin(&ExplanationRequest::explain("  \n\t ")).unwrap_err();
        assert!(matches!(err, ExplainError::BlankPrompt));
        assert_eq!(state.status(), RequestStatus::Completed);
        assert_eq!(state.initial_answer(), "kept");
    }

    #[test]
    fn overlapping_request_is_rejected() {
        let mut state = ConversationState::new();
        state.begin(&ExplanationRequest::default()).unwrap();
        let err = state
            .begin(&ExplanationRequest::follow_up("again?"))
            .unwrap_err();
        assert!(matches!(err, ExplainError::RequestInFlight));
        assert!(state.turns().is_empty());
        assert_eq!(state.status(), RequestStatus::Preparing);
    }

    #[test]
    fn content_accumulates_into_initial_answer() {
        let mut state = ConversationState::new();
        streaming(&ExplanationRequest::default(), &mut state);
        assert_eq!(state.apply(&content("Hello")), Applied::Appended(ContentTarget::InitialAnswer));
        state.apply(&content(" world"));
        assert_eq!(state.apply(&ProtocolEvent::Sentinel), Applied::Skipped);
        state.complete();

        assert_eq!(state.initial_answer(), "Hello world");
        assert_eq!(state.status(), RequestStatus::Completed);
        assert_eq!(state.last_status_message(), "Done");
        assert!(state.can_follow_up());
        assert!(state.turns().is_empty());
    }

    #[test]
    fn new_explanation_clears_previous_conversation() {
        let mut state = completed_initial("first answer");
        streaming(&ExplanationRequest::follow_up("why?"), &mut state);
        state.apply(&content("because"));
        state.complete();
        assert_eq!(state.turns().len(), 2);

        state.begin(&ExplanationRequest::explain("start over")).unwrap();
        assert_eq!(state.initial_answer(), "");
        assert!(state.turns().is_empty());
        assert!(!state.can_follow_up());
        assert_eq!(state.status(), RequestStatus::Preparing);
    }

    #[test]
    fn follow_up_appends_question_immediately() {
        let mut state = completed_initial("answer");
        state.begin(&ExplanationRequest::follow_up("what about X?")).unwrap();

        assert_eq!(state.turns().len(), 1);
        let q = &state.turns()[0];
        assert_eq!(q.role, Role::Question);
        assert_eq!(q.text, "what about X?");
        assert_eq!(state.initial_answer(), "answer");
    }

    #[test]
    fn follow_up_content_creates_then_extends_answer_turn() {
        let mut state = completed_initial("answer");
        streaming(&ExplanationRequest::follow_up("q1"), &mut state);

        let first = state.apply(&content("part one"));
        let second = state.apply(&content(", part two"));
        let Applied::Appended(ContentTarget::Turn(id)) = first else {
            panic!("follow-up text must land in a turn, got {first:?}");
        };
        assert_eq!(second, Applied::Appended(ContentTarget::Turn(id)));
        state.complete();

        assert_eq!(state.turns().len(), 2);
        assert_eq!(state.turns()[1].role, Role::Answer);
        assert_eq!(state.turns()[1].text, "part one, part two");
        assert_eq!(state.turns()[1].id, id);
        assert_eq!(state.initial_answer(), "answer");
    }

    #[test]
    fn second_follow_up_gets_its_own_answer_turn() {
        let mut state = completed_initial("answer");
        for (q, a) in [("q1", "a1"), ("q2", "a2")] {
            streaming(&ExplanationRequest::follow_up(q), &mut state);
            state.apply(&content(a));
            state.complete();
        }
        let roles: Vec<Role> = state.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::Question, Role::Answer, Role::Question, Role::Answer]
        );
        assert_eq!(state.turns()[3].text, "a2");
        let ids: Vec<u64> = state.turns().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn follow_up_completion_keeps_follow_up_eligibility() {
        let mut state = completed_initial("answer");
        streaming(&ExplanationRequest::follow_up("q"), &mut state);
        state.complete();
        assert!(state.can_follow_up());
    }

    #[test]
    fn error_event_fails_and_keeps_partial_text() {
        let mut state = ConversationState::new();
        streaming(&ExplanationRequest::default(), &mut state);
        state.apply(&content("partial "));
        let applied = state.apply(&ProtocolEvent::Error(
            "No key. Set it via /add-llm-keys.".into(),
        ));

        assert_eq!(applied, Applied::Halted);
        assert_eq!(state.status(), RequestStatus::Failed);
        assert!(state.error_flag());
        assert_eq!(state.initial_answer(), "partial ");
        assert_eq!(state.last_status_message(), "No key. Set it via \"API Keys\".");
        assert!(!state.can_follow_up());
    }

    #[test]
    fn events_after_failure_are_ignored() {
        let mut state = ConversationState::new();
        streaming(&ExplanationRequest::default(), &mut state);
        state.apply(&ProtocolEvent::Error("boom".into()));
        assert_eq!(state.apply(&content("late")), Applied::Halted);
        assert_eq!(state.initial_answer(), "");
    }

    #[test]
    fn remote_error_on_follow_up_keeps_question_turn() {
        let mut state = completed_initial("answer");
        streaming(&ExplanationRequest::follow_up("q"), &mut state);
        state.apply(&ProtocolEvent::Error("overloaded".into()));
        assert_eq!(state.turns().len(), 1);
        assert_eq!(state.turns()[0].role, Role::Question);
        assert_eq!(state.status(), RequestStatus::Failed);
    }

    #[test]
    fn sentinel_never_becomes_text() {
        let mut state = completed_initial("answer");
        streaming(&ExplanationRequest::follow_up("q"), &mut state);
        state.apply(&ProtocolEvent::Sentinel);
        state.complete();
        assert!(state.turns().iter().all(|t| !t.text.contains("[DONE]")));
        assert_eq!(state.turns().len(), 1);
    }

    #[test]
    fn begin_clears_error_flag() {
        let mut state = ConversationState::new();
        state.begin(&ExplanationRequest::default()).unwrap();
        state.fail(&ExplainError::Transport {
            detail: "refused".into(),
        });
        assert!(state.error_flag());
        assert_eq!(state.last_status_message(), "Connection error.");

        state.begin(&ExplanationRequest::default()).unwrap();
        assert!(!state.error_flag());
        assert_eq!(state.last_status_message(), "Preparing page…");
    }

    #[test]
    fn state_serialises_transcript() {
        let state = completed_initial("hi");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "Completed");
        assert_eq!(json["initial_answer"], "hi");
        assert!(json.get("next_turn_id").is_none());
    }
}
