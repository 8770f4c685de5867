//! Observer trait for live conversation updates.
//!
//! Inject an [`Arc<dyn ConversationObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] to be told about every
//! mutation the orchestrator makes to a
//! [`crate::conversation::ConversationState`].
//!
//! # Why callbacks instead of polling?
//!
//! `submit` holds the state mutably for the whole request, so a UI cannot read
//! it while text is streaming. The observer receives each change as it
//! happens, in the same order it is applied to the state; forward events to a
//! channel, a terminal, or a window from there.
//!
//! # Example
//!
//! ```rust
//! use pagelens::{ClientConfig, ConversationObserver, ContentTarget};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Transcript(Mutex<String>);
//!
//! impl ConversationObserver for Transcript {
//!     fn on_content(&self, _target: ContentTarget, text: &str) {
//!         self.0.lock().unwrap().push_str(text);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .observer(Arc::new(Transcript::default()) as Arc<dyn ConversationObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::conversation::{ContentTarget, ConversationTurn, RequestStatus};
use std::sync::Arc;

/// Called by [`crate::explain::Explainer`] as a request progresses.
///
/// All methods default to no-ops so implementations override only what they
/// need. Calls for one request come from one task, strictly in order.
pub trait ConversationObserver: Send + Sync {
    /// The request moved to `status`; `message` is the new status line.
    fn on_status(&self, status: RequestStatus, message: &str) {
        let _ = (status, message);
    }

    /// A follow-up `Question` turn was appended.
    fn on_question(&self, turn: &ConversationTurn) {
        let _ = turn;
    }

    /// `text` was appended to `target`.
    fn on_content(&self, target: ContentTarget, text: &str) {
        let _ = (target, text);
    }

    /// The request reached `Completed` or `Failed`.
    ///
    /// # Arguments
    /// * `status`: terminal status
    /// * `message`: final status line (success indicator or error text)
    fn on_finished(&self, status: RequestStatus, message: &str) {
        let _ = (status, message);
    }
}

/// An observer that ignores everything. Used when none is configured.
pub struct NoopObserver;

impl ConversationObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type SharedObserver = Arc<dyn ConversationObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        statuses: Mutex<Vec<RequestStatus>>,
        questions: AtomicUsize,
        text: Mutex<String>,
        finished: Mutex<Option<RequestStatus>>,
    }

    impl ConversationObserver for Recording {
        fn on_status(&self, status: RequestStatus, _message: &str) {
            self.statuses.lock().unwrap().push(status);
        }

        fn on_question(&self, _turn: &ConversationTurn) {
            self.questions.fetch_add(1, Ordering::SeqCst);
        }

        fn on_content(&self, _target: ContentTarget, text: &str) {
            self.text.lock().unwrap().push_str(text);
        }

        fn on_finished(&self, status: RequestStatus, _message: &str) {
            *self.finished.lock().unwrap() = Some(status);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_status(RequestStatus::Preparing, "Preparing page…");
        o.on_question(&ConversationTurn {
            id: 1,
            role: Role::Question,
            text: "why?".into(),
        });
        o.on_content(ContentTarget::InitialAnswer, "text");
        o.on_finished(RequestStatus::Completed, "Done");
    }

    #[test]
    fn recording_observer_receives_events() {
        let r = Recording::default();
        r.on_status(RequestStatus::Preparing, "");
        r.on_status(RequestStatus::Streaming, "");
        r.on_question(&ConversationTurn {
            id: 1,
            role: Role::Question,
            text: "q".into(),
        });
        r.on_content(ContentTarget::Turn(2), "a");
        r.on_content(ContentTarget::Turn(2), "b");
        r.on_finished(RequestStatus::Completed, "Done");

        assert_eq!(
            *r.statuses.lock().unwrap(),
            vec![RequestStatus::Preparing, RequestStatus::Streaming]
        );
        assert_eq!(r.questions.load(Ordering::SeqCst), 1);
        assert_eq!(*r.text.lock().unwrap(), "ab");
        assert_eq!(*r.finished.lock().unwrap(), Some(RequestStatus::Completed));
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: SharedObserver = Arc::new(NoopObserver);
        o.on_status(RequestStatus::Submitting, "Thinking...");
        o.on_content(ContentTarget::InitialAnswer, "x");
    }
}
