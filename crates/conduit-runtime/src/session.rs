//! Conversation sessions.
//!
//! A session holds the mode selected by the user's last bare directive and a
//! bounded window of prior turns. Only user queries and final answers are
//! kept; retrieved context and tool traffic stay inside the query that
//! produced them.

use chrono::{DateTime, Utc};
use conduit_core::OperatingMode;
use conduit_llm::Message;
use uuid::Uuid;

use crate::trace::ExecutionTrace;

/// One user's conversation.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// Mode used when a turn carries no directive.
    pub mode: OperatingMode,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    history: Vec<Message>,
    max_history: usize,
    turns: usize,
    last_trace: Option<ExecutionTrace>,
}

impl Session {
    /// Create a session.
    #[must_use]
    pub fn new(mode: OperatingMode, max_history: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            created_at: Utc::now(),
            history: Vec::new(),
            max_history,
            turns: 0,
            last_trace: None,
        }
    }

    /// Switch the session mode.
    pub fn set_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
    }

    /// Prior turns, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Append a completed exchange, dropping the oldest messages beyond the
    /// window.
    pub fn record_exchange(&mut self, query: &str, answer: &str) {
        self.history.push(Message::user(query));
        self.history.push(Message::assistant(answer));
        self.turns = self.turns.saturating_add(1);

        let excess = self.history.len().saturating_sub(self.max_history);
        if excess > 0 {
            self.history.drain(..excess);
        }
    }

    /// Forget all prior turns.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Completed exchanges since creation.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns
    }

    /// Trace of the most recent query, including failed ones.
    #[must_use]
    pub fn last_trace(&self) -> Option<&ExecutionTrace> {
        self.last_trace.as_ref()
    }

    pub(crate) fn set_last_trace(&mut self, trace: Option<ExecutionTrace>) {
        self.last_trace = trace;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = Session::new(OperatingMode::Auto, 10);
        assert_eq!(session.mode, OperatingMode::Auto);
        assert!(session.history().is_empty());
        assert!(session.last_trace().is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = Session::new(OperatingMode::Chat, 4);
        for i in 0..5 {
            session.record_exchange(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[0].text(), Some("q3"));
        assert_eq!(session.history()[3].text(), Some("a4"));
        assert_eq!(session.turn_count(), 5);
    }

    #[test]
    fn test_zero_window_keeps_nothing() {
        let mut session = Session::new(OperatingMode::Chat, 0);
        session.record_exchange("q", "a");
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_clear_keeps_mode() {
        let mut session = Session::new(OperatingMode::Chat, 4);
        session.set_mode(OperatingMode::Agent);
        session.record_exchange("q", "a");
        session.clear_history();
        assert!(session.history().is_empty());
        assert_eq!(session.mode, OperatingMode::Agent);
    }
}
