//! Per-user conversation state

use serde::Serialize;

use pdfchat_core::ChatMessage;

/// State of one chat session: whether the knowledge base is ready and the turns so far
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatSession {
    ready: bool,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a PDF has been indexed and chat is available
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Turns in the order they happened
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Conversation to send for a new query: the history plus the query as a user turn
    pub fn conversation_with(&self, query: &str) -> Vec<ChatMessage> {
        let mut conversation = self.history.clone();
        conversation.push(ChatMessage::user(query));
        conversation
    }

    /// Append a completed exchange
    pub(crate) fn record_turn(&mut self, query: &str, reply: &str) {
        self.history.push(ChatMessage::user(query));
        self.history.push(ChatMessage::assistant(reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_not_ready() {
        let session = ChatSession::new();
        assert!(!session.is_ready());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_conversation_with_does_not_modify_history() {
        let mut session = ChatSession::new();
        session.record_turn("first", "one");

        let conversation = session.conversation_with("second");
        assert_eq!(
            conversation,
            vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("one"),
                ChatMessage::user("second"),
            ]
        );
        assert_eq!(session.history().len(), 2);
    }
}
