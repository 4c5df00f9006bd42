//! Conversation types

use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Label shown next to a message in the UIs
    pub fn display_name(&self) -> &'static str {
        match self {
            ChatRole::System => "System",
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        }
    }

    /// Parse a role section header such as `system` or `user`
    pub fn parse(s: &str) -> Option<ChatRole> {
        match s.trim().to_lowercase().as_str() {
            "system" => Some(ChatRole::System),
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One message of a conversation, in the shape chat completion APIs expect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Latest user message of a conversation, used as the search query
pub fn latest_user_message(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(ChatRole::parse("system"), Some(ChatRole::System));
        assert_eq!(ChatRole::parse(" User "), Some(ChatRole::User));
        assert_eq!(ChatRole::parse("ASSISTANT"), Some(ChatRole::Assistant));
        assert_eq!(ChatRole::parse("tool"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hola")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hola"}"#);
    }

    #[test]
    fn test_latest_user_message() {
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("answer"),
            ChatMessage::user("second"),
            ChatMessage::assistant("another answer"),
        ];
        assert_eq!(latest_user_message(&messages), Some("second"));
        assert_eq!(latest_user_message(&[ChatMessage::system("x")]), None);
    }
}
