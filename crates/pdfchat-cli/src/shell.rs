//! Interactive terminal chat over the knowledge base

use std::path::PathBuf;

use pdfchat_core::{DocumentRecord, Result};
use pdfchat_rag::{ChatSession, GroundedAnswer, KnowledgeBase};

use crate::ui::{
    display_banner, format_history, handle_input_with_history, print_answer, print_error,
    print_help, print_info, print_success,
};

/// A parsed line of shell input
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Index(PathBuf),
    Delete,
    History,
    Help,
    Exit,
    Ask(String),
    Empty,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head.to_lowercase().as_str() {
            "" => ShellCommand::Empty,
            "/index" | "/upload" if !rest.is_empty() => {
                ShellCommand::Index(PathBuf::from(rest.trim_matches(|c| c == '"' || c == '\'')))
            }
            "/delete" => ShellCommand::Delete,
            "/history" => ShellCommand::History,
            "help" | "/help" => ShellCommand::Help,
            "exit" | "quit" | "/exit" | "/quit" => ShellCommand::Exit,
            _ => ShellCommand::Ask(line.to_string()),
        }
    }
}

/// What a handled command produced
#[derive(Debug)]
pub enum ShellReply {
    Indexed(DocumentRecord),
    Deleted,
    History(String),
    Answer(GroundedAnswer),
    Help,
    Ignored,
    Exit,
}

/// Terminal counterpart of the web shell, owning a single session
pub struct ChatShell {
    knowledge_base: KnowledgeBase,
    session: ChatSession,
}

impl ChatShell {
    pub fn new(knowledge_base: KnowledgeBase) -> Self {
        Self {
            knowledge_base,
            session: ChatSession::new(),
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Run one line of input against the session
    pub async fn handle(&mut self, line: &str) -> Result<ShellReply> {
        match ShellCommand::parse(line) {
            ShellCommand::Empty => Ok(ShellReply::Ignored),
            ShellCommand::Help => Ok(ShellReply::Help),
            ShellCommand::Exit => Ok(ShellReply::Exit),
            ShellCommand::History => Ok(ShellReply::History(format_history(
                self.session.history(),
            ))),
            ShellCommand::Index(path) => {
                let record = self.knowledge_base.upload(&mut self.session, &path).await?;
                Ok(ShellReply::Indexed(record))
            }
            ShellCommand::Delete => {
                self.knowledge_base.remove(&mut self.session).await?;
                Ok(ShellReply::Deleted)
            }
            ShellCommand::Ask(query) => {
                match self.knowledge_base.converse(&mut self.session, &query).await? {
                    Some(answer) => Ok(ShellReply::Answer(answer)),
                    None => Ok(ShellReply::Ignored),
                }
            }
        }
    }

    /// Log in once, then read and answer lines until `exit`
    pub async fn run(&mut self) -> Result<()> {
        display_banner();

        match self.knowledge_base.authenticate().await {
            Ok(_) => print_success("Logged in to Azure"),
            Err(e) => print_error(&format!("Login failed: {}", e)),
        }

        let mut input_history = Vec::new();
        loop {
            let line = handle_input_with_history(&mut input_history).await?;
            match self.handle(&line).await {
                Ok(ShellReply::Exit) => break,
                Ok(ShellReply::Ignored) => {}
                Ok(ShellReply::Help) => print_help(),
                Ok(ShellReply::History(text)) => println!("{}\n", text),
                Ok(ShellReply::Indexed(record)) => print_success(&format!(
                    "Indexed '{}' ({} characters). You can now ask questions.",
                    record.title,
                    record.content.chars().count()
                )),
                Ok(ShellReply::Deleted) => print_success("Knowledge base deleted"),
                Ok(ShellReply::Answer(answer)) => {
                    print_answer(&answer.message.content, &answer.grounding_data)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "shell command failed");
                    print_error(&e.to_string());
                    if !self.session.is_ready() {
                        print_info("Index a PDF with /index <path> to start chatting");
                    }
                }
            }
        }

        println!("👋 Goodbye!");
        Ok(())
    }
}
