//! Grounding prompt templates
//!
//! Templates use the prompty layout: optional YAML front matter between `---`
//! lines, whose `model.parameters` map is sent with the chat request, followed
//! by role sections (`system:`, `user:`, `assistant:`) rendered with Jinja.

use minijinja::Environment;
use serde::Serialize;
use std::path::Path;

use pdfchat_core::{ChatMessage, ChatRole, CompletionParameters, Error, Result, SourceDocument};

const GROUNDED_CHAT: &str = include_str!("../assets/grounded_chat.prompty");

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Model parameters from the front matter
    pub parameters: CompletionParameters,
    sections: Vec<(ChatRole, String)>,
}

impl PromptTemplate {
    /// Built-in template answering strictly from retrieved documents
    pub fn grounded_chat() -> Result<Self> {
        Self::parse(GROUNDED_CHAT)
    }

    /// Load a template file
    pub fn from_prompty(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source).map_err(|e| match e {
            Error::Template(message) => Error::Template(format!("{}: {}", path.display(), message)),
            other => other,
        })
    }

    /// Parse template source
    pub fn parse(source: &str) -> Result<Self> {
        let (front_matter, body) = split_front_matter(source)?;
        let parameters = match front_matter {
            Some(yaml) => parameters_from_front_matter(yaml)?,
            None => CompletionParameters::new(),
        };

        let sections = split_role_sections(body);
        if sections.is_empty() {
            return Err(Error::Template("template has no message sections".to_string()));
        }

        Ok(Self {
            parameters,
            sections,
        })
    }

    /// Render the template into the messages that precede the conversation
    pub fn create_messages<C: Serialize>(
        &self,
        documents: &[SourceDocument],
        context: &C,
    ) -> Result<Vec<ChatMessage>> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        let ctx = minijinja::context! {
            documents => documents,
            context => context,
        };

        let mut messages = Vec::with_capacity(self.sections.len());
        for (role, template) in &self.sections {
            let rendered = env
                .render_str(template, &ctx)
                .map_err(|e| Error::Template(e.to_string()))?;
            let rendered = rendered.trim();
            if !rendered.is_empty() {
                messages.push(ChatMessage::new(*role, rendered));
            }
        }
        Ok(messages)
    }
}

/// Separate `---` delimited front matter from the body
fn split_front_matter(source: &str) -> Result<(Option<&str>, &str)> {
    let source = source.trim_start_matches('\u{feff}');
    let mut lines = source.split_inclusive('\n');

    let first = match lines.next() {
        Some(line) if line.trim_end() == "---" => line,
        _ => return Ok((None, source)),
    };

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == "---" {
            return Ok((Some(&source[start..offset]), &source[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(Error::Template("front matter is not closed with '---'".to_string()))
}

/// Read `model.parameters` (or top-level `parameters`) from the front matter
fn parameters_from_front_matter(yaml: &str) -> Result<CompletionParameters> {
    let front: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| Error::Template(format!("front matter: {e}")))?;

    let parameters = front
        .get("model")
        .and_then(|model| model.get("parameters"))
        .or_else(|| front.get("parameters"));

    match parameters {
        None => Ok(CompletionParameters::new()),
        Some(value) => match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(map),
            serde_json::Value::Null => Ok(CompletionParameters::new()),
            _ => Err(Error::Template("parameters must be a mapping".to_string())),
        },
    }
}

/// Split the body at `role:` header lines; text before the first header is system text
fn split_role_sections(body: &str) -> Vec<(ChatRole, String)> {
    let mut sections = Vec::new();
    let mut role = ChatRole::System;
    let mut buffer = String::new();

    for line in body.split_inclusive('\n') {
        if let Some(next) = role_header(line) {
            if !buffer.trim().is_empty() {
                sections.push((role, std::mem::take(&mut buffer)));
            }
            buffer.clear();
            role = next;
            continue;
        }
        buffer.push_str(line);
    }

    if !buffer.trim().is_empty() {
        sections.push((role, buffer));
    }
    sections
}

fn role_header(line: &str) -> Option<ChatRole> {
    let name = line.trim().strip_suffix(':')?;
    ChatRole::parse(name)
}
