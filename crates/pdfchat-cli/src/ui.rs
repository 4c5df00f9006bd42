//! UI utilities for the terminal

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use std::io::{self, IsTerminal, Write};

use pdfchat_core::{ChatMessage, ChatRole, Result, SourceDocument};

const PROMPT: &str = "pdfchat>";

/// Display startup banner
pub fn display_banner() {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(60, terminal_width.saturating_sub(4)).max(40);

    let top_border = format!("┌{}┐", "─".repeat(banner_width - 2));
    let bottom_border = format!("└{}┘", "─".repeat(banner_width - 2));
    let empty_line = format!("│{}│", " ".repeat(banner_width - 2));

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());

    let title = "pdfchat - Chat with your PDF";
    println!(
        "│  {}{}│",
        title.blue().bold(),
        " ".repeat(banner_width.saturating_sub(title.chars().count() + 4))
    );
    println!("{}", empty_line.blue());

    let feature_lines = [
        "/index <file.pdf>  index a PDF into the knowledge base",
        "/delete            delete the knowledge base",
        "/history           show the conversation",
        "",
        "Answers are grounded on Azure AI Search results",
    ];

    for line in feature_lines {
        if line.is_empty() {
            println!("{}", empty_line.blue());
        } else {
            let padding = banner_width.saturating_sub(line.chars().count() + 4);
            println!("{}", format!("│  {}{}│", line, " ".repeat(padding)).blue());
        }
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
    println!(
        "{}",
        "💡 Tip: index a PDF first, then ask questions about it. Type 'help' for commands".dimmed()
    );
    println!();
}

/// Read one line, with ↑/↓ navigating previous entries
pub async fn handle_input_with_history(history: &mut Vec<String>) -> Result<String> {
    // Piped input is read line by line without raw mode
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok("exit".to_string());
        }
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(input);
    }

    enable_raw_mode()?;
    let result = read_line_raw(history);
    disable_raw_mode()?;
    println!();
    result
}

fn redraw(input: &str) -> Result<()> {
    print!("\r{} {}\x1b[K", PROMPT.green().bold(), input);
    io::stdout().flush()?;
    Ok(())
}

fn read_line_raw(history: &mut Vec<String>) -> Result<String> {
    let mut input = String::new();
    let mut history_index: Option<usize> = None;
    redraw(&input)?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        match key_event.code {
            KeyCode::Enter => {
                if !input.trim().is_empty() {
                    history.push(input.clone());
                }
                return Ok(input.trim().to_string());
            }
            KeyCode::Char('c') | KeyCode::Char('d')
                if key_event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Ok("exit".to_string());
            }
            KeyCode::Char(c) => {
                input.push(c);
                redraw(&input)?;
            }
            KeyCode::Backspace => {
                input.pop();
                redraw(&input)?;
            }
            KeyCode::Up if !history.is_empty() => {
                let new_index = match history_index {
                    None => history.len() - 1,
                    Some(idx) => idx.saturating_sub(1),
                };
                history_index = Some(new_index);
                input = history[new_index].clone();
                redraw(&input)?;
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].clone();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    redraw(&input)?;
                }
            }
            KeyCode::Esc => return Ok(String::new()),
            _ => {}
        }
    }
}

/// Display help message
pub fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Ask a question about the indexed PDF", "<question>".green());
    println!("  {} - Index a PDF, replacing the knowledge base", "/index <path>".green());
    println!("  {} - Delete the knowledge base", "/delete".green());
    println!("  {} - Show the conversation so far", "/history".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit/quit".green());
    println!();
}

pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ️ ".cyan(), message);
}

/// Print an assistant reply followed by the titles it was grounded on
pub fn print_answer(reply: &str, sources: &[SourceDocument]) {
    println!("{} {}", "🤖".cyan(), reply);
    if !sources.is_empty() {
        println!("{}", format_sources(sources).dimmed());
    }
    println!();
}

/// One line listing the distinct source titles
pub fn format_sources(sources: &[SourceDocument]) -> String {
    let mut titles: Vec<&str> = Vec::new();
    for source in sources {
        if !titles.contains(&source.title.as_str()) {
            titles.push(&source.title);
        }
    }
    format!("Sources: {}", titles.join(", "))
}

/// Conversation as `Role: text` lines, oldest first
pub fn format_history(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return "No messages yet.".to_string();
    }

    history
        .iter()
        .map(|message| {
            let label = match message.role {
                ChatRole::User => "You",
                role => role.display_name(),
            };
            format!("{}: {}", label, message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_history() {
        let history = vec![
            ChatMessage::user("What is this about?"),
            ChatMessage::assistant("Essay writing."),
        ];
        insta::assert_snapshot!(format_history(&history), @r###"
        You: What is this about?
        Assistant: Essay writing.
        "###);
        assert_eq!(format_history(&[]), "No messages yet.");
    }

    #[test]
    fn test_format_sources_deduplicates_titles() {
        let source = |title: &str| SourceDocument {
            title: title.to_string(),
            content: String::new(),
        };
        let sources = vec![source("guide"), source("notes"), source("guide")];
        assert_eq!(format_sources(&sources), "Sources: guide, notes");
    }
}
