//! Terminal interface for pdfchat

mod shell;
mod ui;

#[cfg(test)]
mod tests;

pub use shell::{ChatShell, ShellCommand, ShellReply};
pub use ui::{
    display_banner, format_history, format_sources, handle_input_with_history, print_answer,
    print_error, print_help, print_info, print_success,
};

// Re-export core types
pub use pdfchat_core::{Error, Result};
