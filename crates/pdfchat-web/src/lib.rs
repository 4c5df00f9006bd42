//! Web interface for pdfchat
//!
//! A single page lets the user upload a PDF, delete the knowledge base and
//! chat with it. Each browser gets its own session through a cookie.

mod handlers;
mod server;
mod state;


pub use server::{DEFAULT_BIND, router, serve};
pub use state::{
    AppState, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL, Flash, FlashKind, SESSION_COOKIE,
    SessionStore, WebSession,
};
