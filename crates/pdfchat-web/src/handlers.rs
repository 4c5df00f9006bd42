//! Page and form handlers

use axum::Form;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use pdfchat_core::{ChatMessage, ChatRole};
use pdfchat_rag::ChatSession;

use crate::state::{AppState, Flash, SESSION_COOKIE, WebSession};

/// Attach the session cookie when the session was just created
fn with_session_cookie(mut response: Response, id: &str, created: bool) -> Response {
    if created {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(error) => tracing::warn!(%error, "invalid session cookie value"),
        }
    }
    response
}

/// Log in with the service principal unless this session already has
async fn ensure_logged_in(state: &AppState, session: &mut WebSession) {
    if session.logged_in {
        return;
    }
    match state.knowledge_base.authenticate().await {
        Ok(_) => session.logged_in = true,
        Err(e) => {
            tracing::warn!(error = %e, "azure login failed");
            session.flashes.push(Flash::error(format!("Azure login failed: {}", e)));
        }
    }
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    role: &'static str,
    is_user: bool,
    content: &'a str,
}

fn history_entries(history: &[ChatMessage]) -> Vec<HistoryEntry<'_>> {
    history
        .iter()
        .rev()
        .map(|message| HistoryEntry {
            role: message.role.display_name(),
            is_user: message.role == ChatRole::User,
            content: &message.content,
        })
        .collect()
}

/// GET /
pub(crate) async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers).await;
    let mut session = session.lock().await;
    ensure_logged_in(&state, &mut session).await;

    let flashes = std::mem::take(&mut session.flashes);
    let rendered = state.templates.get_template("index.html").and_then(|template| {
        template.render(minijinja::context! {
            ready => session.chat.is_ready(),
            history => history_entries(session.chat.history()),
            flashes => flashes,
        })
    });

    let response = match rendered {
        Ok(html) => Html(html).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
        }
    };
    with_session_cookie(response, &id, created)
}

/// True for names ending in `.pdf`, ignoring case
fn is_pdf_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Read the `file` field of an upload form
async fn read_pdf_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), String> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err("Select a PDF file to upload.".to_string()),
            Err(error) => {
                tracing::warn!(%error, "failed to read upload form");
                return Err(format!("Could not read the upload: {}", error));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let file_name = Path::new(&original_name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        if file_name.is_empty() {
            return Err("Select a PDF file to upload.".to_string());
        }
        if !is_pdf_name(&file_name) {
            return Err(format!("'{}' is not a PDF file.", file_name));
        }

        let data = field.bytes().await.map_err(|error| {
            tracing::warn!(%error, "failed to read upload bytes");
            format!("Could not read '{}': {}", file_name, error)
        })?;
        if data.is_empty() {
            return Err(format!("'{}' is empty.", file_name));
        }
        return Ok((file_name, data.to_vec()));
    }
}

/// POST /upload
pub(crate) async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers).await;
    let mut session = session.lock().await;

    let flash = match read_pdf_field(&mut multipart).await {
        Err(message) => Flash::error(message),
        Ok((file_name, data)) => match index_upload(&state, &mut session, &file_name, &data).await {
            Ok(()) => Flash::success(format!("'{}' was uploaded and indexed.", file_name)),
            Err(message) => Flash::error(message),
        },
    };
    session.flashes.push(flash);

    with_session_cookie(Redirect::to("/").into_response(), &id, created)
}

/// Save the upload under its own name in a scratch directory and index it
async fn index_upload(
    state: &AppState,
    session: &mut WebSession,
    file_name: &str,
    data: &[u8],
) -> Result<(), String> {
    let scratch = tempfile::tempdir().map_err(|e| format!("Could not store the upload: {}", e))?;
    let path = scratch.path().join(file_name);
    tokio::fs::write(&path, data).await.map_err(|error| {
        tracing::warn!(%error, path = %path.display(), "failed to write upload");
        format!("Could not store the upload: {}", error)
    })?;

    state
        .knowledge_base
        .upload(&mut session.chat, &path)
        .await
        .map(|_| ())
        .map_err(|e| format!("Error indexing '{}': {}", file_name, e))
}

/// POST /delete
pub(crate) async fn delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers).await;
    let mut session = session.lock().await;

    let flash = match state.knowledge_base.remove(&mut session.chat).await {
        Ok(()) => Flash::success("The knowledge base was deleted."),
        Err(e) => Flash::error(format!("Error deleting the index: {}", e)),
    };
    session.flashes.push(flash);

    with_session_cookie(Redirect::to("/").into_response(), &id, created)
}

#[derive(Deserialize)]
pub(crate) struct ChatForm {
    #[serde(default)]
    query: String,
}

/// POST /chat
pub(crate) async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers).await;
    let mut session = session.lock().await;

    if !session.chat.is_ready() {
        session
            .flashes
            .push(Flash::info("Upload and index a PDF to enable the chat."));
    } else if let Err(e) = state
        .knowledge_base
        .converse(&mut session.chat, &form.query)
        .await
    {
        session
            .flashes
            .push(Flash::error(format!("Error asking the model: {}", e)));
    }

    with_session_cookie(Redirect::to("/").into_response(), &id, created)
}

/// GET /api/health
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/session
///
/// Unknown or missing cookies get the empty state without creating a session.
pub(crate) async fn session_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ChatSession> {
    match state.sessions.lookup(&headers).await {
        Some(session) => Json(session.lock().await.chat.clone()),
        None => Json(ChatSession::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_name() {
        assert!(is_pdf_name("guide.pdf"));
        assert!(is_pdf_name("GUIDE.PDF"));
        assert!(!is_pdf_name("guide.pdf.exe"));
        assert!(!is_pdf_name("guide"));
    }

    #[test]
    fn test_history_entries_newest_first() {
        let history = vec![ChatMessage::user("question"), ChatMessage::assistant("answer")];
        let entries = history_entries(&history);
        assert_eq!(entries[0].content, "answer");
        assert!(!entries[0].is_user);
        assert_eq!(entries[1].role, "User");
    }
}
