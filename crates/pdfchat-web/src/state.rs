//! Shared state for the web shell

use axum::http::{HeaderMap, header};
use minijinja::Environment;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use pdfchat_rag::{ChatSession, KnowledgeBase};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "pdfchat_session";

/// Outcome message shown once on the next page render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }
}

/// Everything the web shell keeps for one browser
#[derive(Debug, Default)]
pub struct WebSession {
    pub chat: ChatSession,
    pub logged_in: bool,
    pub flashes: Vec<Flash>,
}

/// Sessions idle longer than this are dropped
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on live sessions; the least recently seen goes first
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct SessionEntry {
    session: Arc<Mutex<WebSession>>,
    last_seen: Instant,
}

/// Sessions keyed by cookie value
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Session named by the request cookie, or a fresh one.
    ///
    /// Returns the id, the session and whether the id is new and must be set as a cookie.
    pub async fn resolve(&self, headers: &HeaderMap) -> (String, Arc<Mutex<WebSession>>, bool) {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        self.evict_idle(&mut sessions, now);

        if let Some(id) = session_cookie(headers) {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = now;
                return (id, entry.session.clone(), false);
            }
        }

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    tracing::debug!(session = %id, "evicted least recently seen session");
                }
                None => break,
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(WebSession::default()));
        sessions.insert(
            id.clone(),
            SessionEntry {
                session: session.clone(),
                last_seen: now,
            },
        );
        tracing::debug!(session = %id, "created session");
        (id, session, true)
    }

    /// Existing session named by the request cookie; never creates one
    pub async fn lookup(&self, headers: &HeaderMap) -> Option<Arc<Mutex<WebSession>>> {
        let id = session_cookie(headers)?;
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        self.evict_idle(&mut sessions, now);

        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "dropped idle sessions");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Value of the session cookie, if the request has one
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// State shared across all handlers
pub struct AppState {
    pub knowledge_base: Arc<KnowledgeBase>,
    pub sessions: SessionStore,
    pub templates: Environment<'static>,
}

impl AppState {
    pub fn new(knowledge_base: Arc<KnowledgeBase>) -> anyhow::Result<Self> {
        let mut templates = Environment::new();
        templates.add_template("index.html", include_str!("../templates/index.html"))?;

        Ok(Self {
            knowledge_base,
            sessions: SessionStore::default(),
            templates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; pdfchat_session=abc-123; lang=en"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc-123"));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("pdfchat_session="));
        assert_eq!(session_cookie(&empty), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_resolve_reuses_known_session_only() {
        let store = SessionStore::default();
        let (id, _, created) = store.resolve(&HeaderMap::new()).await;
        assert!(created);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, id)).unwrap(),
        );
        let (same, _, created) = store.resolve(&headers).await;
        assert_eq!(same, id);
        assert!(!created);

        let mut unknown = HeaderMap::new();
        unknown.insert(header::COOKIE, HeaderValue::from_static("pdfchat_session=stale"));
        let (fresh, _, created) = store.resolve(&unknown).await;
        assert_ne!(fresh, "stale");
        assert!(created);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_resolve_caps_live_sessions() {
        let store = SessionStore::with_limits(DEFAULT_SESSION_TTL, 8);
        for _ in 0..500 {
            store.resolve(&HeaderMap::new()).await;
        }
        assert_eq!(store.len().await, 8);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_dropped() {
        let store = SessionStore::with_limits(Duration::ZERO, 100);
        let (id, _, _) = store.resolve(&HeaderMap::new()).await;
        store.resolve(&HeaderMap::new()).await;
        assert_eq!(store.len().await, 1);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, id)).unwrap(),
        );
        assert!(store.lookup(&headers).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_never_creates() {
        let store = SessionStore::default();
        let mut unknown = HeaderMap::new();
        unknown.insert(header::COOKIE, HeaderValue::from_static("pdfchat_session=stale"));
        assert!(store.lookup(&unknown).await.is_none());
        assert!(store.lookup(&HeaderMap::new()).await.is_none());
        assert_eq!(store.len().await, 0);

        let (id, _, _) = store.resolve(&HeaderMap::new()).await;
        let mut known = HeaderMap::new();
        known.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, id)).unwrap(),
        );
        assert!(store.lookup(&known).await.is_some());
        assert_eq!(store.len().await, 1);
    }
}
