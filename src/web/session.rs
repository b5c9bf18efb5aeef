//! Per-browser session state for the web sample.
//!
//! Each browser gets its own session id in a cookie. The session remembers
//! the signed-in account and the authorization request that is in flight.

use crate::auth::Account;
use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "msal_session";

/// Sessions idle for longer than this are dropped.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);
/// Authorization requests not completed within this window are discarded.
const PENDING_AUTH_TTL: Duration = Duration::from_secs(10 * 60);

/// An authorization request waiting for the redirect back.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub state: String,
    pub pkce_verifier: Zeroizing<String>,
    created_at: Instant,
}

impl PendingAuth {
    pub fn new(state: String, pkce_verifier: String) -> Self {
        Self {
            state,
            pkce_verifier: Zeroizing::new(pkce_verifier),
            created_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    account: Option<Account>,
    pending: Option<PendingAuth>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            account: None,
            pending: None,
            last_seen: Instant::now(),
        }
    }
}

/// A session looked up (or created) for a request.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: String,
    pub account: Option<Account>,
    /// True when the browser has to be given a new cookie.
    pub created: bool,
}

/// Thread-safe in-memory session store.
pub struct SessionStore {
    idle_ttl: Duration,
    pending_ttl: Duration,
    inner: RwLock<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(SESSION_IDLE_TTL, PENDING_AUTH_TTL)
    }

    pub fn with_ttl(idle_ttl: Duration, pending_ttl: Duration) -> Self {
        Self {
            idle_ttl,
            pending_ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Find the session for `id`. Unknown or expired ids get a fresh id that
    /// is only stored once an authorization request is attached to it.
    pub async fn resolve(&self, id: Option<&str>) -> ActiveSession {
        if let Some(id) = id {
            let mut guard = self.inner.write().await;
            let now = Instant::now();
            match guard.get_mut(id) {
                Some(session) if now.duration_since(session.last_seen) < self.idle_ttl => {
                    session.last_seen = now;
                    return ActiveSession {
                        id: id.to_string(),
                        account: session.account.clone(),
                        created: false,
                    };
                }
                Some(_) => {
                    guard.remove(id);
                }
                None => {}
            }
        }

        ActiveSession {
            id: Uuid::new_v4().to_string(),
            account: None,
            created: true,
        }
    }

    /// Remember an authorization request, replacing any earlier one.
    pub async fn set_pending(&self, id: &str, pending: PendingAuth) {
        let mut guard = self.inner.write().await;
        self.purge(&mut guard);

        let session = guard.entry(id.to_string()).or_insert_with(Session::new);
        session.pending = Some(pending);
        session.last_seen = Instant::now();
        debug!("Sign-in started ({} sessions)", guard.len());
    }

    /// Claim the pending authorization request. It can only be claimed once.
    pub async fn take_pending(&self, id: &str) -> Option<PendingAuth> {
        let mut guard = self.inner.write().await;
        let pending = guard.get_mut(id)?.pending.take()?;
        if pending.created_at.elapsed() >= self.pending_ttl {
            return None;
        }
        Some(pending)
    }

    /// Record the account that signed in through this session.
    pub async fn set_account(&self, id: &str, account: Account) {
        let mut guard = self.inner.write().await;
        let session = guard.entry(id.to_string()).or_insert_with(Session::new);
        session.account = Some(account);
        session.last_seen = Instant::now();
    }

    /// Drop idle sessions, and sessions that never finished signing in.
    fn purge(&self, sessions: &mut HashMap<String, Session>) {
        let now = Instant::now();
        sessions.retain(|_, session| {
            let signing_in = session
                .pending
                .as_ref()
                .is_some_and(|p| now.duration_since(p.created_at) < self.pending_ttl);
            now.duration_since(session.last_seen) < self.idle_ttl
                && (session.account.is_some() || signing_in)
        });
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// Read the session id from the request cookies.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a new session.
pub fn session_cookie(id: &str) -> String {
    format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, id)
}
