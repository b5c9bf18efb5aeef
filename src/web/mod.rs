//! Web front end for the confidential client sample.
//!
//! `GET /` tries a silent token lookup for the browser's session and sends
//! the browser to the authorization endpoint on a cache miss. `GET /redirect`
//! is the redirect target and exchanges the returned code for a token.

pub mod error;
pub mod handlers;
pub mod session;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::auth::ConfidentialClient;
use session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ConfidentialClient>,
    pub sessions: Arc<SessionStore>,
    pub redirect_uri: Arc<str>,
    pub scopes: Arc<[String]>,
}

impl AppState {
    pub fn new(client: ConfidentialClient, redirect_uri: String, scopes: Vec<String>) -> Self {
        Self {
            client: Arc::new(client),
            sessions: Arc::new(SessionStore::new()),
            redirect_uri: redirect_uri.into(),
            scopes: scopes.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/redirect", get(handlers::redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
