//! In-process stand-in for the identity platform token endpoints.

use axum::{
    extract::{Form, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Reply = (StatusCode, Value);

struct MockState {
    token_replies: Mutex<VecDeque<Reply>>,
    token_fallback: Mutex<Reply>,
    device_code_reply: Mutex<Reply>,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
}

pub(crate) struct MockIdentityPlatform {
    pub authority: String,
    state: Arc<MockState>,
}

impl MockIdentityPlatform {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            token_replies: Mutex::new(VecDeque::new()),
            token_fallback: Mutex::new((
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_grant", "error_description": "no reply queued" }),
            )),
            device_code_reply: Mutex::new((StatusCode::OK, device_code_reply(0))),
            token_requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/{tenant}/oauth2/v2.0/token", post(token))
            .route("/{tenant}/oauth2/v2.0/devicecode", post(device_code))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock identity platform");
        let addr = listener.local_addr().expect("mock address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock identity platform");
        });

        Self {
            authority: format!("http://{}/contoso", addr),
            state,
        }
    }

    /// Queue a token endpoint reply. Replies are served in order.
    pub fn push_token_reply(&self, status: StatusCode, body: Value) {
        self.state
            .token_replies
            .lock()
            .expect("mock lock")
            .push_back((status, body));
    }

    /// Reply served once the queue is empty.
    pub fn set_token_fallback(&self, status: StatusCode, body: Value) {
        *self.state.token_fallback.lock().expect("mock lock") = (status, body);
    }

    pub fn set_device_code_reply(&self, status: StatusCode, body: Value) {
        *self.state.device_code_reply.lock().expect("mock lock") = (status, body);
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.state.token_requests.lock().expect("mock lock").clone()
    }
}

async fn token(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.token_requests.lock().expect("mock lock").push(form);
    let queued = state.token_replies.lock().expect("mock lock").pop_front();
    let (status, body) =
        queued.unwrap_or_else(|| state.token_fallback.lock().expect("mock lock").clone());
    (status, Json(body))
}

async fn device_code(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    let (status, body) = state.device_code_reply.lock().expect("mock lock").clone();
    (status, Json(body))
}

/// Unsigned ID token carrying the claims accounts are built from.
pub(crate) fn id_token(oid: &str, tid: &str, username: &str) -> String {
    let claims = json!({
        "oid": oid,
        "tid": tid,
        "sub": format!("sub-{}", oid),
        "preferred_username": username,
        "name": username,
    });
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub(crate) fn token_reply(access_token: &str, id_token: Option<String>) -> Value {
    let mut body = json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "expires_in": 3600,
        "refresh_token": format!("rt-{}", access_token),
        "scope": "User.Read openid profile offline_access",
    });
    if let Some(id_token) = id_token {
        body["id_token"] = Value::String(id_token);
    }
    body
}

pub(crate) fn device_code_reply(interval: u64) -> Value {
    json!({
        "device_code": "device-code-123",
        "user_code": "ABCD-1234",
        "verification_uri": "https://microsoft.com/devicelogin",
        "expires_in": 900,
        "interval": interval,
        "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code ABCD-1234 to authenticate."
    })
}

pub(crate) fn error_reply(error: &str) -> Value {
    json!({ "error": error, "error_description": format!("AADSTS: {}", error) })
}
