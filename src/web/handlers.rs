//! Request handlers for the sign-in routes.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

use super::error::WebError;
use super::session::{session_cookie, session_id_from_headers, ActiveSession, PendingAuth};
use super::AppState;
use crate::auth::oauth::parse_callback_query;
use crate::error::AuthError;

/// `GET /`: serve a cached token, or send the browser to sign in.
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let cookie = session_id_from_headers(&headers);
    let session = state.sessions.resolve(cookie.as_deref()).await;

    let response = match state
        .client
        .acquire_token_silent(&state.scopes, session.account.as_ref())
        .await
    {
        Ok(result) => format!(
            "[Non-Interactive] Access token is {}\n",
            result.access_token
        )
        .into_response(),
        Err(e) if e.requires_interaction() => {
            let request = state
                .client
                .auth_code_url(&state.redirect_uri, &state.scopes)
                .map_err(|e| WebError::unauthorized(e.to_string()))?;

            state
                .sessions
                .set_pending(
                    &session.id,
                    PendingAuth::new(request.state, request.pkce.verifier),
                )
                .await;

            info!("redirecting to auth: {}", request.url);
            Redirect::to(request.url.as_str()).into_response()
        }
        Err(e) => return Err(WebError::internal(e.to_string())),
    };

    Ok(with_session_cookie(response, &session))
}

/// `GET /redirect`: exchange the authorization code for a token.
pub async fn redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, WebError> {
    let (code, returned_state) = parse_callback_query(&params)?;

    let session_id = session_id_from_headers(&headers)
        .ok_or_else(|| WebError::bad_request("No sign-in in progress for this browser"))?;

    let pending = state
        .sessions
        .take_pending(&session_id)
        .await
        .ok_or_else(|| WebError::bad_request("No sign-in in progress for this browser"))?;

    if returned_state.as_deref() != Some(pending.state.as_str()) {
        return Err(AuthError::StateValidationFailed.into());
    }

    let result = state
        .client
        .acquire_token_by_auth_code(
            &code,
            &state.redirect_uri,
            &state.scopes,
            &pending.pkce_verifier,
        )
        .await?;

    if let Some(account) = result.account {
        state.sessions.set_account(&session_id, account).await;
    }

    Ok(format!("[Interactive] Access token is {}\n", result.access_token).into_response())
}

fn with_session_cookie(mut response: Response, session: &ActiveSession) -> Response {
    if session.created {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(&session.id)) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}
