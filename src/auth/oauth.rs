//! Identity platform endpoints, PKCE, and token wire types.

use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

/// Scopes the library always requests alongside the caller's.
pub const OIDC_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// A parsed authority such as `https://login.microsoftonline.com/organizations`.
#[derive(Debug, Clone)]
pub struct Authority {
    base: String,
    host: String,
}

impl Authority {
    /// Parse an authority URL.
    ///
    /// Plain `http` is only accepted for loopback hosts.
    pub fn parse(authority: &str) -> Result<Self, AuthError> {
        let url = Url::parse(authority)
            .map_err(|e| AuthError::InvalidAuthority(format!("{}: {}", authority, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| AuthError::InvalidAuthority(format!("{}: missing host", authority)))?
            .to_string();

        match url.scheme() {
            "https" => {}
            "http" if is_loopback(&host) => {}
            scheme => {
                return Err(AuthError::InvalidAuthority(format!(
                    "{}: unsupported scheme {}",
                    authority, scheme
                )))
            }
        }

        if url.path().trim_matches('/').is_empty() {
            return Err(AuthError::InvalidAuthority(format!(
                "{}: missing tenant",
                authority
            )));
        }

        let base = authority.trim_end_matches('/').to_string();
        Ok(Self { base, host })
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.base)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.base)
    }

    pub fn device_code_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/devicecode", self.base)
    }

    /// Host of the authority, recorded on accounts.
    pub fn environment(&self) -> &str {
        &self.host
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// The code verifier (stored locally, sent in token exchange).
    pub verifier: String,
    /// The code challenge (SHA256 hash of verifier, sent in auth request).
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let verifier_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        let verifier = URL_SAFE_NO_PAD.encode(&verifier_bytes);

        Self {
            challenge: challenge_for(&verifier),
            verifier,
        }
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

/// BASE64URL(SHA256(verifier))
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state value for CSRF protection.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let state_bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&state_bytes)
}

/// Join the requested scopes with the OIDC scopes, without duplicates.
pub fn scope_string(scopes: &[String]) -> String {
    let mut all: Vec<&str> = Vec::with_capacity(scopes.len() + OIDC_SCOPES.len());
    for scope in scopes.iter().map(String::as_str).chain(OIDC_SCOPES) {
        if !all.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            all.push(scope);
        }
    }
    all.join(" ")
}

/// Token response from the identity platform.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body returned by the token and device code endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    pub fn into_error(self) -> AuthError {
        AuthError::TokenRejected {
            error: self.error,
            description: self.error_description.unwrap_or_default(),
        }
    }
}

/// Parse the query of a redirect back from the authorize endpoint.
///
/// Returns the authorization code and the state, if one was sent.
pub fn parse_callback_query(
    params: &HashMap<String, String>,
) -> Result<(String, Option<String>), AuthError> {
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        return Err(AuthError::OAuthFailed(description));
    }

    let code = params
        .get("code")
        .filter(|code| !code.is_empty())
        .ok_or(AuthError::MissingAuthCode)?
        .clone();

    Ok((code, params.get("state").cloned()))
}
