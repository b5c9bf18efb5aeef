//! Token endpoint plumbing shared by the confidential and public clients.

use crate::auth::account::Account;
use crate::auth::cache::{normalize_scopes, CacheEntry, TokenCache};
use crate::auth::oauth::{scope_string, Authority, TokenErrorResponse, TokenResponse};
use crate::error::AuthError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a successful token acquisition.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub access_token: String,
    pub expires_on: DateTime<Utc>,
    pub scopes: Vec<String>,
    /// Absent when the identity platform returned no ID token.
    pub account: Option<Account>,
    pub id_token: Option<String>,
}

pub(crate) struct ClientCore {
    pub(crate) authority: Authority,
    pub(crate) client_id: String,
    pub(crate) http_client: reqwest::Client,
    client_secret: Option<Zeroizing<String>>,
    cache: TokenCache,
}

impl ClientCore {
    pub(crate) fn new(
        authority: &str,
        client_id: &str,
        client_secret: Option<Zeroizing<String>>,
        cache: TokenCache,
    ) -> Result<Self, AuthError> {
        let authority = Authority::parse(authority)?;

        if client_id.is_empty() {
            return Err(AuthError::InvalidCredential("client id is empty".into()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            authority,
            client_id: client_id.to_string(),
            http_client,
            client_secret,
            cache,
        })
    }

    pub(crate) async fn accounts(&self) -> Vec<Account> {
        self.cache.accounts().await
    }

    /// Serve a token from the cache, refreshing it when only the refresh token is left.
    pub(crate) async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> Result<AuthResult, AuthError> {
        let account = account.ok_or(AuthError::NoTokenFound)?;

        if let Some(entry) = self.cache.lookup_access_token(account, scopes).await {
            debug!("Access token served from cache");
            return Ok(AuthResult {
                access_token: entry.secret,
                expires_on: entry.expires_on,
                scopes: entry.scopes.into_iter().collect(),
                account: Some(account.clone()),
                id_token: None,
            });
        }

        let refresh_token = self
            .cache
            .refresh_token(account)
            .await
            .ok_or(AuthError::NoTokenFound)?;

        info!("Refreshing access token for {}", account.display_name());
        let scope = scope_string(scopes);
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("scope", scope.as_str()),
        ];

        match self.request_token(&form).await {
            Ok(response) => self.save(response, scopes, Some(account)).await,
            Err(AuthError::TokenRejected { error, description })
                if error == "invalid_grant" || error == "interaction_required" =>
            {
                self.cache.remove_refresh_token(account).await;
                Err(AuthError::InteractionRequired(description))
            }
            Err(e) => Err(e),
        }
    }

    /// POST a grant to the token endpoint, adding client authentication.
    pub(crate) async fn request_token(
        &self,
        grant: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(grant.len() + 3);
        form.push(("client_id", self.client_id.as_str()));
        form.push(("client_info", "1"));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form.extend_from_slice(grant);

        let response = self
            .http_client
            .post(self.authority.token_endpoint())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenResponse>()
                .await
                .map_err(|e| AuthError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(error_response) => Err(error_response.into_error()),
            Err(_) => {
                error!("Token request failed: HTTP {} - {}", status, body);
                Err(AuthError::InvalidResponse(format!("HTTP {}", status.as_u16())))
            }
        }
    }

    /// Turn a token response into an [`AuthResult`] and cache it.
    ///
    /// `known_account` is used when the response carries no ID token, as refresh
    /// responses may not.
    pub(crate) async fn save(
        &self,
        response: TokenResponse,
        requested_scopes: &[String],
        known_account: Option<&Account>,
    ) -> Result<AuthResult, AuthError> {
        let expires_on = i64::try_from(response.expires_in)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::InvalidResponse("expires_in out of range".into()))?;

        let granted: Vec<String> = match &response.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.to_vec(),
        };

        let account = response
            .id_token
            .as_deref()
            .map(|id_token| Account::from_id_token(id_token, self.authority.environment()))
            .transpose()?
            .or_else(|| known_account.cloned());

        if let Some(account) = &account {
            self.cache
                .store(CacheEntry {
                    account: account.clone(),
                    scopes: normalize_scopes(&granted),
                    access_token: response.access_token.clone(),
                    expires_on,
                    refresh_token: response.refresh_token.clone(),
                })
                .await;
        }

        Ok(AuthResult {
            access_token: response.access_token,
            expires_on,
            scopes: granted,
            account,
            id_token: response.id_token,
        })
    }
}
