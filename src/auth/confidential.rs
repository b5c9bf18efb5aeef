//! Confidential client for server-side web apps holding a client secret.

use crate::auth::account::Account;
use crate::auth::cache::TokenCache;
use crate::auth::client::{AuthResult, ClientCore};
use crate::auth::oauth::{generate_state, scope_string, PkceChallenge};
use crate::error::AuthError;
use tracing::info;
use url::Url;
use zeroize::Zeroizing;

/// Client authentication for a confidential client.
pub struct Credential {
    secret: Zeroizing<String>,
}

impl Credential {
    pub fn from_secret(secret: impl Into<String>) -> Result<Self, AuthError> {
        let secret = Zeroizing::new(secret.into());
        if secret.trim().is_empty() {
            return Err(AuthError::InvalidCredential("client secret is empty".into()));
        }
        Ok(Self { secret })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<secret>)")
    }
}

/// Everything the caller must keep between sending the browser away and the redirect.
#[derive(Debug, Clone)]
pub struct AuthCodeRequest {
    pub url: Url,
    pub state: String,
    pub pkce: PkceChallenge,
}

pub struct ConfidentialClient {
    core: ClientCore,
}

impl ConfidentialClient {
    pub fn new(
        authority: &str,
        client_id: &str,
        credential: Credential,
        cache: TokenCache,
    ) -> Result<Self, AuthError> {
        let core = ClientCore::new(authority, client_id, Some(credential.secret), cache)?;
        Ok(Self { core })
    }

    pub fn client_id(&self) -> &str {
        &self.core.client_id
    }

    /// Accounts that have signed in and are held in the cache.
    pub async fn accounts(&self) -> Vec<Account> {
        self.core.accounts().await
    }

    /// Acquire a token from the cache without user interaction.
    ///
    /// Fails with [`AuthError::NoTokenFound`] when there is no account or
    /// nothing usable is cached.
    pub async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> Result<AuthResult, AuthError> {
        self.core.acquire_token_silent(scopes, account).await
    }

    /// Build the authorization URL the browser is sent to.
    pub fn auth_code_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<AuthCodeRequest, AuthError> {
        let mut url = Url::parse(&self.core.authority.authorize_endpoint())
            .map_err(|e| AuthError::InvalidAuthority(e.to_string()))?;

        let pkce = PkceChallenge::new();
        let state = generate_state();

        url.query_pairs_mut()
            .append_pair("client_id", &self.core.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &scope_string(scopes))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("client_info", "1");

        Ok(AuthCodeRequest { url, state, pkce })
    }

    /// Exchange an authorization code for tokens.
    pub async fn acquire_token_by_auth_code(
        &self,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
        pkce_verifier: &str,
    ) -> Result<AuthResult, AuthError> {
        let scope = scope_string(scopes);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", pkce_verifier),
            ("scope", scope.as_str()),
        ];

        let response = self.core.request_token(&form).await?;
        let result = self.core.save(response, scopes, None).await?;

        if let Some(account) = &result.account {
            info!("Signed in {}", account.display_name());
        }
        Ok(result)
    }
}
