//! Public client for apps that cannot hold a secret, such as console tools.

use crate::auth::account::Account;
use crate::auth::cache::TokenCache;
use crate::auth::client::{AuthResult, ClientCore};
use crate::auth::device_code::DeviceCodeResult;
use crate::auth::oauth::{scope_string, TokenErrorResponse};
use crate::error::AuthError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra wait added on every `slow_down` reply (RFC 8628).
const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

pub struct PublicClient {
    core: ClientCore,
}

impl PublicClient {
    pub fn new(authority: &str, client_id: &str, cache: TokenCache) -> Result<Self, AuthError> {
        let core = ClientCore::new(authority, client_id, None, cache)?;
        Ok(Self { core })
    }

    /// Accounts that have signed in and are held in the cache.
    pub async fn accounts(&self) -> Vec<Account> {
        self.core.accounts().await
    }

    /// Acquire a token from the cache without user interaction.
    pub async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> Result<AuthResult, AuthError> {
        self.core.acquire_token_silent(scopes, account).await
    }

    /// Run the device code flow.
    ///
    /// `callback` receives the code and instructions for the user once the
    /// identity platform has issued them. Cancelling `cancel` aborts the flow
    /// at any point, including an in-flight HTTP request, and yields
    /// [`AuthError::Cancelled`].
    pub async fn acquire_token_by_device_code<F>(
        &self,
        scopes: &[String],
        callback: F,
        cancel: CancellationToken,
    ) -> Result<AuthResult, AuthError>
    where
        F: FnOnce(&DeviceCodeResult) + Send,
    {
        let device_code = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = self.request_device_code(scopes) => result?,
        };

        callback(&device_code);

        let deadline = Instant::now()
            .checked_add(Duration::from_secs(device_code.expires_in))
            .ok_or_else(|| AuthError::InvalidResponse("expires_in out of range".into()))?;
        let mut interval = Duration::from_secs(device_code.interval);
        let form = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("device_code", device_code.device_code.as_str()),
        ];

        loop {
            let wait = interval.min(deadline.saturating_duration_since(Instant::now()));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }

            if Instant::now() >= deadline {
                return Err(AuthError::DeviceCodeExpired);
            }

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                result = self.core.request_token(&form) => result,
            };

            match attempt {
                Ok(response) => {
                    info!("Device code sign-in completed");
                    return self.core.save(response, scopes, None).await;
                }
                Err(AuthError::TokenRejected { error, description }) => match error.as_str() {
                    "authorization_pending" => {
                        debug!("Waiting for the user to finish signing in");
                    }
                    "slow_down" => {
                        interval += SLOW_DOWN_INCREMENT;
                        debug!("Polling interval raised to {:?}", interval);
                    }
                    "authorization_declined" | "access_denied" => {
                        return Err(AuthError::AccessDenied)
                    }
                    "expired_token" | "code_expired" => return Err(AuthError::DeviceCodeExpired),
                    _ => return Err(AuthError::TokenRejected { error, description }),
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_device_code(&self, scopes: &[String]) -> Result<DeviceCodeResult, AuthError> {
        let scope = scope_string(scopes);
        let params = [
            ("client_id", self.core.client_id.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .core
            .http_client
            .post(self.core.authority.device_code_endpoint())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<DeviceCodeResult>()
                .await
                .map_err(|e| AuthError::InvalidResponse(e.to_string()));
        }

        match response.json::<TokenErrorResponse>().await {
            Ok(error_response) => Err(error_response.into_error()),
            Err(_) => Err(AuthError::InvalidResponse(format!(
                "HTTP {}",
                status.as_u16()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{
        device_code_reply, error_reply, id_token, token_reply, MockIdentityPlatform,
    };
    use axum::http::StatusCode;
    use std::sync::{Arc, Mutex};

    fn scopes() -> Vec<String> {
        vec!["User.Read".to_string()]
    }

    fn client(mock: &MockIdentityPlatform) -> PublicClient {
        PublicClient::new(&mock.authority, "public-client", TokenCache::new()).unwrap()
    }

    #[tokio::test]
    async fn test_device_code_completes_after_pending() {
        let mock = MockIdentityPlatform::start().await;
        mock.push_token_reply(StatusCode::BAD_REQUEST, error_reply("authorization_pending"));
        mock.push_token_reply(
            StatusCode::OK,
            token_reply("device-at", Some(id_token("oid", "tid", "bob@contoso.com"))),
        );
        let client = client(&mock);

        let shown = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&shown);
        let result = client
            .acquire_token_by_device_code(
                &scopes(),
                move |code| *sink.lock().unwrap() = Some(code.message()),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.access_token, "device-at");
        assert!(shown.lock().unwrap().as_deref().unwrap().contains("ABCD-1234"));

        let requests = mock.token_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["grant_type"], DEVICE_CODE_GRANT);
        assert_eq!(requests[0]["device_code"], "device-code-123");
        assert!(!requests[0].contains_key("client_secret"));

        // Signed-in account is available for silent acquisition afterwards
        let account = client.accounts().await.pop().unwrap();
        let silent = client.acquire_token_silent(&scopes(), Some(&account)).await.unwrap();
        assert_eq!(silent.access_token, "device-at");
    }

    #[tokio::test]
    async fn test_cancellation_aborts_polling() {
        let mock = MockIdentityPlatform::start().await;
        mock.set_device_code_reply(StatusCode::OK, device_code_reply(1));
        mock.set_token_fallback(StatusCode::BAD_REQUEST, error_reply("authorization_pending"));
        let client = client(&mock);

        let cancel = CancellationToken::new();
        let timer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            timer.cancel();
        });

        let started = Instant::now();
        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_callback() {
        let mock = MockIdentityPlatform::start().await;
        let client = client(&mock);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let err = client
            .acquire_token_by_device_code(&scopes(), move |_| *flag.lock().unwrap() = true, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Cancelled));
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_declined_and_expired() {
        let mock = MockIdentityPlatform::start().await;
        mock.push_token_reply(StatusCode::BAD_REQUEST, error_reply("authorization_declined"));
        mock.push_token_reply(StatusCode::BAD_REQUEST, error_reply("expired_token"));
        let client = client(&mock);

        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied));

        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DeviceCodeExpired));
    }

    #[tokio::test]
    async fn test_local_deadline_expires_code() {
        let mock = MockIdentityPlatform::start().await;
        let mut reply = device_code_reply(0);
        reply["expires_in"] = 0.into();
        mock.set_device_code_reply(StatusCode::OK, reply);
        let client = client(&mock);

        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DeviceCodeExpired));
        assert!(mock.token_requests().is_empty());
    }

    #[tokio::test]
    async fn test_slow_down_widens_interval() {
        let mock = MockIdentityPlatform::start().await;
        mock.push_token_reply(StatusCode::BAD_REQUEST, error_reply("slow_down"));
        mock.push_token_reply(
            StatusCode::OK,
            token_reply("slow-at", Some(id_token("oid", "tid", "bob@contoso.com"))),
        );
        let client = client(&mock);

        let started = Instant::now();
        let result = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.access_token, "slow-at");
        assert_eq!(mock.token_requests().len(), 2);
        // Interval starts at zero, so the whole wait comes from slow_down
        assert!(started.elapsed() >= SLOW_DOWN_INCREMENT);
    }

    #[tokio::test]
    async fn test_wait_is_capped_at_deadline() {
        let mock = MockIdentityPlatform::start().await;
        let mut reply = device_code_reply(30);
        reply["expires_in"] = 1.into();
        mock.set_device_code_reply(StatusCode::OK, reply);
        let client = client(&mock);

        let started = Instant::now();
        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::DeviceCodeExpired));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_out_of_range_device_code_lifetime() {
        let mock = MockIdentityPlatform::start().await;
        let mut reply = device_code_reply(0);
        reply["expires_in"] = u64::MAX.into();
        mock.set_device_code_reply(StatusCode::OK, reply);
        let client = client(&mock);

        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(ref m) if m == "expires_in out of range"));
        assert!(mock.token_requests().is_empty());
    }

    #[tokio::test]
    async fn test_device_code_request_rejected() {
        let mock = MockIdentityPlatform::start().await;
        mock.set_device_code_reply(StatusCode::BAD_REQUEST, error_reply("invalid_scope"));
        let client = client(&mock);

        let err = client
            .acquire_token_by_device_code(&scopes(), |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRejected { ref error, .. } if error == "invalid_scope"));
    }
}
