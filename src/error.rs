//! Error types for the identity samples.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Authentication-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Silent acquisition found nothing usable in the cache.
    #[error("no token found")]
    NoTokenFound,

    /// The cached refresh token was rejected and the user must sign in again.
    #[error("Interaction required: {0}")]
    InteractionRequired(String),

    #[error("Invalid authority: {0}")]
    InvalidAuthority(String),

    #[error("Invalid client credential: {0}")]
    InvalidCredential(String),

    #[error("Authorization code missing")]
    MissingAuthCode,

    #[error("OAuth2 authorization failed: {0}")]
    OAuthFailed(String),

    #[error("State validation failed (possible CSRF attack)")]
    StateValidationFailed,

    #[error("Token request rejected: {error}: {description}")]
    TokenRejected { error: String, description: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid ID token: {0}")]
    InvalidIdToken(String),

    #[error("Access denied by user")]
    AccessDenied,

    #[error("Device code expired")]
    DeviceCodeExpired,

    #[error("Operation cancelled")]
    Cancelled,
}

impl AuthError {
    /// Returns true if the caller should fall back to an interactive flow.
    pub fn requires_interaction(&self) -> bool {
        matches!(self, Self::NoTokenFound | Self::InteractionRequired(_))
    }

    /// Returns a user-friendly message for display.
    pub fn user_message(&self) -> &str {
        match self {
            Self::NoTokenFound | Self::InteractionRequired(_) => "Please sign in.",
            Self::MissingAuthCode => "Authorization code missing.",
            Self::OAuthFailed(_) => "Sign-in failed. Please try again.",
            Self::StateValidationFailed => "Security error. Please try signing in again.",
            Self::AccessDenied => "Sign-in was declined.",
            Self::DeviceCodeExpired => "The device code expired. Please try again.",
            Self::Cancelled => "Sign-in was cancelled.",
            Self::Network(_) => "Network error. Check your connection.",
            _ => "An error occurred. Please try again.",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Token cache persistence errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read token cache: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write token cache: {0}")]
    Write(#[source] std::io::Error),

    #[error("Malformed token cache: {0}")]
    Format(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_miss_sentinel_text() {
        assert_eq!(AuthError::NoTokenFound.to_string(), "no token found");
    }

    #[test]
    fn test_requires_interaction() {
        assert!(AuthError::NoTokenFound.requires_interaction());
        assert!(AuthError::InteractionRequired("expired".into()).requires_interaction());
        assert!(!AuthError::Cancelled.requires_interaction());
        assert!(!AuthError::TokenRejected {
            error: "invalid_client".into(),
            description: String::new(),
        }
        .requires_interaction());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(AuthError::Cancelled.user_message(), "Sign-in was cancelled.");
        assert_eq!(
            AuthError::Network("timeout".into()).user_message(),
            "Network error. Check your connection."
        );
    }
}
