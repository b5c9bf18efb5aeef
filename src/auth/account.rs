//! Signed-in account handle derived from the ID token.

use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

/// An account returned by a successful sign-in.
///
/// Callers hold on to it and pass it back for silent acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// `<oid>.<tid>`, or the subject when the token has no object id.
    pub home_account_id: String,
    /// Host of the authority that issued the token.
    pub environment: String,
    pub tenant_id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: Option<String>,
    oid: Option<String>,
    tid: Option<String>,
    preferred_username: Option<String>,
    name: Option<String>,
}

impl Account {
    /// Build an account from an ID token.
    ///
    /// The signature is not checked; the token came straight from the token endpoint.
    pub fn from_id_token(id_token: &str, environment: &str) -> Result<Self, AuthError> {
        let payload = id_token
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::InvalidIdToken("not a JWT".into()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

        let claims: IdTokenClaims =
            serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

        let home_account_id = match (&claims.oid, &claims.tid) {
            (Some(oid), Some(tid)) => format!("{}.{}", oid, tid),
            _ => claims
                .sub
                .clone()
                .ok_or_else(|| AuthError::InvalidIdToken("no subject claim".into()))?,
        };

        Ok(Self {
            home_account_id,
            environment: environment.to_string(),
            tenant_id: claims.tid,
            username: claims.preferred_username,
            name: claims.name,
        })
    }

    /// Best available label for logs and UI.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.home_account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(claims: serde_json::Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    #[test]
    fn test_account_from_id_token() {
        let token = jwt(serde_json::json!({
            "oid": "user-oid",
            "tid": "tenant-id",
            "sub": "subject",
            "preferred_username": "john@contoso.com",
            "name": "John Doe"
        }));

        let account = Account::from_id_token(&token, "login.microsoftonline.com").unwrap();
        assert_eq!(account.home_account_id, "user-oid.tenant-id");
        assert_eq!(account.tenant_id.as_deref(), Some("tenant-id"));
        assert_eq!(account.username.as_deref(), Some("john@contoso.com"));
        assert_eq!(account.display_name(), "John Doe");
    }

    #[test]
    fn test_account_falls_back_to_subject() {
        let token = jwt(serde_json::json!({ "sub": "subject" }));
        let account = Account::from_id_token(&token, "login.microsoftonline.com").unwrap();
        assert_eq!(account.home_account_id, "subject");
        assert_eq!(account.display_name(), "subject");
    }

    #[test]
    fn test_malformed_id_token() {
        assert!(Account::from_id_token("garbage", "host").is_err());
        assert!(Account::from_id_token("a.!!!.c", "host").is_err());

        let no_subject = jwt(serde_json::json!({ "name": "Nobody" }));
        assert!(Account::from_id_token(&no_subject, "host").is_err());
    }
}
