//! Types for the OAuth 2.0 Device Authorization Grant.

use serde::Deserialize;

/// Response from the device code endpoint, handed to the display callback.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResult {
    /// The device verification code.
    pub device_code: String,

    /// The end-user verification code displayed to the user.
    pub user_code: String,

    /// The URI the user should visit to authorize.
    pub verification_uri: String,

    /// Lifetime of the device_code in seconds.
    pub expires_in: u64,

    /// Minimum polling interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Localized instructions from the identity platform.
    #[serde(default)]
    pub message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

impl DeviceCodeResult {
    /// The instructions to show the user.
    pub fn message(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => message.clone(),
            _ => format!(
                "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                self.verification_uri, self.user_code
            ),
        }
    }
}
