//! Error taxonomy for the universe identity layer.
//!
//! Provider adapters catch their own failures at the adapter boundary and
//! store them as per-provider error strings; the typed [`AuthError`] is
//! the controller-level currency. Both can be non-`None` at the same time
//! with different messages, by design.

use crate::types::ProviderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Programmatically matchable failure codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorCode {
    InitializationFailed,
    LoginFailed,
    LogoutFailed,
    TokenExpired,
    TokenInvalid,
    TokenRefreshFailed,
    ProviderNotAvailable,
    ProviderConnectionFailed,
    UserNotFound,
    PermissionDenied,
    NetworkError,
    CdssoFailed,
    LinkFailed,
    UnknownError,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitializationFailed => "INITIALIZATION_FAILED",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::LogoutFailed => "LOGOUT_FAILED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            Self::ProviderNotAvailable => "PROVIDER_NOT_AVAILABLE",
            Self::ProviderConnectionFailed => "PROVIDER_CONNECTION_FAILED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::CdssoFailed => "CDSSO_FAILED",
            Self::LinkFailed => "LINK_FAILED",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed authentication error.
///
/// `provider` tags the offending provider when one is involved; `cause`
/// preserves the rendered underlying failure (transport errors, upstream
/// SDK messages) so it survives cloning into snapshots.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct AuthError {
    pub code: AuthErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderName>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl AuthError {
    /// Creates an error with the given code and message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            provider: None,
            message: message.into(),
            cause: None,
        }
    }

    /// Tags the offending provider.
    pub fn with_provider(mut self, provider: ProviderName) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attaches the rendered underlying failure.
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// A provider was addressed but is not enabled or wired in.
    pub fn provider_not_available(provider: ProviderName) -> Self {
        Self::new(
            AuthErrorCode::ProviderNotAvailable,
            format!("{} provider is not available", provider.label()),
        )
        .with_provider(provider)
    }

    /// A transport-level failure talking to a provider backend.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::NetworkError, message)
    }
}

/// Result type alias using [`AuthError`].
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = AuthError::new(AuthErrorCode::LoginFailed, "bad credentials");
        assert_eq!(err.to_string(), "LOGIN_FAILED: bad credentials");
    }

    #[test]
    fn builders_tag_provider_and_cause() {
        let err = AuthError::new(AuthErrorCode::NetworkError, "request failed")
            .with_provider(ProviderName::Valu)
            .with_cause("connection reset");
        assert_eq!(err.provider, Some(ProviderName::Valu));
        assert_eq!(err.cause.as_deref(), Some("connection reset"));
    }

    #[test]
    fn code_serializes_screaming_snake() {
        let json = serde_json::to_string(&AuthErrorCode::ProviderNotAvailable).unwrap();
        assert_eq!(json, "\"PROVIDER_NOT_AVAILABLE\"");
    }

    #[test]
    fn provider_not_available_is_tagged() {
        let err = AuthError::provider_not_available(ProviderName::Merkos);
        assert_eq!(err.code, AuthErrorCode::ProviderNotAvailable);
        assert_eq!(err.provider, Some(ProviderName::Merkos));
    }
}
