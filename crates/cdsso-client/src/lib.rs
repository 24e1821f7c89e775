//! Cross-domain SSO bridge client.
//!
//! Retrieves a token from the trusted auth origin and exchanges it with
//! the local backend for a session. The exchanged bearer token is cached
//! for synchronous reads; the controller feeds it through the platform
//! provider's bearer login.
//!
//! There is no global default instance: construct one and inject it
//! where it is needed. Application code that wants a single instance
//! owns that instance itself.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use universe_core::{AuthError, AuthErrorCode, AuthResult, CdssoBridge, ProviderFuture};
use url::Url;

/// Configuration for the CDSSO bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdssoConfig {
    /// Trusted remote origin that holds the cross-domain session.
    #[serde(default = "default_auth_origin")]
    pub auth_origin: String,
    /// Local backend URL that exchanges the relayed token for a session.
    #[serde(default = "default_exchange_url")]
    pub exchange_url: String,
}

fn default_auth_origin() -> String {
    "https://sso.merkos.dev".to_string()
}

fn default_exchange_url() -> String {
    "https://accounts.merkos.dev/cdsso/exchange".to_string()
}

impl Default for CdssoConfig {
    fn default() -> Self {
        Self {
            auth_origin: default_auth_origin(),
            exchange_url: default_exchange_url(),
        }
    }
}

#[derive(Deserialize)]
struct RelayTokenResponse {
    /// Absent when the remote origin has no session.
    token: Option<String>,
}

#[derive(Serialize)]
struct ExchangeBody<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
}

/// HTTP client implementing the CDSSO token relay.
#[derive(Debug)]
pub struct CdssoClient {
    http: reqwest::Client,
    config: CdssoConfig,
    cached_token: RwLock<Option<String>>,
}

impl CdssoClient {
    pub fn new(config: CdssoConfig) -> AuthResult<Self> {
        for (label, value) in [
            ("auth_origin", &config.auth_origin),
            ("exchange_url", &config.exchange_url),
        ] {
            Url::parse(value).map_err(|e| {
                AuthError::new(
                    AuthErrorCode::InitializationFailed,
                    format!("invalid cdsso {label}: {value}"),
                )
                .with_cause(e)
            })?;
        }
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            cached_token: RwLock::new(None),
        })
    }

    /// Runs the relay: fetch a token from the trusted origin, exchange
    /// it locally, cache the result. `Ok(None)` when the remote origin
    /// has no session to relay.
    pub async fn run_relay(&self) -> AuthResult<Option<String>> {
        let relay_url = format!(
            "{}/cdsso/token",
            self.config.auth_origin.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&relay_url)
            .send()
            .await
            .map_err(|e| cdsso_error("cdsso token fetch failed", e))?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "no cross-domain session available");
            return Ok(None);
        }

        let relay: RelayTokenResponse = response
            .json()
            .await
            .map_err(|e| cdsso_error("cdsso token response malformed", e))?;

        let Some(token) = relay.token else {
            return Ok(None);
        };

        let response = self
            .http
            .post(&self.config.exchange_url)
            .json(&ExchangeBody { token: &token })
            .send()
            .await
            .map_err(|e| cdsso_error("cdsso exchange failed", e))?;

        if !response.status().is_success() {
            return Err(AuthError::new(
                AuthErrorCode::CdssoFailed,
                format!("cdsso exchange rejected: {}", response.status()),
            ));
        }

        let exchange: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| cdsso_error("cdsso exchange response malformed", e))?;

        *self.cached_token.write().expect("lock poisoned") = Some(exchange.access_token.clone());
        tracing::info!("cross-domain session established");
        Ok(Some(exchange.access_token))
    }

    /// Drops the cached token and tells the local backend to end the
    /// relayed session. Best-effort: a failed backend call still clears
    /// the cache.
    pub async fn end_session(&self) -> AuthResult<bool> {
        self.cached_token.write().expect("lock poisoned").take();

        let logout_url = format!(
            "{}/cdsso/logout",
            self.config.auth_origin.trim_end_matches('/')
        );
        match self.http.post(&logout_url).send().await {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "cdsso logout rejected");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "cdsso logout request failed");
                Ok(false)
            }
        }
    }

    /// Synchronous read of the cached token. No network call.
    pub fn cached_bearer_token(&self) -> Option<String> {
        self.cached_token.read().expect("lock poisoned").clone()
    }
}

fn cdsso_error(message: &str, cause: reqwest::Error) -> AuthError {
    AuthError::new(AuthErrorCode::CdssoFailed, message).with_cause(cause)
}

impl CdssoBridge for CdssoClient {
    fn authenticate(&self) -> ProviderFuture<'_, Option<String>> {
        Box::pin(self.run_relay())
    }

    fn logout(&self) -> ProviderFuture<'_, bool> {
        Box::pin(self.end_session())
    }

    fn bearer_token(&self) -> Option<String> {
        self.cached_bearer_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_urls() {
        let config = CdssoConfig {
            auth_origin: "nope".to_string(),
            ..CdssoConfig::default()
        };
        let err = CdssoClient::new(config).unwrap_err();
        assert_eq!(err.code, AuthErrorCode::InitializationFailed);
        assert!(err.message.contains("auth_origin"));
    }

    #[test]
    fn bearer_token_starts_empty() {
        let client = CdssoClient::new(CdssoConfig::default()).unwrap();
        assert_eq!(client.cached_bearer_token(), None);
    }

    #[tokio::test]
    async fn end_session_clears_cache_even_on_network_failure() {
        // Point at a closed local port so the logout call fails fast.
        let config = CdssoConfig {
            auth_origin: "http://127.0.0.1:9".to_string(),
            exchange_url: "http://127.0.0.1:9/exchange".to_string(),
        };
        let client = CdssoClient::new(config).unwrap();
        *client.cached_token.write().unwrap() = Some("tok".to_string());

        let result = client.end_session().await.unwrap();
        assert!(!result);
        assert_eq!(client.cached_bearer_token(), None);
    }
}
