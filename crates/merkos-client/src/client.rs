//! Merkos platform auth client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use universe_core::{
    AuthError, AuthErrorCode, AuthResult, IdentityProvider, LoginMethod, LoginRequest,
    MerkosUser, ProviderFuture, ProviderName, ProviderState, StateCell, TokenStore,
};
use url::Url;

/// Token store key for the platform access token.
pub const MERKOS_TOKEN_KEY: &str = "merkos.access_token";

/// Configuration for the platform provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerkosConfig {
    /// Base URL of the platform auth backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Default site scope for bearer-token logins.
    #[serde(default)]
    pub site_id: Option<String>,
}

fn default_api_url() -> String {
    "https://accounts.merkos.dev".to_string()
}

impl Default for MerkosConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site_id: None,
        }
    }
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct BearerBody<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    site_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
    user: MerkosUser,
}

#[derive(Deserialize, Default)]
struct AccessResponse {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    organizations: Vec<String>,
}

/// HTTP client for the Merkos platform auth backend.
///
/// Every operation commits its outcome to the owned state cell; failures
/// are recorded as the per-provider error message and never leave the
/// cell authenticated without a user.
pub struct MerkosClient {
    http: reqwest::Client,
    config: MerkosConfig,
    tokens: Arc<dyn TokenStore>,
    state: StateCell<MerkosUser>,
}

impl std::fmt::Debug for MerkosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerkosClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MerkosClient {
    pub fn new(config: MerkosConfig, tokens: Arc<dyn TokenStore>) -> AuthResult<Self> {
        Url::parse(&config.api_url).map_err(|e| {
            AuthError::new(
                AuthErrorCode::InitializationFailed,
                format!("invalid merkos api url: {}", config.api_url),
            )
            .with_provider(ProviderName::Merkos)
            .with_cause(e)
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            tokens,
            state: StateCell::new(ProviderName::Merkos),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn stored_token(&self) -> Option<String> {
        match self.tokens.get(MERKOS_TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "token store read failed");
                None
            }
        }
    }

    /// Commits a successful session: user + token, error cleared.
    fn commit_session(&self, user: MerkosUser, token: String) {
        if let Err(e) = self.tokens.set(MERKOS_TOKEN_KEY, &token) {
            tracing::warn!(error = %e, "failed to persist merkos token");
        }
        self.state
            .replace(ProviderState::authenticated(user, Some(token)));
    }

    /// Commits a failed operation: keeps the cell unauthenticated and
    /// records the error message.
    fn commit_failure(&self, message: String) {
        self.state.update(|state| {
            state.is_authenticated = false;
            state.is_loading = false;
            state.user = None;
            state.token = None;
            state.error = Some(message);
        });
    }

    fn set_loading(&self, loading: bool) {
        self.state.update(|state| state.is_loading = loading);
    }

    async fn login_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<MerkosUser>> {
        self.set_loading(true);
        let response = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(&CredentialsBody { email, password })
            .send()
            .await;
        self.finish_session_response(response).await
    }

    async fn login_with_bearer(
        &self,
        token: &str,
        site_id: Option<&str>,
    ) -> AuthResult<Option<MerkosUser>> {
        self.set_loading(true);
        let site_id = site_id.or(self.config.site_id.as_deref());
        let response = self
            .http
            .post(self.endpoint("/auth/token"))
            .json(&BearerBody { token, site_id })
            .send()
            .await;
        self.finish_session_response(response).await
    }

    /// Shared tail of both login paths: map the HTTP outcome into state.
    ///
    /// Wrong credentials (4xx) are a soft failure: `Ok(None)` with the
    /// error recorded on the provider state. Transport failures and 5xx
    /// responses are hard errors.
    async fn finish_session_response(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> AuthResult<Option<MerkosUser>> {
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.commit_failure(format!("merkos request failed: {e}"));
                return Err(AuthError::network("merkos login request failed")
                    .with_provider(ProviderName::Merkos)
                    .with_cause(e));
            }
        };

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!(status = %status, "merkos login rejected");
            self.commit_failure(format!("merkos login rejected: {status}"));
            return Ok(None);
        }
        if !status.is_success() {
            self.commit_failure(format!("merkos backend error: {status}"));
            return Err(AuthError::new(
                AuthErrorCode::ProviderConnectionFailed,
                format!("merkos backend returned {status}"),
            )
            .with_provider(ProviderName::Merkos));
        }

        let session: SessionResponse = match response.json().await {
            Ok(s) => s,
            Err(e) => {
                self.commit_failure("merkos session response malformed".to_string());
                return Err(AuthError::new(
                    AuthErrorCode::ProviderConnectionFailed,
                    "merkos session response malformed",
                )
                .with_provider(ProviderName::Merkos)
                .with_cause(e));
            }
        };

        let user = self.enrich(session.user, &session.token).await;
        self.commit_session(user.clone(), session.token);
        tracing::info!(user_id = %user.id, "merkos login succeeded");
        Ok(Some(user))
    }

    /// Fetches roles/permissions/organizations for the user. Enrichment
    /// failure degrades to the bare user record.
    async fn enrich(&self, mut user: MerkosUser, token: &str) -> MerkosUser {
        let response = self
            .http
            .get(self.endpoint("/auth/me/access"))
            .bearer_auth(token)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.json::<AccessResponse>().await {
                Ok(access) => {
                    user.roles = access.roles;
                    user.permissions = access.permissions;
                    user.organizations = access.organizations;
                }
                Err(e) => tracing::warn!(error = %e, "merkos enrichment response malformed"),
            },
            Ok(r) => tracing::debug!(status = %r.status(), "merkos enrichment unavailable"),
            Err(e) => tracing::warn!(error = %e, "merkos enrichment request failed"),
        }
        user
    }

    async fn fetch_current_user(&self) -> AuthResult<Option<MerkosUser>> {
        let Some(token) = self.stored_token() else {
            return Ok(None);
        };

        self.set_loading(true);
        let response = self
            .http
            .get(self.endpoint("/auth/me"))
            .bearer_auth(&token)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                // Keep any existing session; just record the failure.
                self.state.update(|state| {
                    state.is_loading = false;
                    state.error = Some(format!("merkos user fetch failed: {e}"));
                });
                return Err(AuthError::network("merkos user fetch failed")
                    .with_provider(ProviderName::Merkos)
                    .with_cause(e));
            }
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // The stored token is stale; drop the session.
            tracing::debug!("merkos session expired");
            let _ = self.tokens.delete(MERKOS_TOKEN_KEY);
            self.state.replace(ProviderState::initial());
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            self.state.update(|state| {
                state.is_loading = false;
                state.error = Some(format!("merkos backend error: {status}"));
            });
            return Ok(None);
        }

        match response.json::<MerkosUser>().await {
            Ok(user) => {
                let user = self.enrich(user, &token).await;
                self.commit_session(user.clone(), token);
                Ok(Some(user))
            }
            Err(e) => {
                self.state.update(|state| {
                    state.is_loading = false;
                    state.error = Some("merkos user response malformed".to_string());
                });
                Err(AuthError::new(
                    AuthErrorCode::ProviderConnectionFailed,
                    "merkos user response malformed",
                )
                .with_provider(ProviderName::Merkos)
                .with_cause(e))
            }
        }
    }

    async fn sign_out(&self) -> AuthResult<bool> {
        let token = self.stored_token();

        // Local state clears no matter what the backend says.
        let _ = self.tokens.delete(MERKOS_TOKEN_KEY);
        self.state.replace(ProviderState::initial());

        let Some(token) = token else {
            return Ok(true);
        };

        match self
            .http
            .post(self.endpoint("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "merkos logout rejected");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "merkos logout request failed");
                Ok(false)
            }
        }
    }
}

impl IdentityProvider for MerkosClient {
    type User = MerkosUser;

    fn name(&self) -> ProviderName {
        ProviderName::Merkos
    }

    fn state(&self) -> ProviderState<MerkosUser> {
        self.state.read()
    }

    fn changes(&self) -> broadcast::Receiver<ProviderName> {
        self.state.subscribe()
    }

    fn login(&self, request: LoginRequest) -> ProviderFuture<'_, Option<MerkosUser>> {
        Box::pin(async move {
            match request.method {
                LoginMethod::Credentials => {
                    let (Some(email), Some(password)) = (&request.email, &request.password)
                    else {
                        return Err(AuthError::new(
                            AuthErrorCode::LoginFailed,
                            "email and password are required",
                        )
                        .with_provider(ProviderName::Merkos));
                    };
                    self.login_with_credentials(email, password).await
                }
                LoginMethod::BearerToken => {
                    let Some(token) = &request.token else {
                        return Err(AuthError::new(
                            AuthErrorCode::TokenInvalid,
                            "bearer token is required",
                        )
                        .with_provider(ProviderName::Merkos));
                    };
                    self.login_with_bearer(token, request.site_id.as_deref())
                        .await
                }
                LoginMethod::Silent => self.fetch_current_user().await,
                LoginMethod::Popup => Err(AuthError::new(
                    AuthErrorCode::LoginFailed,
                    "popup login is not supported by the merkos provider",
                )
                .with_provider(ProviderName::Merkos)),
            }
        })
    }

    fn logout(&self) -> ProviderFuture<'_, bool> {
        Box::pin(self.sign_out())
    }

    fn current_user(&self) -> ProviderFuture<'_, Option<MerkosUser>> {
        Box::pin(self.fetch_current_user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use universe_core::MemoryTokenStore;

    fn client() -> MerkosClient {
        MerkosClient::new(MerkosConfig::default(), Arc::new(MemoryTokenStore::new())).unwrap()
    }

    #[test]
    fn rejects_invalid_api_url() {
        let config = MerkosConfig {
            api_url: "not a url".to_string(),
            site_id: None,
        };
        let err = MerkosClient::new(config, Arc::new(MemoryTokenStore::new())).unwrap_err();
        assert_eq!(err.code, AuthErrorCode::InitializationFailed);
    }

    #[test]
    fn endpoint_joins_paths() {
        let client = client();
        assert_eq!(
            client.endpoint("/auth/login"),
            "https://accounts.merkos.dev/auth/login"
        );
    }

    #[test]
    fn starts_in_initial_state() {
        let client = client();
        let state = client.state();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn credentials_login_requires_both_fields() {
        let client = client();
        let err = client
            .login(LoginRequest {
                method: LoginMethod::Credentials,
                email: Some("a@b.com".to_string()),
                ..LoginRequest::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, AuthErrorCode::LoginFailed);
        assert_eq!(err.provider, Some(ProviderName::Merkos));
    }

    #[tokio::test]
    async fn current_user_without_token_is_none() {
        let client = client();
        // No token stored, so no network call is made.
        assert_eq!(client.fetch_current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn logout_without_token_clears_state() {
        let client = client();
        assert!(client.sign_out().await.unwrap());
        assert!(!client.state().is_authenticated);
    }
}
