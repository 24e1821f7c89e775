//! Valu session client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use universe_core::{
    AuthError, AuthErrorCode, AuthResult, IdentityProvider, LoginMethod, LoginRequest,
    ProviderFuture, ProviderName, ProviderState, StateCell, TokenStore, ValuUser,
};
use url::Url;

use crate::suppress::suppress_iframe_teardown;

/// Token store key for the valu session token.
pub const VALU_TOKEN_KEY: &str = "valu.session_token";

/// Configuration for the social/iframe provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValuConfig {
    /// Base URL of the valu session backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Application id registered with valu.
    #[serde(default)]
    pub app_id: Option<String>,
}

fn default_api_url() -> String {
    "https://app.valu.dev".to_string()
}

impl Default for ValuConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            app_id: None,
        }
    }
}

#[derive(Serialize)]
struct SessionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
    user: ValuUser,
}

/// HTTP client for the Valu session backend.
pub struct ValuClient {
    http: reqwest::Client,
    config: ValuConfig,
    tokens: Arc<dyn TokenStore>,
    state: StateCell<ValuUser>,
}

impl std::fmt::Debug for ValuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValuClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ValuClient {
    pub fn new(config: ValuConfig, tokens: Arc<dyn TokenStore>) -> AuthResult<Self> {
        Url::parse(&config.api_url).map_err(|e| {
            AuthError::new(
                AuthErrorCode::InitializationFailed,
                format!("invalid valu api url: {}", config.api_url),
            )
            .with_provider(ProviderName::Valu)
            .with_cause(e)
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            tokens,
            state: StateCell::new(ProviderName::Valu),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn stored_token(&self) -> Option<String> {
        match self.tokens.get(VALU_TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "token store read failed");
                None
            }
        }
    }

    fn commit_session(&self, user: ValuUser, token: String) {
        if let Err(e) = self.tokens.set(VALU_TOKEN_KEY, &token) {
            tracing::warn!(error = %e, "failed to persist valu token");
        }
        self.state
            .replace(ProviderState::authenticated(user, Some(token)));
    }

    fn commit_failure(&self, message: String) {
        self.state.update(|state| {
            state.is_authenticated = false;
            state.is_loading = false;
            state.user = None;
            state.token = None;
            state.error = Some(message);
        });
    }

    async fn open_session(&self, body: SessionBody<'_>) -> AuthResult<Option<ValuUser>> {
        self.state.update(|state| state.is_loading = true);

        let response = self
            .http
            .post(self.endpoint("/api/session"))
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.commit_failure(format!("valu session request failed: {e}"));
                return Err(AuthError::network("valu session request failed")
                    .with_provider(ProviderName::Valu)
                    .with_cause(e));
            }
        };

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!(status = %status, "valu session rejected");
            self.commit_failure(format!("valu session rejected: {status}"));
            return Ok(None);
        }
        if !status.is_success() {
            self.commit_failure(format!("valu backend error: {status}"));
            return Err(AuthError::new(
                AuthErrorCode::ProviderConnectionFailed,
                format!("valu backend returned {status}"),
            )
            .with_provider(ProviderName::Valu));
        }

        match response.json::<SessionResponse>().await {
            Ok(session) => {
                self.commit_session(session.user.clone(), session.token);
                tracing::info!(user_id = %session.user.id, "valu session opened");
                Ok(Some(session.user))
            }
            Err(e) => {
                self.commit_failure("valu session response malformed".to_string());
                Err(AuthError::new(
                    AuthErrorCode::ProviderConnectionFailed,
                    "valu session response malformed",
                )
                .with_provider(ProviderName::Valu)
                .with_cause(e))
            }
        }
    }

    async fn fetch_current_user(&self) -> AuthResult<Option<ValuUser>> {
        let Some(token) = self.stored_token() else {
            return Ok(None);
        };

        self.state.update(|state| state.is_loading = true);
        let result = self.fetch_me(&token).await;
        // The iframe may tear down underneath the session fetch.
        suppress_iframe_teardown(result)
    }

    async fn fetch_me(&self, token: &str) -> AuthResult<Option<ValuUser>> {
        let response = self
            .http
            .get(self.endpoint("/api/users/me"))
            .bearer_auth(token)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.state.update(|state| {
                    state.is_loading = false;
                    state.error = Some(format!("valu user fetch failed: {e}"));
                });
                return Err(AuthError::network("valu user fetch failed")
                    .with_provider(ProviderName::Valu)
                    .with_cause(e));
            }
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!("valu session expired");
            let _ = self.tokens.delete(VALU_TOKEN_KEY);
            self.state.replace(ProviderState::initial());
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            self.state.update(|state| {
                state.is_loading = false;
                state.error = Some(format!("valu backend error: {status}"));
            });
            return Ok(None);
        }

        match response.json::<ValuUser>().await {
            Ok(user) => {
                self.commit_session(user.clone(), token.to_string());
                Ok(Some(user))
            }
            Err(e) => {
                self.state.update(|state| {
                    state.is_loading = false;
                    state.error = Some("valu user response malformed".to_string());
                });
                Err(AuthError::new(
                    AuthErrorCode::ProviderConnectionFailed,
                    "valu user response malformed",
                )
                .with_provider(ProviderName::Valu)
                .with_cause(e))
            }
        }
    }

    async fn close_session(&self) -> AuthResult<bool> {
        let token = self.stored_token();

        // Local state clears no matter what the backend says.
        let _ = self.tokens.delete(VALU_TOKEN_KEY);
        self.state.replace(ProviderState::initial());

        let Some(token) = token else {
            return Ok(true);
        };

        let result = match self
            .http
            .delete(self.endpoint("/api/session"))
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "valu logout rejected");
                Ok(false)
            }
            Err(e) => Err(AuthError::network("valu logout request failed")
                .with_provider(ProviderName::Valu)
                .with_cause(e)),
        };

        // Teardown during logout is the classic trigger for the upstream
        // bug; a closed frame still counts as signed out.
        match suppress_iframe_teardown(result) {
            Ok(ok) => Ok(ok),
            Err(e) => {
                tracing::warn!(error = %e, "valu logout failed");
                Ok(false)
            }
        }
    }
}

impl IdentityProvider for ValuClient {
    type User = ValuUser;

    fn name(&self) -> ProviderName {
        ProviderName::Valu
    }

    fn state(&self) -> ProviderState<ValuUser> {
        self.state.read()
    }

    fn changes(&self) -> broadcast::Receiver<ProviderName> {
        self.state.subscribe()
    }

    fn login(&self, request: LoginRequest) -> ProviderFuture<'_, Option<ValuUser>> {
        Box::pin(async move {
            let app_id = self.config.app_id.as_deref();
            match request.method {
                LoginMethod::Credentials => {
                    if request.password.is_none()
                        || (request.email.is_none() && request.username.is_none())
                    {
                        return Err(AuthError::new(
                            AuthErrorCode::LoginFailed,
                            "email or username plus password are required",
                        )
                        .with_provider(ProviderName::Valu));
                    }
                    self.open_session(SessionBody {
                        email: request.email.as_deref(),
                        username: request.username.as_deref(),
                        password: request.password.as_deref(),
                        token: None,
                        app_id,
                    })
                    .await
                }
                LoginMethod::BearerToken => {
                    let Some(token) = &request.token else {
                        return Err(AuthError::new(
                            AuthErrorCode::TokenInvalid,
                            "session token is required",
                        )
                        .with_provider(ProviderName::Valu));
                    };
                    self.open_session(SessionBody {
                        email: None,
                        username: None,
                        password: None,
                        token: Some(token),
                        app_id,
                    })
                    .await
                }
                // Silent login restores an existing session if one is
                // stored; it never opens a new one.
                LoginMethod::Silent => self.fetch_current_user().await,
                LoginMethod::Popup => Err(AuthError::new(
                    AuthErrorCode::LoginFailed,
                    "popup login requires an embedding frame host",
                )
                .with_provider(ProviderName::Valu)),
            }
        })
    }

    fn logout(&self) -> ProviderFuture<'_, bool> {
        Box::pin(self.close_session())
    }

    fn current_user(&self) -> ProviderFuture<'_, Option<ValuUser>> {
        Box::pin(self.fetch_current_user())
    }
}
