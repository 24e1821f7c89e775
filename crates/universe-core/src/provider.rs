//! Provider and bridge contracts consumed by the reconciliation
//! controller, plus the shared state cell provider adapters own.
//!
//! Trait methods that do network work return a boxed future through the
//! [`ProviderFuture`] alias so the traits stay object-safe and the
//! controller can hold `Arc<dyn ...>` handles.

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AuthResult;
use crate::types::{ProviderName, ProviderState};

/// Boxed future returned by provider and bridge operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = AuthResult<T>> + Send + 'a>>;

/// How a login should be performed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LoginMethod {
    #[default]
    Credentials,
    BearerToken,
    Popup,
    Silent,
}

/// Parameters for a provider login.
#[derive(Clone, Debug, Default)]
pub struct LoginRequest {
    pub method: LoginMethod,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub site_id: Option<String>,
}

impl LoginRequest {
    /// A credentials login.
    pub fn credentials(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            method: LoginMethod::Credentials,
            email: Some(email.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// A bearer-token login.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            method: LoginMethod::BearerToken,
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Scopes the request to a site.
    pub fn with_site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }
}

/// An independent identity provider adapter.
///
/// Implementations own their [`ProviderState`] and mutate it exclusively
/// through their own operations; the controller only reads it. Every
/// committed state change must be followed by a notification on the
/// channel handed out by [`IdentityProvider::changes`].
///
/// Operations return `Ok(None)` / `Ok(false)` for documented soft
/// failures (wrong credentials, expired session) and `Err` for transport
/// failures; callers treat both channels.
pub trait IdentityProvider: Send + Sync {
    type User: Clone + Send + Sync + 'static;

    fn name(&self) -> ProviderName;

    /// Synchronous read of the current provider state.
    fn state(&self) -> ProviderState<Self::User>;

    /// Subscribes to change notifications. Multiple independent
    /// subscribers are supported; dropping the receiver unsubscribes.
    fn changes(&self) -> broadcast::Receiver<ProviderName>;

    fn login(&self, request: LoginRequest) -> ProviderFuture<'_, Option<Self::User>>;

    fn logout(&self) -> ProviderFuture<'_, bool>;

    /// Re-fetches the current user for an existing session. Never turns
    /// an unauthenticated provider into an authenticated one.
    fn current_user(&self) -> ProviderFuture<'_, Option<Self::User>>;
}

/// The cross-domain SSO bridge.
///
/// Retrieves a token from a trusted remote origin and exchanges it with
/// the local backend; the controller feeds the result through the
/// platform provider's bearer login.
pub trait CdssoBridge: Send + Sync {
    /// Performs the token relay. Returns the exchanged bearer token, or
    /// `None` when the remote origin has no session.
    fn authenticate(&self) -> ProviderFuture<'_, Option<String>>;

    fn logout(&self) -> ProviderFuture<'_, bool>;

    /// Synchronous read of the cached token, no network call.
    fn bearer_token(&self) -> Option<String>;
}

/// The state cell a provider adapter owns.
///
/// Commits go through [`StateCell::update`], which notifies subscribers
/// only after the new state is visible to [`StateCell::read`].
#[derive(Debug)]
pub struct StateCell<U> {
    name: ProviderName,
    state: RwLock<ProviderState<U>>,
    changes: broadcast::Sender<ProviderName>,
}

impl<U: Clone> StateCell<U> {
    pub fn new(name: ProviderName) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            name,
            state: RwLock::new(ProviderState::initial()),
            changes,
        }
    }

    pub fn name(&self) -> ProviderName {
        self.name
    }

    /// Clones the current state.
    pub fn read(&self) -> ProviderState<U> {
        self.state.read().expect("lock poisoned").clone()
    }

    /// Applies a mutation and notifies subscribers after commit.
    pub fn update(&self, f: impl FnOnce(&mut ProviderState<U>)) {
        {
            let mut guard = self.state.write().expect("lock poisoned");
            f(&mut guard);
        }
        // Send errors just mean nobody is listening right now.
        let _ = self.changes.send(self.name);
    }

    /// Replaces the state wholesale and notifies subscribers.
    pub fn replace(&self, next: ProviderState<U>) {
        self.update(|state| *state = next);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderName> {
        self.changes.subscribe()
    }

    /// Number of live subscribers, for tests and debugging.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}
