//! The reconciliation controller.
//!
//! Owns no provider state: adapters keep their own, the controller
//! keeps cached views of them plus the derived snapshot. Every
//! observable change flows through [`UniverseAuth::reconcile`], which
//! recomputes the snapshot from the views and notifies subscribers only
//! when something actually changed.

use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use futures_util::future;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use universe_core::{
    AuthError, AuthErrorCode, AuthResult, AuthStatus, Availability, CdssoBridge,
    IdentityProvider, LoginRequest, MemoryTokenStore, MerkosUser, ProviderFuture, ProviderName,
    ProviderState, ProvidersState, TokenStore, UnifiedUser, ValuUser,
};
use universe_engine::{
    determine_status, merge, needs_linking, pick_primary_provider, MergeOptions,
};

use crate::config::UniverseAuthConfig;
use crate::snapshot::{build_universe_provider_state, AuthSnapshot};

type MerkosHandle = Arc<dyn IdentityProvider<User = MerkosUser>>;
type ValuHandle = Arc<dyn IdentityProvider<User = ValuUser>>;
type CdssoHandle = Arc<dyn CdssoBridge>;
type AuthChangeCallback = Box<dyn Fn(bool) + Send + Sync>;

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Options for [`UniverseAuth::login`].
#[derive(Clone, Debug, Default)]
pub struct LoginOptions {
    pub provider: ProviderName,
    pub request: LoginRequest,
}

/// Options for [`UniverseAuth::logout`]. `provider: None` signs out of
/// everything, including the CDSSO bridge.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogoutOptions {
    pub provider: Option<ProviderName>,
}

/// Options for [`UniverseAuth::link_account`].
#[derive(Clone, Debug)]
pub struct LinkAccountOptions {
    pub provider: ProviderName,
    pub request: LoginRequest,
}

struct ControllerState {
    snapshot: Arc<AuthSnapshot>,
    merkos_view: ProviderState<MerkosUser>,
    valu_view: ProviderState<ValuUser>,
    actions_in_flight: usize,
    error: Option<AuthError>,
    initialized: bool,
}

struct Inner {
    config: UniverseAuthConfig,
    merkos: Option<MerkosHandle>,
    valu: Option<ValuHandle>,
    cdsso: Option<CdssoHandle>,
    state: RwLock<ControllerState>,
    changes: broadcast::Sender<Arc<AuthSnapshot>>,
    on_auth_change: RwLock<Option<AuthChangeCallback>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

/// The unified auth controller. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct UniverseAuth {
    inner: Arc<Inner>,
}

impl UniverseAuth {
    /// Constructs the controller with real HTTP adapters for every
    /// enabled provider, then initializes it unless `auto_initialize`
    /// is off.
    pub async fn from_config(config: UniverseAuthConfig) -> AuthResult<Self> {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());

        let mut builder = UniverseAuthBuilder::new(config.clone());
        if config.enable_merkos {
            builder = builder.with_merkos(merkos_client::MerkosClient::new(
                config.merkos.clone(),
                tokens.clone(),
            )?);
        }
        if config.enable_valu {
            builder = builder.with_valu(valu_client::ValuClient::new(
                config.valu.clone(),
                tokens.clone(),
            )?);
        }
        if config.enable_cdsso {
            builder = builder.with_cdsso(cdsso_client::CdssoClient::new(config.cdsso.clone())?);
        }

        let auth = builder.build();
        if auth.inner.config.auto_initialize {
            auth.initialize().await?;
        }
        Ok(auth)
    }

    /// One-time startup: run the CDSSO relay if enabled, hydrate every
    /// enabled provider from its stored session, then start watching
    /// provider change streams. Individual step failures are logged and
    /// absorbed; startup itself never fails once the controller exists.
    pub async fn initialize(&self) -> AuthResult<()> {
        {
            let st = self.inner.state.read().expect("lock poisoned");
            if st.initialized {
                return Ok(());
            }
        }
        self.begin_action();

        // Cross-domain handoff feeds a relayed token through the
        // platform provider's bearer login.
        if let (Some(bridge), Some(merkos)) = (self.cdsso_handle(), self.merkos_handle()) {
            match bridge.authenticate().await {
                Ok(Some(token)) => {
                    if let Err(e) = merkos.login(LoginRequest::bearer(token)).await {
                        tracing::warn!(
                            code = %AuthErrorCode::CdssoFailed,
                            error = %e,
                            "cdsso bearer handoff failed"
                        );
                    }
                }
                Ok(None) => tracing::debug!("no cross-domain session to relay"),
                Err(e) => tracing::warn!(
                    code = %AuthErrorCode::CdssoFailed,
                    error = %e,
                    "cdsso relay failed"
                ),
            }
        }

        let merkos = self.merkos_handle();
        let valu = self.valu_handle();
        let hydrate_merkos = async {
            if let Some(provider) = &merkos {
                if let Err(e) = provider.current_user().await {
                    tracing::warn!(
                        code = %AuthErrorCode::InitializationFailed,
                        error = %e,
                        "merkos session restore failed"
                    );
                }
            }
        };
        let hydrate_valu = async {
            if let Some(provider) = &valu {
                if let Err(e) = provider.current_user().await {
                    tracing::warn!(
                        code = %AuthErrorCode::InitializationFailed,
                        error = %e,
                        "valu session restore failed"
                    );
                }
            }
        };
        tokio::join!(hydrate_merkos, hydrate_valu);

        {
            let mut st = self.inner.state.write().expect("lock poisoned");
            st.initialized = true;
        }
        self.finish_action(true);
        self.spawn_pump();
        tracing::info!(status = %self.snapshot().status, "auth controller initialized");
        Ok(())
    }

    /// Signs in against one provider. The controller stays in a loading
    /// state for the duration; rejections surface as `LOGIN_FAILED`
    /// with the original error as cause.
    pub async fn login(&self, options: LoginOptions) -> AuthResult<()> {
        self.begin_action();
        let result = self.dispatch_login(options.provider, options.request).await;
        {
            let mut st = self.inner.state.write().expect("lock poisoned");
            st.error = result.as_ref().err().cloned();
        }
        self.finish_action(true);
        result
    }

    /// Bearer-token sign-in through the platform provider. This is the
    /// CDSSO landing path, also usable directly.
    pub async fn login_with_bearer_token(
        &self,
        token: impl Into<String>,
        site_id: Option<String>,
    ) -> AuthResult<()> {
        let mut request = LoginRequest::bearer(token);
        if let Some(site_id) = site_id {
            request = request.with_site_id(site_id);
        }
        self.login(LoginOptions {
            provider: ProviderName::Merkos,
            request,
        })
        .await
    }

    /// Signs out. Provider logout failures are logged and swallowed:
    /// local sign-out always completes, so a rejecting backend cannot
    /// hold a session hostage.
    pub async fn logout(&self, options: LogoutOptions) -> AuthResult<()> {
        self.begin_action();
        match options.provider {
            Some(ProviderName::Merkos) => {
                if let Some(provider) = self.merkos_handle() {
                    if let Err(e) = provider.logout().await {
                        tracing::warn!(error = %e, "merkos logout failed; signing out locally");
                    }
                }
                let mut st = self.inner.state.write().expect("lock poisoned");
                st.merkos_view = ProviderState::initial();
            }
            Some(ProviderName::Valu) => {
                if let Some(provider) = self.valu_handle() {
                    if let Err(e) = provider.logout().await {
                        tracing::warn!(error = %e, "valu logout failed; signing out locally");
                    }
                }
                let mut st = self.inner.state.write().expect("lock poisoned");
                st.valu_view = ProviderState::initial();
            }
            None => {
                let merkos = self.merkos_handle();
                let valu = self.valu_handle();
                let cdsso = self.cdsso_handle();
                let mut tasks: Vec<ProviderFuture<'_, bool>> = Vec::new();
                if let Some(provider) = &merkos {
                    tasks.push(provider.logout());
                }
                if let Some(provider) = &valu {
                    tasks.push(provider.logout());
                }
                if let Some(bridge) = &cdsso {
                    tasks.push(bridge.logout());
                }
                for result in future::join_all(tasks).await {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "provider logout failed; signing out locally");
                    }
                }
                let mut st = self.inner.state.write().expect("lock poisoned");
                st.merkos_view = ProviderState::initial();
                st.valu_view = ProviderState::initial();
                st.error = None;
            }
        }
        // No view refresh here: the local clear is authoritative, and a
        // provider whose logout was rejected must not resurrect the
        // session in the same pass.
        self.finish_action(false);
        tracing::info!(provider = ?options.provider.map(|p| p.as_str()), "signed out");
        Ok(())
    }

    /// Adds a second provider to an existing session. Idempotent: if
    /// the target provider is already authenticated this is a no-op.
    pub async fn link_account(&self, options: LinkAccountOptions) -> AuthResult<()> {
        if self.is_authenticated_with(options.provider) {
            tracing::debug!(provider = %options.provider, "already linked");
            return Ok(());
        }
        let provider = options.provider;
        match self
            .login(LoginOptions {
                provider,
                request: options.request,
            })
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = AuthError::new(
                    AuthErrorCode::LinkFailed,
                    format!("linking {} failed: {}", provider, e.message),
                )
                .with_provider(provider)
                .with_cause(e);
                {
                    let mut st = self.inner.state.write().expect("lock poisoned");
                    st.error = Some(err.clone());
                }
                self.reconcile();
                Err(err)
            }
        }
    }

    /// Re-validates every currently-authenticated provider session
    /// against its backend. Failures are logged and absorbed; the
    /// provider adapters downgrade their own state on a dead session.
    pub async fn refresh_auth(&self) -> AuthResult<()> {
        self.begin_action();
        let (merkos_authed, valu_authed) = {
            let st = self.inner.state.read().expect("lock poisoned");
            (
                st.merkos_view.is_authenticated,
                st.valu_view.is_authenticated,
            )
        };
        let merkos = self.merkos_handle().filter(|_| merkos_authed);
        let valu = self.valu_handle().filter(|_| valu_authed);
        let refresh_merkos = async {
            if let Some(provider) = &merkos {
                if let Err(e) = provider.current_user().await {
                    tracing::warn!(
                        code = %AuthErrorCode::TokenRefreshFailed,
                        error = %e,
                        "merkos session refresh failed"
                    );
                }
            }
        };
        let refresh_valu = async {
            if let Some(provider) = &valu {
                if let Err(e) = provider.current_user().await {
                    tracing::warn!(
                        code = %AuthErrorCode::TokenRefreshFailed,
                        error = %e,
                        "valu session refresh failed"
                    );
                }
            }
        };
        tokio::join!(refresh_merkos, refresh_valu);
        self.finish_action(true);
        Ok(())
    }

    /// Clears a sticky controller error and recomputes the status.
    pub fn clear_error(&self) {
        {
            let mut st = self.inner.state.write().expect("lock poisoned");
            st.error = None;
        }
        self.reconcile();
    }

    /// Stops the background change pump. Providers keep their state;
    /// only the watching stops.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.pump.lock().expect("lock poisoned").take() {
            handle.abort();
        }
    }

    /// The current snapshot. Pointer-stable across no-op recomputes.
    pub fn snapshot(&self) -> Arc<AuthSnapshot> {
        self.inner
            .state
            .read()
            .expect("lock poisoned")
            .snapshot
            .clone()
    }

    /// Subscribes to snapshot changes. Only actual changes are sent.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AuthSnapshot>> {
        self.inner.changes.subscribe()
    }

    /// Registers the callback fired with the authenticated flag each
    /// time a loading phase resolves. Replaces any previous callback.
    pub fn set_on_auth_change(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        *self.inner.on_auth_change.write().expect("lock poisoned") = Some(Box::new(callback));
    }

    /// One explanatory sentence for the current status.
    pub fn status_message(&self) -> String {
        self.snapshot().status_message()
    }

    /// Whether the given provider is currently authenticated, per the
    /// controller's cached view.
    pub fn is_authenticated_with(&self, provider: ProviderName) -> bool {
        let st = self.inner.state.read().expect("lock poisoned");
        match provider {
            ProviderName::Merkos => st.merkos_view.is_authenticated,
            ProviderName::Valu => st.valu_view.is_authenticated,
        }
    }

    /// Role check against the platform identity. `false` whenever the
    /// platform user or its enrichment is absent.
    pub fn has_role(&self, role: &str) -> bool {
        let st = self.inner.state.read().expect("lock poisoned");
        st.merkos_view
            .user
            .as_ref()
            .is_some_and(|u| u.roles.iter().any(|r| r == role))
    }

    /// Permission check against the platform identity. `false` whenever
    /// the platform user or its enrichment is absent.
    pub fn has_permission(&self, permission: &str) -> bool {
        let st = self.inner.state.read().expect("lock poisoned");
        st.merkos_view
            .user
            .as_ref()
            .is_some_and(|u| u.permissions.iter().any(|p| p == permission))
    }

    /// The merged user, when any provider is authenticated.
    pub fn current_user(&self) -> Option<UnifiedUser> {
        self.snapshot().user.clone()
    }

    /// The CDSSO bridge, when enabled and configured.
    pub fn cdsso(&self) -> Availability<CdssoHandle> {
        self.cdsso_handle().into()
    }

    fn merkos_handle(&self) -> Option<MerkosHandle> {
        if self.inner.config.enable_merkos {
            self.inner.merkos.clone()
        } else {
            None
        }
    }

    fn valu_handle(&self) -> Option<ValuHandle> {
        if self.inner.config.enable_valu {
            self.inner.valu.clone()
        } else {
            None
        }
    }

    fn cdsso_handle(&self) -> Option<CdssoHandle> {
        if self.inner.config.enable_cdsso {
            self.inner.cdsso.clone()
        } else {
            None
        }
    }

    async fn dispatch_login(
        &self,
        provider: ProviderName,
        request: LoginRequest,
    ) -> AuthResult<()> {
        match provider {
            ProviderName::Merkos => {
                let Some(handle) = self.merkos_handle() else {
                    return Err(AuthError::provider_not_available(ProviderName::Merkos));
                };
                Self::settle_login(provider, handle.login(request).await)
            }
            ProviderName::Valu => {
                let Some(handle) = self.valu_handle() else {
                    return Err(AuthError::provider_not_available(ProviderName::Valu));
                };
                Self::settle_login(provider, handle.login(request).await)
            }
        }
    }

    /// Folds both provider rejection channels (an `Err` and a soft
    /// `Ok(None)`) into one `LOGIN_FAILED`.
    fn settle_login<U>(provider: ProviderName, result: AuthResult<Option<U>>) -> AuthResult<()> {
        match result {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AuthError::new(
                AuthErrorCode::LoginFailed,
                format!("{} rejected the login", provider.label()),
            )
            .with_provider(provider)),
            Err(e) => Err(AuthError::new(
                AuthErrorCode::LoginFailed,
                format!("{} login failed: {}", provider, e.message),
            )
            .with_provider(provider)
            .with_cause(e)),
        }
    }

    fn begin_action(&self) {
        {
            let mut st = self.inner.state.write().expect("lock poisoned");
            st.actions_in_flight += 1;
        }
        self.reconcile();
    }

    fn finish_action(&self, refresh_views: bool) {
        if refresh_views {
            self.sync_views();
        }
        {
            let mut st = self.inner.state.write().expect("lock poisoned");
            st.actions_in_flight = st.actions_in_flight.saturating_sub(1);
        }
        self.reconcile();
    }

    /// Copies each enabled provider's current state into the cached
    /// views the snapshot is computed from.
    fn sync_views(&self) {
        let merkos = self.merkos_handle().map(|p| p.state());
        let valu = self.valu_handle().map(|p| p.state());
        let mut st = self.inner.state.write().expect("lock poisoned");
        if let Some(view) = merkos {
            st.merkos_view = view;
        }
        if let Some(view) = valu {
            st.valu_view = view;
        }
    }

    /// Recomputes the snapshot from the cached views. Keeps the previous
    /// snapshot (same `Arc`) when the shallow key is unchanged, so
    /// no-op passes notify nobody.
    ///
    /// Status layering: a sticky controller error outranks loading, so
    /// an action retried before `clear_error` keeps `status = Error`
    /// for its duration instead of re-entering `Loading`.
    fn reconcile(&self) -> Arc<AuthSnapshot> {
        let (snapshot, loading_resolved) = {
            let mut st = self.inner.state.write().expect("lock poisoned");
            let config = &self.inner.config;

            let report = determine_status(
                &st.valu_view,
                &st.merkos_view,
                config.enable_valu,
                config.enable_merkos,
            );
            let user = merge(
                st.valu_view.user.as_ref(),
                st.merkos_view.user.as_ref(),
                &MergeOptions {
                    priority: config.priority,
                },
            );
            let primary = pick_primary_provider(&st.valu_view, &st.merkos_view, config.priority);
            let is_loading = st.actions_in_flight > 0
                || (config.enable_merkos && st.merkos_view.is_loading)
                || (config.enable_valu && st.valu_view.is_loading);
            let status = if st.error.is_some() {
                AuthStatus::Error
            } else if is_loading {
                AuthStatus::Loading
            } else {
                report.status
            };

            let candidate = AuthSnapshot {
                is_authenticated: !report.authenticated_providers.is_empty(),
                is_loading,
                is_initialized: st.initialized,
                status,
                is_fully_authenticated: report.is_fully_authenticated,
                is_partially_authenticated: report.is_partially_authenticated,
                needs_linking: needs_linking(&st.valu_view, &st.merkos_view),
                error: st.error.clone(),
                providers: ProvidersState {
                    merkos: st.merkos_view.clone(),
                    valu: st.valu_view.clone(),
                    universe: build_universe_provider_state(&report, primary, Utc::now()),
                },
                user,
            };

            if candidate.shallow_key() == st.snapshot.shallow_key() {
                return st.snapshot.clone();
            }

            let previous_status = st.snapshot.status;
            st.snapshot = Arc::new(candidate);
            (
                st.snapshot.clone(),
                previous_status == AuthStatus::Loading
                    && st.snapshot.status != AuthStatus::Loading,
            )
        };

        tracing::debug!(
            status = %snapshot.status,
            authenticated = snapshot.is_authenticated,
            "auth snapshot updated"
        );
        let _ = self.inner.changes.send(snapshot.clone());
        if loading_resolved {
            let callback = self.inner.on_auth_change.read().expect("lock poisoned");
            if let Some(callback) = callback.as_ref() {
                callback(snapshot.is_authenticated);
            }
        }
        snapshot
    }

    /// Spawns the background task that folds provider change
    /// notifications back into the snapshot. Holds only a weak handle,
    /// so dropping the last controller stops the pump.
    fn spawn_pump(&self) {
        let mut guard = self.inner.pump.lock().expect("lock poisoned");
        if guard.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let mut merkos_rx = self.merkos_handle().map(|p| p.changes());
        let mut valu_rx = self.valu_handle().map(|p| p.changes());

        *guard = Some(tokio::spawn(async move {
            loop {
                if merkos_rx.is_none() && valu_rx.is_none() {
                    break;
                }
                tokio::select! {
                    alive = next_change(&mut merkos_rx) => {
                        if !alive {
                            merkos_rx = None;
                            continue;
                        }
                    }
                    alive = next_change(&mut valu_rx) => {
                        if !alive {
                            valu_rx = None;
                            continue;
                        }
                    }
                }
                // Drain whatever else already queued up so one pass
                // covers a burst of provider changes.
                drain(&mut merkos_rx);
                drain(&mut valu_rx);

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let controller = UniverseAuth { inner };
                controller.sync_views();
                controller.reconcile();
            }
            tracing::debug!("provider change pump stopped");
        }));
    }
}

async fn next_change(rx: &mut Option<broadcast::Receiver<ProviderName>>) -> bool {
    let Some(receiver) = rx else {
        return std::future::pending::<bool>().await;
    };
    loop {
        match receiver.recv().await {
            Ok(_) => return true,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "provider change stream lagged");
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

fn drain(rx: &mut Option<broadcast::Receiver<ProviderName>>) {
    if let Some(receiver) = rx {
        while receiver.try_recv().is_ok() {}
    }
}

/// Assembles a controller from injected provider handles. This is how
/// tests swap in fakes; `UniverseAuth::from_config` uses it with the
/// real HTTP adapters.
pub struct UniverseAuthBuilder {
    config: UniverseAuthConfig,
    merkos: Option<MerkosHandle>,
    valu: Option<ValuHandle>,
    cdsso: Option<CdssoHandle>,
}

impl UniverseAuthBuilder {
    pub fn new(config: UniverseAuthConfig) -> Self {
        Self {
            config,
            merkos: None,
            valu: None,
            cdsso: None,
        }
    }

    pub fn with_merkos(
        mut self,
        provider: impl IdentityProvider<User = MerkosUser> + 'static,
    ) -> Self {
        self.merkos = Some(Arc::new(provider));
        self
    }

    pub fn with_valu(mut self, provider: impl IdentityProvider<User = ValuUser> + 'static) -> Self {
        self.valu = Some(Arc::new(provider));
        self
    }

    pub fn with_cdsso(mut self, bridge: impl CdssoBridge + 'static) -> Self {
        self.cdsso = Some(Arc::new(bridge));
        self
    }

    pub fn build(self) -> UniverseAuth {
        let (changes, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        UniverseAuth {
            inner: Arc::new(Inner {
                config: self.config,
                merkos: self.merkos,
                valu: self.valu,
                cdsso: self.cdsso,
                state: RwLock::new(ControllerState {
                    snapshot: Arc::new(AuthSnapshot::initial()),
                    merkos_view: ProviderState::initial(),
                    valu_view: ProviderState::initial(),
                    actions_in_flight: 0,
                    error: None,
                    initialized: false,
                }),
                changes,
                on_auth_change: RwLock::new(None),
                pump: Mutex::new(None),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_without_providers_yields_initial_snapshot() {
        let auth = UniverseAuthBuilder::new(UniverseAuthConfig::default()).build();
        let snapshot = auth.snapshot();
        assert_eq!(snapshot.status, AuthStatus::Loading);
        assert!(!snapshot.is_initialized);
    }

    #[tokio::test]
    async fn login_on_disabled_provider_is_provider_not_available() {
        let config = UniverseAuthConfig {
            enable_merkos: false,
            auto_initialize: false,
            ..UniverseAuthConfig::default()
        };
        let auth = UniverseAuthBuilder::new(config).build();
        let err = auth
            .login(LoginOptions {
                provider: ProviderName::Merkos,
                request: LoginRequest::bearer("tok"),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, AuthErrorCode::ProviderNotAvailable);
        assert_eq!(auth.snapshot().status, AuthStatus::Error);
    }

    #[tokio::test]
    async fn initialize_without_providers_settles_unauthenticated() {
        let config = UniverseAuthConfig {
            enable_merkos: false,
            auto_initialize: false,
            ..UniverseAuthConfig::default()
        };
        let auth = UniverseAuthBuilder::new(config).build();
        auth.initialize().await.unwrap();
        let snapshot = auth.snapshot();
        assert!(snapshot.is_initialized);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        auth.shutdown();
    }

    #[test]
    fn role_and_permission_checks_require_enrichment() {
        let auth = UniverseAuthBuilder::new(UniverseAuthConfig::default()).build();
        // No platform user at all.
        assert!(!auth.has_role("admin"));
        assert!(!auth.has_permission("users:write"));

        // Authenticated, but the enrichment fetch never populated
        // roles or permissions.
        let mut user = MerkosUser::new("m-1", "m@example.org");
        {
            let mut st = auth.inner.state.write().expect("lock poisoned");
            st.merkos_view = ProviderState::authenticated(user.clone(), None);
        }
        assert!(!auth.has_role("admin"));
        assert!(!auth.has_permission("users:write"));

        user.roles = vec!["admin".to_string()];
        user.permissions = vec!["users:write".to_string()];
        {
            let mut st = auth.inner.state.write().expect("lock poisoned");
            st.merkos_view = ProviderState::authenticated(user, None);
        }
        assert!(auth.has_role("admin"));
        assert!(!auth.has_role("editor"));
        assert!(auth.has_permission("users:write"));
        assert!(!auth.has_permission("users:delete"));
    }

    #[tokio::test]
    async fn clear_error_returns_to_derived_status() {
        let config = UniverseAuthConfig {
            enable_merkos: false,
            auto_initialize: false,
            ..UniverseAuthConfig::default()
        };
        let auth = UniverseAuthBuilder::new(config).build();
        auth.initialize().await.unwrap();
        let _ = auth
            .login(LoginOptions {
                provider: ProviderName::Valu,
                request: LoginRequest::default(),
            })
            .await;
        assert_eq!(auth.snapshot().status, AuthStatus::Error);
        auth.clear_error();
        assert_eq!(auth.snapshot().status, AuthStatus::Unauthenticated);
        auth.shutdown();
    }
}
