//! End-to-end controller behavior against in-memory fake providers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use universe_auth::{
    LinkAccountOptions, LoginOptions, LogoutOptions, UniverseAuth, UniverseAuthBuilder,
    UniverseAuthConfig,
};
use universe_core::{
    AuthError, AuthErrorCode, AuthStatus, CdssoBridge, IdentityProvider, LoginRequest,
    MerkosUser, ProviderFuture, ProviderName, ProviderState, StateCell, ValuUser,
};

struct FakeProviderInner<U: Clone + Send + Sync + 'static> {
    name: ProviderName,
    state: StateCell<U>,
    login_user: Mutex<Option<U>>,
    fail_logout: AtomicBool,
    login_calls: AtomicUsize,
}

/// In-memory provider that authenticates as whatever user it was
/// seeded with. Cloneable so tests keep a handle after handing one to
/// the builder.
#[derive(Clone)]
struct FakeProvider<U: Clone + Send + Sync + 'static>(Arc<FakeProviderInner<U>>);

impl<U: Clone + Send + Sync + 'static> FakeProvider<U> {
    fn new(name: ProviderName) -> Self {
        Self(Arc::new(FakeProviderInner {
            name,
            state: StateCell::new(name),
            login_user: Mutex::new(None),
            fail_logout: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
        }))
    }

    fn seed_login_user(&self, user: U) {
        *self.0.login_user.lock().unwrap() = Some(user);
    }

    fn reject_logout(&self) {
        self.0.fail_logout.store(true, Ordering::SeqCst);
    }

    fn login_calls(&self) -> usize {
        self.0.login_calls.load(Ordering::SeqCst)
    }

    fn commit_session(&self, user: U) {
        self.0
            .state
            .replace(ProviderState::authenticated(user, Some("tok".to_string())));
    }
}

impl<U: Clone + Send + Sync + 'static> IdentityProvider for FakeProvider<U> {
    type User = U;

    fn name(&self) -> ProviderName {
        self.0.name
    }

    fn state(&self) -> ProviderState<U> {
        self.0.state.read()
    }

    fn changes(&self) -> broadcast::Receiver<ProviderName> {
        self.0.state.subscribe()
    }

    fn login(&self, _request: LoginRequest) -> ProviderFuture<'_, Option<U>> {
        self.0.login_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match self.0.login_user.lock().unwrap().clone() {
                Some(user) => {
                    self.commit_session(user.clone());
                    Ok(Some(user))
                }
                None => Ok(None),
            }
        })
    }

    fn logout(&self) -> ProviderFuture<'_, bool> {
        Box::pin(async move {
            if self.0.fail_logout.load(Ordering::SeqCst) {
                return Err(AuthError::new(
                    AuthErrorCode::ProviderConnectionFailed,
                    "backend rejected logout",
                )
                .with_provider(self.0.name));
            }
            self.0.state.replace(ProviderState::initial());
            Ok(true)
        })
    }

    fn current_user(&self) -> ProviderFuture<'_, Option<U>> {
        Box::pin(async move { Ok(self.0.state.read().user) })
    }
}

struct FakeBridgeInner {
    token: Option<String>,
    logout_calls: AtomicUsize,
}

#[derive(Clone)]
struct FakeBridge(Arc<FakeBridgeInner>);

impl FakeBridge {
    fn with_token(token: &str) -> Self {
        Self(Arc::new(FakeBridgeInner {
            token: Some(token.to_string()),
            logout_calls: AtomicUsize::new(0),
        }))
    }

    fn logout_calls(&self) -> usize {
        self.0.logout_calls.load(Ordering::SeqCst)
    }
}

impl CdssoBridge for FakeBridge {
    fn authenticate(&self) -> ProviderFuture<'_, Option<String>> {
        Box::pin(async move { Ok(self.0.token.clone()) })
    }

    fn logout(&self) -> ProviderFuture<'_, bool> {
        self.0.logout_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(true) })
    }

    fn bearer_token(&self) -> Option<String> {
        self.0.token.clone()
    }
}

fn merkos_user(id: &str) -> MerkosUser {
    MerkosUser::new(id, "person@example.org")
}

fn config(enable_merkos: bool, enable_valu: bool) -> UniverseAuthConfig {
    UniverseAuthConfig {
        enable_merkos,
        enable_valu,
        enable_cdsso: false,
        auto_initialize: false,
        ..UniverseAuthConfig::default()
    }
}

fn merkos_only() -> (UniverseAuth, FakeProvider<MerkosUser>) {
    let merkos = FakeProvider::new(ProviderName::Merkos);
    let auth = UniverseAuthBuilder::new(config(true, false))
        .with_merkos(merkos.clone())
        .build();
    (auth, merkos)
}

fn both_providers() -> (
    UniverseAuth,
    FakeProvider<MerkosUser>,
    FakeProvider<ValuUser>,
) {
    let merkos = FakeProvider::new(ProviderName::Merkos);
    let valu = FakeProvider::new(ProviderName::Valu);
    let auth = UniverseAuthBuilder::new(config(true, true))
        .with_merkos(merkos.clone())
        .with_valu(valu.clone())
        .build();
    (auth, merkos, valu)
}

async fn sign_in_merkos(auth: &UniverseAuth) {
    auth.login(LoginOptions {
        provider: ProviderName::Merkos,
        request: LoginRequest::credentials("person@example.org", "hunter2"),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn merkos_only_login_is_fully_authenticated() {
    let (auth, merkos) = merkos_only();
    merkos.seed_login_user(merkos_user("123"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;

    let snapshot = auth.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Authenticated);
    assert!(snapshot.is_fully_authenticated);
    assert!(!snapshot.is_partially_authenticated);
    assert!(snapshot.is_authenticated);
    assert_eq!(snapshot.user.as_ref().unwrap().id, "123");
    assert_eq!(
        snapshot.providers.universe.linked_providers,
        vec![ProviderName::Merkos]
    );
    assert_eq!(auth.status_message(), "Signed in with Merkos.");
    auth.shutdown();
}

#[tokio::test]
async fn partial_messages_name_the_missing_provider() {
    let (auth, merkos, _valu) = both_providers();
    merkos.seed_login_user(merkos_user("m-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;

    let snapshot = auth.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Partial);
    assert!(snapshot.is_partially_authenticated);
    assert!(!snapshot.is_fully_authenticated);
    assert_eq!(
        auth.status_message(),
        "Signed in with Merkos only. Valu sign-in is still pending."
    );
    auth.shutdown();
}

#[tokio::test]
async fn valu_only_partial_reads_differently() {
    let (auth, _merkos, valu) = both_providers();
    valu.seed_login_user(ValuUser::new("v-1"));
    auth.initialize().await.unwrap();
    auth.login(LoginOptions {
        provider: ProviderName::Valu,
        request: LoginRequest::credentials("person@example.org", "hunter2"),
    })
    .await
    .unwrap();

    assert_eq!(
        auth.status_message(),
        "Signed in with Valu only. Merkos sign-in is still pending."
    );
    auth.shutdown();
}

#[tokio::test]
async fn both_providers_authenticated_is_linked() {
    let (auth, merkos, valu) = both_providers();
    merkos.seed_login_user(merkos_user("m-1"));
    valu.seed_login_user(ValuUser::new("v-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;
    auth.link_account(LinkAccountOptions {
        provider: ProviderName::Valu,
        request: LoginRequest::credentials("person@example.org", "hunter2"),
    })
    .await
    .unwrap();

    let snapshot = auth.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Authenticated);
    assert!(snapshot.is_fully_authenticated);
    assert!(snapshot.is_partially_authenticated);
    assert!(snapshot.needs_linking);
    assert!(snapshot.providers.universe.is_linked);
    // Merkos priority: the unified id is the platform id.
    let user = snapshot.user.as_ref().unwrap();
    assert_eq!(user.id, "m-1");
    assert_eq!(user.merkos_user_id.as_deref(), Some("m-1"));
    assert_eq!(user.valu_user_id.as_deref(), Some("v-1"));
    assert_eq!(
        snapshot.providers.universe.primary_provider,
        Some(ProviderName::Merkos)
    );
    auth.shutdown();
}

#[tokio::test]
async fn logout_succeeds_even_when_every_backend_rejects_it() {
    let (auth, merkos, valu) = both_providers();
    merkos.seed_login_user(merkos_user("m-1"));
    valu.seed_login_user(ValuUser::new("v-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;
    merkos.reject_logout();
    valu.reject_logout();

    auth.logout(LogoutOptions::default()).await.unwrap();

    let snapshot = auth.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
    assert!(!snapshot.is_authenticated);
    assert_eq!(snapshot.user, None);
    assert_eq!(snapshot.error, None);
    auth.shutdown();
}

#[tokio::test]
async fn targeted_logout_keeps_the_other_session() {
    let (auth, merkos, valu) = both_providers();
    merkos.seed_login_user(merkos_user("m-1"));
    valu.seed_login_user(ValuUser::new("v-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;
    auth.link_account(LinkAccountOptions {
        provider: ProviderName::Valu,
        request: LoginRequest::credentials("person@example.org", "hunter2"),
    })
    .await
    .unwrap();

    auth.logout(LogoutOptions {
        provider: Some(ProviderName::Valu),
    })
    .await
    .unwrap();

    let snapshot = auth.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Partial);
    assert!(auth.is_authenticated_with(ProviderName::Merkos));
    assert!(!auth.is_authenticated_with(ProviderName::Valu));
    auth.shutdown();
}

#[tokio::test]
async fn full_logout_also_ends_the_cdsso_session() {
    let merkos = FakeProvider::new(ProviderName::Merkos);
    merkos.seed_login_user(merkos_user("m-1"));
    let bridge = FakeBridge::with_token("relayed");
    let auth = UniverseAuthBuilder::new(UniverseAuthConfig {
        enable_cdsso: true,
        auto_initialize: false,
        ..config(true, false)
    })
    .with_merkos(merkos.clone())
    .with_cdsso(bridge.clone())
    .build();

    // The relay hands its token to the platform provider at startup.
    auth.initialize().await.unwrap();
    assert_eq!(auth.snapshot().status, AuthStatus::Authenticated);
    assert_eq!(merkos.login_calls(), 1);

    auth.logout(LogoutOptions::default()).await.unwrap();
    assert_eq!(bridge.logout_calls(), 1);
    assert_eq!(auth.snapshot().status, AuthStatus::Unauthenticated);
    auth.shutdown();
}

#[tokio::test]
async fn bearer_login_requires_the_platform_provider() {
    let valu = FakeProvider::new(ProviderName::Valu);
    let auth = UniverseAuthBuilder::new(config(false, true))
        .with_valu(valu.clone())
        .build();
    auth.initialize().await.unwrap();

    let err = auth
        .login_with_bearer_token("tok", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, AuthErrorCode::ProviderNotAvailable);
    assert_eq!(err.provider, Some(ProviderName::Merkos));
    assert_eq!(auth.snapshot().status, AuthStatus::Error);
    auth.shutdown();
}

#[tokio::test]
async fn link_is_idempotent_for_an_authenticated_provider() {
    let (auth, merkos) = merkos_only();
    merkos.seed_login_user(merkos_user("m-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;
    assert_eq!(merkos.login_calls(), 1);

    auth.link_account(LinkAccountOptions {
        provider: ProviderName::Merkos,
        request: LoginRequest::credentials("person@example.org", "hunter2"),
    })
    .await
    .unwrap();
    assert_eq!(merkos.login_calls(), 1);
    auth.shutdown();
}

#[tokio::test]
async fn failed_link_surfaces_link_failed() {
    let (auth, merkos, _valu) = both_providers();
    merkos.seed_login_user(merkos_user("m-1"));
    // The valu fake was never seeded, so its login soft-fails.
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;

    let err = auth
        .link_account(LinkAccountOptions {
            provider: ProviderName::Valu,
            request: LoginRequest::credentials("person@example.org", "hunter2"),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, AuthErrorCode::LinkFailed);
    assert_eq!(err.provider, Some(ProviderName::Valu));
    assert_eq!(auth.snapshot().status, AuthStatus::Error);

    // The platform session survives the failed link.
    auth.clear_error();
    assert_eq!(auth.snapshot().status, AuthStatus::Partial);
    auth.shutdown();
}

#[tokio::test]
async fn noop_recompute_keeps_the_same_snapshot() {
    let (auth, merkos) = merkos_only();
    merkos.seed_login_user(merkos_user("m-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;

    let before = auth.snapshot();
    auth.clear_error();
    let after = auth.snapshot();
    assert!(Arc::ptr_eq(&before, &after));
    auth.shutdown();
}

#[tokio::test]
async fn on_auth_change_fires_once_per_resolved_loading_phase() {
    let (auth, merkos) = merkos_only();
    merkos.seed_login_user(merkos_user("m-1"));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    auth.set_on_auth_change(move |authenticated| {
        sink.lock().unwrap().push(authenticated);
    });

    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;
    auth.clear_error();

    assert_eq!(*events.lock().unwrap(), vec![false, true]);
    auth.shutdown();
}

#[tokio::test]
async fn refresh_drops_a_session_the_backend_no_longer_honors() {
    let (auth, merkos) = merkos_only();
    merkos.seed_login_user(merkos_user("m-1"));
    auth.initialize().await.unwrap();
    sign_in_merkos(&auth).await;

    // The backend invalidated the session out-of-band.
    merkos.0.state.replace(ProviderState::initial());
    auth.refresh_auth().await.unwrap();

    let snapshot = auth.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
    assert!(!snapshot.is_authenticated);
    auth.shutdown();
}

#[tokio::test]
async fn pump_folds_spontaneous_provider_changes_into_the_snapshot() {
    let (auth, merkos) = merkos_only();
    auth.initialize().await.unwrap();
    let mut changes = auth.subscribe();

    // A change committed by the provider itself, outside any
    // controller action.
    merkos.commit_session(merkos_user("m-9"));

    let snapshot = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("pump did not react to the provider change")
        .unwrap();
    assert_eq!(snapshot.status, AuthStatus::Authenticated);
    assert_eq!(snapshot.user.as_ref().unwrap().id, "m-9");
    auth.shutdown();
}
