//! Immutable controller snapshots.
//!
//! Every recomputation either produces a fresh [`AuthSnapshot`] or keeps
//! the previous one when nothing observable changed, so subscribers can
//! compare by pointer identity instead of deep equality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use universe_core::{
    AuthError, AuthStatus, ProviderName, ProvidersState, UnifiedUser, UniverseProviderState,
};
use universe_engine::{status_message, StatusReport};

/// One consistent view of the unified session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UnifiedUser>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub is_initialized: bool,
    pub status: AuthStatus,
    pub is_fully_authenticated: bool,
    pub is_partially_authenticated: bool,
    pub needs_linking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AuthError>,
    pub providers: ProvidersState,
}

impl AuthSnapshot {
    /// The pre-initialization snapshot: loading, nothing known yet.
    pub fn initial() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
            is_initialized: false,
            status: AuthStatus::Loading,
            is_fully_authenticated: false,
            is_partially_authenticated: false,
            needs_linking: false,
            error: None,
            providers: ProvidersState::default(),
        }
    }

    /// The shallow comparison key used to decide whether a recompute
    /// actually changed anything. Deliberately excludes timestamps so a
    /// no-op pass keeps the previous snapshot.
    pub(crate) fn shallow_key(&self) -> (bool, AuthStatus, bool, Option<&str>) {
        (
            self.is_loading,
            self.status,
            self.is_authenticated,
            self.user.as_ref().map(|u| u.id.as_str()),
        )
    }

    /// One explanatory sentence for the current status.
    pub fn status_message(&self) -> String {
        let report = StatusReport {
            status: self.status,
            is_fully_authenticated: self.is_fully_authenticated,
            is_partially_authenticated: self.is_partially_authenticated,
            authenticated_providers: self.providers.universe.linked_providers.clone(),
        };
        status_message(&report, self.error.as_ref())
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Builds the virtual provider entry describing the composed identity.
pub(crate) fn build_universe_provider_state(
    report: &StatusReport,
    primary: Option<ProviderName>,
    now: DateTime<Utc>,
) -> UniverseProviderState {
    UniverseProviderState {
        is_linked: report.authenticated_providers.len() > 1,
        linked_providers: report.authenticated_providers.clone(),
        primary_provider: primary,
        last_sync_at: Some(now),
    }
}
