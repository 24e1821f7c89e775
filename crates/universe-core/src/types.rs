//! Core types for the universe identity layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An independent external identity source.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    /// The platform identity provider.
    #[default]
    Merkos,
    /// The social/iframe-embedded identity provider.
    Valu,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merkos => "merkos",
            Self::Valu => "valu",
        }
    }

    /// Human-readable label for status messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Merkos => "Merkos",
            Self::Valu => "Valu",
        }
    }

    /// Parses a provider name, returning `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "merkos" => Some(Self::Merkos),
            "valu" => Some(Self::Valu),
            _ => None,
        }
    }

    /// The opposite provider.
    pub fn other(&self) -> Self {
        match self {
            Self::Merkos => Self::Valu,
            Self::Valu => Self::Merkos,
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single authentication status exposed to consumers.
///
/// Exactly one value holds at any time. `Authenticated`, `Partial` and
/// `Unauthenticated` are terminal from the derivation engine's
/// perspective; `Loading` is transitional; `Error` is sticky until
/// explicitly cleared on the controller.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Loading,
    Authenticated,
    Partial,
    Unauthenticated,
    Error,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Partial => "partial",
            Self::Unauthenticated => "unauthenticated",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed snapshot of one provider's authentication lifecycle.
///
/// Created all-false/`None` at provider mount and mutated exclusively by
/// that provider's own login/logout/refresh operations. The
/// reconciliation layer only ever reads it.
///
/// Invariant: `is_authenticated == true` implies `user.is_some()`.
/// `is_loading == true` marks the snapshot as transitional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderState<U> {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub user: Option<U>,
    pub token: Option<String>,
    /// Provider-level error message. Cleared by the provider's own next
    /// successful operation, never by the controller.
    pub error: Option<String>,
}

impl<U> ProviderState<U> {
    /// The all-false/`None` state a provider starts in. Disabled
    /// providers contribute this state to every reconciliation pass.
    pub fn initial() -> Self {
        Self {
            is_authenticated: false,
            is_loading: false,
            user: None,
            token: None,
            error: None,
        }
    }

    /// An authenticated state for the given user and token.
    pub fn authenticated(user: U, token: Option<String>) -> Self {
        Self {
            is_authenticated: true,
            is_loading: false,
            user: Some(user),
            token,
            error: None,
        }
    }
}

impl<U> Default for ProviderState<U> {
    fn default() -> Self {
        Self::initial()
    }
}

/// A user record from the platform provider.
///
/// `roles`, `permissions` and `organizations` are enrichment data fetched
/// after authentication; they default to empty when enrichment is absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MerkosUser {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<String>,
}

impl MerkosUser {
    /// A minimal record with just an id and email.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            name: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            metadata: None,
            roles: Vec::new(),
            permissions: Vec::new(),
            organizations: Vec::new(),
        }
    }
}

/// Nested profile record on a valu user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct ValuProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A user record from the social/iframe provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValuUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ValuProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ValuUser {
    /// A minimal record with just an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            username: None,
            display_name: None,
            name: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            profile: None,
            metadata: None,
        }
    }
}

/// Raw per-provider records carried on the unified user for debugging
/// and enrichment. Never merged further.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkos: Option<MerkosUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valu: Option<ValuUser>,
}

/// The single merged identity exposed to consumers.
///
/// A derived value: recomputed from scratch on every reconciliation pass
/// and never mutated in place. Optional fields are omitted (not set to
/// null) when absent so serialization consumers can distinguish.
///
/// Invariants: `linked_accounts` length equals the count of non-`None`
/// input provider users; `display_name` is never empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnifiedUser {
    /// Primary-provider id, never merged or concatenated.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkos_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valu_user_id: Option<String>,
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Fixed merkos-then-valu insertion order.
    pub linked_accounts: Vec<ProviderName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_data: Option<ProviderData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Derived linkage snapshot, written once per reconciliation pass and
/// never independently mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct UniverseProviderState {
    pub is_linked: bool,
    pub linked_providers: Vec<ProviderName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_provider: Option<ProviderName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Container of every provider state plus the derived linkage snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct ProvidersState {
    pub merkos: ProviderState<MerkosUser>,
    pub valu: ProviderState<ValuUser>,
    pub universe: UniverseProviderState,
}

/// A dependency that may or may not be wired in.
///
/// Accessors for optional collaborators return this tagged union instead
/// of relying on key-presence duck-typing; narrow with
/// [`Availability::is_available`] or consume with
/// [`Availability::into_option`].
#[derive(Clone, Debug, PartialEq)]
pub enum Availability<T> {
    Available(T),
    Unavailable,
}

impl<T> Availability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }

    /// Returns the value or panics. Use only where the collaborator is
    /// guaranteed by construction.
    pub fn expect_available(self, msg: &str) -> T {
        match self {
            Self::Available(value) => value,
            Self::Unavailable => panic!("{}", msg),
        }
    }
}

impl<T> From<Option<T>> for Availability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Available(v),
            None => Self::Unavailable,
        }
    }
}
