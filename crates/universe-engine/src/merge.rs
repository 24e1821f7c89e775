//! The user merge engine.
//!
//! Folds two optional provider user records into one unified record.
//! Every field resolves independently: the priority provider's value
//! wins, the other provider's value fills gaps, and the display name
//! walks a fixed fallback chain that always terminates in a literal
//! default.

use serde_json::{Map, Value};
use universe_core::{MerkosUser, ProviderData, ProviderName, UnifiedUser, ValuUser};

/// Literal display-name default when no provider offers anything usable.
const DEFAULT_DISPLAY_NAME: &str = "User";

/// Options for a merge pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Which provider's fields win on conflict.
    pub priority: ProviderName,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            priority: ProviderName::Merkos,
        }
    }
}

/// A provider-agnostic view of the fields the merge cares about.
///
/// `secondary_name` is the provider's next-best name source (merkos
/// `name`, valu `profile.display_name`); `handle` is the last-resort
/// name source used only for the non-priority provider (valu `username`
/// falling back to `name`, merkos `name`).
struct FieldView<'a> {
    id: &'a str,
    email: Option<&'a str>,
    display_name: Option<&'a str>,
    secondary_name: Option<&'a str>,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    handle: Option<&'a str>,
    avatar_url: Option<&'a str>,
}

impl<'a> FieldView<'a> {
    fn merkos(user: &'a MerkosUser) -> Self {
        Self {
            id: &user.id,
            email: non_empty(Some(user.email.as_str())),
            display_name: non_empty(user.display_name.as_deref()),
            secondary_name: non_empty(user.name.as_deref()),
            first_name: non_empty(user.first_name.as_deref()),
            last_name: non_empty(user.last_name.as_deref()),
            handle: non_empty(user.name.as_deref()),
            avatar_url: non_empty(user.avatar_url.as_deref()),
        }
    }

    fn valu(user: &'a ValuUser) -> Self {
        let profile_display = user.profile.as_ref().and_then(|p| p.display_name.as_deref());
        // The nested profile image wins over the top-level avatar field.
        let profile_image = user.profile.as_ref().and_then(|p| p.image_url.as_deref());
        Self {
            id: &user.id,
            email: non_empty(user.email.as_deref()),
            display_name: non_empty(user.display_name.as_deref()),
            secondary_name: non_empty(profile_display),
            first_name: non_empty(user.first_name.as_deref()),
            last_name: non_empty(user.last_name.as_deref()),
            handle: non_empty(user.username.as_deref()).or(non_empty(user.name.as_deref())),
            avatar_url: non_empty(profile_image).or(non_empty(user.avatar_url.as_deref())),
        }
    }

    fn full_name(&self) -> Option<String> {
        match (self.first_name, self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.to_string()),
            (None, Some(last)) => Some(last.to_string()),
            (None, None) => None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Merges two optional provider user records into one unified identity.
///
/// Returns `None` iff both inputs are `None`. Pure and deterministic:
/// no network, no storage, no clock.
pub fn merge(
    valu: Option<&ValuUser>,
    merkos: Option<&MerkosUser>,
    opts: &MergeOptions,
) -> Option<UnifiedUser> {
    if valu.is_none() && merkos.is_none() {
        return None;
    }

    let merkos_view = merkos.map(FieldView::merkos);
    let valu_view = valu.map(FieldView::valu);

    // The primary view is the priority provider's when present, else the
    // other provider's. At least one exists here.
    let (primary, other) = match opts.priority {
        ProviderName::Merkos => match (merkos_view, valu_view) {
            (Some(m), v) => (m, v),
            (None, Some(v)) => (v, None),
            (None, None) => unreachable!("both inputs checked above"),
        },
        ProviderName::Valu => match (valu_view, merkos_view) {
            (Some(v), m) => (v, m),
            (None, Some(m)) => (m, None),
            (None, None) => unreachable!("both inputs checked above"),
        },
    };

    let display_name = resolve_display_name(&primary, other.as_ref());
    let email = primary
        .email
        .or(other.as_ref().and_then(|o| o.email))
        .unwrap_or_default()
        .to_string();

    let first_name = primary
        .first_name
        .or(other.as_ref().and_then(|o| o.first_name))
        .map(str::to_string);
    let last_name = primary
        .last_name
        .or(other.as_ref().and_then(|o| o.last_name))
        .map(str::to_string);
    let avatar_url = primary
        .avatar_url
        .or(other.as_ref().and_then(|o| o.avatar_url))
        .map(str::to_string);

    let mut linked_accounts = Vec::new();
    if merkos.is_some() {
        linked_accounts.push(ProviderName::Merkos);
    }
    if valu.is_some() {
        linked_accounts.push(ProviderName::Valu);
    }

    Some(UnifiedUser {
        id: primary.id.to_string(),
        merkos_user_id: merkos.map(|u| u.id.clone()),
        valu_user_id: valu.map(|u| u.id.clone()),
        email,
        display_name,
        first_name,
        last_name,
        avatar_url,
        linked_accounts,
        provider_data: Some(ProviderData {
            merkos: merkos.cloned(),
            valu: valu.cloned(),
        }),
        metadata: merge_metadata(
            merkos.and_then(|u| u.metadata.as_ref()),
            valu.and_then(|u| u.metadata.as_ref()),
        ),
    })
}

/// Display-name fallback chain:
/// priority displayName → priority secondary name → priority
/// firstName+lastName → other displayName/secondary → other
/// firstName+lastName → other handle → email local part (priority
/// first) → literal default.
fn resolve_display_name(primary: &FieldView<'_>, other: Option<&FieldView<'_>>) -> String {
    if let Some(name) = primary.display_name.or(primary.secondary_name) {
        return name.to_string();
    }
    if let Some(name) = primary.full_name() {
        return name;
    }
    if let Some(other) = other {
        if let Some(name) = other.display_name.or(other.secondary_name) {
            return name.to_string();
        }
        if let Some(name) = other.full_name() {
            return name;
        }
        if let Some(handle) = other.handle {
            return handle.to_string();
        }
    }
    let email = primary.email.or(other.and_then(|o| o.email));
    if let Some(local) = email.and_then(|e| e.split('@').next()).filter(|s| !s.is_empty()) {
        return local.to_string();
    }
    DEFAULT_DISPLAY_NAME.to_string()
}

/// Shallow metadata merge: merkos keys applied first, then valu keys
/// overwriting on collision. Valu wins on metadata specifically,
/// independent of the overall priority argument.
fn merge_metadata(
    merkos: Option<&Map<String, Value>>,
    valu: Option<&Map<String, Value>>,
) -> Option<Map<String, Value>> {
    if merkos.is_none() && valu.is_none() {
        return None;
    }
    let mut merged = Map::new();
    if let Some(m) = merkos {
        merged.extend(m.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(v) = valu {
        merged.extend(v.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Some(merged)
}
