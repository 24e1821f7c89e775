//! The status derivation engine.
//!
//! Maps the set of enabled providers and their authenticated flags to a
//! single status plus derived predicates. Provider errors are invisible
//! here; error surfacing is the reconciliation controller's job, layered
//! on top of the computed status.

use universe_core::{AuthStatus, ProviderName, ProviderState};

/// The output of one derivation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub status: AuthStatus,
    pub is_fully_authenticated: bool,
    pub is_partially_authenticated: bool,
    /// Authenticated enabled providers, merkos before valu.
    pub authenticated_providers: Vec<ProviderName>,
}

/// Derives the single authentication status from both provider states.
///
/// When two or more enabled providers are authenticated the report is
/// both fully AND partially authenticated at once. That overlap is an
/// intentional modeling choice, not a bug.
pub fn determine_status<V, M>(
    valu_state: &ProviderState<V>,
    merkos_state: &ProviderState<M>,
    valu_enabled: bool,
    merkos_enabled: bool,
) -> StatusReport {
    let mut authenticated_providers = Vec::new();
    if merkos_enabled && merkos_state.is_authenticated {
        authenticated_providers.push(ProviderName::Merkos);
    }
    if valu_enabled && valu_state.is_authenticated {
        authenticated_providers.push(ProviderName::Valu);
    }

    let enabled_count = usize::from(merkos_enabled) + usize::from(valu_enabled);
    let authenticated_count = authenticated_providers.len();

    if enabled_count == 0 {
        return StatusReport {
            status: AuthStatus::Unauthenticated,
            is_fully_authenticated: false,
            is_partially_authenticated: false,
            authenticated_providers,
        };
    }

    if authenticated_count == enabled_count {
        return StatusReport {
            status: AuthStatus::Authenticated,
            is_fully_authenticated: true,
            is_partially_authenticated: authenticated_count > 1,
            authenticated_providers,
        };
    }

    if authenticated_count > 0 {
        return StatusReport {
            status: AuthStatus::Partial,
            is_fully_authenticated: false,
            is_partially_authenticated: true,
            authenticated_providers,
        };
    }

    StatusReport {
        status: AuthStatus::Unauthenticated,
        is_fully_authenticated: false,
        is_partially_authenticated: false,
        authenticated_providers,
    }
}

/// True iff both providers are independently authenticated, regardless
/// of which ones are enabled. Used to prompt the user to formally link
/// accounts.
pub fn needs_linking<V, M>(
    valu_state: &ProviderState<V>,
    merkos_state: &ProviderState<M>,
) -> bool {
    valu_state.is_authenticated && merkos_state.is_authenticated
}

/// Picks the primary provider: the preferred one when both are
/// authenticated, the authenticated one when only one is, else `None`.
pub fn pick_primary_provider<V, M>(
    valu_state: &ProviderState<V>,
    merkos_state: &ProviderState<M>,
    preferred: ProviderName,
) -> Option<ProviderName> {
    match (merkos_state.is_authenticated, valu_state.is_authenticated) {
        (true, true) => Some(preferred),
        (true, false) => Some(ProviderName::Merkos),
        (false, true) => Some(ProviderName::Valu),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use universe_core::{MerkosUser, ValuUser};

    fn merkos_state(authenticated: bool) -> ProviderState<MerkosUser> {
        if authenticated {
            ProviderState::authenticated(MerkosUser::new("m-1", "m@x.org"), None)
        } else {
            ProviderState::initial()
        }
    }

    fn valu_state(authenticated: bool) -> ProviderState<ValuUser> {
        if authenticated {
            ProviderState::authenticated(ValuUser::new("v-1"), None)
        } else {
            ProviderState::initial()
        }
    }

    #[test]
    fn exhaustive_status_matrix() {
        // (merkos_enabled, merkos_auth, valu_enabled, valu_auth) -> status
        let table: &[(bool, bool, bool, bool, AuthStatus)] = &[
            (false, false, false, false, AuthStatus::Unauthenticated),
            (false, false, false, true, AuthStatus::Unauthenticated),
            (false, true, false, false, AuthStatus::Unauthenticated),
            (false, true, false, true, AuthStatus::Unauthenticated),
            (true, false, false, false, AuthStatus::Unauthenticated),
            (true, false, false, true, AuthStatus::Unauthenticated),
            (true, true, false, false, AuthStatus::Authenticated),
            (true, true, false, true, AuthStatus::Authenticated),
            (false, false, true, false, AuthStatus::Unauthenticated),
            (false, true, true, false, AuthStatus::Unauthenticated),
            (false, false, true, true, AuthStatus::Authenticated),
            (false, true, true, true, AuthStatus::Authenticated),
            (true, false, true, false, AuthStatus::Unauthenticated),
            (true, true, true, false, AuthStatus::Partial),
            (true, false, true, true, AuthStatus::Partial),
            (true, true, true, true, AuthStatus::Authenticated),
        ];

        for &(me, ma, ve, va, expected) in table {
            let report = determine_status(&valu_state(va), &merkos_state(ma), ve, me);
            assert_eq!(
                report.status, expected,
                "merkos_enabled={me} merkos_auth={ma} valu_enabled={ve} valu_auth={va}"
            );
        }
    }

    #[test]
    fn single_enabled_authenticated_is_fully() {
        let report = determine_status(&valu_state(false), &merkos_state(true), false, true);
        assert_eq!(report.status, AuthStatus::Authenticated);
        assert!(report.is_fully_authenticated);
        assert!(!report.is_partially_authenticated);
        assert_eq!(report.authenticated_providers, vec![ProviderName::Merkos]);
    }

    #[test]
    fn double_authenticated_is_both_fully_and_partially() {
        let report = determine_status(&valu_state(true), &merkos_state(true), true, true);
        assert_eq!(report.status, AuthStatus::Authenticated);
        assert!(report.is_fully_authenticated);
        assert!(report.is_partially_authenticated);
        assert_eq!(
            report.authenticated_providers,
            vec![ProviderName::Merkos, ProviderName::Valu]
        );
    }

    #[test]
    fn partial_sets_only_partial_flag() {
        let report = determine_status(&valu_state(false), &merkos_state(true), true, true);
        assert_eq!(report.status, AuthStatus::Partial);
        assert!(!report.is_fully_authenticated);
        assert!(report.is_partially_authenticated);
    }

    #[test]
    fn nothing_enabled_is_unauthenticated_with_no_flags() {
        let report = determine_status(&valu_state(true), &merkos_state(true), false, false);
        assert_eq!(report.status, AuthStatus::Unauthenticated);
        assert!(!report.is_fully_authenticated);
        assert!(!report.is_partially_authenticated);
        assert!(report.authenticated_providers.is_empty());
    }

    #[test]
    fn errors_do_not_override_status() {
        let mut merkos = merkos_state(true);
        merkos.error = Some("connection refused".to_string());
        let mut valu = valu_state(false);
        valu.error = Some("iframe blocked".to_string());

        let report = determine_status(&valu, &merkos, true, true);
        assert_eq!(report.status, AuthStatus::Partial);
    }

    #[test]
    fn needs_linking_ignores_enabled_flags() {
        assert!(needs_linking(&valu_state(true), &merkos_state(true)));
        assert!(!needs_linking(&valu_state(true), &merkos_state(false)));
        assert!(!needs_linking(&valu_state(false), &merkos_state(true)));
        assert!(!needs_linking(&valu_state(false), &merkos_state(false)));
    }

    #[test]
    fn primary_provider_selection() {
        assert_eq!(
            pick_primary_provider(&valu_state(true), &merkos_state(true), ProviderName::Valu),
            Some(ProviderName::Valu)
        );
        assert_eq!(
            pick_primary_provider(&valu_state(false), &merkos_state(true), ProviderName::Valu),
            Some(ProviderName::Merkos)
        );
        assert_eq!(
            pick_primary_provider(&valu_state(true), &merkos_state(false), ProviderName::Merkos),
            Some(ProviderName::Valu)
        );
        assert_eq!(
            pick_primary_provider(&valu_state(false), &merkos_state(false), ProviderName::Merkos),
            None
        );
    }
}
