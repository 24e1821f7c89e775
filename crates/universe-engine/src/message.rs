//! Human-readable status messages.
//!
//! Partial authentication gets provider-specific wording so a
//! merkos-only session reads differently from a valu-only one. Error
//! text is appended to the status sentence, never substituted for it.

use crate::status::StatusReport;
use universe_core::{AuthError, AuthStatus, ProviderName};

/// Renders a status report into one explanatory sentence.
pub fn status_message(report: &StatusReport, error: Option<&AuthError>) -> String {
    let base = match report.status {
        AuthStatus::Loading => "Checking authentication status...".to_string(),
        AuthStatus::Authenticated => match report.authenticated_providers.as_slice() {
            [single] => format!("Signed in with {}.", single.label()),
            [] => "Signed in.".to_string(),
            many => {
                let names: Vec<&str> = many.iter().map(|p| p.label()).collect();
                format!("Signed in with {}.", names.join(" and "))
            }
        },
        AuthStatus::Partial => match report.authenticated_providers.as_slice() {
            [ProviderName::Merkos] => {
                "Signed in with Merkos only. Valu sign-in is still pending.".to_string()
            }
            [ProviderName::Valu] => {
                "Signed in with Valu only. Merkos sign-in is still pending.".to_string()
            }
            _ => "Signed in with some of your accounts.".to_string(),
        },
        AuthStatus::Unauthenticated => "Not signed in.".to_string(),
        AuthStatus::Error => "Authentication failed.".to_string(),
    };

    match error {
        Some(err) => format!("{} ({})", base, err.message),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use universe_core::AuthErrorCode;

    fn report(status: AuthStatus, providers: Vec<ProviderName>) -> StatusReport {
        StatusReport {
            status,
            is_fully_authenticated: status == AuthStatus::Authenticated,
            is_partially_authenticated: status == AuthStatus::Partial,
            authenticated_providers: providers,
        }
    }

    #[test]
    fn partial_variants_are_distinguishable() {
        let merkos_only = status_message(
            &report(AuthStatus::Partial, vec![ProviderName::Merkos]),
            None,
        );
        let valu_only = status_message(
            &report(AuthStatus::Partial, vec![ProviderName::Valu]),
            None,
        );
        assert_ne!(merkos_only, valu_only);
        assert!(merkos_only.contains("Merkos only"));
        assert!(valu_only.contains("Valu only"));
    }

    #[test]
    fn fully_authenticated_lists_providers() {
        let msg = status_message(
            &report(
                AuthStatus::Authenticated,
                vec![ProviderName::Merkos, ProviderName::Valu],
            ),
            None,
        );
        assert_eq!(msg, "Signed in with Merkos and Valu.");

        let msg = status_message(
            &report(AuthStatus::Authenticated, vec![ProviderName::Valu]),
            None,
        );
        assert_eq!(msg, "Signed in with Valu.");
    }

    #[test]
    fn loading_and_unauthenticated() {
        assert_eq!(
            status_message(&report(AuthStatus::Loading, vec![]), None),
            "Checking authentication status..."
        );
        assert_eq!(
            status_message(&report(AuthStatus::Unauthenticated, vec![]), None),
            "Not signed in."
        );
    }

    #[test]
    fn error_text_is_additive() {
        let err = AuthError::new(AuthErrorCode::LoginFailed, "bad credentials");
        let msg = status_message(&report(AuthStatus::Error, vec![]), Some(&err));
        assert_eq!(msg, "Authentication failed. (bad credentials)");

        // An error alongside a non-error status stays additive too.
        let msg = status_message(
            &report(AuthStatus::Partial, vec![ProviderName::Merkos]),
            Some(&err),
        );
        assert!(msg.starts_with("Signed in with Merkos only."));
        assert!(msg.ends_with("(bad credentials)"));
    }
}
