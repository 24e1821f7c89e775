//! Suppression of a known upstream SDK teardown error.
//!
//! When the embedding frame closes while a session call is in flight,
//! the Valu SDK surfaces a spurious error instead of a clean close. The
//! original workaround monkey-patched the SDK; here the condition is a
//! named, tested predicate and the suppression is an explicit decorator
//! around the affected call sites.

use universe_core::AuthResult;

/// The message fragment the upstream SDK emits on frame teardown.
pub const IFRAME_TEARDOWN_MESSAGE: &str = "Target window closed";

/// True iff the error message is the known benign teardown error.
pub fn is_iframe_teardown_error(message: &str) -> bool {
    message.contains(IFRAME_TEARDOWN_MESSAGE)
}

/// Swallows the known teardown error, substituting the default value.
/// All other errors pass through untouched.
pub fn suppress_iframe_teardown<T: Default>(result: AuthResult<T>) -> AuthResult<T> {
    match result {
        Err(e) if is_iframe_teardown_error(&e.message)
            || e.cause.as_deref().is_some_and(is_iframe_teardown_error) =>
        {
            tracing::debug!(error = %e, "suppressed known valu iframe teardown error");
            Ok(T::default())
        }
        other => other,
    }
}
