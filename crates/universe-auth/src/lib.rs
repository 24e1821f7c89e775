//! # universe-auth
//!
//! The reconciliation controller that composes independent identity
//! providers into one unified session.
//!
//! Two providers participate today: the platform backend (merkos) and
//! the social/iframe backend (valu), plus an optional cross-domain SSO
//! bridge that relays an existing remote session into a platform login
//! at startup. The controller:
//!
//! - caches each provider's state and recomputes an immutable
//!   [`AuthSnapshot`] whenever anything changes,
//! - merges both user records into one identity via the pure engines in
//!   `universe-engine`,
//! - keeps snapshots pointer-stable across no-op recomputes, so
//!   subscribers compare with `Arc::ptr_eq` instead of deep equality,
//! - guarantees local sign-out even when a provider backend rejects the
//!   logout call.
//!
//! ```no_run
//! use universe_auth::{UniverseAuth, UniverseAuthConfig};
//!
//! # async fn run() -> Result<(), universe_core::AuthError> {
//! let auth = UniverseAuth::from_config(UniverseAuthConfig::default()).await?;
//! println!("{}", auth.status_message());
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod logging;
mod snapshot;

pub use config::UniverseAuthConfig;
pub use controller::{
    LinkAccountOptions, LoginOptions, LogoutOptions, UniverseAuth, UniverseAuthBuilder,
};
pub use logging::init_logging;
pub use snapshot::AuthSnapshot;
