//! # universe-core
//!
//! Data model and contracts for the universe identity composition layer.
//!
//! This crate holds everything the engines and the reconciliation
//! controller agree on, and nothing that does I/O:
//!
//! - Per-provider state snapshots and user records
//! - The unified user record and authentication status enum
//! - The `AuthError` taxonomy shared by every crate in the workspace
//! - The `IdentityProvider` / `CdssoBridge` traits consumed by the
//!   controller and implemented by the client crates
//! - The `TokenStore` trait that provider adapters persist tokens through

mod error;
mod provider;
mod store;
mod types;

pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use provider::{
    CdssoBridge, IdentityProvider, LoginMethod, LoginRequest, ProviderFuture, StateCell,
};
pub use store::{MemoryTokenStore, TokenStore};
pub use types::{
    AuthStatus, Availability, MerkosUser, ProviderData, ProviderName, ProviderState,
    ProvidersState, UnifiedUser, UniverseProviderState, ValuProfile, ValuUser,
};
