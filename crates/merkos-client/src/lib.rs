//! Platform identity provider adapter.
//!
//! Thin HTTP wrapper around the Merkos platform auth backend. Owns its
//! own [`universe_core::ProviderState`] and token storage; the
//! reconciliation layer only reads state and subscribes to changes.

mod client;

pub use client::{MerkosClient, MerkosConfig, MERKOS_TOKEN_KEY};
