//! Social/iframe identity provider adapter.
//!
//! Thin HTTP wrapper around the Valu session backend. The upstream SDK
//! has a known teardown bug when its embedding frame closes mid-call;
//! [`suppress_iframe_teardown`] wraps the affected call sites
//! instead of patching the SDK in place.

mod client;
mod suppress;

pub use client::{ValuClient, ValuConfig, VALU_TOKEN_KEY};
pub use suppress::{is_iframe_teardown_error, suppress_iframe_teardown, IFRAME_TEARDOWN_MESSAGE};
