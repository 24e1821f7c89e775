//! # universe-engine
//!
//! The pure computation core of the universe identity layer.
//!
//! Two engines plus a renderer, all deterministic functions over
//! already-resolved provider snapshots:
//!
//! - [`merge`] folds two optional provider user records into one
//!   [`universe_core::UnifiedUser`], resolving field conflicts via a
//!   priority order and fallback chains.
//! - [`determine_status`] maps enabled/authenticated provider flags to a
//!   single [`universe_core::AuthStatus`] plus derived predicates.
//! - [`status_message`] renders a human-readable explanation for a
//!   status report.
//!
//! None of this suspends, touches storage, or reacts to provider errors;
//! error surfacing is layered on top by the reconciliation controller.

mod merge;
mod message;
mod status;

pub use merge::{merge, MergeOptions};
pub use message::status_message;
pub use status::{determine_status, needs_linking, pick_primary_provider, StatusReport};
