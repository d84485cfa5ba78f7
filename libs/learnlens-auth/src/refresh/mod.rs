//! Transparent recovery from expired access tokens.
//!
//! [`RefreshLayer`] watches for `401 Unauthorized`, drives a single-flight
//! refresh through [`RefreshCoordinator`] and replays the failed request once.

mod coordinator;
mod layer;

pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use layer::{RefreshLayer, RefreshService};

/// Request extension marking the one replay of a request after a refresh.
///
/// A request carrying it is never refreshed again, and the bearer layer
/// keeps the `Authorization` header it was replayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retried;
