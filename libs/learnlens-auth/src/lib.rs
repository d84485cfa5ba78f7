#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated client of the `LearnLens` dashboard API.
//!
//! Requests sent through [`ApiClient`] carry the stored access token. When
//! the server answers `401 Unauthorized`, the client exchanges the refresh
//! token for a new access token and replays the request once. Concurrent
//! `401`s share a single refresh; if it fails, every waiting request gets
//! [`SessionExpired`] and the stored tokens are removed.
//!
//! [`Session`] implements login, logout, registration and profile lookup on
//! top of the client.

// Core
pub mod api;
pub mod config;
pub mod error;
pub mod secret;
pub mod store;
pub mod types;

// Tower layers
pub mod builder_ext;
pub mod layer;
pub mod refresh;

pub mod http_error;
pub mod session;

pub use api::{ApiClient, RequestOptions};
pub use builder_ext::HttpClientBuilderExt;
pub use config::ApiClientConfig;
pub use error::{ApiError, AuthError, RefreshError, SessionExpired, TokenStoreError};
pub use layer::{BearerAuthLayer, BearerAuthService};
pub use refresh::{RefreshCoordinator, RefreshLayer, RefreshOutcome, RefreshService, Retried};
pub use secret::SecretString;
pub use session::{Session, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::{Envelope, NewUser, Registration, TokenPair, UserProfile};
