//! Tower layers for HTTP client middleware
//!
//! - [`DefaultHeadersLayer`] - Adds configured headers (User-Agent included)
//!   to every request that does not already carry them

mod default_headers;

pub use default_headers::{DefaultHeadersLayer, DefaultHeadersService};
