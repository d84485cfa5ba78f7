#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for `LearnLens`
//!
//! This crate provides a hyper-based HTTP client with:
//! - A base URL fixed at construction (request paths are resolved against it)
//! - Default headers applied to every request (`User-Agent`, `Accept`, ...)
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling and a per-request timeout
//! - Transparent response decompression (gzip, brotli, deflate)
//! - A single optional auth layer slot, used by `learnlens-auth` to attach
//!   bearer tokens and to recover from expired access tokens
//!
//! A client built **without** an auth layer is the "raw" transport: requests
//! sent through it bypass every interceptor. The token refresh call and the
//! unauthenticated login/registration calls go through such a client.
//!
//! # Example
//!
//! ```ignore
//! use learnlens_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .base_url("https://api.example.com".parse()?)
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let profile: serde_json::Value = client
//!     .get("/users/me")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::{HttpClientBuilder, InnerService};
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{DefaultHeadersLayer, DefaultHeadersService};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
