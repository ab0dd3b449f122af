//! An async Rust client for the Planet Data API.
//!
//! This crate implements an authenticated search flow:
//! resolve a credential, submit a query, then stream the results across
//! as many pages as the service returns.
//!
//! ## Quick start
//! - Configure authentication via the `PL_API_KEY` environment variable or a
//!   `~/.planet.json` secret file (`{"key": "..."}`).
//! - Call [`DataClient::quick_search`] with a filter and the item types to
//!   search, and consume the returned stream.
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use planetapi::{DataClient, SearchRequest, Sort};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> planetapi::Result<()> {
//!     let client = DataClient::from_env().await?;
//!     let filter = json!({
//!         "type": "RangeFilter",
//!         "field_name": "cloud_cover",
//!         "config": {"lt": 0.2}
//!     });
//!     let search = SearchRequest::new(filter, ["PSScene"]).with_sort(Sort::AcquiredDesc);
//!     let features: Vec<_> = client.quick_search(&search, Some(100))?.try_collect().await?;
//!     println!("{} features", features.len());
//!     Ok(())
//! }
//! ```
//!
//! Credentials are looked up in order: explicit key, environment variable,
//! secret file. Expired OAuth tokens in the secret file are refreshed and
//! written back before use.

#![forbid(unsafe_code)]

mod auth;
mod config;
mod data;
mod download;
mod error;
mod http;
mod models;
mod paging;
mod secret;
mod session;
mod util;

pub use auth::{Credential, CredentialResolver, OAuthRefresher, RefreshedTokens, TokenRefresher, TokenSet};
pub use config::{AuthConfig, ClientConfig, DEFAULT_BASE_URL, ENV_API_KEY, OAuthConfig, default_secret_path};
pub use data::{DataClient, MAX_PAGE_SIZE, SearchRequest, Sort};
pub use error::{Error, Result, translate};
pub use http::{Method, ReqwestTransport, Request, Response, Transport};
pub use models::{Asset, Assets, Feature, Page, decode_assets, decode_features};
pub use paging::paginate;
pub use secret::{Document, SecretFile};
pub use session::Session;
