//! Synchronous client core for the Linkding bookmark manager API.
//!
//! # Overview
//! [`LinkdingClient`] builds `HttpRequest` values and parses `HttpResponse`
//! values without touching the network. [`Linkding`] binds it to a
//! [`Transport`] and exposes one method per endpoint: bookmarks (list,
//! archived list, get, check, create, update, archive, unarchive, delete)
//! and bookmark assets (list, get, delete).
//!
//! # Design
//! - Both client types are stateless; configuration is an explicit
//!   [`ClientConfig`] owned by the caller.
//! - Listing filters are all-`Option` ([`ListFilter`]); unset fields never
//!   reach the query string.
//! - Failures are either the transport's own error, passed through, or a
//!   decode error. Status codes are a transport concern.
//! - With the default `ureq` feature, [`UreqTransport`] provides a blocking
//!   transport.

pub mod api;
pub mod backends;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod types;

pub use api::{Linkding, Pages};
#[cfg(feature = "ureq")]
pub use backends::UreqTransport;
pub use client::LinkdingClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ApiError, ConfigError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use query::{with_query, ListFilter, SortOrder};
pub use types::{Bookmark, BookmarkAsset, CheckResult, CreateBookmarkRequest, Metadata, Page};
