//! Stateless HTTP request builder and response parser for the Linkding API.
//!
//! # Design
//! `LinkdingClient` holds only the base URL and the API token and carries no
//! mutable state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`. The caller (or [`Linkding`](crate::Linkding)) executes
//! the round-trip in between.
//!
//! Parsers decode the body and nothing else. They do not look at the status
//! code; see [`TransportError::Status`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{with_query, ListFilter};
use crate::types::{Bookmark, BookmarkAsset, CheckResult, CreateBookmarkRequest, Page};

const BOOKMARKS_PATH: &str = "/api/bookmarks/";
const ARCHIVED_PATH: &str = "/api/bookmarks/archived/";
const CHECK_PATH: &str = "/api/bookmarks/check/";

/// Synchronous, stateless request builder and response parser.
#[derive(Clone)]
pub struct LinkdingClient {
    base_url: String,
    token: String,
}

impl std::fmt::Debug for LinkdingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkdingClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LinkdingClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list_bookmarks(&self, filter: &ListFilter) -> HttpRequest {
        self.request(HttpMethod::Get, &with_query(BOOKMARKS_PATH, filter))
    }

    pub fn build_list_archived_bookmarks(&self, filter: &ListFilter) -> HttpRequest {
        self.request(HttpMethod::Get, &with_query(ARCHIVED_PATH, filter))
    }

    pub fn build_get_bookmark(&self, id: u64) -> HttpRequest {
        self.request(HttpMethod::Get, &bookmark_path(id))
    }

    /// The URL is sent as given, scheme-less and relative forms included.
    /// Only input no URL reader would accept fails here, as a transport error,
    /// and then no request is produced.
    pub fn build_check_bookmark(&self, url: &str) -> Result<HttpRequest, ApiError> {
        validate_check_url(url)?;
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("url", url)
            .finish();
        Ok(self.request(HttpMethod::Get, &format!("{CHECK_PATH}?{query}")))
    }

    pub fn build_create_bookmark(&self, input: &CreateBookmarkRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, BOOKMARKS_PATH, input)
    }

    pub fn build_update_bookmark(&self, id: u64, input: &CreateBookmarkRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &bookmark_path(id), input)
    }

    pub fn build_archive_bookmark(&self, id: u64) -> HttpRequest {
        self.request(HttpMethod::Post, &format!("{BOOKMARKS_PATH}{id}/archive/"))
    }

    pub fn build_unarchive_bookmark(&self, id: u64) -> HttpRequest {
        self.request(HttpMethod::Post, &format!("{BOOKMARKS_PATH}{id}/unarchive/"))
    }

    pub fn build_delete_bookmark(&self, id: u64) -> HttpRequest {
        self.request(HttpMethod::Delete, &bookmark_path(id))
    }

    pub fn build_list_bookmark_assets(&self, bookmark_id: u64) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("{BOOKMARKS_PATH}{bookmark_id}/assets/"))
    }

    pub fn build_get_bookmark_asset(&self, bookmark_id: u64, asset_id: u64) -> HttpRequest {
        self.request(HttpMethod::Get, &asset_path(bookmark_id, asset_id))
    }

    pub fn build_delete_bookmark_asset(&self, bookmark_id: u64, asset_id: u64) -> HttpRequest {
        self.request(HttpMethod::Delete, &asset_path(bookmark_id, asset_id))
    }

    /// Request for a `next`/`previous` cursor of a [`Page`].
    ///
    /// Only the path and query of the cursor are taken from the server. The
    /// request always goes to the configured scheme, host and port, so the
    /// token never follows a cursor to another origin or down to plain http.
    pub fn build_follow_cursor(&self, cursor: &str) -> Result<HttpRequest, ApiError> {
        let base = Url::parse(&self.base_url).map_err(|e| TransportError::invalid_url(&self.base_url, e))?;
        let mut target = base.join(cursor).map_err(|e| TransportError::invalid_url(cursor, e))?;

        if target.origin() != base.origin() {
            tracing::warn!(cursor, base_url = %self.base_url, "cursor origin differs from base url, rewriting");
            let mut rebased = base.clone();
            rebased.set_path(target.path());
            rebased.set_query(target.query());
            target = rebased;
        }
        target.set_fragment(None);

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: target.into(),
            headers: self.headers(false),
            body: None,
        })
    }

    pub fn parse_list_bookmarks(&self, response: HttpResponse) -> Result<Page<Bookmark>, ApiError> {
        decode(response)
    }

    pub fn parse_list_archived_bookmarks(&self, response: HttpResponse) -> Result<Page<Bookmark>, ApiError> {
        decode(response)
    }

    pub fn parse_get_bookmark(&self, response: HttpResponse) -> Result<Bookmark, ApiError> {
        decode(response)
    }

    pub fn parse_check_bookmark(&self, response: HttpResponse) -> Result<CheckResult, ApiError> {
        decode(response)
    }

    pub fn parse_create_bookmark(&self, response: HttpResponse) -> Result<Bookmark, ApiError> {
        decode(response)
    }

    pub fn parse_update_bookmark(&self, response: HttpResponse) -> Result<Bookmark, ApiError> {
        decode(response)
    }

    pub fn parse_archive_bookmark(&self, response: HttpResponse) -> Result<(), ApiError> {
        discard(response)
    }

    pub fn parse_unarchive_bookmark(&self, response: HttpResponse) -> Result<(), ApiError> {
        discard(response)
    }

    pub fn parse_delete_bookmark(&self, response: HttpResponse) -> Result<(), ApiError> {
        discard(response)
    }

    pub fn parse_list_bookmark_assets(&self, response: HttpResponse) -> Result<Page<BookmarkAsset>, ApiError> {
        decode(response)
    }

    pub fn parse_get_bookmark_asset(&self, response: HttpResponse) -> Result<BookmarkAsset, ApiError> {
        decode(response)
    }

    pub fn parse_delete_bookmark_asset(&self, response: HttpResponse) -> Result<(), ApiError> {
        discard(response)
    }

    pub fn parse_page<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<Page<T>, ApiError> {
        decode(response)
    }

    fn request(&self, method: HttpMethod, path_and_query: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{path_and_query}", self.base_url),
            headers: self.headers(false),
            body: None,
        }
    }

    fn json_request<B: Serialize>(&self, method: HttpMethod, path: &str, input: &B) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(ApiError::Encode)?;
        Ok(HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers: self.headers(true),
            body: Some(body),
        })
    }

    fn headers(&self, with_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![
            ("authorization".to_string(), format!("Token {}", self.token)),
            ("accept".to_string(), "application/json".to_string()),
        ];
        if with_body {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        headers
    }
}

fn bookmark_path(id: u64) -> String {
    format!("{BOOKMARKS_PATH}{id}/")
}

fn asset_path(bookmark_id: u64, asset_id: u64) -> String {
    format!("{BOOKMARKS_PATH}{bookmark_id}/assets/{asset_id}/")
}

fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| {
        tracing::warn!(
            status = response.status,
            target_type = std::any::type_name::<T>(),
            error = %e,
            "failed to decode response body"
        );
        ApiError::Decode(e)
    })
}

fn discard(_response: HttpResponse) -> Result<(), ApiError> {
    Ok(())
}

/// Rejects what a lenient URL reader rejects: control characters, a `:`
/// before any scheme letter, a `:` in the first segment of a relative path,
/// malformed `%` escapes outside the query and an unparsable authority.
fn validate_check_url(input: &str) -> Result<(), TransportError> {
    let invalid = |reason: &str| TransportError::invalid_url(input, reason);

    if input.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("control character in url"));
    }
    let (rest, fragment) = input.split_once('#').unwrap_or((input, ""));
    let rest = rest.split_once('?').map_or(rest, |(before, _)| before);
    if !valid_escapes(fragment) {
        return Err(invalid("malformed percent escape"));
    }

    match scheme_end(rest).map_err(invalid)? {
        Some(colon) => {
            let after = &rest[colon + 1..];
            // Opaque forms such as `mailto:` keep their escapes unchecked.
            if after.starts_with('/') && !valid_escapes(after) {
                return Err(invalid("malformed percent escape"));
            }
            check_authority(input, input)
        }
        None if rest.starts_with("//") => {
            if !valid_escapes(rest) {
                return Err(invalid("malformed percent escape"));
            }
            check_authority(input, &format!("http:{input}"))
        }
        None => {
            if rest.split('/').next().is_some_and(|segment| segment.contains(':')) {
                return Err(invalid("colon in first path segment"));
            }
            if !valid_escapes(rest) {
                return Err(invalid("malformed percent escape"));
            }
            Ok(())
        }
    }
}

/// Index of the `:` ending a scheme, if `s` starts with one.
fn scheme_end(s: &str) -> Result<Option<usize>, &'static str> {
    for (i, c) in s.char_indices() {
        match c {
            'a'..='z' | 'A'..='Z' => {}
            '0'..='9' | '+' | '-' | '.' if i > 0 => {}
            ':' if i == 0 => return Err("missing scheme before ':'"),
            ':' => return Ok(Some(i)),
            _ => return Ok(None),
        }
    }
    Ok(None)
}

fn valid_escapes(s: &str) -> bool {
    s.split('%')
        .skip(1)
        .all(|rest| rest.as_bytes().get(..2).is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)))
}

fn check_authority(input: &str, candidate: &str) -> Result<(), TransportError> {
    match Url::parse(candidate) {
        // An empty host is legal in a generic URL.
        Ok(_) | Err(url::ParseError::EmptyHost) => Ok(()),
        Err(e) => Err(TransportError::invalid_url(input, e)),
    }
}
