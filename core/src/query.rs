//! Listing filters and their query-string encoding.
//!
//! Every filter field is optional and an unset field contributes nothing to
//! the query string. Keys are emitted in alphabetical order; the server reads
//! parameters by name, so the order carries no meaning.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use url::form_urlencoded;

/// Sort order for bookmark listings.
///
/// `Other` carries a token the client does not know about; it is forwarded
/// verbatim and left for the server to accept or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOrder {
    AddedAsc,
    AddedDesc,
    TitleAsc,
    TitleDesc,
    Other(String),
}

impl SortOrder {
    pub fn as_str(&self) -> &str {
        match self {
            SortOrder::AddedAsc => "added_asc",
            SortOrder::AddedDesc => "added_desc",
            SortOrder::TitleAsc => "title_asc",
            SortOrder::TitleDesc => "title_desc",
            SortOrder::Other(token) => token,
        }
    }
}

impl FromStr for SortOrder {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "added_asc" => SortOrder::AddedAsc,
            "added_desc" => SortOrder::AddedDesc,
            "title_asc" => SortOrder::TitleAsc,
            "title_desc" => SortOrder::TitleDesc,
            other => SortOrder::Other(other.to_string()),
        })
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters for the bookmark listing endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Free-text search, in the server's search syntax.
    pub query: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Only `Some(true)` narrows the listing; `Some(false)` is the same as unset.
    pub unread: Option<bool>,
    pub added_since: Option<DateTime<Utc>>,
    pub modified_since: Option<DateTime<Utc>>,
    pub sort: Option<SortOrder>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn unread(mut self, unread: bool) -> Self {
        self.unread = Some(unread);
        self
    }

    #[must_use]
    pub fn added_since(mut self, since: DateTime<Utc>) -> Self {
        self.added_since = Some(since);
        self
    }

    #[must_use]
    pub fn modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.modified_since = Some(since);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// The parameters this filter sets, keyed by wire name.
    fn params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();

        if let Some(q) = self.query.as_deref().filter(|q| !q.is_empty()) {
            params.insert("q", q.to_string());
        }
        if let Some(limit) = self.limit.filter(|n| *n > 0) {
            params.insert("limit", limit.to_string());
        }
        if let Some(offset) = self.offset.filter(|n| *n > 0) {
            params.insert("offset", offset.to_string());
        }
        if self.unread == Some(true) {
            params.insert("unread", "yes".to_string());
        }
        if let Some(since) = self.added_since {
            params.insert("added_since", rfc3339(since));
        }
        if let Some(since) = self.modified_since {
            params.insert("modified_since", rfc3339(since));
        }
        if let Some(sort) = self.sort.as_ref().filter(|s| !s.as_str().is_empty()) {
            params.insert("sort", sort.as_str().to_string());
        }

        params
    }

    /// Encoded query string without the leading `?`, or `None` when no field
    /// is set.
    pub fn to_query(&self) -> Option<String> {
        let params = self.params();
        if params.is_empty() {
            return None;
        }
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(params.iter());
        Some(serializer.finish())
    }
}

/// Append the filter's query string to `path`, or return `path` unchanged
/// when the filter is empty.
pub fn with_query(path: &str, filter: &ListFilter) -> String {
    match filter.to_query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
