//! Domain DTOs for the Linkding API.
//!
//! # Design
//! Field names match the wire format (snake_case) so no renames are needed.
//! Fields the server derives on its own (scraped titles, favicon and preview
//! URLs) may arrive as `null` and are modeled as `Option<String>`; user text,
//! flag and tag fields default to empty when missing or `null`. Timestamps
//! are RFC3339 on the wire and `DateTime<Utc>` here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A saved URL with its metadata and tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    pub id: u64,
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default)]
    pub website_title: Option<String>,
    #[serde(default)]
    pub website_description: Option<String>,
    #[serde(default)]
    pub web_archive_snapshot_url: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub preview_image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_archived: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unread: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shared: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_names: Vec<String>,
    pub date_added: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// A file attached to a bookmark, such as an HTML snapshot or an upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookmarkAsset {
    pub id: u64,
    /// Id of the owning bookmark.
    pub bookmark: u64,
    pub asset_type: String,
    pub date_created: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// Request payload for creating or replacing a bookmark.
///
/// `tag_names` is always serialized, as `[]` when there are no tags; the
/// server treats a missing list differently from an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateBookmarkRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub tag_names: Vec<String>,
}

impl CreateBookmarkRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_names = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn archived(mut self, is_archived: bool) -> Self {
        self.is_archived = is_archived;
        self
    }

    #[must_use]
    pub fn unread(mut self, unread: bool) -> Self {
        self.unread = unread;
        self
    }

    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }
}

/// Starting point for an update: the user-editable fields of an existing
/// bookmark.
impl From<&Bookmark> for CreateBookmarkRequest {
    fn from(bookmark: &Bookmark) -> Self {
        Self {
            url: bookmark.url.clone(),
            title: bookmark.title.clone(),
            description: bookmark.description.clone(),
            notes: bookmark.notes.clone(),
            is_archived: bookmark.is_archived,
            unread: bookmark.unread,
            shared: bookmark.shared,
            tag_names: bookmark.tag_names.clone(),
        }
    }
}

/// One page of a paginated listing.
///
/// `next` and `previous` are absolute URLs supplied by the server; an empty or
/// `null` cursor is normalized to `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub next: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Metadata the server scraped from a URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_image: Option<String>,
}

/// Answer of the check endpoint.
///
/// `bookmark` is `None` when the URL has not been saved yet; metadata and
/// auto tags are filled in either way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    #[serde(default)]
    pub bookmark: Option<Bookmark>,
    pub metadata: Metadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_tags: Vec<String>,
}

impl CheckResult {
    pub fn is_bookmarked(&self) -> bool {
        self.bookmark.is_some()
    }
}

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
