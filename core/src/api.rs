//! Resource mappers: one method per Linkding endpoint.
//!
//! Each call builds the request with [`LinkdingClient`], hands it to the
//! [`Transport`], and parses the response. Transport errors are returned as
//! they came; nothing is retried.

use serde::de::DeserializeOwned;

use crate::client::LinkdingClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::query::ListFilter;
use crate::types::{Bookmark, BookmarkAsset, CheckResult, CreateBookmarkRequest, Page};

/// A Linkding API client bound to a transport.
#[derive(Debug, Clone)]
pub struct Linkding<T> {
    client: LinkdingClient,
    transport: T,
}

impl<T: Transport> Linkding<T> {
    pub fn new(config: &ClientConfig, transport: T) -> Self {
        Self {
            client: LinkdingClient::new(config),
            transport,
        }
    }

    /// The underlying request builder, for callers that drive I/O themselves.
    pub fn client(&self) -> &LinkdingClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn list_bookmarks(&self, filter: &ListFilter) -> Result<Page<Bookmark>, ApiError> {
        let response = self.send(self.client.build_list_bookmarks(filter))?;
        self.client.parse_list_bookmarks(response)
    }

    pub fn list_archived_bookmarks(&self, filter: &ListFilter) -> Result<Page<Bookmark>, ApiError> {
        let response = self.send(self.client.build_list_archived_bookmarks(filter))?;
        self.client.parse_list_archived_bookmarks(response)
    }

    pub fn get_bookmark(&self, id: u64) -> Result<Bookmark, ApiError> {
        let response = self.send(self.client.build_get_bookmark(id))?;
        self.client.parse_get_bookmark(response)
    }

    /// Look up whether `url` is already bookmarked, along with the metadata
    /// the server scrapes for it.
    pub fn check_bookmark(&self, url: &str) -> Result<CheckResult, ApiError> {
        let response = self.send(self.client.build_check_bookmark(url)?)?;
        self.client.parse_check_bookmark(response)
    }

    pub fn create_bookmark(&self, input: &CreateBookmarkRequest) -> Result<Bookmark, ApiError> {
        let response = self.send(self.client.build_create_bookmark(input)?)?;
        self.client.parse_create_bookmark(response)
    }

    /// Replace the editable fields of bookmark `id` with `input`.
    pub fn update_bookmark(&self, id: u64, input: &CreateBookmarkRequest) -> Result<Bookmark, ApiError> {
        let response = self.send(self.client.build_update_bookmark(id, input)?)?;
        self.client.parse_update_bookmark(response)
    }

    pub fn archive_bookmark(&self, id: u64) -> Result<(), ApiError> {
        let response = self.send(self.client.build_archive_bookmark(id))?;
        self.client.parse_archive_bookmark(response)
    }

    pub fn unarchive_bookmark(&self, id: u64) -> Result<(), ApiError> {
        let response = self.send(self.client.build_unarchive_bookmark(id))?;
        self.client.parse_unarchive_bookmark(response)
    }

    pub fn delete_bookmark(&self, id: u64) -> Result<(), ApiError> {
        let response = self.send(self.client.build_delete_bookmark(id))?;
        self.client.parse_delete_bookmark(response)
    }

    pub fn list_bookmark_assets(&self, bookmark_id: u64) -> Result<Page<BookmarkAsset>, ApiError> {
        let response = self.send(self.client.build_list_bookmark_assets(bookmark_id))?;
        self.client.parse_list_bookmark_assets(response)
    }

    pub fn get_bookmark_asset(&self, bookmark_id: u64, asset_id: u64) -> Result<BookmarkAsset, ApiError> {
        let response = self.send(self.client.build_get_bookmark_asset(bookmark_id, asset_id))?;
        self.client.parse_get_bookmark_asset(response)
    }

    pub fn delete_bookmark_asset(&self, bookmark_id: u64, asset_id: u64) -> Result<(), ApiError> {
        let response = self.send(self.client.build_delete_bookmark_asset(bookmark_id, asset_id))?;
        self.client.parse_delete_bookmark_asset(response)
    }

    /// Fetch the page after `page`, or `None` if it was the last one.
    pub fn next_page<I: DeserializeOwned>(&self, page: &Page<I>) -> Option<Result<Page<I>, ApiError>> {
        page.next.as_deref().map(|cursor| self.follow(cursor))
    }

    /// Fetch the page before `page`, or `None` if it was the first one.
    pub fn previous_page<I: DeserializeOwned>(&self, page: &Page<I>) -> Option<Result<Page<I>, ApiError>> {
        page.previous.as_deref().map(|cursor| self.follow(cursor))
    }

    /// Iterate over every page of the bookmark listing, starting with the one
    /// `filter` selects.
    pub fn bookmark_pages(&self, filter: &ListFilter) -> Pages<'_, T> {
        Pages::new(self, self.client.build_list_bookmarks(filter))
    }

    /// Like [`bookmark_pages`](Self::bookmark_pages), over archived bookmarks.
    pub fn archived_bookmark_pages(&self, filter: &ListFilter) -> Pages<'_, T> {
        Pages::new(self, self.client.build_list_archived_bookmarks(filter))
    }

    fn follow<I: DeserializeOwned>(&self, cursor: &str) -> Result<Page<I>, ApiError> {
        let response = self.send(self.client.build_follow_cursor(cursor)?)?;
        self.client.parse_page(response)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.send(request)?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

/// Iterator over consecutive pages of a bookmark listing.
///
/// Stops after the last page, or after yielding the first error.
pub struct Pages<'a, T> {
    api: &'a Linkding<T>,
    pending: Option<Result<HttpRequest, ApiError>>,
}

impl<'a, T: Transport> Pages<'a, T> {
    fn new(api: &'a Linkding<T>, first: HttpRequest) -> Self {
        Self {
            api,
            pending: Some(Ok(first)),
        }
    }
}

impl<T: Transport> Iterator for Pages<'_, T> {
    type Item = Result<Page<Bookmark>, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self
            .pending
            .take()?
            .and_then(|request| self.api.send(request))
            .and_then(|response| self.api.client.parse_page::<Bookmark>(response));
        if let Ok(page) = &page {
            self.pending = page.next.as_deref().map(|cursor| self.api.client.build_follow_cursor(cursor));
        }
        Some(page)
    }
}
