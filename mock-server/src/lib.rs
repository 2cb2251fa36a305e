use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{OriginalUri, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use url::{form_urlencoded, Url};

const DEFAULT_LIMIT: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: u64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub website_title: Option<String>,
    pub website_description: Option<String>,
    pub web_archive_snapshot_url: Option<String>,
    pub favicon_url: Option<String>,
    pub preview_image_url: Option<String>,
    pub is_archived: bool,
    pub unread: bool,
    pub shared: bool,
    pub tag_names: Vec<String>,
    pub date_added: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub bookmark: u64,
    pub asset_type: String,
    pub date_created: DateTime<Utc>,
    pub content_type: String,
    pub display_name: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct BookmarkInput {
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

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub unread: Option<String>,
    pub added_since: Option<DateTime<Utc>>,
    pub modified_since: Option<DateTime<Utc>>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckParams {
    pub url: String,
}

#[derive(Default)]
pub struct Store {
    next_bookmark_id: u64,
    next_asset_id: u64,
    bookmarks: BTreeMap<u64, Bookmark>,
    assets: BTreeMap<u64, Asset>,
}

impl Store {
    fn insert_bookmark(&mut self, input: BookmarkInput, now: DateTime<Utc>) -> Bookmark {
        self.next_bookmark_id += 1;
        let bookmark = Bookmark {
            id: self.next_bookmark_id,
            url: input.url,
            title: input.title,
            description: input.description,
            notes: input.notes,
            website_title: None,
            website_description: None,
            web_archive_snapshot_url: None,
            favicon_url: None,
            preview_image_url: None,
            is_archived: input.is_archived,
            unread: input.unread,
            shared: input.shared,
            tag_names: input.tag_names,
            date_added: now,
            date_modified: now,
        };
        self.bookmarks.insert(bookmark.id, bookmark.clone());

        // Every new bookmark gets an HTML snapshot queued for it.
        self.next_asset_id += 1;
        let asset = Asset {
            id: self.next_asset_id,
            bookmark: bookmark.id,
            asset_type: "snapshot".to_string(),
            date_created: now,
            content_type: "text/html".to_string(),
            display_name: format!("HTML snapshot from {}", now.format("%m/%d/%Y")),
            status: "pending".to_string(),
        };
        self.assets.insert(asset.id, asset);

        bookmark
    }
}

fn apply(bookmark: &mut Bookmark, input: BookmarkInput, now: DateTime<Utc>) {
    bookmark.url = input.url;
    bookmark.title = input.title;
    bookmark.description = input.description;
    bookmark.notes = input.notes;
    bookmark.is_archived = input.is_archived;
    bookmark.unread = input.unread;
    bookmark.shared = input.shared;
    bookmark.tag_names = input.tag_names;
    bookmark.date_modified = now;
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    db: Db,
}

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." })))
}

fn bad_request(field: &str, message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ field: [message] })))
}

pub fn app(token: &str) -> Router {
    let state = AppState {
        token: Arc::from(token),
        db: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route("/api/bookmarks/", get(list_bookmarks).post(create_bookmark))
        .route("/api/bookmarks/archived/", get(list_archived_bookmarks))
        .route("/api/bookmarks/check/", get(check_bookmark))
        .route(
            "/api/bookmarks/{id}/",
            get(get_bookmark).put(update_bookmark).delete(delete_bookmark),
        )
        .route("/api/bookmarks/{id}/archive/", post(archive_bookmark))
        .route("/api/bookmarks/{id}/unarchive/", post(unarchive_bookmark))
        .route("/api/bookmarks/{id}/assets/", get(list_assets))
        .route(
            "/api/bookmarks/{id}/assets/{asset_id}/",
            get(get_asset).delete(delete_asset),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

pub async fn run(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(token)).await
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = format!("Token {}", state.token);
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid token." })),
        )
            .into_response();
    }
    next.run(request).await
}

async fn list_bookmarks(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Bookmark>>> {
    list(&state, &uri, &headers, &params, false).await
}

async fn list_archived_bookmarks(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Bookmark>>> {
    list(&state, &uri, &headers, &params, true).await
}

async fn list(
    state: &AppState,
    uri: &axum::http::Uri,
    headers: &HeaderMap,
    params: &ListParams,
    archived: bool,
) -> ApiResult<Json<Page<Bookmark>>> {
    let mut matching: Vec<Bookmark> = {
        let store = state.db.read().await;
        store
            .bookmarks
            .values()
            .filter(|b| b.is_archived == archived && matches_filter(b, params))
            .cloned()
            .collect()
    };

    match params.sort.as_deref() {
        None | Some("") | Some("added_desc") => {
            matching.sort_by(|a, b| (b.date_added, b.id).cmp(&(a.date_added, a.id)))
        }
        Some("added_asc") => matching.sort_by(|a, b| (a.date_added, a.id).cmp(&(b.date_added, b.id))),
        Some("title_asc") => matching.sort_by_key(|b| (b.title.to_lowercase(), b.id)),
        Some("title_desc") => {
            matching.sort_by(|a, b| (b.title.to_lowercase(), b.id).cmp(&(a.title.to_lowercase(), a.id)))
        }
        Some(_) => return Err(bad_request("sort", "Invalid sort option.")),
    }

    let count = matching.len();
    let limit = params.limit.filter(|n| *n > 0).unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let results: Vec<Bookmark> = matching.into_iter().skip(offset).take(limit).collect();

    let end = offset.saturating_add(limit);
    let next = (end < count).then(|| page_url(uri, headers, limit, end));
    let previous = (offset > 0).then(|| page_url(uri, headers, limit, offset.saturating_sub(limit)));

    Ok(Json(Page {
        count,
        next,
        previous,
        results,
    }))
}

fn matches_filter(bookmark: &Bookmark, params: &ListParams) -> bool {
    if params.unread.as_deref() == Some("yes") && !bookmark.unread {
        return false;
    }
    if params.added_since.is_some_and(|since| bookmark.date_added < since) {
        return false;
    }
    if params.modified_since.is_some_and(|since| bookmark.date_modified < since) {
        return false;
    }
    let Some(q) = params.q.as_deref() else {
        return true;
    };
    q.split_whitespace().all(|term| {
        let term = term.to_lowercase();
        match term.strip_prefix('#') {
            Some(tag) => bookmark.tag_names.iter().any(|t| t.to_lowercase() == tag),
            None => [&bookmark.url, &bookmark.title, &bookmark.description, &bookmark.notes]
                .iter()
                .any(|field| field.to_lowercase().contains(&term)),
        }
    })
}

/// Absolute URL of the same listing with a different window.
fn page_url(uri: &axum::http::Uri, headers: &HeaderMap, limit: usize, offset: usize) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(uri.query().unwrap_or("").as_bytes()) {
        if key != "limit" && key != "offset" {
            query.append_pair(&key, &value);
        }
    }
    query.append_pair("limit", &limit.to_string());
    if offset > 0 {
        query.append_pair("offset", &offset.to_string());
    }

    format!("http://{host}{}?{}", uri.path(), query.finish())
}

async fn check_bookmark(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> ApiResult<Json<Value>> {
    let parsed = Url::parse(&params.url).map_err(|_| bad_request("url", "Enter a valid URL."))?;
    let host = parsed.host_str().unwrap_or_default();
    let site = host.strip_prefix("www.").unwrap_or(host);

    let bookmark = {
        let store = state.db.read().await;
        store.bookmarks.values().find(|b| b.url == params.url).cloned()
    };

    let auto_tags: Vec<String> = site
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| vec![s.to_string()])
        .unwrap_or_default();

    Ok(Json(json!({
        "bookmark": bookmark,
        "metadata": {
            "url": params.url,
            "title": site,
            "description": null,
            "preview_image": null,
        },
        "auto_tags": auto_tags,
    })))
}

async fn create_bookmark(
    State(state): State<AppState>,
    Json(input): Json<BookmarkInput>,
) -> ApiResult<(StatusCode, Json<Bookmark>)> {
    let now = Utc::now();
    let mut store = state.db.write().await;

    // Saving a URL twice updates the existing bookmark.
    let existing = store.bookmarks.values().find(|b| b.url == input.url).map(|b| b.id);
    let bookmark = match existing {
        Some(id) => {
            let bookmark = store.bookmarks.get_mut(&id).ok_or_else(not_found)?;
            apply(bookmark, input, now);
            bookmark.clone()
        }
        None => store.insert_bookmark(input, now),
    };
    tracing::info!(id = bookmark.id, url = %bookmark.url, "bookmark saved");
    Ok((StatusCode::CREATED, Json(bookmark)))
}

async fn get_bookmark(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Json<Bookmark>> {
    let store = state.db.read().await;
    store.bookmarks.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_bookmark(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<BookmarkInput>,
) -> ApiResult<Json<Bookmark>> {
    let mut store = state.db.write().await;
    let bookmark = store.bookmarks.get_mut(&id).ok_or_else(not_found)?;
    apply(bookmark, input, Utc::now());
    tracing::info!(id, "bookmark updated");
    Ok(Json(bookmark.clone()))
}

async fn archive_bookmark(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    set_archived(&state, id, true).await
}

async fn unarchive_bookmark(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    set_archived(&state, id, false).await
}

async fn set_archived(state: &AppState, id: u64, archived: bool) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    let bookmark = store.bookmarks.get_mut(&id).ok_or_else(not_found)?;
    bookmark.is_archived = archived;
    bookmark.date_modified = Utc::now();
    tracing::info!(id, archived, "bookmark archive state changed");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_bookmark(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    store.bookmarks.remove(&id).ok_or_else(not_found)?;
    store.assets.retain(|_, asset| asset.bookmark != id);
    tracing::info!(id, "bookmark deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_assets(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Json<Page<Asset>>> {
    let store = state.db.read().await;
    if !store.bookmarks.contains_key(&id) {
        return Err(not_found());
    }
    let results: Vec<Asset> = store.assets.values().filter(|a| a.bookmark == id).cloned().collect();
    Ok(Json(Page {
        count: results.len(),
        next: None,
        previous: None,
        results,
    }))
}

async fn get_asset(
    State(state): State<AppState>,
    Path((id, asset_id)): Path<(u64, u64)>,
) -> ApiResult<Json<Asset>> {
    let store = state.db.read().await;
    store
        .assets
        .get(&asset_id)
        .filter(|a| a.bookmark == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn delete_asset(
    State(state): State<AppState>,
    Path((id, asset_id)): Path<(u64, u64)>,
) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    if !store.assets.get(&asset_id).is_some_and(|a| a.bookmark == id) {
        return Err(not_found());
    }
    store.assets.remove(&asset_id);
    tracing::info!(id, asset_id, "asset deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(id: u64, title: &str, tags: &[&str]) -> Bookmark {
        let at = DateTime::from_timestamp(1_700_000_000 + id as i64, 0).unwrap();
        Bookmark {
            id,
            url: format!("https://example.com/{id}"),
            title: title.to_string(),
            description: String::new(),
            notes: "some notes".to_string(),
            website_title: None,
            website_description: None,
            web_archive_snapshot_url: None,
            favicon_url: None,
            preview_image_url: None,
            is_archived: false,
            unread: id % 2 == 0,
            shared: false,
            tag_names: tags.iter().map(|t| t.to_string()).collect(),
            date_added: at,
            date_modified: at,
        }
    }

    #[test]
    fn bookmark_serializes_nullable_fields_as_null() {
        let json = serde_json::to_value(bookmark(1, "Test", &[])).unwrap();
        assert_eq!(json["id"], 1);
        assert!(json["favicon_url"].is_null());
        assert_eq!(json["tag_names"], json!([]));
        assert_eq!(json["date_added"], "2023-11-14T22:13:21Z");
    }

    #[test]
    fn input_defaults_missing_fields() {
        let input: BookmarkInput = serde_json::from_str(r#"{"url":"https://example.com"}"#).unwrap();
        assert_eq!(input.url, "https://example.com");
        assert!(input.tag_names.is_empty());
        assert!(!input.unread);
    }

    #[test]
    fn input_rejects_missing_url() {
        let result: Result<BookmarkInput, _> = serde_json::from_str(r#"{"title":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn filter_matches_text_and_tags() {
        let b = bookmark(2, "Rust async book", &["Rust", "books"]);
        let params = |q: &str| ListParams {
            q: Some(q.to_string()),
            ..ListParams::default()
        };
        assert!(matches_filter(&b, &params("async")));
        assert!(matches_filter(&b, &params("#rust notes")));
        assert!(!matches_filter(&b, &params("#python")));
        assert!(!matches_filter(&b, &params("async golang")));
    }

    #[test]
    fn filter_respects_unread_and_dates() {
        let read = bookmark(1, "a", &[]);
        let unread = bookmark(2, "b", &[]);
        let params = ListParams {
            unread: Some("yes".to_string()),
            ..ListParams::default()
        };
        assert!(!matches_filter(&read, &params));
        assert!(matches_filter(&unread, &params));

        let params = ListParams {
            added_since: DateTime::from_timestamp(1_700_000_002, 0),
            ..ListParams::default()
        };
        assert!(!matches_filter(&read, &params));
        assert!(matches_filter(&unread, &params));
    }

    #[test]
    fn page_url_replaces_window_and_keeps_filters() {
        let uri: axum::http::Uri = "/api/bookmarks/?q=rust&limit=2&offset=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(
            page_url(&uri, &headers, 2, 4),
            "http://127.0.0.1:4000/api/bookmarks/?q=rust&limit=2&offset=4"
        );
        assert_eq!(
            page_url(&uri, &headers, 2, 0),
            "http://127.0.0.1:4000/api/bookmarks/?q=rust&limit=2"
        );
    }

    #[test]
    fn store_queues_snapshot_for_new_bookmarks() {
        let mut store = Store::default();
        let now = Utc::now();
        let input: BookmarkInput = serde_json::from_str(r#"{"url":"https://example.com"}"#).unwrap();
        let created = store.insert_bookmark(input, now);
        assert_eq!(created.id, 1);
        let asset = store.assets.values().next().unwrap();
        assert_eq!(asset.bookmark, created.id);
        assert_eq!(asset.asset_type, "snapshot");
        assert_eq!(asset.status, "pending");
    }
}
