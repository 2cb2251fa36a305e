//! Full bookmark lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every resource
//! mapper over real HTTP through `UreqTransport`.

#![cfg(feature = "ureq")]

use linkding_core::{
    ApiError, ClientConfig, CreateBookmarkRequest, Linkding, ListFilter, SortOrder, TransportError,
    UreqTransport,
};

const TOKEN: &str = "integration-token";

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, TOKEN).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn connect(base_url: &str, token: &str) -> Linkding<UreqTransport> {
    let config = ClientConfig::builder()
        .base_url(base_url)
        .token(token)
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap();
    Linkding::new(&config, UreqTransport::from_config(&config))
}

#[test]
fn bookmark_lifecycle() {
    let base_url = start_server();
    let api = connect(&base_url, TOKEN);

    // Step 1: list, should be empty.
    let page = api.list_bookmarks(&ListFilter::new()).unwrap();
    assert_eq!(page.count, 0);
    assert!(page.results.is_empty(), "expected empty list");

    // Step 2: check an unsaved URL.
    let check = api.check_bookmark("https://www.rust-lang.org/").unwrap();
    assert!(check.bookmark.is_none());
    assert_eq!(check.metadata.url, "https://www.rust-lang.org/");
    assert!(check.metadata.title.is_some());
    assert_eq!(check.auto_tags, vec!["rust-lang"]);

    // Step 3: create.
    let input = CreateBookmarkRequest::new("https://www.rust-lang.org/")
        .title("Rust")
        .tags(["rust", "lang"])
        .unread(true);
    let created = api.create_bookmark(&input).unwrap();
    assert_eq!(created.title, "Rust");
    assert_eq!(created.tag_names, vec!["rust", "lang"]);
    assert!(created.unread);
    let id = created.id;

    // Step 4: get and check now find it.
    let fetched = api.get_bookmark(id).unwrap();
    assert_eq!(fetched, created);
    let check = api.check_bookmark("https://www.rust-lang.org/").unwrap();
    assert_eq!(check.bookmark.as_ref().map(|b| b.id), Some(id));

    // Step 5: filtered listing.
    let page = api
        .list_bookmarks(&ListFilter::new().query("rust").limit(10).unread(true))
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, id);

    // Step 6: update.
    let updated = api
        .update_bookmark(id, &CreateBookmarkRequest::from(&fetched).title("Rust lang").unread(false))
        .unwrap();
    assert_eq!(updated.title, "Rust lang");
    assert!(!updated.unread);
    assert_eq!(updated.tag_names, created.tag_names);

    // Step 7: archive moves it out of the main listing.
    api.archive_bookmark(id).unwrap();
    assert_eq!(api.list_bookmarks(&ListFilter::new()).unwrap().count, 0);
    let archived = api.list_archived_bookmarks(&ListFilter::new()).unwrap();
    assert_eq!(archived.count, 1);
    assert!(archived.results[0].is_archived);

    // Step 8: unarchive.
    api.unarchive_bookmark(id).unwrap();
    assert!(!api.get_bookmark(id).unwrap().is_archived);

    // Step 9: assets.
    let assets = api.list_bookmark_assets(id).unwrap();
    assert_eq!(assets.count, 1);
    let asset = api.get_bookmark_asset(id, assets.results[0].id).unwrap();
    assert_eq!(asset.bookmark, id);
    api.delete_bookmark_asset(id, asset.id).unwrap();
    assert!(api.list_bookmark_assets(id).unwrap().results.is_empty());

    // Step 10: delete.
    api.delete_bookmark(id).unwrap();

    // Step 11: get after delete, the transport reports 404.
    let err = api.get_bookmark(id).unwrap_err();
    assert_eq!(err.status(), Some(404));

    // Step 12: delete again, still a transport error rather than a decode error.
    let err = api.delete_bookmark(id).unwrap_err();
    assert!(matches!(err, ApiError::Transport(TransportError::Status { status: 404, .. })));
}

#[test]
fn pages_follow_server_cursors() {
    let base_url = start_server();
    let api = connect(&base_url, TOKEN);

    for i in 0..5 {
        api.create_bookmark(&CreateBookmarkRequest::new(format!("https://example.com/{i}")).title(format!("t{i}")))
            .unwrap();
    }

    let filter = ListFilter::new().limit(2).sort(SortOrder::TitleAsc);
    let first = api.list_bookmarks(&filter).unwrap();
    assert_eq!(first.count, 5);
    assert!(first.next.as_deref().is_some_and(|n| n.starts_with(&base_url)));

    let titles: Vec<String> = api
        .bookmark_pages(&filter)
        .map(|page| page.unwrap())
        .flat_map(|page| page.results)
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["t0", "t1", "t2", "t3", "t4"]);

    let second = api.next_page(&first).unwrap().unwrap();
    let back = api.previous_page(&second).unwrap().unwrap();
    assert_eq!(back.results, first.results);
}

#[test]
fn invalid_sort_is_rejected_by_server() {
    let base_url = start_server();
    let api = connect(&base_url, TOKEN);

    let err = api
        .list_bookmarks(&ListFilter::new().sort(SortOrder::Other("shuffle".to_string())))
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[test]
fn wrong_token_is_a_transport_error() {
    let base_url = start_server();
    let api = connect(&base_url, "wrong-token");

    let err = api.list_bookmarks(&ListFilter::new()).unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn unreachable_server_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = connect(&format!("http://{addr}"), TOKEN);
    let err = api.get_bookmark(1).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.status(), None);
}
