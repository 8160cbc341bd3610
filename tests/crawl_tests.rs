//! End-to-end crawl tests
//!
//! These tests run the engine against a wiremock server and inspect what
//! reached the recording publisher.

mod common;

use common::{html, test_engine, test_settings, Published, RecordingPublisher};
use crawl_relay::output::RunStatus;
use crawl_relay::state::{CrawlFailure, FailureCode, FetchStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_stays_on_site() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        html(r#"<a href="/a">A</a><a href="http://other.test/x">Elsewhere</a>"#),
    )
    .await;
    mount(&server, "/a", html(r#"<img src="/img/logo.png">"#)).await;
    mount(
        &server,
        "/img/logo.png",
        ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"),
    )
    .await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new());
    let engine = test_engine(&server.uri(), test_settings(), publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.fetched, 3);
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert_eq!(summary.external_references, vec!["http://other.test/x"]);
    assert_eq!(publisher.markup_paths(), vec!["/", "/a"]);

    let image = publisher.calls().into_iter().find_map(|call| match call {
        Published::File { path, body, headers } => Some((path, body, headers)),
        _ => None,
    });
    let (image_path, body, headers) = image.expect("image was not published");
    assert_eq!(image_path, "/img/logo.png");
    assert_eq!(body, vec![1u8, 2, 3]);
    assert_eq!(headers.get("content-type").map(String::as_str), Some("image/png"));
}

#[tokio::test]
async fn test_redirect_is_published_and_followed() {
    let server = MockServer::start().await;
    mount(&server, "/", html(r#"<a href="/old">Old</a>"#)).await;
    mount(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("Location", "/new"),
    )
    .await;
    mount(&server, "/new", html("<p>moved here</p>")).await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new());
    let engine = test_engine(&server.uri(), test_settings(), publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert_eq!(summary.redirected, 1);
    assert!(publisher.calls().contains(&Published::Redirect {
        from: "/old".to_string(),
        to: "/new".to_string(),
        author: "crawl-relay".to_string(),
        status_code: 301,
    }));
    assert_eq!(publisher.markup_paths(), vec!["/", "/new"]);
}

#[tokio::test]
async fn test_rewrite_makes_site_links_relative() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<a href="{uri}/a">A</a><a href="https://other.test/">O</a>"#,
        uri = server.uri()
    );
    mount(&server, "/", html(&page)).await;
    mount(&server, "/a", html("<p>a</p>")).await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new());
    let mut settings = test_settings();
    settings.rewrite = true;
    let engine = test_engine(&server.uri(), settings, publisher.clone(), state.path());

    engine.seed_queue();
    engine.run(CancellationToken::new()).await;

    let root = publisher.markup("/").expect("root page was not published");
    assert!(root.contains(r#"href="/a""#), "{}", root);
    assert!(!root.contains(&server.uri()), "{}", root);
    assert!(root.contains("https://other.test/"));
}

#[tokio::test]
async fn test_publish_failure_is_recorded() {
    let server = MockServer::start().await;
    mount(&server, "/", html(r#"<a href="/a">A</a>"#)).await;
    mount(&server, "/a", html("<p>a</p>")).await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::rejecting("/a"));
    let engine = test_engine(&server.uri(), test_settings(), publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(
        summary.failures,
        vec![CrawlFailure::new(
            FailureCode::Publish,
            format!("{}/a", server.uri())
        )]
    );
    // The fetch itself succeeded
    assert_eq!(summary.fetched, 2);
    assert_eq!(publisher.markup_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_fetch_failures_are_recorded() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        html(r#"<a href="/missing">M</a><img src="/big.bin">"#),
    )
    .await;
    mount(
        &server,
        "/big.bin",
        ResponseTemplate::new(200).set_body_raw(vec![0u8; 4096], "application/octet-stream"),
    )
    .await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new());
    let mut settings = test_settings();
    settings.session.max_resource_size = 1024;
    let engine = test_engine(&server.uri(), settings, publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    let mut codes: Vec<String> = summary
        .failures
        .iter()
        .map(|failure| failure.code.to_string())
        .collect();
    codes.sort();
    assert_eq!(codes, vec!["404", "too_large"]);
    assert_eq!(summary.failed, 2);
    assert_eq!(engine.session().count_by_status(FetchStatus::Failed), 2);
}

#[tokio::test]
async fn test_robots_disallowed_items_are_not_fetched() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
    )
    .await;
    mount(&server, "/", html(r#"<a href="/private/page">P</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html("<p>secret</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new());
    let mut settings = test_settings();
    settings.session.respect_robots = true;
    let engine = test_engine(&server.uri(), settings, publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert_eq!(
        summary.failures,
        vec![CrawlFailure::new(
            FailureCode::Robots,
            format!("{}/private/page", server.uri())
        )]
    );
    assert_eq!(publisher.markup_paths(), vec!["/"]);
}

#[tokio::test]
async fn test_detected_resources_are_fetched_and_published() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        html(
            r#"<div style="background-image:url('/bg.jpg')"></div>
               <img data-src="/lazy.png" class="lazy">"#,
        ),
    )
    .await;
    mount(
        &server,
        "/bg.jpg",
        ResponseTemplate::new(200).set_body_raw(vec![0xffu8, 0xd8], "image/jpeg"),
    )
    .await;
    mount(
        &server,
        "/lazy.png",
        ResponseTemplate::new(200).set_body_raw(vec![0x89u8, b'P'], "image/png"),
    )
    .await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new());
    let engine = test_engine(&server.uri(), test_settings(), publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert_eq!(summary.fetched, 3);
    assert_eq!(publisher.file_paths(), vec!["/bg.jpg", "/lazy.png"]);

    let root = format!("{}/", server.uri());
    for resource in ["/bg.jpg", "/lazy.png"] {
        let item = engine
            .session()
            .item_by_url(&format!("{}{}", server.uri(), resource))
            .expect("detected resource was not queued");
        assert_eq!(item.referrer.as_deref(), Some(root.as_str()));
    }
}

#[tokio::test]
async fn test_discoveries_dispatch_while_page_publishes() {
    let server = MockServer::start().await;
    mount(&server, "/", html(r#"<a href="/a">A</a>"#)).await;
    mount(&server, "/a", html("<p>a</p>")).await;

    let state = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher::new().with_delay("/", Duration::from_secs(2)));
    let mut settings = test_settings();
    settings.session.concurrency = 4;
    let engine = test_engine(&server.uri(), settings, publisher.clone(), state.path());

    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert_eq!(summary.fetched, 2);
    let order: Vec<String> = publisher
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Published::Markup { path, .. } => Some(path),
            _ => None,
        })
        .collect();
    // `/a` is published while the root page is still held by the publisher
    assert_eq!(order, vec!["/a", "/"]);
}

async fn crawl_single_download(publisher: Arc<RecordingPublisher>) -> Vec<CrawlFailure> {
    let server = MockServer::start().await;
    mount(&server, "/", html(r#"<a href="/guide.pdf">Guide</a>"#)).await;
    mount(
        &server,
        "/guide.pdf",
        ResponseTemplate::new(200)
            .insert_header("Content-Disposition", "attachment; filename=guide.pdf")
            .set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
    )
    .await;

    let state = tempfile::tempdir().unwrap();
    let engine = test_engine(&server.uri(), test_settings(), publisher.clone(), state.path());
    engine.seed_queue();
    let summary = engine.run(CancellationToken::new()).await;

    assert_eq!(summary.temp_files_swept, 0);
    summary.failures
}

#[tokio::test]
async fn test_upload_temp_file_removed_after_publish() {
    let publisher = Arc::new(RecordingPublisher::new());
    let failures = crawl_single_download(publisher.clone()).await;

    assert!(failures.is_empty(), "{:?}", failures);
    assert_eq!(publisher.file_paths(), vec!["/guide.pdf"]);
    let sources = publisher.file_sources();
    assert_eq!(sources.len(), 1);
    assert!(!sources[0].exists(), "{} was left behind", sources[0].display());
}

#[tokio::test]
async fn test_upload_temp_file_removed_after_rejection() {
    let publisher = Arc::new(RecordingPublisher::rejecting("/guide.pdf"));
    let failures = crawl_single_download(publisher.clone()).await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].code, FailureCode::Publish);
    assert!(publisher.file_paths().is_empty());
    let sources = publisher.file_sources();
    assert_eq!(sources.len(), 1);
    assert!(!sources[0].exists(), "{} was left behind", sources[0].display());
}
