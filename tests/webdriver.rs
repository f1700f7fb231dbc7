//! Integration tests for the WebDriver renderer
//!
//! These tests use wiremock to stand in for a WebDriver server and check the
//! wire protocol the session speaks, then run a whole crawl through it.

use feed_harvester::config::{Config, DelayRange, RendererConfig};
use feed_harvester::crawler::{Coordinator, CrawlOutcome, EngagementExtractor};
use feed_harvester::renderer::{Key, RenderError, Renderer, RendererFactory, WebDriverFactory};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SESSION: &str = "/session/abc123";

fn ok(value: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": value }))
}

async fn mount_new_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_string_contains("alwaysMatch"))
        .respond_with(ok(json!({ "sessionId": "abc123", "capabilities": {} })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_delete_session(server: &MockServer) {
    Mock::given(method("DELETE"))
        .and(path(SESSION))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(server)
        .await;
}

fn factory_for(server: &MockServer) -> WebDriverFactory {
    let config = RendererConfig {
        webdriver_url: server.uri(),
        ..RendererConfig::default()
    };
    WebDriverFactory::new(&config).unwrap()
}

#[tokio::test]
async fn test_session_commands() {
    let server = MockServer::start().await;
    mount_new_session(&server).await;
    mount_delete_session(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/url", SESSION)))
        .and(body_string_contains("https://feed.example/foryou"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/source", SESSION)))
        .respond_with(ok(json!("<html><body>feed</body></html>")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/execute/sync", SESSION)))
        .respond_with(ok(json!(2400)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/actions", SESSION)))
        .and(body_string_contains("keyDown"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/actions", SESSION)))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = factory_for(&server).open().await.unwrap();

    session.navigate("https://feed.example/foryou").await.unwrap();
    assert_eq!(
        session.current_markup().await.unwrap(),
        "<html><body>feed</body></html>"
    );
    assert_eq!(
        session.script_eval("return 1;").await.unwrap(),
        json!(2400)
    );
    session.send_key(Key::End).await.unwrap();

    session.close().await.unwrap();
    // Second close must not hit the server again
    session.close().await.unwrap();

    assert!(matches!(
        session.current_markup().await,
        Err(RenderError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_error_body_maps_to_protocol_error() {
    let server = MockServer::start().await;
    mount_new_session(&server).await;
    mount_delete_session(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/url", SESSION)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "invalid session id", "message": "session deleted" }
        })))
        .mount(&server)
        .await;

    let mut session = factory_for(&server).open().await.unwrap();
    let err = session.navigate("https://feed.example/").await.unwrap_err();

    match err {
        RenderError::Protocol { error, message, .. } => {
            assert_eq!(error, "invalid session id");
            assert_eq!(message, "session deleted");
        }
        other => panic!("expected protocol error, got {:?}", other),
    }

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_non_json_response_is_unexpected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = factory_for(&server).open().await;

    assert!(matches!(
        result,
        Err(RenderError::UnexpectedResponse { .. })
    ));
}

/// Reports a scroll extent that grows on every measurement
struct GrowingExtent(AtomicU64);

impl Respond for GrowingExtent {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let extent = self.0.fetch_add(600, Ordering::SeqCst) + 600;
        ok(json!(extent))
    }
}

#[tokio::test]
async fn test_full_run_over_webdriver() {
    let server = MockServer::start().await;
    mount_new_session(&server).await;
    mount_delete_session(&server).await;

    let feed = r#"<html><body>
        <div data-e2e="recommend-list-item-container">
            <a href="/@one/video/1001">one</a>
            <div data-e2e="video-desc"><a data-e2e="search-common-link" href="/tag/dance">#dance</a></div>
            <button aria-label="Like video"><strong>5.1K</strong></button>
        </div>
        <div data-e2e="recommend-list-item-container">
            <a href="/@two/video/1002">two</a>
            <button aria-label="Share video"><strong>77</strong></button>
        </div>
    </body></html>"#;

    Mock::given(method("POST"))
        .and(path(format!("{}/url", SESSION)))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/actions", SESSION)))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/actions", SESSION)))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/source", SESSION)))
        .respond_with(ok(json!(feed)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/execute/sync", SESSION)))
        .and(body_string_contains("scrollHeight"))
        .respond_with(GrowingExtent(AtomicU64::new(1000)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/execute/sync", SESSION)))
        .and(body_string_contains("scrollTo"))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.feed.url = format!("{}/foryou", server.uri());
    config.crawler.target_count = 2;
    config.crawler.settle_wait_ms = 1;
    config.rate_limit.short_delay = DelayRange::new(0.0, 0.0);
    config.rate_limit.long_delay = DelayRange::new(0.0, 0.0);
    config.renderer.webdriver_url = server.uri();

    let factory = Arc::new(WebDriverFactory::new(&config.renderer).unwrap());
    let extractor = Box::new(EngagementExtractor::new().unwrap());
    let mut coordinator = Coordinator::new(&config, factory, extractor).unwrap();

    let report = coordinator
        .run_once(config.crawler.target(), &CancellationToken::new())
        .await;

    assert!(matches!(report.outcome, CrawlOutcome::TargetReached));
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].hashtags(), ["dance".to_string()]);
    assert_eq!(report.records[0].likes(), "5.1K");
    assert_eq!(report.records[1].shares(), "77");
    assert_eq!(report.records[1].likes(), "N/A");
}
