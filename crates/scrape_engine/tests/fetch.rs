use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use scrape_engine::{
    Backoff, ErrorKind, FetchRequest, FetchSettings, Fetcher, HostRateLimiter, ReqwestFetcher,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_settings() -> FetchSettings {
    FetchSettings {
        backoff: Backoff {
            base: Duration::from_millis(1),
            ceiling: Duration::from_millis(5),
            retry_after_ceiling: Duration::from_millis(50),
        },
        ..FetchSettings::default()
    }
}

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new(fast_settings()).unwrap()
}

fn request(url: &str, max_retries: u32) -> FetchRequest {
    FetchRequest::new(url, Duration::from_secs(5), max_retries)
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn fetcher_returns_body_status_and_content_type() {
    scrape_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/doc", server.uri());
    let page = fetcher().fetch(&request(&url, 0)).await.expect("fetch ok");

    assert_eq!(page.status, 200);
    assert_eq!(page.body, b"<html>ok</html>");
    assert!(page.content_type.starts_with("text/html"));
    assert_eq!(page.final_url, url);
}

#[tokio::test]
async fn non_success_status_is_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let page = fetcher().fetch(&request(&url, 3)).await.expect("http answer");

    assert_eq!(page.status, 404);
    assert!(!page.is_success());
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn server_errors_other_than_503_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/boom", server.uri());
    let page = fetcher().fetch(&request(&url, 3)).await.unwrap();

    assert_eq!(page.status, 500);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn invalid_urls_fail_without_network() {
    for url in ["not a url", "ftp://example.com/x", "", "https://"] {
        let err = fetcher().fetch(&request(url, 2)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput, "url {url:?}");
    }
}

#[tokio::test]
async fn zero_timeout_is_invalid_input() {
    let req = FetchRequest::new("https://example.com", Duration::ZERO, 0);
    let err = fetcher().fetch(&req).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
}

#[tokio::test]
async fn timeouts_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(800))
                .set_body_string("late"),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("on time", "text/plain"))
        .with_priority(2)
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let req = FetchRequest::new(url, Duration::from_millis(150), 2);
    let page = fetcher().fetch(&req).await.expect("third attempt succeeds");

    assert_eq!(page.body, b"on time");
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn timeouts_exhaust_into_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let url = format!("{}/slow", server.uri());
    let req = FetchRequest::new(url, Duration::from_millis(100), 1);
    let err = fetcher().fetch(&req).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
    // Bind then drop a listener so the port is known to be closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}/");
    let err = fetcher().fetch(&request(&url, 1)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn service_unavailable_with_retry_after_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("back"))
        .with_priority(2)
        .mount(&server)
        .await;

    let url = format!("{}/busy", server.uri());
    let page = fetcher().fetch(&request(&url, 1)).await.unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn too_many_requests_is_returned_once_retries_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&server)
        .await;

    let url = format!("{}/throttled", server.uri());
    let page = fetcher().fetch(&request(&url, 2)).await.unwrap();

    assert_eq!(page.status, 429);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn oversized_responses_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..fast_settings()
    };
    let fetcher = ReqwestFetcher::new(settings).unwrap();
    let url = format!("{}/large", server.uri());
    let err = fetcher.fetch(&request(&url, 2)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert!(err.message.contains("too large"), "{}", err.message);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn shared_rate_limiter_spends_tokens_for_the_fetched_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let limiter = Arc::new(HostRateLimiter::from_settings(1, 1).unwrap());
    let fetcher = fetcher().with_rate_limiter(limiter.clone());
    let url = format!("{}/once", server.uri());
    fetcher.fetch(&request(&url, 0)).await.unwrap();

    assert!(!limiter.try_acquire("127.0.0.1"));
    assert!(limiter.try_acquire("other.example.com"));
}
