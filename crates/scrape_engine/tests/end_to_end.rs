use std::fs;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use scrape_engine::{
    run, write_exports, Backoff, ErrorKind, ExportOptions, FetchSettings, FieldValue,
    HostRateLimiter, Pipeline, PipelineConfig, RateLimitSettings, SelectorSpec,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT: &str = r#"<html><head><title>Kettle</title></head><body>
<header>Site menu</header>
<h1>Kettle 2000</h1>
<p class="price">$19.99</p>
<a class="more" href="/products/kettle/specs">Specs</a>
<footer>Copyright</footer>
</body></html>"#;

async fn shop() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/kettle"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PRODUCT, "text/html; charset=utf-8"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

fn spec() -> SelectorSpec {
    SelectorSpec::from_definitions(["name=h1", "price=.price", "more=a.more@href"]).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        max_retries: 0,
        capture_markdown: true,
        rate_limit: RateLimitSettings {
            requests_per_second: 100,
            burst: 10,
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn http_pipeline_extracts_and_classifies() {
    scrape_logging::initialize_for_tests();
    let server = shop().await;
    let kettle = format!("{}/products/kettle", server.uri());
    let urls = vec![
        kettle.clone(),
        format!("{}/products/gone", server.uri()),
        "mailto:someone@example.com".to_string(),
    ];

    let settings = FetchSettings {
        backoff: Backoff {
            base: Duration::from_millis(1),
            ..Backoff::default()
        },
        ..FetchSettings::default()
    };
    let pipeline = Pipeline::with_http(config(), settings).unwrap();
    let result = pipeline.run(&urls, &spec()).await;

    assert_eq!(result.records.len(), 1);
    let record = &result.records[0];
    assert_eq!(record.get("name"), Some(&FieldValue::Single("Kettle 2000".into())));
    assert_eq!(record.get("price"), Some(&FieldValue::Single("$19.99".into())));
    assert_eq!(
        record.get("more"),
        Some(&FieldValue::Single(format!("{}/products/kettle/specs", server.uri())))
    );
    let markdown = record.markdown.as_deref().unwrap();
    assert!(markdown.contains("Kettle 2000"));
    assert!(!markdown.contains("Site menu"));

    let kinds: Vec<ErrorKind> = result.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::HttpError(404), ErrorKind::InvalidInput]);
}

#[tokio::test]
async fn free_run_function_rejects_bad_config() {
    let config = PipelineConfig {
        timeout_ms: 0,
        ..PipelineConfig::default()
    };
    let err = run(&["https://example.com".to_string()], &spec(), config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn exports_are_written_for_presenters() {
    let server = shop().await;
    let urls = vec![
        format!("{}/products/kettle", server.uri()),
        format!("{}/products/gone", server.uri()),
    ];
    let result = run(&urls, &spec(), config()).await.unwrap();

    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("exports");
    let options = ExportOptions {
        stem: "20240101_000000".into(),
        page_files: true,
        ..ExportOptions::default()
    };
    let summary = write_exports(&out, &result, &spec(), &options).unwrap();

    let names: Vec<String> = summary
        .written
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(
        &names[..4],
        &[
            "20240101_000000_data.json".to_string(),
            "20240101_000000_data.csv".to_string(),
            "20240101_000000_failures.csv".to_string(),
            "20240101_000000_data.md".to_string(),
        ]
    );
    assert_eq!(names.len(), 5);
    assert!(out.join("pages").is_dir());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("20240101_000000_data.json")).unwrap())
            .unwrap();
    assert_eq!(json["records"][0]["fields"]["price"], "$19.99");
    assert_eq!(json["failures"][0]["reason"], "HttpError:404");
    assert_eq!(json["cancelled"], false);

    let csv = fs::read_to_string(out.join("20240101_000000_data.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("url,name,price,more"));
    assert!(lines.next().unwrap().contains("Kettle 2000,$19.99,"));

    let md = fs::read_to_string(out.join("20240101_000000_data.md")).unwrap();
    assert!(md.starts_with("===== DOC START ====="));
}

#[tokio::test]
async fn separate_runs_share_one_per_host_budget() {
    let server = shop().await;
    let strict = PipelineConfig {
        max_retries: 0,
        rate_limit: RateLimitSettings {
            requests_per_second: 1,
            burst: 1,
        },
        ..PipelineConfig::default()
    };

    let started = Instant::now();
    for path in ["/products/kettle", "/products/gone", "/products/kettle?again"] {
        let url = format!("{}{path}", server.uri());
        let result = run(&[url], &spec(), strict.clone()).await.unwrap();
        assert_eq!(result.accounted(), 1);
    }

    // one token up front, then one per second for the other two requests
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1800), "{elapsed:?}");
    let limiter = HostRateLimiter::shared(1, 1).unwrap();
    assert!(!limiter.try_acquire("127.0.0.1"));
}
