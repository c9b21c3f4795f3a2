//! Integration tests for the crawl client facade
//!
//! Submission, cancellation, single-page scraping and site mapping against a wiremock
//! stand-in for the crawl service.

use crawl_conductor::transport::{ErrorCategory, IDEMPOTENCY_HEADER};
use crawl_conductor::{
    ClientSettings, CrawlClient, CrawlError, CrawlOptions, Document, MapOptions, ScrapeOptions,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_client(server: &MockServer) -> CrawlClient {
    let settings = ClientSettings::new("fc-test")
        .with_base_url(server.uri())
        .with_backoff_base(Duration::from_millis(10));
    CrawlClient::new(settings).expect("client should build")
}

#[tokio::test]
async fn test_submit_sends_authenticated_request() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .and(header("authorization", "Bearer fc-test"))
        .and(header("content-type", "application/json"))
        .and(header(IDEMPOTENCY_HEADER, "run-42"))
        .and(body_json(json!({
            "url": "https://example.com",
            "limit": 10,
            "scrapeOptions": {"formats": ["markdown"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "id": "job1",
            "url": format!("{}/v1/crawl/job1", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = CrawlOptions::default()
        .with_limit(10)
        .with_formats(["markdown"]);
    let job = client
        .async_crawl_url("https://example.com", &options, Some("run-42"))
        .await
        .expect("submission should succeed");

    assert_eq!(job.id(), "job1");
}

#[tokio::test]
async fn test_submit_without_id_is_protocol_violation() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let err = client
        .async_crawl_url("https://example.com", &CrawlOptions::default(), None)
        .await
        .unwrap_err();

    match err {
        CrawlError::Protocol { context, .. } => assert_eq!(context, "crawl submission"),
        other => panic!("expected Protocol, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_conflict_is_classified() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "Idempotency key already used"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .async_crawl_url("https://example.com", &CrawlOptions::default(), Some("run-42"))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Conflict: Failed to start crawl job due to a conflict. Idempotency key already used - No additional error details provided."
    );
    match err {
        CrawlError::Api(api) => assert_eq!(api.category, ErrorCategory::Conflict),
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_retries_bad_gateway() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "job7"})))
        .expect(1)
        .mount(&server)
        .await;

    let job = client
        .async_crawl_url("https://example.com", &CrawlOptions::default(), None)
        .await
        .expect("retry should recover");
    assert_eq!(job.id(), "job7");
}

#[tokio::test]
async fn test_crawl_url_submits_then_collects() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "job1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/crawl/job1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "total": 1,
            "completed": 1,
            "data": [{"markdown": "# Home"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .crawl_url(
            "https://example.com",
            &CrawlOptions::default(),
            Duration::from_secs(2),
            None,
        )
        .await
        .expect("crawl should complete");

    assert_eq!(result.job.id(), "job1");
    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].markdown(), Some("# Home"));
}

#[tokio::test]
async fn test_cancel_crawl() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("DELETE"))
        .and(path("/v1/crawl/job1"))
        .and(header("authorization", "Bearer fc-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "cancelled"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client.cancel_crawl("job1").await.unwrap();
    assert_eq!(response, json!({"status": "cancelled"}));
}

#[tokio::test]
async fn test_cancel_unknown_job_is_classified() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("DELETE"))
        .and(path("/v1/crawl/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client.cancel_crawl("nope").await.unwrap_err();
    match err {
        CrawlError::Api(api) => {
            assert_eq!(api.status, 404);
            assert_eq!(api.category, ErrorCategory::Unexpected);
            assert_eq!(api.action, "cancel crawl job");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scrape_url() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_json(json!({
            "url": "https://example.com/about",
            "formats": ["markdown"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "markdown": "# About",
                "metadata": {"sourceURL": "https://example.com/about"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = ScrapeOptions {
        formats: Some(vec!["markdown".to_string()]),
        ..ScrapeOptions::default()
    };
    let document: Document = client
        .scrape_url("https://example.com/about", &options)
        .await
        .unwrap();

    assert_eq!(document.markdown(), Some("# About"));
    assert_eq!(document.source_url(), Some("https://example.com/about"));
}

#[tokio::test]
async fn test_scrape_failure_reported_in_body() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "page unreachable"
        })))
        .mount(&server)
        .await;

    let err = client
        .scrape_url("https://example.com/gone", &ScrapeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Protocol { .. }));
    assert!(err.to_string().contains("page unreachable"));
}

#[tokio::test]
async fn test_map_url() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/map"))
        .and(header("authorization", "Bearer fc-test"))
        .and(body_json(json!({
            "url": "https://example.com",
            "search": "docs"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "links": ["https://example.com/docs", "https://example.com/docs/api"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = MapOptions {
        search: Some("docs".to_string()),
        ..MapOptions::default()
    };
    let links = client.map_url("https://example.com", &options).await.unwrap();

    assert_eq!(
        links,
        vec![
            "https://example.com/docs".to_string(),
            "https://example.com/docs/api".to_string()
        ]
    );
}

#[tokio::test]
async fn test_map_without_links_is_protocol_violation() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "site not reachable"
        })))
        .mount(&server)
        .await;

    let err = client
        .map_url("https://example.com", &MapOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Protocol { .. }));
    assert!(err
        .to_string()
        .contains("Failed to map URL. Error: site not reachable"));
}

#[tokio::test]
async fn test_map_timeout_is_classified() {
    let server = MockServer::start().await;
    let client = create_test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/map"))
        .respond_with(ResponseTemplate::new(408).set_body_json(json!({
            "error": "took too long"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .map_url("https://example.com", &MapOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Request Timeout: Failed to map as the request timed out. took too long - No additional error details provided."
    );
    match err {
        CrawlError::Api(api) => {
            assert_eq!(api.category, ErrorCategory::Timeout);
            assert_eq!(api.action, "map");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}
