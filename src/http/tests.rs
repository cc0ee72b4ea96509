//! Tests for the HTTP fetcher module

use super::*;
use crate::error::Error;
use crate::planner::WorkUnit;
use crate::source::{
    BackoffPolicy, FetchOutcome, PageFetcher, PageRequest, PaginatedSource, SourceConfig,
};
use crate::types::PaginationKind;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unit_for(server: &MockServer) -> WorkUnit {
    WorkUnit::new(
        "boston",
        "2024",
        format!("{}/event-results/{{{{ source }}}}/", server.uri()),
    )
}

fn fetcher(config: HttpFetcherConfig) -> HttpPageFetcher {
    HttpPageFetcher::with_config(config).unwrap()
}

#[test]
fn test_config_default() {
    let config = HttpFetcherConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.records_pointer, "/results");
    assert_eq!(config.pagination, PaginationKind::PageNumber);
    assert_eq!(config.params.page, "page");
    assert!(config.total_pages_pointer.is_none());
}

#[test]
fn test_config_builder() {
    let config = HttpFetcherConfig::builder()
        .timeout(Duration::from_secs(5))
        .user_agent("test-agent/1.0")
        .header("Referer", "https://example.com/")
        .query("year", "{{ partition }}")
        .records_pointer("/data/items")
        .total_pages_pointer("/pagination/last_page")
        .build();

    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.user_agent, "test-agent/1.0");
    assert_eq!(
        config.query.get("year").map(String::as_str),
        Some("{{ partition }}")
    );
    assert_eq!(config.records_pointer, "/data/items");
    assert_eq!(
        config.total_pages_pointer.as_deref(),
        Some("/pagination/last_page")
    );
}

#[test]
fn test_build_url_page_number() {
    let fetcher = fetcher(
        HttpFetcherConfig::builder()
            .query("year", "{{ partition }}")
            .query("order_by", "place")
            .build(),
    );
    let unit = WorkUnit::new("boston", "2024", "https://api.example.com/r/{{ source }}/");

    let url = fetcher
        .build_url(&unit, &PageRequest::first(1, 100))
        .unwrap();

    assert_eq!(
        url.as_str(),
        "https://api.example.com/r/boston/?order_by=place&year=2024&page=1&limit=100"
    );
}

#[test]
fn test_build_url_offset_and_cursor() {
    let unit = WorkUnit::new("s", "p", "https://api.example.com/items");
    let request = PageRequest {
        page: 3,
        offset: 40,
        page_size: 20,
        cursor: Some("abc".to_string()),
    };

    let offset = fetcher(
        HttpFetcherConfig::builder()
            .pagination(PaginationKind::Offset)
            .build(),
    );
    assert_eq!(
        offset.build_url(&unit, &request).unwrap().query(),
        Some("offset=40&limit=20")
    );

    let cursor = fetcher(
        HttpFetcherConfig::builder()
            .pagination(PaginationKind::Cursor)
            .params(PaginationParams {
                cursor: "after".to_string(),
                limit: "per_page".to_string(),
                ..PaginationParams::default()
            })
            .build(),
    );
    assert_eq!(
        cursor.build_url(&unit, &request).unwrap().query(),
        Some("after=abc&per_page=20")
    );
}

#[test]
fn test_build_url_undefined_variable() {
    let fetcher = fetcher(HttpFetcherConfig::default());
    let unit = WorkUnit::new("s", "p", "https://api.example.com/{{ vars.region }}");

    let err = fetcher
        .build_url(&unit, &PageRequest::first(1, 10))
        .unwrap_err();
    assert!(matches!(err, Error::Template { .. }));
}

#[test]
fn test_decode_page_pointers() {
    let fetcher = fetcher(
        HttpFetcherConfig::builder()
            .records_pointer("/data/items")
            .total_pages_pointer("/pagination/last_page")
            .cursor_pointer("/next")
            .has_more_pointer("/has_more")
            .build(),
    );

    let page = fetcher
        .decode_page(&json!({
            "data": {"items": [{"id": 1}, {"id": 2}]},
            "pagination": {"last_page": "7"},
            "next": "c2",
            "has_more": false
        }))
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page.total_pages, Some(7));
    assert_eq!(page.next_cursor.as_deref(), Some("c2"));
    assert_eq!(page.is_last, Some(true));
}

#[test]
fn test_decode_page_missing_records_is_empty() {
    let fetcher = fetcher(HttpFetcherConfig::default());
    let page = fetcher.decode_page(&json!({"message": "no results"})).unwrap();
    assert!(page.is_empty());
}

#[test]
fn test_decode_page_rejects_non_array() {
    let fetcher = fetcher(HttpFetcherConfig::default());
    let err = fetcher
        .decode_page(&json!({"results": {"id": 1}}))
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.to_string().contains("an object"));
}

#[tokio::test]
async fn test_fetch_page_sends_templated_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/event-results/boston/"))
        .and(query_param("year", "2024"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "2"))
        .and(header("Referer", "https://example.com/boston"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1}, {"id": 2}],
            "pagination": {"last_page": 4}
        })))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(
        HttpFetcherConfig::builder()
            .query("year", "{{ partition }}")
            .header("Referer", "https://example.com/{{ source }}")
            .total_pages_pointer("/pagination/last_page")
            .build(),
    );

    let outcome = fetcher
        .fetch_page(&unit_for(&mock_server), &PageRequest::first(1, 2))
        .await
        .unwrap();

    match outcome {
        FetchOutcome::Page(page) => {
            assert_eq!(page.items, vec![json!({"id": 1}), json!({"id": 2})]);
            assert_eq!(page.total_pages, Some(4));
        }
        FetchOutcome::RateLimited { .. } => panic!("expected a page"),
    }
}

#[tokio::test]
async fn test_fetch_page_429_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_string("Rate limited"),
        )
        .mount(&mock_server)
        .await;

    let outcome = fetcher(HttpFetcherConfig::default())
        .fetch_page(&unit_for(&mock_server), &PageRequest::first(1, 10))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(3))
        }
    );
}

#[tokio::test]
async fn test_fetch_page_server_error_is_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = fetcher(HttpFetcherConfig::default())
        .fetch_page(&unit_for(&mock_server), &PageRequest::first(1, 10))
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "Server error");
        }
        other => panic!("Expected HttpStatus error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_page_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let err = fetcher(HttpFetcherConfig::default())
        .fetch_page(&unit_for(&mock_server), &PageRequest::first(1, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.is_unit_failure());
}

#[tokio::test]
async fn test_paginated_source_recovers_from_429() {
    let mock_server = MockServer::start().await;

    // First request for page 2 is rate limited
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1}, {"id": 2}]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 3}]
        })))
        .mount(&mock_server)
        .await;

    let source = PaginatedSource::new(fetcher(HttpFetcherConfig::default())).with_config(
        SourceConfig::default()
            .with_request_delay(Duration::ZERO)
            .with_backoff(BackoffPolicy::exponential(Duration::from_millis(10), 3)),
    );
    let unit = unit_for(&mock_server);

    let items: Vec<_> = source
        .fetch(&unit, 2)
        .map(|r| r.unwrap()["id"].as_i64().unwrap())
        .collect()
        .await;

    assert_eq!(items, vec![1, 2, 3]);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}
