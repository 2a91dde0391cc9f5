//! End-to-end pipeline tests against a local mock server.
//!
//! Uses `wiremock` to serve the product page, script chunks, and the offers
//! endpoint so no real network traffic is made. Covers the happy path, the
//! blocked and not-found halts, and the first-match chunk ordering policy.

use std::path::PathBuf;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use offerscan_core::{AppConfig, ProductUrl};
use offerscan_scraper::{run_pipeline, ChunkMatcher, ScrapeClient, ScrapeError, Stage};

fn test_config() -> AppConfig {
    AppConfig {
        log_level: "info".to_string(),
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        user_agent: "offerscan-test/0.1".to_string(),
        accept_language: "en-US".to_string(),
        output_path: PathBuf::from("result.json"),
    }
}

fn test_client() -> ScrapeClient {
    ScrapeClient::new(&test_config()).expect("failed to build test client")
}

fn product_url(server: &MockServer) -> ProductUrl {
    ProductUrl::parse(&format!("{}/ip/test-product/123456789", server.uri()))
        .expect("mock product URL should validate")
}

/// Product page with a JSON-LD block and the given chunk script references.
fn product_page(jsonld: &str, chunk_paths: &[&str]) -> String {
    let scripts: String = chunk_paths
        .iter()
        .map(|p| format!("<script src=\"{p}\"></script>\n"))
        .collect();
    format!(
        r#"<!doctype html><html><head>
<script type="application/ld+json">{jsonld}</script>
{scripts}</head><body><h1>Test Product</h1></body></html>"#
    )
}

fn chunk_body(token: &str) -> String {
    format!(r#"(self.chunks=self.chunks||[]).push([1,{{q:function(){{const e={{name:"GetAllSellerOffers",hash:"{token}"}};return e}}}}]);"#)
}

// ---------------------------------------------------------------------------
// Scenario A: valid page, token in first chunk, two offers returned
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_pipeline_extracts_two_offers_in_order() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","name":"Test Product","sku":"123456789"}"#,
        &["/static/chunks/marketplace_product-seller-info-a1b2c3d4.js"],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_product-seller-info-a1b2c3d4.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("abcDEF123")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orchestra/home/graphql/GetAllSellerOffers/abcDEF123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"marketplace": {"offers": [
                {"sellerName": "Acme Deals", "price": 19.99},
                {"sellerName": "Bargain Hut", "price": 21.50},
            ]}}
        })))
        .mount(&server)
        .await;

    let result = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect("pipeline should succeed");

    assert_eq!(result.sku.as_str(), "123456789");
    assert_eq!(result.offers.len(), 2);
    assert_eq!(result.offers[0]["sellerName"], "Acme Deals");
    assert_eq!(result.offers[1]["sellerName"], "Bargain Hut");
    // The persisted payload keeps the upstream data.marketplace.offers shape.
    assert_eq!(
        result.payload["data"]["marketplace"]["offers"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
}

// ---------------------------------------------------------------------------
// Scenario B: block page at fetch; later stages never run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn block_page_halts_at_page_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Robot or human?</title></head>
<body><div id="px-captcha"></div></body></html>"#,
        ))
        .mount(&server)
        .await;

    // Neither the chunk path nor the offers endpoint may ever be requested.
    Mock::given(path_regex(r"^/static/chunks/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path_regex(r"^/orchestra/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::PageFetch);
    assert!(
        err.source.is_blocked(),
        "expected Blocked, got: {:?}",
        err.source
    );
}

#[tokio::test]
async fn challenge_status_code_is_blocked_not_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::PageFetch);
    assert!(err.source.is_blocked());
}

// ---------------------------------------------------------------------------
// Scenario C: JSON-LD present but no sku key; no further network calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_sku_halts_before_any_chunk_or_offers_request() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","name":"No identifier"}"#,
        &["/static/chunks/marketplace_product-seller-info-a1b2c3d4.js"],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    Mock::given(path_regex(r"^/static/chunks/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path_regex(r"^/orchestra/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::SkuExtract);
    assert!(
        matches!(err.source, ScrapeError::NotFound { .. }),
        "expected NotFound, got: {:?}",
        err.source
    );
}

// ---------------------------------------------------------------------------
// First-match chunk ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_comes_from_first_matching_chunk_in_document_order() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","sku":"123456789"}"#,
        &[
            "/static/chunks/marketplace_product-seller-info-aaa111.js",
            "/static/chunks/marketplace_all-sellers-panel.bbb222.js",
        ],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    // Both chunks contain a valid token; only the first may be used.
    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_product-seller-info-aaa111.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("tokenAAA11111111")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_all-sellers-panel.bbb222.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("tokenBBB22222222")))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orchestra/home/graphql/GetAllSellerOffers/tokenAAA11111111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"marketplace": {"offers": []}}
        })))
        .mount(&server)
        .await;

    let result = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect("pipeline should succeed with the first token");
    assert!(result.offers.is_empty());
}

#[tokio::test]
async fn tokenless_first_chunk_falls_through_to_second() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","sku":"123456789"}"#,
        &[
            "/static/chunks/marketplace_layout-ccc333.js",
            "/static/chunks/marketplace_all-sellers-panel.ddd444.js",
        ],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_layout-ccc333.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("console.log('no token here');"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_all-sellers-panel.ddd444.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("tokenDDD44444444")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orchestra/home/graphql/GetAllSellerOffers/tokenDDD44444444"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"marketplace": {"offers": [{"sellerName": "Only One"}]}}
        })))
        .mount(&server)
        .await;

    let result = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect("pipeline should succeed with the second chunk's token");
    assert_eq!(result.offers.len(), 1);
}

// ---------------------------------------------------------------------------
// Idempotence: a second run against an unchanged site reaches the same
// stage outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_runs_against_unchanged_site_agree() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","sku":"123456789"}"#,
        &["/static/chunks/marketplace_product-seller-info-abc789.js"],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_product-seller-info-abc789.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("tokenABC78900000")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orchestra/home/graphql/GetAllSellerOffers/tokenABC78900000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"marketplace": {"offers": [
                {"sellerName": "Acme Deals", "price": 19.99},
                {"sellerName": "Bargain Hut", "price": 21.50},
            ]}}
        })))
        .mount(&server)
        .await;

    let client = test_client();
    let matcher = ChunkMatcher::default();
    let url = product_url(&server);

    let first = run_pipeline(&client, &matcher, &url)
        .await
        .expect("first run should succeed");
    let second = run_pipeline(&client, &matcher, &url)
        .await
        .expect("second run should succeed");

    assert_eq!(first.sku, second.sku);
    assert_eq!(first.offers.len(), second.offers.len());
    assert_eq!(first.offers, second.offers);
}

#[tokio::test]
async fn repeated_runs_halt_at_the_same_stage() {
    let server = MockServer::start().await;

    // JSON-LD without a sku key: every run must halt at SKU extraction.
    let page = product_page(r#"{"@type":"Product","name":"No identifier"}"#, &[]);
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let client = test_client();
    let matcher = ChunkMatcher::default();
    let url = product_url(&server);

    let first = run_pipeline(&client, &matcher, &url)
        .await
        .expect_err("first run should halt");
    let second = run_pipeline(&client, &matcher, &url)
        .await
        .expect_err("second run should halt");

    assert_eq!(first.stage, Stage::SkuExtract);
    assert_eq!(first.stage, second.stage);
    assert!(matches!(first.source, ScrapeError::NotFound { .. }));
    assert!(matches!(second.source, ScrapeError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Offers-stage outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_marketplace_chunks_is_token_not_found() {
    let server = MockServer::start().await;

    let page = product_page(r#"{"@type":"Product","sku":"123456789"}"#, &[]);
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::TokenLocate);
    assert!(matches!(err.source, ScrapeError::NotFound { .. }));
}

#[tokio::test]
async fn malformed_offers_response_is_not_found_at_offers_stage() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","sku":"123456789"}"#,
        &["/static/chunks/marketplace_product-seller-info-eee555.js"],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_product-seller-info-eee555.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("tokenEEE55555555")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orchestra/home/graphql/GetAllSellerOffers/tokenEEE55555555"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::OffersFetch);
    assert!(matches!(err.source, ScrapeError::NotFound { .. }));
}

#[tokio::test]
async fn challenge_body_from_offers_endpoint_is_blocked_at_offers_stage() {
    let server = MockServer::start().await;

    let page = product_page(
        r#"{"@type":"Product","sku":"123456789"}"#,
        &["/static/chunks/marketplace_product-seller-info-fff666.js"],
    );
    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/chunks/marketplace_product-seller-info-fff666.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chunk_body("tokenFFF66666666")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orchestra/home/graphql/GetAllSellerOffers/tokenFFF66666666"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Robot or human?</body></html>"),
        )
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::OffersFetch);
    assert!(
        err.source.is_blocked(),
        "expected Blocked, got: {:?}",
        err.source
    );
}

#[tokio::test]
async fn transport_failure_at_page_fetch_is_not_blocked() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip/test-product/123456789"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = run_pipeline(&test_client(), &ChunkMatcher::default(), &product_url(&server))
        .await
        .expect_err("pipeline should halt");

    assert_eq!(err.stage, Stage::PageFetch);
    assert!(
        err.source.is_transport(),
        "expected a transport error, got: {:?}",
        err.source
    );
}
