//! Seed-test scenarios 1-2 from the cache's testable properties: bypass
//! purity under normalization-equivalent URLs, and L1-to-L2 promotion.

use autobrowse_agent::cache::{CacheService, CachedPage, L1Store, L2Store};

fn sample_page(url: &str, content: &str) -> CachedPage {
    CachedPage {
        cache_key: String::new(),
        url: url.to_string(),
        title: "Guide".into(),
        content: content.to_string(),
        content_hash: "h".into(),
        word_count: content.split_whitespace().count(),
        selector_used: None,
        extraction_method: "universal".into(),
        ttl_seconds: 0,
        summary: None,
        key_points: None,
        entities: None,
        success_rate: 1.0,
    }
}

#[tokio::test]
async fn scenario_1_cache_normalization_bypass_is_a_noop() {
    let service = CacheService::new(L1Store::new(None), None);
    let url = "https://Example.com:443/Foo/?utm_source=x&b=2&a=1";

    service
        .put(url, Some(".price"), "", sample_page(url, "1.99"))
        .await
        .unwrap();

    for variant in [
        "https://Example.com:443/Foo/?utm_source=x&b=2&a=1",
        "https://example.com/foo?b=2&a=1",
        "HTTPS://EXAMPLE.COM/foo/",
    ] {
        let got = service.get(variant, Some(".price"), "").await.unwrap();
        assert!(got.is_none(), "bypass-selector put must never be observable via get");
    }
}

#[tokio::test]
async fn scenario_2_l1_to_l2_promotion() {
    let mut server = mockito::Server::new_async().await;
    let url = "https://docs.example.org/guide";
    let large_content = "word ".repeat(3_000);

    let page = sample_page(url, &large_content);
    let page_json = serde_json::to_string(&page).unwrap();

    let get_mock = server
        .mock("GET", mockito::Matcher::Regex(r"^/page/.*$".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page_json)
        .create_async()
        .await;
    server
        .mock("POST", "/page")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"ok","expires":null}"#)
        .create_async()
        .await;

    let l2 = L2Store::new(server.url());
    let service = CacheService::new(L1Store::new(None), Some(l2));

    // L1 is empty; the service must fall through to L2 and promote.
    let (_page, origin) = service.get(url, None, "").await.unwrap().expect("L2 hit expected");
    assert_eq!(origin, autobrowse_agent::cache::CacheOrigin::L2);
    get_mock.assert_async().await;

    // Second read is served from the promoted L1 entry.
    let (page_again, origin_again) = service.get(url, None, "").await.unwrap().expect("L1 hit expected");
    assert_eq!(origin_again, autobrowse_agent::cache::CacheOrigin::L1);
    assert_eq!(page_again.word_count, page.word_count);
}
