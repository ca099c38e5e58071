//! Seed-test scenario 3: selector memory. The ordering contract belongs to
//! the durable store (sorted by success-minus-failure desc, then avg
//! find-time asc); the client's job is picking the first entry whose
//! success rate clears the 80% floor.

use autobrowse_agent::cache::{CacheService, L1Store, L2Store, SelectorPerformance};

fn performance(selector: &str, success: u64, fail: u64) -> SelectorPerformance {
    SelectorPerformance {
        domain: "news.example.com".into(),
        element_type: "content".into(),
        selector: selector.into(),
        success_count: success,
        fail_count: fail,
        last_used: 0,
        avg_find_time_ms: 50.0,
    }
}

#[tokio::test]
async fn scenario_3_best_selector_clears_the_success_floor() {
    let mut server = mockito::Server::new_async().await;

    let ranked = vec![
        performance("article.main", 10, 2), // 83% success
        performance(".post-body", 5, 5),    // 50% success
    ];
    server
        .mock("GET", "/element/news.example.com/content")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&ranked).unwrap())
        .create_async()
        .await;

    let l2 = L2Store::new(server.url());
    let service = CacheService::new(L1Store::new(None), Some(l2));

    let best = service
        .get_optimized_selector("news.example.com", "content")
        .await
        .expect("a selector above the 80% floor should be returned");

    assert_eq!(best.selector, "article.main");
}

#[tokio::test]
async fn no_selector_returned_when_none_clear_the_floor() {
    let mut server = mockito::Server::new_async().await;

    let ranked = vec![performance(".post-body", 5, 5)];
    server
        .mock("GET", "/element/news.example.com/content")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&ranked).unwrap())
        .create_async()
        .await;

    let l2 = L2Store::new(server.url());
    let service = CacheService::new(L1Store::new(None), Some(l2));

    assert!(service.get_optimized_selector("news.example.com", "content").await.is_none());
}
