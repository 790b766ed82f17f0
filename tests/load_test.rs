//! Load testing for the RPC server and the batching client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::json;

use formrpc::FormPayload;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    let server = common::spawn_app().await;
    let client = Arc::new(server.client(true));

    let total_users = 200;
    let start = Instant::now();

    // Multipart calls, one exchange each
    let creates = (0..total_users).map(|i| {
        let client = client.clone();
        async move {
            let form = FormPayload::new()
                .text("name", format!("user-{}", i))
                .text("age", (20 + i % 50).to_string());
            client.mutation("createUser", form).await
        }
    });
    let created = join_all(creates).await;
    assert!(created.iter().all(|r| r.is_ok()));

    // JSON queries, coalesced into batches
    let reads = (0..total_users).map(|i| {
        let client = client.clone();
        async move { client.query("getUser", json!({ "name": format!("user-{}", i) })).await }
    });
    let found = join_all(reads).await;

    let duration = start.elapsed();
    println!("Load Test Results:");
    println!("  Calls: {}", total_users * 2);
    println!("  Total Duration: {:?}", duration);
    println!("  Calls/sec: {:.2}", (total_users * 2) as f64 / duration.as_secs_f64());

    for (i, result) in found.into_iter().enumerate() {
        assert_eq!(result.unwrap()["name"], json!(format!("user-{}", i)));
    }
    assert!(duration < Duration::from_secs(30));
}
