//! Concurrent load against a single quota.

use std::time::{Duration, Instant};

use common::{client, gate_config, start_echo_upstream, start_gate};

mod common;

#[tokio::test]
async fn test_concurrent_requests_never_exceed_quota() {
    let upstream = start_echo_upstream().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = gate_config(upstream.addr, dir.path());
    config.rate_limit.api.max_requests = 50;
    config.rate_limit.api.window_secs = 3600;
    let gate = start_gate(config).await;

    let concurrency = 20;
    let requests_per_task = 10;
    let client = client();
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = gate.url("/api/games/popular");
        handles.push(tokio::spawn(async move {
            let mut admitted = 0;
            let mut limited = 0;
            for _ in 0..requests_per_task {
                match client.get(&url).send().await.map(|r| r.status().as_u16()) {
                    Ok(200) => admitted += 1,
                    Ok(429) => limited += 1,
                    other => panic!("unexpected response: {:?}", other),
                }
            }
            (admitted, limited)
        }));
    }

    let mut admitted = 0;
    let mut limited = 0;
    for handle in handles {
        let (a, l) = handle.await.unwrap();
        admitted += a;
        limited += l;
    }

    println!(
        "{} requests in {:?}: {} admitted, {} limited",
        concurrency * requests_per_task,
        start.elapsed(),
        admitted,
        limited
    );
    assert_eq!(admitted, 50);
    assert_eq!(limited, concurrency * requests_per_task - 50);
    assert_eq!(upstream.hits(), 50);
    assert!(start.elapsed() < Duration::from_secs(30));

    gate.shutdown.trigger();
}
