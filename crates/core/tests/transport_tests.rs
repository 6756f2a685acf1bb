//! Live transport behavior against a local websocket endpoint: delivery of
//! broadcasts and the fixed-backoff reconnect loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use showsync_core::{ConnectionState, PerformanceTimeClient};

#[tokio::test(flavor = "multi_thread")]
async fn test_client_receives_broadcasts_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"cause":"cue","time_points":[{"cue":"intro","offset":5}]}"#.to_string(),
        ))
        .await
        .unwrap();
        // Hold the connection open while the client processes.
        tokio::time::sleep(Duration::from_millis(800)).await;
    });

    let client = PerformanceTimeClient::new(
        format!("ws://{}/ws/performanceTime", addr),
        Duration::from_millis(1000),
    );
    client.connect();
    client.connect(); // idempotent

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    let since = client.since_cue("intro");
    assert!((since - 5.0).abs() < 1.0, "since_cue was {}", since);
    assert_eq!(client.latest_cue().unwrap().name, "intro");

    client.shutdown();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_retries_on_fixed_backoff() {
    // A listener that drops every connection before the websocket handshake
    // completes, forcing the client through its retry loop.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let client = PerformanceTimeClient::new(
        format!("ws://{}/ws/performanceTime", addr),
        Duration::from_millis(300),
    );
    client.connect();

    // Initial attempt plus roughly one retry per backoff period.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let seen = attempts.load(Ordering::SeqCst);
    assert!(seen >= 3, "expected repeated reconnects, saw {}", seen);

    client.shutdown();
    // Allow any in-flight attempt to land before sampling.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let after_shutdown = attempts.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(
        attempts.load(Ordering::SeqCst),
        after_shutdown,
        "shutdown must cancel the reconnect loop"
    );
}
