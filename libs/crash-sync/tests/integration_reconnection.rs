//! Integration tests for reconnection
//!
//! These tests verify backoff scheduling, the attempt cap and offline
//! handling against a real socket.

mod common;

use common::{connected_client, fast_config, wait_for, MockCrashServer};
use crash_sync::{ClientConfig, ConnectionStatus, GameClient, ReconnectionStrategy};
use std::time::Duration;

/// A local address nothing listens on
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

#[test]
fn test_default_backoff_sequence() {
    verbose_println!("Testing default backoff sequence...");

    let strategy = ClientConfig::default().reconnect_strategy();
    let delays: Vec<u64> = (0..10)
        .map(|i| strategy.base_delay(i).unwrap().as_millis() as u64)
        .collect();
    verbose_println!("  Delays: {:?}", delays);

    assert_eq!(&delays[..5], &[3000, 6000, 12000, 24000, 30000]);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(delays.iter().all(|&d| d <= 30000));
    assert!(strategy.base_delay(10).is_none());
}

#[test]
fn test_jittered_delay_bounds() {
    let strategy = ClientConfig::default().reconnect_strategy();
    for attempt in 0..10 {
        let base = strategy.base_delay(attempt).unwrap();
        for _ in 0..20 {
            let delay = strategy.next_delay(attempt).unwrap();
            assert!(delay >= base && delay < base + Duration::from_millis(1000));
        }
    }
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    verbose_println!("Testing reconnect after server-side close...");

    let server = MockCrashServer::start().await;
    let client = connected_client(&server).await;
    client.set_player_name("Ada").unwrap();
    assert!(wait_for(Duration::from_secs(2), || !client.snapshot().show_name_prompt).await);

    server.kick_all();

    let back = wait_for(Duration::from_secs(5), || {
        let snapshot = client.snapshot();
        server.connection_count() == 2
            && snapshot.status == ConnectionStatus::Connected
            && snapshot.player.session_id.as_deref() == Some("session-000002")
    })
    .await;
    assert!(back, "client did not reconnect");

    // the locally set name is replayed on the new connection
    assert!(wait_for(Duration::from_secs(2), || server.received_of("set_player_name").len() == 2).await);
    assert_eq!(client.snapshot().network.reconnect_attempts, 0);

    let texts: Vec<String> = client.recent_notices().into_iter().map(|n| n.text).collect();
    verbose_println!("  Notices: {:?}", texts);
    assert!(texts.contains(&"Disconnected from server".to_string()));
    assert!(texts.iter().any(|t| t.starts_with("Attempting to reconnect")));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    verbose_println!("Testing reconnect cap...");

    let config = fast_config(&dead_url().await);
    let client = GameClient::start(&config).unwrap();
    client.connect().unwrap();

    let exhausted = wait_for(Duration::from_secs(5), || client.snapshot().exhausted).await;
    assert!(exhausted, "reconnection never gave up");

    let snapshot = client.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    assert_eq!(snapshot.network.reconnect_attempts, 3);
    assert!(client
        .recent_notices()
        .iter()
        .any(|n| n.text.starts_with("Unable to reconnect")));

    // nothing else is scheduled
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(client.snapshot().network.reconnect_attempts, 3);
    assert_eq!(client.status(), ConnectionStatus::Disconnected);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_offline_drop_is_terminal() {
    let server = MockCrashServer::start().await;
    let client = connected_client(&server).await;

    client.set_online(false).unwrap();
    assert!(wait_for(Duration::from_secs(2), || !client.snapshot().network.is_online).await);

    server.kick_all();
    assert!(wait_for(Duration::from_secs(2), || client.snapshot().exhausted).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count(), 1);

    // coming back online does not reconnect by itself; a manual connect does
    client.set_online(true).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count(), 1);

    client.connect().unwrap();
    assert!(wait_for(Duration::from_secs(5), || client.status().is_connected()).await);
    assert_eq!(server.connection_count(), 2);
    assert!(!client.snapshot().exhausted);

    client.shutdown().await.unwrap();
}
