//! Integration tests for FeedSession against a local scripted feed.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use marketbridge::market_data::{FeedSession, SessionState, SessionTiming};
use marketbridge::Error;

async fn open(url: &str, timing: &SessionTiming) -> marketbridge::Result<FeedSession> {
    FeedSession::open(url, &credentials(), &subscription(), timing).await
}

#[tokio::test]
async fn handshake_then_stream() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let url = spawn_feed(move |_, mut ws| {
        let seen_tx = seen_tx.clone();
        async move {
            let (auth, subscribe) = accept_handshake(&mut ws).await;
            let _ = seen_tx.send((auth, subscribe));
            ws.send(Message::Text(r#"[{"T":"t","S":"AAPL","p":187.5}]"#.into())).await.unwrap();
            drain(&mut ws).await;
        }
    })
    .await;

    let mut session = open(&url, &fast_timing()).await.expect("open");
    assert_eq!(session.state(), SessionState::Streaming);

    let payload = session.receive().await.expect("payload");
    assert_eq!(payload, br#"[{"T":"t","S":"AAPL","p":187.5}]"#.to_vec());

    let (auth, subscribe) = seen_rx.recv().await.unwrap();
    let auth: serde_json::Value = serde_json::from_str(&auth).unwrap();
    assert_eq!(auth, serde_json::json!({"action": "auth", "key": "AKTEST", "secret": "SKTEST"}));
    let subscribe: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(subscribe["action"], "subscribe");
    assert_eq!(subscribe["trades"], serde_json::json!(["AAPL", "MSFT"]));
    assert_eq!(subscribe["quotes"], serde_json::json!(["AAPL", "MSFT"]));

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_matches!(session.receive().await, Err(Error::Session(_)));
}

#[tokio::test]
async fn auth_error_closes_without_subscribing() {
    let (after_tx, mut after_rx) = mpsc::unbounded_channel();
    let url = spawn_feed(move |_, mut ws| {
        let after_tx = after_tx.clone();
        async move {
            ws.send(Message::Text(GREETING.into())).await.unwrap();
            let _auth = next_text(&mut ws).await;
            ws.send(Message::Text(AUTH_FAILED.into())).await.unwrap();
            let after = tokio::time::timeout(Duration::from_secs(1), next_text(&mut ws)).await;
            let _ = after_tx.send(after.ok().flatten());
        }
    })
    .await;

    let result = open(&url, &fast_timing()).await;
    assert_matches!(result, Err(Error::Auth(msg)) if msg.contains("auth failed"));
    assert_eq!(after_rx.recv().await.unwrap(), None, "no subscribe may follow a rejected auth");
}

#[tokio::test]
async fn missing_greeting_is_a_session_error() {
    let url = spawn_feed(|_, mut ws| async move {
        let _ = ws.close(None).await;
    })
    .await;

    assert_matches!(open(&url, &fast_timing()).await, Err(Error::Session(msg)) if msg.contains("welcome"));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connect_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert_matches!(open(&format!("ws://{}", addr), &fast_timing()).await, Err(Error::Connect(_)));
}

#[tokio::test]
async fn silent_feed_hits_read_deadline() {
    let url = spawn_feed(|_, mut ws| async move {
        accept_handshake(&mut ws).await;
        // Stop reading: pings go unanswered and nothing else is sent.
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(ws);
    })
    .await;

    let mut session = open(&url, &fast_timing()).await.expect("open");
    let started = tokio::time::Instant::now();
    assert_matches!(session.receive().await, Err(Error::Session(msg)) if msg.contains("no traffic"));
    assert!(started.elapsed() < Duration::from_secs(2));
    session.close().await;
}

#[tokio::test]
async fn pongs_keep_a_quiet_session_alive() {
    let url = spawn_feed(|_, mut ws| async move {
        accept_handshake(&mut ws).await;
        // Read (and so pong) for well past the read deadline before sending data.
        let until = tokio::time::Instant::now() + Duration::from_millis(1_200);
        while let Ok(Some(_)) = tokio::time::timeout_at(until, ws.next()).await {}
        ws.send(Message::Text(r#"{"T":"q","S":"MSFT"}"#.into())).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let mut session = open(&url, &fast_timing()).await.expect("open");
    let payload = session.receive().await.expect("payload after quiet period");
    assert_eq!(payload, br#"{"T":"q","S":"MSFT"}"#.to_vec());
    assert!(session.pings_sent() > 0);
    session.close().await;
}

#[tokio::test]
async fn remote_close_ends_the_stream() {
    let url = spawn_feed(|_, mut ws| async move {
        accept_handshake(&mut ws).await;
        let _ = ws.close(None).await;
    })
    .await;

    let mut session = open(&url, &fast_timing()).await.expect("open");
    assert_matches!(session.receive().await, Err(Error::Session(_)));
    session.close().await;
}

#[tokio::test]
async fn no_pings_after_close() {
    let pings = Arc::new(AtomicUsize::new(0));
    let server_pings = Arc::clone(&pings);
    let url = spawn_feed(move |_, mut ws| {
        let pings = Arc::clone(&server_pings);
        async move {
            accept_handshake(&mut ws).await;
            while let Some(Ok(frame)) = ws.next().await {
                if let Message::Ping(_) = frame {
                    pings.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    })
    .await;

    let timing = SessionTiming { read_deadline: Duration::from_secs(5), ..fast_timing() };
    let mut session = open(&url, &timing).await.expect("open");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(session.pings_sent() >= 2);

    session.close().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let at_close = pings.load(Ordering::SeqCst);
    assert!(at_close >= 2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(pings.load(Ordering::SeqCst), at_close);
    assert_eq!(session.state(), SessionState::Closed);
}
