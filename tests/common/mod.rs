//! Scripted local WebSocket feed used as the stub endpoint in integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use marketbridge::market_data::{Credentials, SessionTiming, Subscription};

pub type ServerWs = WebSocketStream<TcpStream>;

pub const GREETING: &str = r#"[{"T":"success","msg":"connected"}]"#;
pub const AUTH_OK: &str = r#"[{"T":"success","msg":"authenticated"}]"#;
pub const AUTH_FAILED: &str = r#"[{"T":"error","code":402,"msg":"auth failed"}]"#;

/// Accept connections forever, running `handler` for each with its 1-based index.
pub async fn spawn_feed<F, Fut>(handler: F) -> String
where
    F: Fn(usize, ServerWs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let mut index = 0;
        while let Ok((tcp, _)) = listener.accept().await {
            index += 1;
            if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                tokio::spawn(handler(index, ws));
            }
        }
    });
    format!("ws://{}", addr)
}

/// Next text frame, skipping control frames. `None` on close, error or end of stream.
pub async fn next_text(ws: &mut ServerWs) -> Option<String> {
    while let Some(frame) = ws.next().await {
        match frame {
            | Ok(Message::Text(text)) => return Some(text),
            | Ok(Message::Close(_)) | Err(_) => return None,
            | Ok(_) => continue,
        }
    }
    None
}

/// Greeting, successful auth, subscribe. Returns the auth and subscribe requests.
pub async fn accept_handshake(ws: &mut ServerWs) -> (String, String) {
    ws.send(Message::Text(GREETING.into())).await.expect("send greeting");
    let auth = next_text(ws).await.expect("auth request");
    ws.send(Message::Text(AUTH_OK.into())).await.expect("send auth ok");
    let subscribe = next_text(ws).await.expect("subscribe request");
    (auth, subscribe)
}

/// Keep reading (and so answering pings) until the client goes away.
pub async fn drain(ws: &mut ServerWs) {
    while ws.next().await.is_some() {}
}

pub fn credentials() -> Credentials {
    Credentials::new("AKTEST", "SKTEST")
}

pub fn subscription() -> Subscription {
    Subscription::trades_and_quotes(&["AAPL".to_string(), "MSFT".to_string()])
}

/// Short timings so liveness behavior shows up within a test run.
pub fn fast_timing() -> SessionTiming {
    SessionTiming {
        handshake_timeout: Duration::from_secs(2),
        ping_interval: Duration::from_millis(50),
        ping_timeout: Duration::from_millis(200),
        read_deadline: Duration::from_millis(400),
    }
}
