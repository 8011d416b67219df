//! One authenticated streaming connection to the market-data feed.
//!
//! A session walks `Connecting → AwaitingGreeting → Authenticating →
//! Subscribing → Streaming` inside [`FeedSession::open`] and ends in `Closed`.
//! It never retries anything itself; every failure is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::heartbeat::Heartbeat;
use super::protocol::{is_error_response, AuthRequest, Credentials, SubscribeRequest, Subscription};
use crate::utils::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingGreeting,
    Authenticating,
    Subscribing,
    Streaming,
    Closed,
}

/// Connection and liveness timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTiming {
    pub handshake_timeout: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    /// Maximum silence on the read side before the session is declared dead.
    pub read_deadline: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(5),
            read_deadline: Duration::from_secs(60),
        }
    }
}

pub struct FeedSession {
    state: SessionState,
    sink: Arc<Mutex<WsSink>>,
    stream: SplitStream<WsStream>,
    heartbeat: Option<Heartbeat>,
    timing: SessionTiming,
    deadline: Instant,
}

impl std::fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("state", &self.state)
            .field("timing", &self.timing)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl FeedSession {
    /// Connect, authenticate and subscribe. On success the session is streaming
    /// and its heartbeat is running.
    pub async fn open(
        endpoint: &str,
        credentials: &Credentials,
        subscription: &Subscription,
        timing: &SessionTiming,
    ) -> Result<Self> {
        debug!("feed session {:?}: {}", SessionState::Connecting, endpoint);
        let ws = connect(endpoint, timing.handshake_timeout).await?;
        let (sink, stream) = ws.split();

        let mut session = Self {
            state: SessionState::AwaitingGreeting,
            sink: Arc::new(Mutex::new(sink)),
            stream,
            heartbeat: None,
            timing: timing.clone(),
            deadline: Instant::now() + timing.read_deadline,
        };

        if let Err(e) = session.handshake(credentials, subscription).await {
            session.close().await;
            return Err(e);
        }

        session.heartbeat = Some(Heartbeat::spawn(
            Arc::clone(&session.sink),
            timing.ping_interval,
            timing.ping_timeout,
        ));
        session.transition(SessionState::Streaming);
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pings_sent(&self) -> u64 {
        self.heartbeat.as_ref().map_or(0, Heartbeat::pings_sent)
    }

    /// Next text or binary frame. Control frames are consumed here and only
    /// extend the read deadline.
    pub async fn receive(&mut self) -> Result<Vec<u8>> {
        if self.state != SessionState::Streaming {
            return Err(Error::Session(format!("session is {:?}, not streaming", self.state)));
        }
        self.read_data().await.map_err(Error::Session)
    }

    /// Stop the heartbeat, then close the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        let wait = self.timing.ping_timeout;
        let sink = Arc::clone(&self.sink);
        let closing = async move { sink.lock().await.close().await };
        match tokio::time::timeout(wait, closing).await {
            | Ok(Ok(())) => {}
            | Ok(Err(e)) => debug!("close frame not delivered: {}", e),
            | Err(_) => debug!("close frame timed out"),
        }
        self.transition(SessionState::Closed);
    }

    async fn handshake(&mut self, credentials: &Credentials, subscription: &Subscription) -> Result<()> {
        // The feed rejects auth sent before its greeting has been read.
        let greeting = self
            .read_data()
            .await
            .map_err(|e| Error::Session(format!("read welcome failed: {}", e)))?;
        info!("< {}", String::from_utf8_lossy(&greeting));

        self.transition(SessionState::Authenticating);
        self.send_json(&AuthRequest::new(credentials))
            .await
            .map_err(|e| Error::Handshake(format!("auth send failed: {}", e)))?;
        let response = self
            .read_data()
            .await
            .map_err(|e| Error::Session(format!("auth response read failed: {}", e)))?;
        let response = String::from_utf8_lossy(&response);
        info!("< {}", response);
        if is_error_response(&response) {
            return Err(Error::Auth(format!("feed rejected credentials: {}", response)));
        }

        self.transition(SessionState::Subscribing);
        self.send_json(&SubscribeRequest::new(subscription))
            .await
            .map_err(|e| Error::Handshake(format!("subscribe send failed: {}", e)))?;
        info!("> subscribed trades={:?} quotes={:?}", subscription.trades, subscription.quotes);
        if !subscription.bars.is_empty() {
            info!("> subscribed bars={:?}", subscription.bars);
        }
        Ok(())
    }

    async fn send_json<T: Serialize>(&self, message: &T) -> std::result::Result<(), String> {
        let text = serde_json::to_string(message).map_err(|e| e.to_string())?;
        self.sink.lock().await.send(Message::Text(text)).await.map_err(|e| e.to_string())
    }

    async fn read_data(&mut self) -> std::result::Result<Vec<u8>, String> {
        loop {
            let frame = match tokio::time::timeout_at(self.deadline, self.stream.next()).await {
                | Err(_) => return Err(format!("no traffic for {:?}", self.timing.read_deadline)),
                | Ok(None) => return Err("connection closed".to_string()),
                | Ok(Some(Err(e))) => return Err(e.to_string()),
                | Ok(Some(Ok(frame))) => frame,
            };
            self.deadline = Instant::now() + self.timing.read_deadline;
            match frame {
                | Message::Text(text) => return Ok(text.into_bytes()),
                | Message::Binary(bytes) => return Ok(bytes),
                | Message::Close(Some(frame)) => {
                    return Err(format!("closed by remote: {} {}", u16::from(frame.code), frame.reason))
                }
                | Message::Close(None) => return Err("closed by remote".to_string()),
                | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("feed session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            warn!("feed session dropped in state {:?} without close", self.state);
        }
    }
}

async fn connect(endpoint: &str, timeout: Duration) -> Result<WsStream> {
    match tokio::time::timeout(timeout, connect_async(endpoint)).await {
        | Err(_) => Err(Error::Connect(format!("ws dial to {} timed out after {:?}", endpoint, timeout))),
        | Ok(Err(tungstenite::Error::Http(resp))) => {
            Err(Error::Connect(format!("ws dial to {} failed (http={})", endpoint, resp.status())))
        }
        | Ok(Err(e)) => Err(Error::Connect(format!("ws dial to {} failed: {}", endpoint, e))),
        | Ok(Ok((ws, _))) => Ok(ws),
    }
}
