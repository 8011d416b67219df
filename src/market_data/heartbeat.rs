//! Session-scoped ping task.

use futures_util::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const PING_PAYLOAD: &[u8] = b"ping";

/// Sends a WebSocket ping on a fixed interval until cancelled.
///
/// The task shares the write half of the connection with its session through
/// a mutex; the session keeps the read half. Dropping the handle cancels the
/// task, and [`Heartbeat::stop`] additionally waits for it to finish so no
/// ping can go out afterwards.
pub struct Heartbeat {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    pings_sent: Arc<AtomicU64>,
}

impl Heartbeat {
    pub fn spawn<S>(sink: Arc<Mutex<S>>, interval: Duration, ping_timeout: Duration) -> Self
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let pings_sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&pings_sent);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let ping = async {
                            sink.lock().await.send(Message::Ping(PING_PAYLOAD.to_vec())).await
                        };
                        match tokio::time::timeout(ping_timeout, ping).await {
                            | Ok(Ok(())) => {
                                counter.fetch_add(1, Ordering::Relaxed);
                            }
                            | Ok(Err(e)) => log::warn!("heartbeat ping failed: {}", e),
                            | Err(_) => log::warn!("heartbeat ping timed out after {:?}", ping_timeout),
                        }
                    }
                }
            }
            log::debug!("heartbeat stopped");
        });

        Self { token, handle: Some(handle), pings_sent }
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }

    /// Cancel the task and wait until it has exited.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::warn!("heartbeat task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
