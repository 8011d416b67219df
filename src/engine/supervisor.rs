//! Session supervisor: the reconnect loop driving feed → codec → publisher.

use std::convert::Infallible;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use tokio::time::Instant;

use super::backoff::BackoffPolicy;
use crate::config::Config;
use crate::market_data::{normalize, Credentials, FeedSession, SessionTiming, Subscription};
use crate::publisher::Publisher;
use crate::utils::error::{Error, Result};

/// Everything needed to open a feed session and label its envelopes.
#[derive(Debug, Clone)]
pub struct FeedTarget {
    pub endpoint: String,
    pub credentials: Credentials,
    pub subscription: Subscription,
    pub timing: SessionTiming,
    pub source: String,
    pub feed: String,
}

impl FeedTarget {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            endpoint: config.feed_url(),
            credentials: config.credentials()?,
            subscription: config.subscription(),
            timing: config.session_timing(),
            source: config.feed.source.clone(),
            feed: config.feed_name(),
        })
    }
}

/// How one session ended.
#[derive(Debug)]
pub struct SessionFailure {
    pub error: Error,
    /// Time spent streaming; `None` when the handshake never completed.
    pub streamed_for: Option<Duration>,
    pub published: u64,
}

pub struct Supervisor<P> {
    target: FeedTarget,
    publisher: P,
    policy: BackoffPolicy,
}

impl<P: Publisher> Supervisor<P> {
    pub fn new(target: FeedTarget, publisher: P, policy: BackoffPolicy) -> Self {
        Self { target, publisher, policy }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Reconnect forever. Every failure kind, authentication included, is
    /// handled the same way: log, back off, open a fresh session.
    pub async fn run(&self) {
        let mut backoff = self.policy.start();
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let failure = self.run_session().await;
            let delay = self.policy.delay_after(&mut backoff, &failure.error, failure.streamed_for);
            warn!(
                "stream ended (attempt {}, kind={}, published={}): {}; reconnecting in {:?}",
                attempt,
                failure.error.kind(),
                failure.published,
                failure.error,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Open one session and pump it until it fails. The session is always
    /// closed before this returns.
    pub async fn run_session(&self) -> SessionFailure {
        let target = &self.target;
        let mut session =
            match FeedSession::open(&target.endpoint, &target.credentials, &target.subscription, &target.timing)
                .await
            {
                | Ok(session) => session,
                | Err(error) => return SessionFailure { error, streamed_for: None, published: 0 },
            };

        info!("streaming {} into publisher", target.endpoint);
        let started = Instant::now();
        let mut published = 0;
        let error = match self.pump(&mut session, &mut published).await {
            | Ok(never) => match never {},
            | Err(error) => error,
        };
        session.close().await;

        SessionFailure { error, streamed_for: Some(started.elapsed()), published }
    }

    async fn pump(&self, session: &mut FeedSession, published: &mut u64) -> Result<Infallible> {
        loop {
            let payload = session.receive().await?;
            let ingest_timestamp_ms = Utc::now().timestamp_millis();
            for envelope in normalize(&payload, &self.target.source, &self.target.feed, ingest_timestamp_ms) {
                let key = envelope.partition_key();
                self.publisher.publish(&envelope, &key).await?;
                *published += 1;
            }
        }
    }
}
