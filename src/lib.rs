//! # marketbridge
//! Bridges a real-time market-data WebSocket feed onto a partitioned Kafka topic.
//!
//! [`engine::Supervisor`] keeps one [`market_data::FeedSession`] alive,
//! normalizes every inbound frame into [`market_data::Envelope`]s and hands
//! them, keyed by symbol, to a [`publisher::Publisher`].

pub use crate::utils::error::{Error, Result};

pub mod config;
pub mod engine;
pub mod market_data;
pub mod publisher;
pub mod utils;
