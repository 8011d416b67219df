//! Reconnect loop and its backoff schedule.

pub mod backoff;
pub mod supervisor;

pub use backoff::{Backoff, BackoffPolicy};
pub use supervisor::{FeedTarget, SessionFailure, Supervisor};
