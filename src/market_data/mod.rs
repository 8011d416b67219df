//! Feed side of the bridge: wire protocol, session lifecycle and envelope normalization.

pub mod envelope;
pub mod heartbeat;
pub mod protocol;
pub mod session;

pub use envelope::{normalize, partition_key, Envelope, UNKNOWN_KEY};
pub use protocol::{Credentials, Subscription};
pub use session::{FeedSession, SessionState, SessionTiming};
