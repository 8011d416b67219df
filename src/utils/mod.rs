//! Error type and log setup shared by the library and the binary.

pub mod error;
mod logging;

pub use error::{Error, Result};
pub use logging::{default_filter, init_logging, short_target};
