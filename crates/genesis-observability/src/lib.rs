//! Genesis Observability
//!
//! Logging setup shared by the relay binary and its tests.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::LoggingConfig;
pub use error::{ObservabilityError, Result};
pub use logging::{create_bridge_span, create_request_span, LogManager};
