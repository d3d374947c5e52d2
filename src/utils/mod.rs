//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: tracing-subscriber setup from configuration
//! - **Metrics**: thread-safe traffic and connection counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
