//! Logging setup for the converge operator.
//!
//! A [`Tracing`] value describes which sinks receive log events. Calling
//! [`Tracing::init`] installs them as the global subscriber.
pub mod tracing;

pub use tracing::{Error, LogFormat, RotationPeriod, TelemetryOptions, Tracing};
