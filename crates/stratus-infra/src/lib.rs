//! Stratus Infrastructure Library
//!
//! Shared infrastructure for Stratus binaries:
//! - Telemetry initialization
//! - Error response serialization

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat, TelemetryConfig};

pub use error::ErrorResponse;
