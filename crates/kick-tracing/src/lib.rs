//! Tracing setup shared by kick-proxy binaries: fmt/JSON logging, optional
//! OTLP export, and span builders for the dispatch path.

pub mod config;
pub mod otlp;
pub mod spans;

pub use config::{LogFormat, OtlpProtocol, TracingConfig};
pub use otlp::{init_tracing, TracingGuard};
