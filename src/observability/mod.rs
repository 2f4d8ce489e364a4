//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//!
//! Tracing is initialised by the binary; the library only emits events and spans.

pub mod metrics;

pub use metrics::*;
