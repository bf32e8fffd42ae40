//! Service layer
//!
//! Background threads that drive the alerting engine.

pub mod runtime;

pub use runtime::{EngineRuntime, RuntimeConfig};
