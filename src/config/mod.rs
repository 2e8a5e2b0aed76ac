//! Configuration module for HashBridge
//!
//! Provides the runtime configuration (sandbox toggle, memory limits) and
//! the catalogue of supported hash algorithms.

mod settings;

pub use settings::*;
