//! Primitive engines and the registry that compiles and caches them

mod primitive;
mod registry;

pub use primitive::PrimitiveEngine;
pub use registry::{Registry, RegistryStats};
