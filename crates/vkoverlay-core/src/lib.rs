//! Driver-independent building blocks for the vkoverlay layer: errors,
//! configuration and the handle registry.

pub mod config;
pub mod error;
pub mod registry;

pub use config::LayerConfig;
pub use error::LayerError;
pub use registry::Registry;
