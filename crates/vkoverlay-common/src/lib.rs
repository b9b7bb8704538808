pub mod logging;
pub mod platform;

pub use logging::init_logging;

/// Name the layer is registered under in its loader manifest.
pub const LAYER_NAME: &str = "VK_LAYER_VKOVERLAY_overlay";

/// Human-readable description reported to the loader.
pub const LAYER_DESCRIPTION: &str = "Composites an overlay into every presented frame";

/// Layer implementation version reported to the loader.
pub const LAYER_IMPLEMENTATION_VERSION: u32 = 1;
