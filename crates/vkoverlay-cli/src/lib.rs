//! Support code for the `vkoverlay` tool.

pub mod manifest;
pub mod report;
