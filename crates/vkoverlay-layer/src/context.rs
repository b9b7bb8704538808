//! The layer context: every registry plus the collaborators hooks need.
//!
//! One context lives for the life of the process behind [`crate::context`].
//! Tests build their own with a fake [`DispatchLoader`].

use ash::vk;
use tracing::{debug, error, warn};
use vkoverlay_core::{LayerConfig, LayerError, Registry};

use crate::device::{DeviceRecord, QueueRecord};
use crate::dispatch::DispatchLoader;
use crate::instance::{InstanceRecord, PhysicalDeviceRecord};
use crate::overlay::{BadgePainter, OverlayPainter};
use crate::swapchain::SwapchainRecord;

pub struct LayerContext {
    pub(crate) config: LayerConfig,
    pub(crate) loader: Box<dyn DispatchLoader>,
    pub(crate) painter: Box<dyn OverlayPainter>,
    pub(crate) instances: Registry<vk::Instance, InstanceRecord>,
    pub(crate) physical_devices: Registry<vk::PhysicalDevice, PhysicalDeviceRecord>,
    pub(crate) devices: Registry<vk::Device, DeviceRecord>,
    pub(crate) queues: Registry<vk::Queue, QueueRecord>,
    pub(crate) swapchains: Registry<vk::SwapchainKHR, SwapchainRecord>,
}

impl LayerContext {
    /// Context that paints the configured badge.
    pub fn new(config: LayerConfig, loader: Box<dyn DispatchLoader>) -> Self {
        let painter = Box::new(BadgePainter::new(config.overlay.clone()));
        Self {
            config,
            loader,
            painter,
            instances: Registry::new("VkInstance"),
            physical_devices: Registry::new("VkPhysicalDevice"),
            devices: Registry::new("VkDevice"),
            queues: Registry::new("VkQueue"),
            swapchains: Registry::new("VkSwapchainKHR"),
        }
    }

    pub fn with_painter(mut self, painter: Box<dyn OverlayPainter>) -> Self {
        self.painter = painter;
        self
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn instances(&self) -> &Registry<vk::Instance, InstanceRecord> {
        &self.instances
    }

    pub fn physical_devices(&self) -> &Registry<vk::PhysicalDevice, PhysicalDeviceRecord> {
        &self.physical_devices
    }

    pub fn devices(&self) -> &Registry<vk::Device, DeviceRecord> {
        &self.devices
    }

    pub fn queues(&self) -> &Registry<vk::Queue, QueueRecord> {
        &self.queues
    }

    pub fn swapchains(&self) -> &Registry<vk::SwapchainKHR, SwapchainRecord> {
        &self.swapchains
    }

    /// Convert a hook's error into the result handed back to the caller.
    pub fn fail(&self, hook: &str, err: LayerError) -> vk::Result {
        match &err {
            LayerError::Driver(result) => debug!("{hook}: next layer returned {result:?}"),
            LayerError::HandleNotFound { .. } => report_invariant_violation(&err),
            LayerError::LoaderProtocol(_) => error!("{hook}: {err}"),
            _ => warn!("{hook}: {err}"),
        }
        err.to_vk_result()
    }
}

/// A lookup missed a handle some creation hook should have registered.
///
/// Fatal in debug builds. Release builds log it and let the caller fall back
/// to its documented result so the host keeps running.
pub fn report_invariant_violation(err: &LayerError) {
    error!("internal invariant violated: {err}");
    debug_assert!(false, "internal invariant violated: {err}");
}
