//! vkoverlay explicit layer.
//!
//! Loaded by the Vulkan loader between an application and the driver. Every
//! `vkQueuePresentKHR` gets an extra submission that draws the overlay into
//! the presented image before it reaches the display.
//!
//! The loader finds us through `vkNegotiateLoaderLayerInterfaceVersion` (or,
//! for old loaders, the exported `vkGetInstanceProcAddr`); everything else is
//! reached through the proc-addr functions.

pub mod chain;
pub mod context;
pub mod device;
pub mod dispatch;
pub mod hooks;
pub mod instance;
pub mod overlay;
pub mod present;
pub mod swapchain;

use std::ffi::{c_char, c_void, CStr};
use std::sync::OnceLock;

use ash::vk;
use tracing::info;
use vkoverlay_core::LayerConfig;

pub use context::{report_invariant_violation, LayerContext};
pub use dispatch::{DeviceDispatch, DispatchLoader, InstanceDispatch, NextLayerLoader};
pub use overlay::{BadgePainter, FrameContext, OverlayPainter};

/// Loader/layer interface version this layer implements.
pub const LAYER_INTERFACE_VERSION: u32 = 2;

/// `LAYER_NEGOTIATE_INTERFACE_STRUCT`
const NEGOTIATE_INTERFACE_STRUCT: u32 = 1;

static CONTEXT: OnceLock<LayerContext> = OnceLock::new();

/// The process-wide layer context, created on the first loader call.
pub fn context() -> &'static LayerContext {
    CONTEXT.get_or_init(|| {
        let config = LayerConfig::from_environment();
        vkoverlay_common::init_logging(&config.logging.filter);
        info!(
            "{} loaded (overlay {})",
            vkoverlay_common::LAYER_NAME,
            if config.overlay.enabled { "enabled" } else { "disabled" }
        );
        LayerContext::new(config, Box::new(NextLayerLoader))
    })
}

/// `VkNegotiateLayerInterface`
#[repr(C)]
pub struct NegotiateLayerInterface {
    pub s_type: u32,
    pub p_next: *mut c_void,
    pub loader_layer_interface_version: u32,
    pub pfn_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub pfn_get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
    pub pfn_get_physical_device_proc_addr: Option<chain::PfnGetPhysicalDeviceProcAddr>,
}

#[no_mangle]
pub unsafe extern "system" fn vkNegotiateLoaderLayerInterfaceVersion(
    p_version_struct: *mut NegotiateLayerInterface,
) -> vk::Result {
    context();
    if p_version_struct.is_null() || (*p_version_struct).s_type != NEGOTIATE_INTERFACE_STRUCT {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let negotiate = &mut *p_version_struct;
    if negotiate.loader_layer_interface_version >= LAYER_INTERFACE_VERSION {
        negotiate.loader_layer_interface_version = LAYER_INTERFACE_VERSION;
        negotiate.pfn_get_instance_proc_addr = Some(vkGetInstanceProcAddr);
        negotiate.pfn_get_device_proc_addr = Some(vkGetDeviceProcAddr);
        negotiate.pfn_get_physical_device_proc_addr = None;
    }
    info!(
        "negotiated loader interface version {}",
        negotiate.loader_layer_interface_version
    );
    vk::Result::SUCCESS
}

#[no_mangle]
pub unsafe extern "system" fn vkGetInstanceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    context().get_instance_proc_addr(instance, CStr::from_ptr(p_name))
}

#[no_mangle]
pub unsafe extern "system" fn vkGetDeviceProcAddr(
    device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    context().get_device_proc_addr(device, CStr::from_ptr(p_name))
}
