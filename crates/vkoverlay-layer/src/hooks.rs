//! Name → hook table behind `vkGetInstanceProcAddr` / `vkGetDeviceProcAddr`.
//!
//! Anything not in the table resolves through the next layer, so the
//! application sees exactly the pointer it would have seen without us.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::OnceLock;

use ash::vk;
use ash::vk::Handle;
use tracing::debug;

use crate::context::LayerContext;
use crate::{device, instance, present, swapchain};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookScope {
    /// Reachable only through `vkGetInstanceProcAddr`.
    Instance,
    /// Reachable through both proc-addr entry points.
    Device,
}

#[derive(Clone, Copy)]
pub struct Hook {
    pub scope: HookScope,
    pub function: unsafe extern "system" fn(),
}

macro_rules! hook {
    ($table:ident, $scope:ident, $name:literal, $f:path) => {
        $table.insert(
            $name,
            Hook {
                scope: HookScope::$scope,
                function: unsafe { std::mem::transmute::<*const (), unsafe extern "system" fn()>($f as *const ()) },
            },
        );
    };
}

fn table() -> &'static HashMap<&'static str, Hook> {
    static TABLE: OnceLock<HashMap<&'static str, Hook>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = HashMap::new();
        hook!(t, Instance, "vkGetInstanceProcAddr", crate::vkGetInstanceProcAddr);
        hook!(t, Instance, "vkCreateInstance", instance::create_instance);
        hook!(t, Instance, "vkDestroyInstance", instance::destroy_instance);
        hook!(t, Instance, "vkEnumeratePhysicalDevices", instance::enumerate_physical_devices);
        hook!(t, Instance, "vkEnumerateInstanceLayerProperties", instance::enumerate_instance_layer_properties);
        hook!(t, Instance, "vkEnumerateInstanceExtensionProperties", instance::enumerate_instance_extension_properties);
        hook!(t, Instance, "vkEnumerateDeviceLayerProperties", instance::enumerate_device_layer_properties);
        hook!(t, Instance, "vkEnumerateDeviceExtensionProperties", instance::enumerate_device_extension_properties);
        hook!(t, Instance, "vkCreateDevice", device::create_device);

        hook!(t, Device, "vkGetDeviceProcAddr", crate::vkGetDeviceProcAddr);
        hook!(t, Device, "vkDestroyDevice", device::destroy_device);
        hook!(t, Device, "vkGetDeviceQueue", device::get_device_queue);
        hook!(t, Device, "vkGetDeviceQueue2", device::get_device_queue2);
        hook!(t, Device, "vkCreateSwapchainKHR", swapchain::create_swapchain);
        hook!(t, Device, "vkDestroySwapchainKHR", swapchain::destroy_swapchain);
        hook!(t, Device, "vkQueuePresentKHR", present::queue_present);
        t
    })
}

fn lookup(name: &CStr) -> Option<&'static Hook> {
    name.to_str().ok().and_then(|name| table().get(name))
}

/// Any intercepted function, as seen through `vkGetInstanceProcAddr`.
pub fn instance_hook(name: &CStr) -> Option<unsafe extern "system" fn()> {
    lookup(name).map(|hook| hook.function)
}

/// Device-scope intercepted function, as seen through `vkGetDeviceProcAddr`.
pub fn device_hook(name: &CStr) -> Option<unsafe extern "system" fn()> {
    lookup(name)
        .filter(|hook| hook.scope == HookScope::Device)
        .map(|hook| hook.function)
}

/// Every intercepted function name with its scope.
pub fn intercepted() -> impl Iterator<Item = (&'static str, HookScope)> {
    table().iter().map(|(name, hook)| (*name, hook.scope))
}

impl LayerContext {
    pub unsafe fn get_instance_proc_addr(&self, instance: vk::Instance, name: &CStr) -> vk::PFN_vkVoidFunction {
        if let Some(f) = instance_hook(name) {
            return Some(f);
        }
        if instance == vk::Instance::null() {
            return None;
        }
        match self.instances.get(instance) {
            Ok(record) => record.dispatch.get_instance_proc_addr(instance, name.as_ptr()),
            Err(_) => {
                debug!("{:?} requested on unknown instance {:#x}", name, instance.as_raw());
                None
            }
        }
    }

    pub unsafe fn get_device_proc_addr(&self, device: vk::Device, name: &CStr) -> vk::PFN_vkVoidFunction {
        if device == vk::Device::null() {
            return None;
        }
        if let Some(f) = device_hook(name) {
            return Some(f);
        }
        match self.devices.get(device) {
            Ok(record) => record.dispatch.get_device_proc_addr(device, name.as_ptr()),
            Err(_) => {
                debug!("{:?} requested on unknown device {:#x}", name, device.as_raw());
                None
            }
        }
    }
}
