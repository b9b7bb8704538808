//! Instance-scope hooks: creation and destruction, physical-device
//! ownership, and the layer/extension property queries.

use std::ffi::{c_char, CStr};
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use tracing::{debug, info, warn};
use vkoverlay_common::{LAYER_DESCRIPTION, LAYER_IMPLEMENTATION_VERSION, LAYER_NAME};
use vkoverlay_core::LayerError;

use crate::chain::InstanceLinkNode;
use crate::context::LayerContext;
use crate::dispatch::{resolve, InstanceDispatch};

/// Dispatch table for one instance created through this layer.
pub struct InstanceRecord {
    pub dispatch: Arc<dyn InstanceDispatch>,
}

/// Which instance a physical device was enumerated from.
#[derive(Debug, Clone, Copy)]
pub struct PhysicalDeviceRecord {
    pub instance: vk::Instance,
}

impl LayerContext {
    pub unsafe fn create_instance(
        &self,
        p_create_info: *const vk::InstanceCreateInfo<'_>,
        p_allocator: *const vk::AllocationCallbacks<'_>,
        p_instance: *mut vk::Instance,
    ) -> Result<(), LayerError> {
        if p_create_info.is_null() || p_instance.is_null() {
            return Err(LayerError::LoaderProtocol("vkCreateInstance called with null pointers"));
        }
        let link = InstanceLinkNode::find(p_create_info)
            .ok_or(LayerError::LoaderProtocol("no layer link node in VkInstanceCreateInfo chain"))?;
        let gipa = link.next_get_instance_proc_addr();
        let create: Option<vk::PFN_vkCreateInstance> =
            resolve!(gipa, vk::Instance::null(), "vkCreateInstance");
        let create =
            create.ok_or(LayerError::LoaderProtocol("next layer does not expose vkCreateInstance"))?;

        link.advance();
        create(p_create_info, p_allocator, p_instance).result()?;

        let instance = *p_instance;
        let dispatch = self.loader.load_instance(instance, gipa);
        self.instances.insert(instance, InstanceRecord { dispatch });
        info!("instance {:#x} created", instance.as_raw());
        Ok(())
    }

    pub unsafe fn destroy_instance(
        &self,
        instance: vk::Instance,
        p_allocator: *const vk::AllocationCallbacks<'_>,
    ) -> Result<(), LayerError> {
        if instance == vk::Instance::null() {
            return Ok(());
        }
        let record = self.instances.get(instance)?;
        record.dispatch.destroy_instance(instance, p_allocator);
        self.instances.remove(instance)?;
        self.physical_devices.retain(|_, pd| pd.instance != instance);
        info!("instance {:#x} destroyed", instance.as_raw());
        Ok(())
    }

    pub unsafe fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        p_count: *mut u32,
        p_devices: *mut vk::PhysicalDevice,
    ) -> Result<vk::Result, LayerError> {
        let record = self.instances.get(instance)?;
        let result = record.dispatch.enumerate_physical_devices(instance, p_count, p_devices);
        match result {
            vk::Result::SUCCESS | vk::Result::INCOMPLETE => {}
            err => return Err(LayerError::Driver(err)),
        }
        if !p_devices.is_null() && !p_count.is_null() {
            for &physical_device in std::slice::from_raw_parts(p_devices, *p_count as usize) {
                if !self.physical_devices.contains(physical_device) {
                    self.physical_devices
                        .insert(physical_device, PhysicalDeviceRecord { instance });
                }
            }
        }
        Ok(result)
    }

    /// Instance a physical device belongs to. Devices reached through entry
    /// points this layer does not hook fall back to the only live instance.
    pub fn owner_instance(&self, physical_device: vk::PhysicalDevice) -> Option<vk::Instance> {
        if let Ok(record) = self.physical_devices.get(physical_device) {
            return Some(record.instance);
        }
        let instances = self.instances.handles_where(|_| true);
        match instances.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub unsafe fn enumerate_device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        p_layer_name: *const c_char,
        p_count: *mut u32,
        p_properties: *mut vk::ExtensionProperties,
    ) -> Result<vk::Result, LayerError> {
        if is_this_layer(p_layer_name) {
            return Ok(write_no_extensions(p_count));
        }
        let instance = self.owner_instance(physical_device).ok_or(LayerError::LoaderProtocol(
            "vkEnumerateDeviceExtensionProperties on an unknown physical device",
        ))?;
        let record = self.instances.get(instance)?;
        Ok(record.dispatch.enumerate_device_extension_properties(
            physical_device,
            p_layer_name,
            p_count,
            p_properties,
        ))
    }
}

// ── Layer properties ────────────────────────────────────────────────────────

pub fn layer_properties() -> vk::LayerProperties {
    let mut props = vk::LayerProperties {
        spec_version: vk::API_VERSION_1_3,
        implementation_version: LAYER_IMPLEMENTATION_VERSION,
        ..Default::default()
    };
    copy_c_str(&mut props.layer_name, LAYER_NAME);
    copy_c_str(&mut props.description, LAYER_DESCRIPTION);
    props
}

/// Two-call enumeration of the single layer this module provides.
pub unsafe fn write_layer_properties(p_count: *mut u32, p_properties: *mut vk::LayerProperties) -> vk::Result {
    if p_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    if p_properties.is_null() {
        *p_count = 1;
        return vk::Result::SUCCESS;
    }
    if *p_count == 0 {
        return vk::Result::INCOMPLETE;
    }
    *p_properties = layer_properties();
    *p_count = 1;
    vk::Result::SUCCESS
}

/// The layer provides no extensions of its own.
pub unsafe fn write_no_extensions(p_count: *mut u32) -> vk::Result {
    if p_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    *p_count = 0;
    vk::Result::SUCCESS
}

pub unsafe fn is_this_layer(p_layer_name: *const c_char) -> bool {
    !p_layer_name.is_null() && CStr::from_ptr(p_layer_name).to_bytes() == LAYER_NAME.as_bytes()
}

fn copy_c_str(dst: &mut [c_char], src: &str) {
    let len = src.len().min(dst.len() - 1);
    for (d, s) in dst.iter_mut().zip(&src.as_bytes()[..len]) {
        *d = *s as c_char;
    }
    dst[len] = 0;
}

// ── Hooks ───────────────────────────────────────────────────────────────────

pub(crate) unsafe extern "system" fn create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let ctx = crate::context();
    match ctx.create_instance(p_create_info, p_allocator, p_instance) {
        Ok(()) => vk::Result::SUCCESS,
        Err(e) => ctx.fail("vkCreateInstance", e),
    }
}

pub(crate) unsafe extern "system" fn destroy_instance(
    instance: vk::Instance,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    let ctx = crate::context();
    if let Err(e) = ctx.destroy_instance(instance, p_allocator) {
        ctx.fail("vkDestroyInstance", e);
    }
}

pub(crate) unsafe extern "system" fn enumerate_physical_devices(
    instance: vk::Instance,
    p_count: *mut u32,
    p_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let ctx = crate::context();
    ctx.enumerate_physical_devices(instance, p_count, p_devices)
        .unwrap_or_else(|e| ctx.fail("vkEnumeratePhysicalDevices", e))
}

pub(crate) unsafe extern "system" fn enumerate_instance_layer_properties(
    p_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    write_layer_properties(p_count, p_properties)
}

pub(crate) unsafe extern "system" fn enumerate_instance_extension_properties(
    p_layer_name: *const c_char,
    p_count: *mut u32,
    _p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if is_this_layer(p_layer_name) {
        write_no_extensions(p_count)
    } else {
        debug!("instance extension query for another layer");
        vk::Result::ERROR_LAYER_NOT_PRESENT
    }
}

pub(crate) unsafe extern "system" fn enumerate_device_layer_properties(
    _physical_device: vk::PhysicalDevice,
    p_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    write_layer_properties(p_count, p_properties)
}

pub(crate) unsafe extern "system" fn enumerate_device_extension_properties(
    physical_device: vk::PhysicalDevice,
    p_layer_name: *const c_char,
    p_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    let ctx = crate::context();
    ctx.enumerate_device_extension_properties(physical_device, p_layer_name, p_count, p_properties)
        .unwrap_or_else(|e| {
            warn!("vkEnumerateDeviceExtensionProperties: {e}");
            e.to_vk_result()
        })
}

