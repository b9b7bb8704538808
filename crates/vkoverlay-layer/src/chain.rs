//! Loader ↔ layer chain structures (`vk_layer.h`).
//!
//! The loader threads one `VkLayer{Instance,Device}CreateInfo` node through the
//! create-info `pNext` chain. Its link list holds the next layer's
//! `GetProcAddr` functions; each layer consumes its own entry by advancing the
//! list head before calling down.

use std::ffi::{c_char, c_void};
use std::ptr;

use ash::vk;

pub const LOADER_INSTANCE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(47);
pub const LOADER_DEVICE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(48);

/// `VkLayerFunction`: what a loader chain node carries. Stored as a raw `u32`
/// in the nodes since newer loaders may send values this layer does not know.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFunction {
    LinkInfo = 0,
    LoaderDataCallback = 1,
    LoaderLayerCreateDeviceCallback = 2,
    LoaderFeatures = 3,
}

pub type PfnSetInstanceLoaderData =
    unsafe extern "system" fn(instance: vk::Instance, object: *mut c_void) -> vk::Result;

pub type PfnSetDeviceLoaderData =
    unsafe extern "system" fn(device: vk::Device, object: *mut c_void) -> vk::Result;

pub type PfnGetPhysicalDeviceProcAddr =
    unsafe extern "system" fn(instance: vk::Instance, p_name: *const c_char) -> vk::PFN_vkVoidFunction;

#[repr(C)]
pub struct LayerInstanceLink {
    pub p_next: *mut LayerInstanceLink,
    pub pfn_next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub pfn_next_get_physical_device_proc_addr: Option<PfnGetPhysicalDeviceProcAddr>,
}

#[repr(C)]
pub struct LayerDeviceLink {
    pub p_next: *mut LayerDeviceLink,
    pub pfn_next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub pfn_next_get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct LayerDeviceCallbacks {
    pub pfn_layer_create_device: *const c_void,
    pub pfn_layer_destroy_device: *const c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union LayerInstancePayload {
    pub layer_info: *mut LayerInstanceLink,
    pub set_instance_loader_data: Option<PfnSetInstanceLoaderData>,
    pub layer_device: LayerDeviceCallbacks,
    pub loader_features: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union LayerDevicePayload {
    pub layer_info: *mut LayerDeviceLink,
    pub set_device_loader_data: Option<PfnSetDeviceLoaderData>,
}

/// `VkLayerInstanceCreateInfo`
#[repr(C)]
pub struct LayerInstanceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: u32,
    pub u: LayerInstancePayload,
}

/// `VkLayerDeviceCreateInfo`
#[repr(C)]
pub struct LayerDeviceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: u32,
    pub u: LayerDevicePayload,
}

/// Common prefix of both loader node types.
#[repr(C)]
struct LoaderNodeHeader {
    s_type: vk::StructureType,
    p_next: *const c_void,
    function: u32,
}

/// The instance chain node whose link list this layer consumes.
pub struct InstanceLinkNode(*mut LayerInstanceCreateInfo);

/// The device chain node whose link list this layer consumes.
pub struct DeviceLinkNode(*mut LayerDeviceCreateInfo);

impl InstanceLinkNode {
    /// Locate the `VK_LAYER_LINK_INFO` node in an instance create-info chain.
    ///
    /// # Safety
    /// `create_info` must point to a valid `VkInstanceCreateInfo` whose chain
    /// is well formed.
    pub unsafe fn find(create_info: *const vk::InstanceCreateInfo<'_>) -> Option<Self> {
        let node = find_loader_node(
            (*create_info).p_next,
            LOADER_INSTANCE_CREATE_INFO,
            LayerFunction::LinkInfo,
        ) as *mut LayerInstanceCreateInfo;
        if node.is_null() || (*node).u.layer_info.is_null() {
            return None;
        }
        Some(Self(node))
    }

    pub unsafe fn next_get_instance_proc_addr(&self) -> vk::PFN_vkGetInstanceProcAddr {
        (*(*self.0).u.layer_info).pfn_next_get_instance_proc_addr
    }

    /// Pop this layer's link so the next layer finds its own at the head.
    pub unsafe fn advance(&self) {
        (*self.0).u.layer_info = (*(*self.0).u.layer_info).p_next;
    }
}

impl DeviceLinkNode {
    /// Locate the `VK_LAYER_LINK_INFO` node in a device create-info chain.
    ///
    /// # Safety
    /// `create_info` must point to a valid `VkDeviceCreateInfo` whose chain is
    /// well formed.
    pub unsafe fn find(create_info: *const vk::DeviceCreateInfo<'_>) -> Option<Self> {
        let node = find_loader_node(
            (*create_info).p_next,
            LOADER_DEVICE_CREATE_INFO,
            LayerFunction::LinkInfo,
        ) as *mut LayerDeviceCreateInfo;
        if node.is_null() || (*node).u.layer_info.is_null() {
            return None;
        }
        Some(Self(node))
    }

    pub unsafe fn next_get_instance_proc_addr(&self) -> vk::PFN_vkGetInstanceProcAddr {
        (*(*self.0).u.layer_info).pfn_next_get_instance_proc_addr
    }

    pub unsafe fn next_get_device_proc_addr(&self) -> vk::PFN_vkGetDeviceProcAddr {
        (*(*self.0).u.layer_info).pfn_next_get_device_proc_addr
    }

    pub unsafe fn advance(&self) {
        (*self.0).u.layer_info = (*(*self.0).u.layer_info).p_next;
    }
}

/// The loader's object-registration callback for objects the layer
/// allocates itself (dispatchable handles need the loader's dispatch pointer).
pub unsafe fn find_device_loader_data_callback(
    create_info: *const vk::DeviceCreateInfo<'_>,
) -> Option<PfnSetDeviceLoaderData> {
    let node = find_loader_node(
        (*create_info).p_next,
        LOADER_DEVICE_CREATE_INFO,
        LayerFunction::LoaderDataCallback,
    ) as *const LayerDeviceCreateInfo;
    if node.is_null() {
        return None;
    }
    (*node).u.set_device_loader_data
}

unsafe fn find_loader_node(
    mut p: *const c_void,
    s_type: vk::StructureType,
    function: LayerFunction,
) -> *mut c_void {
    while !p.is_null() {
        let header = &*(p as *const LoaderNodeHeader);
        if header.s_type == s_type && header.function == function as u32 {
            return p as *mut c_void;
        }
        p = header.p_next;
    }
    ptr::null_mut()
}
