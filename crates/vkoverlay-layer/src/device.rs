//! Device-scope hooks and the per-device overlay resources.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;
use tracing::{info, warn};
use vkoverlay_core::LayerError;

use crate::chain::{self, DeviceLinkNode, PfnSetDeviceLoaderData};
use crate::context::LayerContext;
use crate::dispatch::{loader_object, resolve, DeviceDispatch};

pub struct DeviceRecord {
    pub dispatch: Arc<dyn DeviceDispatch>,
    pub physical_device: vk::PhysicalDevice,
    pub set_loader_data: Option<PfnSetDeviceLoaderData>,
    /// `None` when the device is inert: presents pass straight through.
    pub overlay: Option<Mutex<DeviceOverlay>>,
}

impl DeviceRecord {
    pub fn is_inert(&self) -> bool {
        self.overlay.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRecord {
    pub device: vk::Device,
    pub queue_index: u32,
    pub family_index: u32,
}

/// Objects reused by every overlay submission on one device.
#[derive(Debug)]
pub struct DeviceOverlay {
    pub queue_family: u32,
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub semaphore: vk::Semaphore,
    /// Signaled whenever no overlay submission is pending.
    pub fence: vk::Fence,
    pub frames: u64,
    /// Cleared when a submission fails; the fence can no longer be trusted.
    pub active: bool,
}

impl DeviceOverlay {
    fn empty(queue_family: u32) -> Self {
        Self {
            queue_family,
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            semaphore: vk::Semaphore::null(),
            fence: vk::Fence::null(),
            frames: 0,
            active: true,
        }
    }

    /// Block until the previous overlay submission has retired.
    pub unsafe fn wait_idle(&self, dispatch: &dyn DeviceDispatch, device: vk::Device) -> vk::Result {
        if !self.active {
            return vk::Result::SUCCESS;
        }
        loop {
            match dispatch.wait_for_fence(device, self.fence, u64::MAX) {
                vk::Result::TIMEOUT => continue,
                result => return result,
            }
        }
    }

    unsafe fn create_objects(
        &mut self,
        dispatch: &dyn DeviceDispatch,
        device: vk::Device,
        set_loader_data: PfnSetDeviceLoaderData,
    ) -> Result<(), LayerError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.queue_family);
        self.command_pool = dispatch
            .create_command_pool(device, &pool_info)
            .map_err(LayerError::overlay("command pool"))?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        self.command_buffer = dispatch
            .allocate_command_buffer(device, &alloc_info)
            .map_err(LayerError::overlay("command buffer"))?;
        set_loader_data(device, loader_object(self.command_buffer))
            .result()
            .map_err(LayerError::overlay("loader data"))?;

        self.semaphore = dispatch
            .create_semaphore(device)
            .map_err(LayerError::overlay("semaphore"))?;
        self.fence = dispatch
            .create_fence(device, true)
            .map_err(LayerError::overlay("fence"))?;
        Ok(())
    }

    /// Destroy whatever exists; null members are skipped.
    unsafe fn destroy_objects(&self, dispatch: &dyn DeviceDispatch, device: vk::Device) {
        if self.command_buffer != vk::CommandBuffer::null() {
            dispatch.free_command_buffer(device, self.command_pool, self.command_buffer);
        }
        if self.command_pool != vk::CommandPool::null() {
            dispatch.destroy_command_pool(device, self.command_pool);
        }
        if self.semaphore != vk::Semaphore::null() {
            dispatch.destroy_semaphore(device, self.semaphore);
        }
        if self.fence != vk::Fence::null() {
            dispatch.destroy_fence(device, self.fence);
        }
    }
}

impl LayerContext {
    pub unsafe fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        p_create_info: *const vk::DeviceCreateInfo<'_>,
        p_allocator: *const vk::AllocationCallbacks<'_>,
        p_device: *mut vk::Device,
    ) -> Result<(), LayerError> {
        if p_create_info.is_null() || p_device.is_null() {
            return Err(LayerError::LoaderProtocol("vkCreateDevice called with null pointers"));
        }
        let link = DeviceLinkNode::find(p_create_info)
            .ok_or(LayerError::LoaderProtocol("no layer link node in VkDeviceCreateInfo chain"))?;
        let gipa = link.next_get_instance_proc_addr();
        let gdpa = link.next_get_device_proc_addr();
        let instance = self.owner_instance(physical_device).unwrap_or(vk::Instance::null());
        let create: Option<vk::PFN_vkCreateDevice> = resolve!(gipa, instance, "vkCreateDevice");
        let create =
            create.ok_or(LayerError::LoaderProtocol("next layer does not expose vkCreateDevice"))?;

        link.advance();
        create(physical_device, p_create_info, p_allocator, p_device).result()?;

        let device = *p_device;
        let dispatch = self.loader.load_device(device, gdpa);
        let set_loader_data = chain::find_device_loader_data_callback(p_create_info);

        let overlay = if !self.config.overlay.enabled {
            info!("overlay disabled by configuration; device {:#x} is inert", device.as_raw());
            None
        } else {
            let family = self.overlay_queue_family(physical_device, &*p_create_info);
            match provision_overlay(&*dispatch, device, family, set_loader_data) {
                Ok(overlay) => Some(Mutex::new(overlay)),
                Err(e) => {
                    warn!("device {:#x} left without overlay: {e}", device.as_raw());
                    None
                }
            }
        };

        self.devices.insert(
            device,
            DeviceRecord {
                dispatch,
                physical_device,
                set_loader_data,
                overlay,
            },
        );
        info!("device {:#x} created", device.as_raw());
        Ok(())
    }

    pub unsafe fn destroy_device(
        &self,
        device: vk::Device,
        p_allocator: *const vk::AllocationCallbacks<'_>,
    ) -> Result<(), LayerError> {
        if device == vk::Device::null() {
            return Ok(());
        }
        let record = self.devices.get(device)?;
        if let Some(overlay) = &record.overlay {
            let overlay = overlay.lock();
            let idle = overlay.wait_idle(&*record.dispatch, device);
            if idle != vk::Result::SUCCESS {
                warn!("overlay fence wait on device teardown returned {idle:?}");
            }
            overlay.destroy_objects(&*record.dispatch, device);
        }
        record.dispatch.destroy_device(device, p_allocator);

        self.devices.remove(device)?;
        self.queues.retain(|_, q| q.device != device);
        let leaked = self.swapchains.handles_where(|sc| sc.device == device);
        if !leaked.is_empty() {
            warn!("device {:#x} destroyed with {} live swapchain(s)", device.as_raw(), leaked.len());
            self.swapchains.retain(|_, sc| sc.device != device);
        }
        info!("device {:#x} destroyed", device.as_raw());
        Ok(())
    }

    pub unsafe fn get_device_queue(
        &self,
        device: vk::Device,
        family_index: u32,
        queue_index: u32,
        p_queue: *mut vk::Queue,
    ) -> Result<(), LayerError> {
        let record = self.devices.get(device)?;
        let queue = record.dispatch.get_device_queue(device, family_index, queue_index);
        *p_queue = queue;
        self.register_queue(queue, device, family_index, queue_index);
        Ok(())
    }

    pub unsafe fn get_device_queue2(
        &self,
        device: vk::Device,
        p_queue_info: *const vk::DeviceQueueInfo2<'_>,
        p_queue: *mut vk::Queue,
    ) -> Result<(), LayerError> {
        let record = self.devices.get(device)?;
        let info = &*p_queue_info;
        let queue = record.dispatch.get_device_queue2(device, info);
        *p_queue = queue;
        self.register_queue(queue, device, info.queue_family_index, info.queue_index);
        Ok(())
    }

    fn register_queue(&self, queue: vk::Queue, device: vk::Device, family_index: u32, queue_index: u32) {
        if queue == vk::Queue::null() || self.queues.contains(queue) {
            return;
        }
        self.queues.insert(
            queue,
            QueueRecord {
                device,
                queue_index,
                family_index,
            },
        );
    }

    /// First requested family with graphics support, else the first requested.
    unsafe fn overlay_queue_family(
        &self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> u32 {
        let requested: Vec<u32> = if create_info.p_queue_create_infos.is_null() {
            Vec::new()
        } else {
            std::slice::from_raw_parts(
                create_info.p_queue_create_infos,
                create_info.queue_create_info_count as usize,
            )
            .iter()
            .map(|q| q.queue_family_index)
            .collect()
        };
        let families = self
            .owner_instance(physical_device)
            .and_then(|instance| self.instances.get(instance).ok())
            .map(|record| record.dispatch.get_physical_device_queue_family_properties(physical_device))
            .unwrap_or_default();

        requested
            .iter()
            .copied()
            .find(|&family| {
                families
                    .get(family as usize)
                    .is_some_and(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            })
            .or_else(|| requested.first().copied())
            .unwrap_or(0)
    }
}

unsafe fn provision_overlay(
    dispatch: &dyn DeviceDispatch,
    device: vk::Device,
    queue_family: u32,
    set_loader_data: Option<PfnSetDeviceLoaderData>,
) -> Result<DeviceOverlay, LayerError> {
    let set_loader_data = set_loader_data.ok_or(LayerError::LoaderProtocol(
        "no loader data callback in VkDeviceCreateInfo chain",
    ))?;
    let mut overlay = DeviceOverlay::empty(queue_family);
    if let Err(e) = overlay.create_objects(dispatch, device, set_loader_data) {
        overlay.destroy_objects(dispatch, device);
        return Err(e);
    }
    Ok(overlay)
}

// ── Hooks ───────────────────────────────────────────────────────────────────

pub(crate) unsafe extern "system" fn create_device(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    let ctx = crate::context();
    match ctx.create_device(physical_device, p_create_info, p_allocator, p_device) {
        Ok(()) => vk::Result::SUCCESS,
        Err(e) => ctx.fail("vkCreateDevice", e),
    }
}

pub(crate) unsafe extern "system" fn destroy_device(
    device: vk::Device,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    let ctx = crate::context();
    if let Err(e) = ctx.destroy_device(device, p_allocator) {
        ctx.fail("vkDestroyDevice", e);
    }
}

pub(crate) unsafe extern "system" fn get_device_queue(
    device: vk::Device,
    family_index: u32,
    queue_index: u32,
    p_queue: *mut vk::Queue,
) {
    let ctx = crate::context();
    if let Err(e) = ctx.get_device_queue(device, family_index, queue_index, p_queue) {
        ctx.fail("vkGetDeviceQueue", e);
    }
}

pub(crate) unsafe extern "system" fn get_device_queue2(
    device: vk::Device,
    p_queue_info: *const vk::DeviceQueueInfo2<'_>,
    p_queue: *mut vk::Queue,
) {
    let ctx = crate::context();
    if let Err(e) = ctx.get_device_queue2(device, p_queue_info, p_queue) {
        ctx.fail("vkGetDeviceQueue2", e);
    }
}
