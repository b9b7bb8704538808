//! Per-instance and per-device tables of the next layer's entry points.
//!
//! Hooks never call Vulkan directly. They go through [`InstanceDispatch`] /
//! [`DeviceDispatch`], which the loader-backed tables implement by resolving
//! every function this layer forwards to through the next `GetProcAddr` at
//! creation time. Tests substitute their own implementations through
//! [`DispatchLoader`].

use std::ffi::{c_char, c_void};
use std::ptr;
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;

/// Resolve a Vulkan function by name through a `GetProcAddr` and cast it to
/// the matching function pointer type.
macro_rules! resolve {
    ($gpa:expr, $handle:expr, $name:literal) => {
        std::mem::transmute::<vk::PFN_vkVoidFunction, _>(($gpa)(
            $handle,
            concat!($name, "\0").as_ptr() as *const std::ffi::c_char,
        ))
    };
}
pub(crate) use resolve;

/// Call an optional entry point, reporting `ERROR_EXTENSION_NOT_PRESENT` when
/// the next layer did not expose it.
macro_rules! forward {
    ($pfn:expr, $($arg:expr),* $(,)?) => {
        match $pfn {
            Some(f) => f($($arg),*),
            None => vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        }
    };
}

macro_rules! forward_void {
    ($pfn:expr, $($arg:expr),* $(,)?) => {
        if let Some(f) = $pfn {
            f($($arg),*)
        }
    };
}

// ── Swapchain entry points ──────────────────────────────────────────────────

pub type PfnCreateSwapchainKhr = unsafe extern "system" fn(
    device: vk::Device,
    p_create_info: *const vk::SwapchainCreateInfoKHR<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_swapchain: *mut vk::SwapchainKHR,
) -> vk::Result;

pub type PfnDestroySwapchainKhr = unsafe extern "system" fn(
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    p_allocator: *const vk::AllocationCallbacks<'_>,
);

pub type PfnGetSwapchainImagesKhr = unsafe extern "system" fn(
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    p_count: *mut u32,
    p_images: *mut vk::Image,
) -> vk::Result;

pub type PfnQueuePresentKhr =
    unsafe extern "system" fn(queue: vk::Queue, p_present_info: *const vk::PresentInfoKHR<'_>) -> vk::Result;

// ── Capability traits ───────────────────────────────────────────────────────

/// Instance-level calls the layer forwards or makes itself.
pub trait InstanceDispatch: Send + Sync {
    unsafe fn get_instance_proc_addr(
        &self,
        instance: vk::Instance,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction;

    unsafe fn destroy_instance(
        &self,
        instance: vk::Instance,
        allocator: *const vk::AllocationCallbacks<'_>,
    );

    /// Raw two-call enumeration, forwarded exactly as the application made it.
    unsafe fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        count: *mut u32,
        devices: *mut vk::PhysicalDevice,
    ) -> vk::Result;

    unsafe fn enumerate_device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        layer_name: *const c_char,
        count: *mut u32,
        properties: *mut vk::ExtensionProperties,
    ) -> vk::Result;

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;
}

/// Device-level calls the layer forwards or makes itself.
///
/// Objects the layer creates for its own use are created without allocation
/// callbacks; objects owned by the application keep the caller's allocator.
pub trait DeviceDispatch: Send + Sync {
    unsafe fn get_device_proc_addr(&self, device: vk::Device, name: *const c_char)
        -> vk::PFN_vkVoidFunction;
    unsafe fn destroy_device(&self, device: vk::Device, allocator: *const vk::AllocationCallbacks<'_>);
    unsafe fn get_device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue;
    unsafe fn get_device_queue2(&self, device: vk::Device, info: &vk::DeviceQueueInfo2<'_>) -> vk::Queue;

    unsafe fn create_command_pool(
        &self,
        device: vk::Device,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool>;
    unsafe fn destroy_command_pool(&self, device: vk::Device, pool: vk::CommandPool);
    unsafe fn allocate_command_buffer(
        &self,
        device: vk::Device,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<vk::CommandBuffer>;
    unsafe fn free_command_buffer(&self, device: vk::Device, pool: vk::CommandPool, buffer: vk::CommandBuffer);
    unsafe fn create_semaphore(&self, device: vk::Device) -> VkResult<vk::Semaphore>;
    unsafe fn destroy_semaphore(&self, device: vk::Device, semaphore: vk::Semaphore);
    unsafe fn create_fence(&self, device: vk::Device, signaled: bool) -> VkResult<vk::Fence>;
    unsafe fn destroy_fence(&self, device: vk::Device, fence: vk::Fence);
    unsafe fn wait_for_fence(&self, device: vk::Device, fence: vk::Fence, timeout: u64) -> vk::Result;
    unsafe fn reset_fence(&self, device: vk::Device, fence: vk::Fence) -> vk::Result;

    unsafe fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> vk::Result;
    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> vk::Result;
    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> vk::Result;
    unsafe fn cmd_pipeline_barrier(
        &self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    );
    unsafe fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>);
    unsafe fn cmd_clear_attachments(
        &self,
        buffer: vk::CommandBuffer,
        attachments: &[vk::ClearAttachment],
        rects: &[vk::ClearRect],
    );
    unsafe fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);
    unsafe fn queue_submit(&self, queue: vk::Queue, submit: &vk::SubmitInfo<'_>, fence: vk::Fence) -> vk::Result;

    unsafe fn create_render_pass(
        &self,
        device: vk::Device,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass>;
    unsafe fn destroy_render_pass(&self, device: vk::Device, render_pass: vk::RenderPass);
    unsafe fn create_image_view(
        &self,
        device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView>;
    unsafe fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView);
    unsafe fn create_framebuffer(
        &self,
        device: vk::Device,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer>;
    unsafe fn destroy_framebuffer(&self, device: vk::Device, framebuffer: vk::Framebuffer);

    unsafe fn create_swapchain(
        &self,
        device: vk::Device,
        info: *const vk::SwapchainCreateInfoKHR<'_>,
        allocator: *const vk::AllocationCallbacks<'_>,
        swapchain: *mut vk::SwapchainKHR,
    ) -> vk::Result;
    unsafe fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        allocator: *const vk::AllocationCallbacks<'_>,
    );
    unsafe fn get_swapchain_images(&self, device: vk::Device, swapchain: vk::SwapchainKHR)
        -> VkResult<Vec<vk::Image>>;
    unsafe fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR<'_>) -> vk::Result;
}

/// Builds dispatch tables once the next layer has created an object.
pub trait DispatchLoader: Send + Sync {
    unsafe fn load_instance(
        &self,
        instance: vk::Instance,
        gipa: vk::PFN_vkGetInstanceProcAddr,
    ) -> Arc<dyn InstanceDispatch>;

    unsafe fn load_device(
        &self,
        device: vk::Device,
        gdpa: vk::PFN_vkGetDeviceProcAddr,
    ) -> Arc<dyn DeviceDispatch>;
}

/// Production loader: resolves through the next layer in the chain.
pub struct NextLayerLoader;

impl DispatchLoader for NextLayerLoader {
    unsafe fn load_instance(
        &self,
        instance: vk::Instance,
        gipa: vk::PFN_vkGetInstanceProcAddr,
    ) -> Arc<dyn InstanceDispatch> {
        Arc::new(LoaderInstanceTable::load(instance, gipa))
    }

    unsafe fn load_device(
        &self,
        device: vk::Device,
        gdpa: vk::PFN_vkGetDeviceProcAddr,
    ) -> Arc<dyn DeviceDispatch> {
        Arc::new(LoaderDeviceTable::load(device, gdpa))
    }
}

// ── Instance table ──────────────────────────────────────────────────────────

pub struct LoaderInstanceTable {
    get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    destroy_instance: Option<vk::PFN_vkDestroyInstance>,
    enumerate_physical_devices: Option<vk::PFN_vkEnumeratePhysicalDevices>,
    enumerate_device_extension_properties: Option<vk::PFN_vkEnumerateDeviceExtensionProperties>,
    get_physical_device_queue_family_properties:
        Option<vk::PFN_vkGetPhysicalDeviceQueueFamilyProperties>,
}

impl LoaderInstanceTable {
    pub unsafe fn load(instance: vk::Instance, gipa: vk::PFN_vkGetInstanceProcAddr) -> Self {
        Self {
            get_instance_proc_addr: gipa,
            destroy_instance: resolve!(gipa, instance, "vkDestroyInstance"),
            enumerate_physical_devices: resolve!(gipa, instance, "vkEnumeratePhysicalDevices"),
            enumerate_device_extension_properties: resolve!(
                gipa,
                instance,
                "vkEnumerateDeviceExtensionProperties"
            ),
            get_physical_device_queue_family_properties: resolve!(
                gipa,
                instance,
                "vkGetPhysicalDeviceQueueFamilyProperties"
            ),
        }
    }
}

impl InstanceDispatch for LoaderInstanceTable {
    unsafe fn get_instance_proc_addr(
        &self,
        instance: vk::Instance,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        (self.get_instance_proc_addr)(instance, name)
    }

    unsafe fn destroy_instance(
        &self,
        instance: vk::Instance,
        allocator: *const vk::AllocationCallbacks<'_>,
    ) {
        forward_void!(self.destroy_instance, instance, allocator);
    }

    unsafe fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        count: *mut u32,
        devices: *mut vk::PhysicalDevice,
    ) -> vk::Result {
        forward!(self.enumerate_physical_devices, instance, count, devices)
    }

    unsafe fn enumerate_device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        layer_name: *const c_char,
        count: *mut u32,
        properties: *mut vk::ExtensionProperties,
    ) -> vk::Result {
        forward!(
            self.enumerate_device_extension_properties,
            physical_device,
            layer_name,
            count,
            properties
        )
    }

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        let Some(f) = self.get_physical_device_queue_family_properties else {
            return Vec::new();
        };
        let mut count = 0u32;
        f(physical_device, &mut count, ptr::null_mut());
        let mut families = vec![vk::QueueFamilyProperties::default(); count as usize];
        f(physical_device, &mut count, families.as_mut_ptr());
        families.truncate(count as usize);
        families
    }
}

// ── Device table ────────────────────────────────────────────────────────────

pub struct LoaderDeviceTable {
    get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
    destroy_device: Option<vk::PFN_vkDestroyDevice>,
    get_device_queue: Option<vk::PFN_vkGetDeviceQueue>,
    get_device_queue2: Option<vk::PFN_vkGetDeviceQueue2>,
    create_command_pool: Option<vk::PFN_vkCreateCommandPool>,
    destroy_command_pool: Option<vk::PFN_vkDestroyCommandPool>,
    allocate_command_buffers: Option<vk::PFN_vkAllocateCommandBuffers>,
    free_command_buffers: Option<vk::PFN_vkFreeCommandBuffers>,
    create_semaphore: Option<vk::PFN_vkCreateSemaphore>,
    destroy_semaphore: Option<vk::PFN_vkDestroySemaphore>,
    create_fence: Option<vk::PFN_vkCreateFence>,
    destroy_fence: Option<vk::PFN_vkDestroyFence>,
    wait_for_fences: Option<vk::PFN_vkWaitForFences>,
    reset_fences: Option<vk::PFN_vkResetFences>,
    reset_command_buffer: Option<vk::PFN_vkResetCommandBuffer>,
    begin_command_buffer: Option<vk::PFN_vkBeginCommandBuffer>,
    end_command_buffer: Option<vk::PFN_vkEndCommandBuffer>,
    cmd_pipeline_barrier: Option<vk::PFN_vkCmdPipelineBarrier>,
    cmd_begin_render_pass: Option<vk::PFN_vkCmdBeginRenderPass>,
    cmd_clear_attachments: Option<vk::PFN_vkCmdClearAttachments>,
    cmd_end_render_pass: Option<vk::PFN_vkCmdEndRenderPass>,
    queue_submit: Option<vk::PFN_vkQueueSubmit>,
    create_render_pass: Option<vk::PFN_vkCreateRenderPass>,
    destroy_render_pass: Option<vk::PFN_vkDestroyRenderPass>,
    create_image_view: Option<vk::PFN_vkCreateImageView>,
    destroy_image_view: Option<vk::PFN_vkDestroyImageView>,
    create_framebuffer: Option<vk::PFN_vkCreateFramebuffer>,
    destroy_framebuffer: Option<vk::PFN_vkDestroyFramebuffer>,
    create_swapchain: Option<PfnCreateSwapchainKhr>,
    destroy_swapchain: Option<PfnDestroySwapchainKhr>,
    get_swapchain_images: Option<PfnGetSwapchainImagesKhr>,
    queue_present: Option<PfnQueuePresentKhr>,
}

impl LoaderDeviceTable {
    pub unsafe fn load(device: vk::Device, gdpa: vk::PFN_vkGetDeviceProcAddr) -> Self {
        Self {
            get_device_proc_addr: gdpa,
            destroy_device: resolve!(gdpa, device, "vkDestroyDevice"),
            get_device_queue: resolve!(gdpa, device, "vkGetDeviceQueue"),
            get_device_queue2: resolve!(gdpa, device, "vkGetDeviceQueue2"),
            create_command_pool: resolve!(gdpa, device, "vkCreateCommandPool"),
            destroy_command_pool: resolve!(gdpa, device, "vkDestroyCommandPool"),
            allocate_command_buffers: resolve!(gdpa, device, "vkAllocateCommandBuffers"),
            free_command_buffers: resolve!(gdpa, device, "vkFreeCommandBuffers"),
            create_semaphore: resolve!(gdpa, device, "vkCreateSemaphore"),
            destroy_semaphore: resolve!(gdpa, device, "vkDestroySemaphore"),
            create_fence: resolve!(gdpa, device, "vkCreateFence"),
            destroy_fence: resolve!(gdpa, device, "vkDestroyFence"),
            wait_for_fences: resolve!(gdpa, device, "vkWaitForFences"),
            reset_fences: resolve!(gdpa, device, "vkResetFences"),
            reset_command_buffer: resolve!(gdpa, device, "vkResetCommandBuffer"),
            begin_command_buffer: resolve!(gdpa, device, "vkBeginCommandBuffer"),
            end_command_buffer: resolve!(gdpa, device, "vkEndCommandBuffer"),
            cmd_pipeline_barrier: resolve!(gdpa, device, "vkCmdPipelineBarrier"),
            cmd_begin_render_pass: resolve!(gdpa, device, "vkCmdBeginRenderPass"),
            cmd_clear_attachments: resolve!(gdpa, device, "vkCmdClearAttachments"),
            cmd_end_render_pass: resolve!(gdpa, device, "vkCmdEndRenderPass"),
            queue_submit: resolve!(gdpa, device, "vkQueueSubmit"),
            create_render_pass: resolve!(gdpa, device, "vkCreateRenderPass"),
            destroy_render_pass: resolve!(gdpa, device, "vkDestroyRenderPass"),
            create_image_view: resolve!(gdpa, device, "vkCreateImageView"),
            destroy_image_view: resolve!(gdpa, device, "vkDestroyImageView"),
            create_framebuffer: resolve!(gdpa, device, "vkCreateFramebuffer"),
            destroy_framebuffer: resolve!(gdpa, device, "vkDestroyFramebuffer"),
            create_swapchain: resolve!(gdpa, device, "vkCreateSwapchainKHR"),
            destroy_swapchain: resolve!(gdpa, device, "vkDestroySwapchainKHR"),
            get_swapchain_images: resolve!(gdpa, device, "vkGetSwapchainImagesKHR"),
            queue_present: resolve!(gdpa, device, "vkQueuePresentKHR"),
        }
    }
}

impl DeviceDispatch for LoaderDeviceTable {
    unsafe fn get_device_proc_addr(
        &self,
        device: vk::Device,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        (self.get_device_proc_addr)(device, name)
    }

    unsafe fn destroy_device(&self, device: vk::Device, allocator: *const vk::AllocationCallbacks<'_>) {
        forward_void!(self.destroy_device, device, allocator);
    }

    unsafe fn get_device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue {
        let mut queue = vk::Queue::null();
        forward_void!(self.get_device_queue, device, family, index, &mut queue);
        queue
    }

    unsafe fn get_device_queue2(&self, device: vk::Device, info: &vk::DeviceQueueInfo2<'_>) -> vk::Queue {
        let mut queue = vk::Queue::null();
        forward_void!(self.get_device_queue2, device, info, &mut queue);
        queue
    }

    unsafe fn create_command_pool(
        &self,
        device: vk::Device,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        let mut pool = vk::CommandPool::null();
        forward!(self.create_command_pool, device, info, ptr::null(), &mut pool).result_with_success(pool)
    }

    unsafe fn destroy_command_pool(&self, device: vk::Device, pool: vk::CommandPool) {
        forward_void!(self.destroy_command_pool, device, pool, ptr::null());
    }

    unsafe fn allocate_command_buffer(
        &self,
        device: vk::Device,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<vk::CommandBuffer> {
        let mut buffer = vk::CommandBuffer::null();
        forward!(self.allocate_command_buffers, device, info, &mut buffer).result_with_success(buffer)
    }

    unsafe fn free_command_buffer(&self, device: vk::Device, pool: vk::CommandPool, buffer: vk::CommandBuffer) {
        forward_void!(self.free_command_buffers, device, pool, 1, &buffer);
    }

    unsafe fn create_semaphore(&self, device: vk::Device) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        let mut semaphore = vk::Semaphore::null();
        forward!(self.create_semaphore, device, &info, ptr::null(), &mut semaphore)
            .result_with_success(semaphore)
    }

    unsafe fn destroy_semaphore(&self, device: vk::Device, semaphore: vk::Semaphore) {
        forward_void!(self.destroy_semaphore, device, semaphore, ptr::null());
    }

    unsafe fn create_fence(&self, device: vk::Device, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::default().flags(flags);
        let mut fence = vk::Fence::null();
        forward!(self.create_fence, device, &info, ptr::null(), &mut fence).result_with_success(fence)
    }

    unsafe fn destroy_fence(&self, device: vk::Device, fence: vk::Fence) {
        forward_void!(self.destroy_fence, device, fence, ptr::null());
    }

    unsafe fn wait_for_fence(&self, device: vk::Device, fence: vk::Fence, timeout: u64) -> vk::Result {
        forward!(self.wait_for_fences, device, 1, &fence, vk::TRUE, timeout)
    }

    unsafe fn reset_fence(&self, device: vk::Device, fence: vk::Fence) -> vk::Result {
        forward!(self.reset_fences, device, 1, &fence)
    }

    unsafe fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> vk::Result {
        forward!(self.reset_command_buffer, buffer, vk::CommandBufferResetFlags::empty())
    }

    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> vk::Result {
        forward!(self.begin_command_buffer, buffer, info)
    }

    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> vk::Result {
        forward!(self.end_command_buffer, buffer)
    }

    unsafe fn cmd_pipeline_barrier(
        &self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        forward_void!(
            self.cmd_pipeline_barrier,
            buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            0,
            ptr::null(),
            0,
            ptr::null(),
            image_barriers.len() as u32,
            image_barriers.as_ptr(),
        );
    }

    unsafe fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        forward_void!(self.cmd_begin_render_pass, buffer, info, vk::SubpassContents::INLINE);
    }

    unsafe fn cmd_clear_attachments(
        &self,
        buffer: vk::CommandBuffer,
        attachments: &[vk::ClearAttachment],
        rects: &[vk::ClearRect],
    ) {
        forward_void!(
            self.cmd_clear_attachments,
            buffer,
            attachments.len() as u32,
            attachments.as_ptr(),
            rects.len() as u32,
            rects.as_ptr(),
        );
    }

    unsafe fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        forward_void!(self.cmd_end_render_pass, buffer);
    }

    unsafe fn queue_submit(&self, queue: vk::Queue, submit: &vk::SubmitInfo<'_>, fence: vk::Fence) -> vk::Result {
        forward!(self.queue_submit, queue, 1, submit, fence)
    }

    unsafe fn create_render_pass(
        &self,
        device: vk::Device,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        let mut render_pass = vk::RenderPass::null();
        forward!(self.create_render_pass, device, info, ptr::null(), &mut render_pass)
            .result_with_success(render_pass)
    }

    unsafe fn destroy_render_pass(&self, device: vk::Device, render_pass: vk::RenderPass) {
        forward_void!(self.destroy_render_pass, device, render_pass, ptr::null());
    }

    unsafe fn create_image_view(
        &self,
        device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        let mut view = vk::ImageView::null();
        forward!(self.create_image_view, device, info, ptr::null(), &mut view).result_with_success(view)
    }

    unsafe fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView) {
        forward_void!(self.destroy_image_view, device, view, ptr::null());
    }

    unsafe fn create_framebuffer(
        &self,
        device: vk::Device,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        let mut framebuffer = vk::Framebuffer::null();
        forward!(self.create_framebuffer, device, info, ptr::null(), &mut framebuffer)
            .result_with_success(framebuffer)
    }

    unsafe fn destroy_framebuffer(&self, device: vk::Device, framebuffer: vk::Framebuffer) {
        forward_void!(self.destroy_framebuffer, device, framebuffer, ptr::null());
    }

    unsafe fn create_swapchain(
        &self,
        device: vk::Device,
        info: *const vk::SwapchainCreateInfoKHR<'_>,
        allocator: *const vk::AllocationCallbacks<'_>,
        swapchain: *mut vk::SwapchainKHR,
    ) -> vk::Result {
        forward!(self.create_swapchain, device, info, allocator, swapchain)
    }

    unsafe fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        allocator: *const vk::AllocationCallbacks<'_>,
    ) {
        forward_void!(self.destroy_swapchain, device, swapchain, allocator);
    }

    unsafe fn get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        let Some(f) = self.get_swapchain_images else {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        };
        // Two-call idiom; retry while the driver reports the count changed.
        loop {
            let mut count = 0u32;
            f(device, swapchain, &mut count, ptr::null_mut()).result()?;
            let mut images = vec![vk::Image::null(); count as usize];
            match f(device, swapchain, &mut count, images.as_mut_ptr()) {
                vk::Result::SUCCESS => {
                    images.truncate(count as usize);
                    return Ok(images);
                }
                vk::Result::INCOMPLETE => continue,
                err => return Err(err),
            }
        }
    }

    unsafe fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR<'_>) -> vk::Result {
        forward!(self.queue_present, queue, info)
    }
}

/// Reinterpret a dispatchable handle as the pointer the loader writes its
/// dispatch table into.
pub fn loader_object<H: vk::Handle>(handle: H) -> *mut c_void {
    handle.as_raw() as usize as *mut c_void
}
