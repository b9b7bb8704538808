//! Fake next layer for driving a `LayerContext` without a GPU.
//!
//! `FakeInstance` / `FakeDevice` record every call and simulate the state the
//! layer must respect: fence signal state, whether the reusable command
//! buffer has a submission nobody has waited for, and per-swapchain present
//! results. The `extern "system"` functions stand in for the loader's link
//! entries so chain handling runs over real `repr(C)` nodes.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;
use vkoverlay_core::LayerConfig;
use vkoverlay_layer::chain::{
    LayerDeviceCreateInfo, LayerDeviceLink, LayerDevicePayload, LayerFunction, LayerInstanceCreateInfo,
    LayerInstanceLink, LayerInstancePayload, LOADER_DEVICE_CREATE_INFO, LOADER_INSTANCE_CREATE_INFO,
};
use vkoverlay_layer::{DeviceDispatch, DispatchLoader, InstanceDispatch, LayerContext};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0x10_000);

pub fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(0x10, Ordering::SeqCst)
}

pub unsafe extern "system" fn passthrough_instance_fn() {}
pub unsafe extern "system" fn passthrough_device_fn() {}

pub fn fn_addr(f: vk::PFN_vkVoidFunction) -> Option<usize> {
    f.map(|f| f as usize)
}

// ── Recorded calls ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DestroyDevice,
    CreateCommandPool { family: u32, resettable: bool },
    DestroyCommandPool(vk::CommandPool),
    AllocateCommandBuffer(vk::CommandBuffer),
    FreeCommandBuffer(vk::CommandBuffer),
    CreateSemaphore(vk::Semaphore),
    DestroySemaphore(vk::Semaphore),
    CreateFence { fence: vk::Fence, signaled: bool },
    DestroyFence(vk::Fence),
    WaitForFence(vk::Fence),
    ResetFence(vk::Fence),
    ResetCommandBuffer,
    BeginCommandBuffer,
    EndCommandBuffer,
    Barrier {
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src_stage: vk::PipelineStageFlags,
    },
    BeginRenderPass { render_pass: vk::RenderPass, framebuffer: vk::Framebuffer },
    ClearAttachments { rects: Vec<(i32, i32, u32, u32)> },
    EndRenderPass,
    Submit {
        waits: Vec<vk::Semaphore>,
        stages: Vec<vk::PipelineStageFlags>,
        signals: Vec<vk::Semaphore>,
        fence: vk::Fence,
    },
    CreateRenderPass {
        render_pass: vk::RenderPass,
        format: vk::Format,
        load_op: vk::AttachmentLoadOp,
        initial_layout: vk::ImageLayout,
        final_layout: vk::ImageLayout,
    },
    DestroyRenderPass(vk::RenderPass),
    CreateImageView { view: vk::ImageView, image: vk::Image },
    DestroyImageView(vk::ImageView),
    CreateFramebuffer { framebuffer: vk::Framebuffer, view: vk::ImageView, width: u32, height: u32 },
    DestroyFramebuffer(vk::Framebuffer),
    CreateSwapchain(vk::SwapchainKHR),
    DestroySwapchain(vk::SwapchainKHR),
    Present {
        waits: Vec<vk::Semaphore>,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        has_p_next: bool,
    },
}

// ── Fake instance ───────────────────────────────────────────────────────────

pub struct FakeInstance {
    pub physical_devices: Vec<vk::PhysicalDevice>,
    pub queue_families: Vec<vk::QueueFlags>,
    pub destroyed: Mutex<Vec<vk::Instance>>,
}

impl FakeInstance {
    pub fn new() -> Self {
        Self {
            physical_devices: vec![
                vk::PhysicalDevice::from_raw(next_handle()),
                vk::PhysicalDevice::from_raw(next_handle()),
            ],
            // Family 0 is transfer-only, family 1 can draw.
            queue_families: vec![
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            ],
            destroyed: Mutex::new(Vec::new()),
        }
    }
}

impl InstanceDispatch for FakeInstance {
    unsafe fn get_instance_proc_addr(
        &self,
        _instance: vk::Instance,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        match CStr::from_ptr(name).to_bytes() {
            b"vkGetPhysicalDeviceProperties" => Some(passthrough_instance_fn),
            b"vkCmdDraw" => Some(passthrough_device_fn),
            _ => None,
        }
    }

    unsafe fn destroy_instance(&self, instance: vk::Instance, _allocator: *const vk::AllocationCallbacks<'_>) {
        self.destroyed.lock().push(instance);
    }

    unsafe fn enumerate_physical_devices(
        &self,
        _instance: vk::Instance,
        count: *mut u32,
        devices: *mut vk::PhysicalDevice,
    ) -> vk::Result {
        if devices.is_null() {
            *count = self.physical_devices.len() as u32;
            return vk::Result::SUCCESS;
        }
        let n = (*count as usize).min(self.physical_devices.len());
        ptr::copy_nonoverlapping(self.physical_devices.as_ptr(), devices, n);
        *count = n as u32;
        if n < self.physical_devices.len() {
            vk::Result::INCOMPLETE
        } else {
            vk::Result::SUCCESS
        }
    }

    unsafe fn enumerate_device_extension_properties(
        &self,
        _physical_device: vk::PhysicalDevice,
        _layer_name: *const c_char,
        count: *mut u32,
        _properties: *mut vk::ExtensionProperties,
    ) -> vk::Result {
        *count = 7;
        vk::Result::SUCCESS
    }

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        _physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.queue_families
            .iter()
            .map(|&flags| vk::QueueFamilyProperties {
                queue_flags: flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }
}

// ── Fake device ─────────────────────────────────────────────────────────────

pub struct DeviceState {
    pub calls: Vec<Call>,
    pub fences: HashMap<vk::Fence, bool>,
    /// A submission of the reusable command buffer nobody has waited for yet.
    pub unobserved_submission: bool,
    pub violations: Vec<String>,
    pub image_count: u32,
    pub images: HashMap<vk::SwapchainKHR, Vec<vk::Image>>,
    pub fail_at: Option<&'static str>,
    pub submit_result: vk::Result,
    pub present_results: HashMap<vk::SwapchainKHR, vk::Result>,
}

pub struct FakeDevice {
    pub state: Mutex<DeviceState>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState {
                calls: Vec::new(),
                fences: HashMap::new(),
                unobserved_submission: false,
                violations: Vec::new(),
                image_count: 3,
                images: HashMap::new(),
                fail_at: None,
                submit_result: vk::Result::SUCCESS,
                present_results: HashMap::new(),
            }),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.lock().violations.clone()
    }

    pub fn fail_at(&self, stage: &'static str) {
        self.state.lock().fail_at = Some(stage);
    }

    pub fn set_image_count(&self, count: u32) {
        self.state.lock().image_count = count;
    }

    pub fn set_submit_result(&self, result: vk::Result) {
        self.state.lock().submit_result = result;
    }

    pub fn set_present_result(&self, swapchain: vk::SwapchainKHR, result: vk::Result) {
        self.state.lock().present_results.insert(swapchain, result);
    }

    pub fn images(&self, swapchain: vk::SwapchainKHR) -> Vec<vk::Image> {
        self.state.lock().images.get(&swapchain).cloned().unwrap_or_default()
    }

    pub fn presents(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Present { .. }))
            .collect()
    }

    pub fn submits(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn injected(&self, stage: &'static str) -> VkResult<()> {
        if self.state.lock().fail_at == Some(stage) {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        } else {
            Ok(())
        }
    }

    fn check_idle(state: &mut DeviceState, what: &str) {
        if state.unobserved_submission {
            state
                .violations
                .push(format!("{what} while the previous submission was still in flight"));
        }
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len as usize)
    }
}

impl DeviceDispatch for FakeDevice {
    unsafe fn get_device_proc_addr(&self, _device: vk::Device, name: *const c_char) -> vk::PFN_vkVoidFunction {
        match CStr::from_ptr(name).to_bytes() {
            b"vkCmdDraw" => Some(passthrough_device_fn),
            _ => None,
        }
    }

    unsafe fn destroy_device(&self, _device: vk::Device, _allocator: *const vk::AllocationCallbacks<'_>) {
        self.record(Call::DestroyDevice);
    }

    unsafe fn get_device_queue(&self, _device: vk::Device, family: u32, index: u32) -> vk::Queue {
        vk::Queue::from_raw(0x9000 + u64::from(family) * 0x100 + u64::from(index) * 0x10)
    }

    unsafe fn get_device_queue2(&self, device: vk::Device, info: &vk::DeviceQueueInfo2<'_>) -> vk::Queue {
        self.get_device_queue(device, info.queue_family_index, info.queue_index)
    }

    unsafe fn create_command_pool(
        &self,
        _device: vk::Device,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.injected("command_pool")?;
        self.record(Call::CreateCommandPool {
            family: info.queue_family_index,
            resettable: info.flags.contains(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
        });
        Ok(vk::CommandPool::from_raw(next_handle()))
    }

    unsafe fn destroy_command_pool(&self, _device: vk::Device, pool: vk::CommandPool) {
        self.record(Call::DestroyCommandPool(pool));
    }

    unsafe fn allocate_command_buffer(
        &self,
        _device: vk::Device,
        _info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<vk::CommandBuffer> {
        self.injected("command_buffer")?;
        let buffer = vk::CommandBuffer::from_raw(next_handle());
        self.record(Call::AllocateCommandBuffer(buffer));
        Ok(buffer)
    }

    unsafe fn free_command_buffer(&self, _device: vk::Device, _pool: vk::CommandPool, buffer: vk::CommandBuffer) {
        self.record(Call::FreeCommandBuffer(buffer));
    }

    unsafe fn create_semaphore(&self, _device: vk::Device) -> VkResult<vk::Semaphore> {
        self.injected("semaphore")?;
        let semaphore = vk::Semaphore::from_raw(next_handle());
        self.record(Call::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    unsafe fn destroy_semaphore(&self, _device: vk::Device, semaphore: vk::Semaphore) {
        self.record(Call::DestroySemaphore(semaphore));
    }

    unsafe fn create_fence(&self, _device: vk::Device, signaled: bool) -> VkResult<vk::Fence> {
        self.injected("fence")?;
        let fence = vk::Fence::from_raw(next_handle());
        let mut state = self.state.lock();
        state.fences.insert(fence, signaled);
        state.calls.push(Call::CreateFence { fence, signaled });
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, _device: vk::Device, fence: vk::Fence) {
        let mut state = self.state.lock();
        state.fences.remove(&fence);
        state.calls.push(Call::DestroyFence(fence));
    }

    unsafe fn wait_for_fence(&self, _device: vk::Device, fence: vk::Fence, timeout: u64) -> vk::Result {
        let mut state = self.state.lock();
        state.calls.push(Call::WaitForFence(fence));
        if timeout != u64::MAX {
            state.violations.push(format!("fence wait with finite timeout {timeout}"));
        }
        match state.fences.get(&fence) {
            Some(true) => {
                state.unobserved_submission = false;
                vk::Result::SUCCESS
            }
            Some(false) => {
                // Nothing pending will ever signal it: a real driver hangs here.
                state.violations.push("wait on an unsignaled fence with no pending work".to_string());
                vk::Result::ERROR_DEVICE_LOST
            }
            None => {
                state.violations.push("wait on an unknown fence".to_string());
                vk::Result::ERROR_DEVICE_LOST
            }
        }
    }

    unsafe fn reset_fence(&self, _device: vk::Device, fence: vk::Fence) -> vk::Result {
        let mut state = self.state.lock();
        state.calls.push(Call::ResetFence(fence));
        state.fences.insert(fence, false);
        vk::Result::SUCCESS
    }

    unsafe fn reset_command_buffer(&self, _buffer: vk::CommandBuffer) -> vk::Result {
        let mut state = self.state.lock();
        FakeDevice::check_idle(&mut state, "command buffer reset");
        state.calls.push(Call::ResetCommandBuffer);
        vk::Result::SUCCESS
    }

    unsafe fn begin_command_buffer(
        &self,
        _buffer: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> vk::Result {
        if let Err(e) = self.injected("begin") {
            return e;
        }
        let mut state = self.state.lock();
        FakeDevice::check_idle(&mut state, "command buffer recording");
        state.calls.push(Call::BeginCommandBuffer);
        vk::Result::SUCCESS
    }

    unsafe fn end_command_buffer(&self, _buffer: vk::CommandBuffer) -> vk::Result {
        self.record(Call::EndCommandBuffer);
        vk::Result::SUCCESS
    }

    unsafe fn cmd_pipeline_barrier(
        &self,
        _buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        for barrier in image_barriers {
            self.record(Call::Barrier {
                image: barrier.image,
                old_layout: barrier.old_layout,
                new_layout: barrier.new_layout,
                src_stage,
            });
        }
    }

    unsafe fn cmd_begin_render_pass(&self, _buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        self.record(Call::BeginRenderPass {
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
        });
    }

    unsafe fn cmd_clear_attachments(
        &self,
        _buffer: vk::CommandBuffer,
        _attachments: &[vk::ClearAttachment],
        rects: &[vk::ClearRect],
    ) {
        self.record(Call::ClearAttachments {
            rects: rects
                .iter()
                .map(|r| (r.rect.offset.x, r.rect.offset.y, r.rect.extent.width, r.rect.extent.height))
                .collect(),
        });
    }

    unsafe fn cmd_end_render_pass(&self, _buffer: vk::CommandBuffer) {
        self.record(Call::EndRenderPass);
    }

    unsafe fn queue_submit(&self, _queue: vk::Queue, submit: &vk::SubmitInfo<'_>, fence: vk::Fence) -> vk::Result {
        let mut state = self.state.lock();
        state.calls.push(Call::Submit {
            waits: raw_slice(submit.p_wait_semaphores, submit.wait_semaphore_count).to_vec(),
            stages: raw_slice(submit.p_wait_dst_stage_mask, submit.wait_semaphore_count).to_vec(),
            signals: raw_slice(submit.p_signal_semaphores, submit.signal_semaphore_count).to_vec(),
            fence,
        });
        if state.submit_result != vk::Result::SUCCESS {
            return state.submit_result;
        }
        if state.fences.get(&fence) == Some(&true) {
            state.violations.push("submit with a fence that is still signaled".to_string());
        }
        FakeDevice::check_idle(&mut state, "submission");
        // The GPU finishes instantly; the layer only learns it by waiting.
        state.fences.insert(fence, true);
        state.unobserved_submission = true;
        vk::Result::SUCCESS
    }

    unsafe fn create_render_pass(
        &self,
        _device: vk::Device,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        self.injected("render_pass")?;
        let render_pass = vk::RenderPass::from_raw(next_handle());
        let attachment = &*info.p_attachments;
        self.record(Call::CreateRenderPass {
            render_pass,
            format: attachment.format,
            load_op: attachment.load_op,
            initial_layout: attachment.initial_layout,
            final_layout: attachment.final_layout,
        });
        Ok(render_pass)
    }

    unsafe fn destroy_render_pass(&self, _device: vk::Device, render_pass: vk::RenderPass) {
        self.record(Call::DestroyRenderPass(render_pass));
    }

    unsafe fn create_image_view(
        &self,
        _device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        self.injected("image_view")?;
        let view = vk::ImageView::from_raw(next_handle());
        self.record(Call::CreateImageView { view, image: info.image });
        Ok(view)
    }

    unsafe fn destroy_image_view(&self, _device: vk::Device, view: vk::ImageView) {
        self.record(Call::DestroyImageView(view));
    }

    unsafe fn create_framebuffer(
        &self,
        _device: vk::Device,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        self.injected("framebuffer")?;
        let framebuffer = vk::Framebuffer::from_raw(next_handle());
        self.record(Call::CreateFramebuffer {
            framebuffer,
            view: *info.p_attachments,
            width: info.width,
            height: info.height,
        });
        Ok(framebuffer)
    }

    unsafe fn destroy_framebuffer(&self, _device: vk::Device, framebuffer: vk::Framebuffer) {
        self.record(Call::DestroyFramebuffer(framebuffer));
    }

    unsafe fn create_swapchain(
        &self,
        _device: vk::Device,
        _info: *const vk::SwapchainCreateInfoKHR<'_>,
        _allocator: *const vk::AllocationCallbacks<'_>,
        swapchain: *mut vk::SwapchainKHR,
    ) -> vk::Result {
        if let Err(e) = self.injected("swapchain") {
            return e;
        }
        let handle = vk::SwapchainKHR::from_raw(next_handle());
        let mut state = self.state.lock();
        let images = (0..state.image_count)
            .map(|_| vk::Image::from_raw(next_handle()))
            .collect();
        state.images.insert(handle, images);
        state.calls.push(Call::CreateSwapchain(handle));
        *swapchain = handle;
        vk::Result::SUCCESS
    }

    unsafe fn destroy_swapchain(
        &self,
        _device: vk::Device,
        swapchain: vk::SwapchainKHR,
        _allocator: *const vk::AllocationCallbacks<'_>,
    ) {
        let mut state = self.state.lock();
        state.images.remove(&swapchain);
        state.calls.push(Call::DestroySwapchain(swapchain));
    }

    unsafe fn get_swapchain_images(
        &self,
        _device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        self.injected("images")?;
        self.state
            .lock()
            .images
            .get(&swapchain)
            .cloned()
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    unsafe fn queue_present(&self, _queue: vk::Queue, info: &vk::PresentInfoKHR<'_>) -> vk::Result {
        let mut state = self.state.lock();
        let swapchains = raw_slice(info.p_swapchains, info.swapchain_count);
        let indices = raw_slice(info.p_image_indices, info.swapchain_count);
        if swapchains.len() != 1 {
            state
                .violations
                .push(format!("forwarded present with {} swapchains", swapchains.len()));
        }
        let result = state
            .present_results
            .get(&swapchains[0])
            .copied()
            .unwrap_or(vk::Result::SUCCESS);
        if !info.p_results.is_null() {
            *info.p_results = result;
        }
        state.calls.push(Call::Present {
            waits: raw_slice(info.p_wait_semaphores, info.wait_semaphore_count).to_vec(),
            swapchain: swapchains[0],
            image_index: indices[0],
            has_p_next: !info.p_next.is_null(),
        });
        result
    }
}

// ── Loader ──────────────────────────────────────────────────────────────────

pub struct FakeLoader {
    pub instance: Arc<FakeInstance>,
    pub device: Arc<FakeDevice>,
}

impl DispatchLoader for FakeLoader {
    unsafe fn load_instance(
        &self,
        _instance: vk::Instance,
        _gipa: vk::PFN_vkGetInstanceProcAddr,
    ) -> Arc<dyn InstanceDispatch> {
        self.instance.clone()
    }

    unsafe fn load_device(&self, _device: vk::Device, _gdpa: vk::PFN_vkGetDeviceProcAddr) -> Arc<dyn DeviceDispatch> {
        self.device.clone()
    }
}

// ── Next-layer entry points ─────────────────────────────────────────────────

thread_local! {
    static NEXT_CREATE_RESULT: Cell<vk::Result> = const { Cell::new(vk::Result::SUCCESS) };
    static LINK_SEEN_BY_NEXT: Cell<usize> = const { Cell::new(0) };
    static LOADER_DATA_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Make the next layer's create call fail on this thread.
pub fn set_next_create_result(result: vk::Result) {
    NEXT_CREATE_RESULT.set(result);
}

/// Head of the link list as the next layer saw it when called.
pub fn link_seen_by_next() -> usize {
    LINK_SEEN_BY_NEXT.get()
}

pub fn loader_data_calls() -> usize {
    LOADER_DATA_CALLS.get()
}

pub unsafe extern "system" fn next_get_instance_proc_addr(
    _instance: vk::Instance,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    match CStr::from_ptr(name).to_bytes() {
        b"vkCreateInstance" => Some(std::mem::transmute::<*const (), unsafe extern "system" fn()>(
            next_create_instance as *const (),
        )),
        b"vkCreateDevice" => Some(std::mem::transmute::<*const (), unsafe extern "system" fn()>(
            next_create_device as *const (),
        )),
        _ => None,
    }
}

pub unsafe extern "system" fn empty_get_instance_proc_addr(
    _instance: vk::Instance,
    _name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    None
}

pub unsafe extern "system" fn next_get_device_proc_addr(
    _device: vk::Device,
    _name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    None
}

unsafe extern "system" fn next_create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let node = find_node((*p_create_info).p_next, LOADER_INSTANCE_CREATE_INFO) as *const LayerInstanceCreateInfo;
    LINK_SEEN_BY_NEXT.set(if node.is_null() { 0 } else { (*node).u.layer_info as usize });
    let result = NEXT_CREATE_RESULT.get();
    if result != vk::Result::SUCCESS {
        return result;
    }
    *p_instance = vk::Instance::from_raw(next_handle());
    vk::Result::SUCCESS
}

unsafe extern "system" fn next_create_device(
    _physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    let node = find_node((*p_create_info).p_next, LOADER_DEVICE_CREATE_INFO) as *const LayerDeviceCreateInfo;
    LINK_SEEN_BY_NEXT.set(if node.is_null() { 0 } else { (*node).u.layer_info as usize });
    let result = NEXT_CREATE_RESULT.get();
    if result != vk::Result::SUCCESS {
        return result;
    }
    *p_device = vk::Device::from_raw(next_handle());
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_set_device_loader_data(_device: vk::Device, _object: *mut c_void) -> vk::Result {
    LOADER_DATA_CALLS.set(LOADER_DATA_CALLS.get() + 1);
    vk::Result::SUCCESS
}

/// First link-info node of the given type in a `pNext` chain.
unsafe fn find_node(mut p: *const c_void, s_type: vk::StructureType) -> *const c_void {
    while !p.is_null() {
        let node = &*(p as *const LayerInstanceCreateInfo);
        if node.s_type == s_type && node.function == LayerFunction::LinkInfo as u32 {
            return p;
        }
        p = node.p_next;
    }
    ptr::null()
}

// ── Chains ──────────────────────────────────────────────────────────────────

/// Loader-shaped instance chain: our link, then the link of the layer below.
pub struct InstanceChain {
    below: Box<LayerInstanceLink>,
    ours: Box<LayerInstanceLink>,
    node: Box<LayerInstanceCreateInfo>,
}

impl InstanceChain {
    pub fn new(gipa: vk::PFN_vkGetInstanceProcAddr) -> Self {
        let mut below = Box::new(LayerInstanceLink {
            p_next: ptr::null_mut(),
            pfn_next_get_instance_proc_addr: next_get_instance_proc_addr,
            pfn_next_get_physical_device_proc_addr: None,
        });
        let mut ours = Box::new(LayerInstanceLink {
            p_next: &mut *below,
            pfn_next_get_instance_proc_addr: gipa,
            pfn_next_get_physical_device_proc_addr: None,
        });
        let node = Box::new(LayerInstanceCreateInfo {
            s_type: LOADER_INSTANCE_CREATE_INFO,
            p_next: ptr::null(),
            function: LayerFunction::LinkInfo as u32,
            u: LayerInstancePayload { layer_info: &mut *ours },
        });
        Self { below, ours, node }
    }

    pub fn below(&self) -> usize {
        &*self.below as *const LayerInstanceLink as usize
    }

    pub fn ours(&self) -> usize {
        &*self.ours as *const LayerInstanceLink as usize
    }

    pub fn head(&self) -> usize {
        unsafe { self.node.u.layer_info as usize }
    }

    pub fn create_info(&self) -> vk::InstanceCreateInfo<'_> {
        let mut info = vk::InstanceCreateInfo::default();
        info.p_next = &*self.node as *const LayerInstanceCreateInfo as *const c_void;
        info
    }
}

/// Loader-shaped device chain, optionally with the loader-data callback node.
pub struct DeviceChain {
    below: Box<LayerDeviceLink>,
    ours: Box<LayerDeviceLink>,
    callback: Box<LayerDeviceCreateInfo>,
    node: Box<LayerDeviceCreateInfo>,
    queue_infos: Vec<vk::DeviceQueueCreateInfo<'static>>,
}

static QUEUE_PRIORITY: [f32; 1] = [1.0];

impl DeviceChain {
    pub fn new(with_callback: bool, families: &[u32]) -> Self {
        let mut below = Box::new(LayerDeviceLink {
            p_next: ptr::null_mut(),
            pfn_next_get_instance_proc_addr: next_get_instance_proc_addr,
            pfn_next_get_device_proc_addr: next_get_device_proc_addr,
        });
        let mut ours = Box::new(LayerDeviceLink {
            p_next: &mut *below,
            pfn_next_get_instance_proc_addr: next_get_instance_proc_addr,
            pfn_next_get_device_proc_addr: next_get_device_proc_addr,
        });
        let callback = Box::new(LayerDeviceCreateInfo {
            s_type: LOADER_DEVICE_CREATE_INFO,
            p_next: ptr::null(),
            function: LayerFunction::LoaderDataCallback as u32,
            u: LayerDevicePayload {
                set_device_loader_data: Some(fake_set_device_loader_data),
            },
        });
        let node = Box::new(LayerDeviceCreateInfo {
            s_type: LOADER_DEVICE_CREATE_INFO,
            p_next: if with_callback {
                &*callback as *const LayerDeviceCreateInfo as *const c_void
            } else {
                ptr::null()
            },
            function: LayerFunction::LinkInfo as u32,
            u: LayerDevicePayload { layer_info: &mut *ours },
        });
        let queue_infos = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&QUEUE_PRIORITY)
            })
            .collect();
        Self {
            below,
            ours,
            callback,
            node,
            queue_infos,
        }
    }

    pub fn below(&self) -> usize {
        &*self.below as *const LayerDeviceLink as usize
    }

    pub fn create_info(&self) -> vk::DeviceCreateInfo<'_> {
        let mut info = vk::DeviceCreateInfo::default().queue_create_infos(&self.queue_infos);
        info.p_next = &*self.node as *const LayerDeviceCreateInfo as *const c_void;
        info
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

/// A context wired to one fake instance table and one fake device table.
pub struct Harness {
    pub ctx: LayerContext,
    pub instance_table: Arc<FakeInstance>,
    pub device_table: Arc<FakeDevice>,
}

/// Handles of a fully set up instance → device → queue → swapchain stack.
pub struct Stack {
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub queue: vk::Queue,
    pub swapchain: vk::SwapchainKHR,
}

pub const GRAPHICS_FAMILY: u32 = 1;
pub const EXTENT: vk::Extent2D = vk::Extent2D { width: 1280, height: 720 };

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LayerConfig::default())
    }

    pub fn with_config(config: LayerConfig) -> Self {
        let instance_table = Arc::new(FakeInstance::new());
        let device_table = Arc::new(FakeDevice::new());
        let loader = FakeLoader {
            instance: instance_table.clone(),
            device: device_table.clone(),
        };
        Self {
            ctx: LayerContext::new(config, Box::new(loader)),
            instance_table,
            device_table,
        }
    }

    pub fn create_instance(&self) -> vk::Instance {
        let chain = InstanceChain::new(next_get_instance_proc_addr);
        let info = chain.create_info();
        let mut instance = vk::Instance::null();
        unsafe { self.ctx.create_instance(&info, ptr::null(), &mut instance) }
            .unwrap_or_else(|e| panic!("instance creation failed: {e}"));
        instance
    }

    pub fn enumerate_physical_devices(&self, instance: vk::Instance) -> Vec<vk::PhysicalDevice> {
        let mut count = 0u32;
        unsafe {
            let counted = self
                .ctx
                .enumerate_physical_devices(instance, &mut count, ptr::null_mut())
                .unwrap_or_else(|e| panic!("enumeration failed: {e}"));
            assert_eq!(counted, vk::Result::SUCCESS);
            let mut devices = vec![vk::PhysicalDevice::null(); count as usize];
            let filled = self
                .ctx
                .enumerate_physical_devices(instance, &mut count, devices.as_mut_ptr())
                .unwrap_or_else(|e| panic!("enumeration failed: {e}"));
            assert_eq!(filled, vk::Result::SUCCESS);
            devices
        }
    }

    pub fn create_device(&self, physical_device: vk::PhysicalDevice) -> vk::Device {
        let chain = DeviceChain::new(true, &[0, GRAPHICS_FAMILY]);
        let info = chain.create_info();
        let mut device = vk::Device::null();
        unsafe { self.ctx.create_device(physical_device, &info, ptr::null(), &mut device) }
            .unwrap_or_else(|e| panic!("device creation failed: {e}"));
        device
    }

    pub fn get_queue(&self, device: vk::Device, family: u32) -> vk::Queue {
        let mut queue = vk::Queue::null();
        unsafe { self.ctx.get_device_queue(device, family, 0, &mut queue) }
            .unwrap_or_else(|e| panic!("queue lookup failed: {e}"));
        queue
    }

    pub fn create_swapchain_with_usage(&self, device: vk::Device, usage: vk::ImageUsageFlags) -> vk::SwapchainKHR {
        let info = vk::SwapchainCreateInfoKHR::default()
            .image_format(vk::Format::B8G8R8A8_SRGB)
            .image_extent(EXTENT)
            .image_usage(usage)
            .min_image_count(3);
        let mut swapchain = vk::SwapchainKHR::null();
        unsafe { self.ctx.create_swapchain(device, &info, ptr::null(), &mut swapchain) }
            .unwrap_or_else(|e| panic!("swapchain creation failed: {e}"));
        swapchain
    }

    pub fn create_swapchain(&self, device: vk::Device) -> vk::SwapchainKHR {
        self.create_swapchain_with_usage(device, vk::ImageUsageFlags::COLOR_ATTACHMENT)
    }

    pub fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        unsafe { self.ctx.destroy_swapchain(device, swapchain, ptr::null()) }
            .unwrap_or_else(|e| panic!("swapchain destruction failed: {e}"));
    }

    pub fn stack(&self) -> Stack {
        let instance = self.create_instance();
        let physical_device = self.enumerate_physical_devices(instance)[0];
        let device = self.create_device(physical_device);
        let queue = self.get_queue(device, GRAPHICS_FAMILY);
        let swapchain = self.create_swapchain(device);
        Stack {
            instance,
            physical_device,
            device,
            queue,
            swapchain,
        }
    }

    /// Present `swapchains[i]` at `indices[i]`, returning the call's result and
    /// the per-swapchain results.
    pub fn present(
        &self,
        queue: vk::Queue,
        swapchains: &[vk::SwapchainKHR],
        indices: &[u32],
        waits: &[vk::Semaphore],
    ) -> (vk::Result, Vec<vk::Result>) {
        let mut results = vec![vk::Result::NOT_READY; swapchains.len()];
        let info = vk::PresentInfoKHR::default()
            .wait_semaphores(waits)
            .swapchains(swapchains)
            .image_indices(indices)
            .results(&mut results);
        let result = unsafe { self.ctx.queue_present(queue, &info) }
            .unwrap_or_else(|e| panic!("present failed: {e}"));
        (result, results)
    }

    pub fn private_semaphore(&self, device: vk::Device) -> vk::Semaphore {
        let record = self.ctx.devices().get(device).expect("device record");
        let overlay = record.overlay.as_ref().expect("overlay resources");
        let semaphore = overlay.lock().semaphore;
        semaphore
    }
}

pub fn semaphores(n: usize) -> Vec<vk::Semaphore> {
    (0..n).map(|_| vk::Semaphore::from_raw(next_handle())).collect()
}

impl FakeDevice {
    pub fn clear_failure(&self) {
        self.state.lock().fail_at = None;
    }
}

/// Owned, nul-terminated Vulkan function name.
pub fn name(s: &str) -> std::ffi::CString {
    std::ffi::CString::new(s).expect("function name")
}
