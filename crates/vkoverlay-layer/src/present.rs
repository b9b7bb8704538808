//! Present interception: composite the overlay into each presented image,
//! then hand the image to the next layer.
//!
//! Each swapchain in a batch gets its own injected submission and its own
//! forwarded single-swapchain present. The injected submission takes over the
//! application's wait semaphores and signals the device's private semaphore,
//! which is the only thing the forwarded present waits on.
//!
//! The application's semaphores can be waited on only once per batch. The
//! first fence-gated submission on the device consumes them. Every later
//! entry in the batch is ordered behind it by the overlay fence, whether it
//! is composited or passed through.

use std::ffi::c_void;
use std::ptr;

use ash::vk;
use ash::vk::Handle;
use tracing::{error, warn};
use vkoverlay_core::LayerError;

use crate::context::{report_invariant_violation, LayerContext};
use crate::device::{DeviceOverlay, DeviceRecord, QueueRecord};
use crate::dispatch::DeviceDispatch;
use crate::overlay::FrameContext;
use crate::swapchain::{ShadowPass, SwapchainRecord, COLOR_SUBRESOURCE_RANGE};

/// Stage the injected submission waits at, and the source scope of its
/// layout barrier.
pub const OVERLAY_WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

/// Stage an empty hand-off submission waits at. Valid on every queue family.
pub const HANDOFF_WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::ALL_COMMANDS;

/// One entry of the application's present batch.
struct PresentTarget {
    swapchain: vk::SwapchainKHR,
    image_index: u32,
    p_next: *const c_void,
    p_result: *mut vk::Result,
    /// No entries follow this one in the batch.
    last: bool,
}

/// The application's wait semaphores as a batch hands them out.
struct BatchWaits<'a> {
    /// Not yet waited on by anything this layer forwarded.
    pending: &'a [vk::Semaphore],
    /// Consumed by a submission gated on the overlay fence.
    fenced: bool,
}

impl<'a> BatchWaits<'a> {
    fn take(&mut self) -> &'a [vk::Semaphore] {
        std::mem::take(&mut self.pending)
    }
}

/// The shadow targets of the image being presented.
struct DrawTarget<'r> {
    shadow: &'r ShadowPass,
    image: vk::Image,
    framebuffer: vk::Framebuffer,
}

impl LayerContext {
    pub unsafe fn queue_present(
        &self,
        queue: vk::Queue,
        p_present_info: *const vk::PresentInfoKHR<'_>,
    ) -> Result<vk::Result, LayerError> {
        let info = &*p_present_info;
        let queue_record = self.queues.get(queue)?;
        let device_record = self.devices.get(queue_record.device)?;

        let count = info.swapchain_count as usize;
        let swapchains = raw_slice(info.p_swapchains, count);
        let image_indices = raw_slice(info.p_image_indices, count);
        let mut waits = BatchWaits {
            pending: raw_slice(info.p_wait_semaphores, info.wait_semaphore_count as usize),
            fenced: false,
        };

        let mut first_failure = vk::Result::SUCCESS;
        for (i, (&swapchain, &image_index)) in swapchains.iter().zip(image_indices).enumerate() {
            let target = PresentTarget {
                swapchain,
                image_index,
                p_next: if count == 1 { info.p_next } else { ptr::null() },
                p_result: if info.p_results.is_null() {
                    ptr::null_mut()
                } else {
                    info.p_results.add(i)
                },
                last: i + 1 == count,
            };
            let result = self.present_one(queue, &queue_record, &device_record, &target, &mut waits);
            if first_failure == vk::Result::SUCCESS && result != vk::Result::SUCCESS {
                first_failure = result;
            }
        }
        Ok(first_failure)
    }

    unsafe fn present_one(
        &self,
        queue: vk::Queue,
        queue_record: &QueueRecord,
        device_record: &DeviceRecord,
        target: &PresentTarget,
        waits: &mut BatchWaits<'_>,
    ) -> vk::Result {
        let dispatch = &*device_record.dispatch;
        let Some(overlay) = &device_record.overlay else {
            return forward_present(dispatch, queue, target, waits.take());
        };
        let swapchain_record = match self.swapchains.get(target.swapchain) {
            Ok(record) => Some(record),
            Err(e) => {
                report_invariant_violation(&e);
                None
            }
        };

        // Held through the forwarded present: nothing else may touch the
        // command buffer or the private semaphore until this image is queued.
        let mut overlay = overlay.lock();
        if !overlay.active {
            return forward_present(dispatch, queue, target, waits.take());
        }
        let device = queue_record.device;
        let drawable = swapchain_record
            .as_deref()
            .and_then(|record| Some((record, draw_target(record, &overlay, queue_record, target)?)));
        let Some((swapchain_record, draw)) = drawable else {
            return pass_through(dispatch, queue, device, &mut overlay, target, waits);
        };

        let idle = overlay.wait_idle(dispatch, device);
        if idle != vk::Result::SUCCESS {
            return idle;
        }

        let frame = FrameContext {
            command_buffer: overlay.command_buffer,
            extent: swapchain_record.extent,
            image_index: target.image_index,
            frame_index: overlay.frames,
        };
        if let Err(result) = self.record_overlay(dispatch, swapchain_record, &draw, &frame) {
            warn!("overlay recording failed with {result:?}; presenting without overlay");
            return pass_through(dispatch, queue, device, &mut overlay, target, waits);
        }

        let consumed = waits.take();
        let wait_stages = vec![OVERLAY_WAIT_STAGE; consumed.len()];
        let command_buffers = [overlay.command_buffer];
        let signals = [overlay.semaphore];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(consumed)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signals);
        let submitted = submit_gated(dispatch, queue, device, &mut overlay, &submit);
        if submitted != vk::Result::SUCCESS {
            return submitted;
        }
        waits.fenced |= !consumed.is_empty();
        overlay.frames += 1;

        forward_present(dispatch, queue, target, &signals)
    }

    /// Record the barrier, the render pass and the painter's commands.
    unsafe fn record_overlay(
        &self,
        dispatch: &dyn DeviceDispatch,
        swapchain: &SwapchainRecord,
        draw: &DrawTarget<'_>,
        frame: &FrameContext,
    ) -> Result<(), vk::Result> {
        let cmd = frame.command_buffer;
        dispatch.reset_command_buffer(cmd).result()?;
        let begin = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        dispatch.begin_command_buffer(cmd, &begin).result()?;

        // The application already moved the image to PRESENT_SRC.
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .old_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(draw.image)
            .subresource_range(COLOR_SUBRESOURCE_RANGE);
        dispatch.cmd_pipeline_barrier(
            cmd,
            OVERLAY_WAIT_STAGE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            &[barrier],
        );

        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(draw.shadow.render_pass)
            .framebuffer(draw.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: swapchain.extent,
            });
        dispatch.cmd_begin_render_pass(cmd, &render_pass_begin);
        self.painter.paint(frame, dispatch);
        dispatch.cmd_end_render_pass(cmd);

        dispatch.end_command_buffer(cmd).result()
    }
}

/// Shadow targets for the presented image, or `None` when this entry cannot
/// be composited.
fn draw_target<'r>(
    swapchain: &'r SwapchainRecord,
    overlay: &DeviceOverlay,
    queue_record: &QueueRecord,
    target: &PresentTarget,
) -> Option<DrawTarget<'r>> {
    let shadow = swapchain.shadow.as_ref()?;
    if overlay.queue_family != queue_record.family_index {
        return None;
    }
    let index = target.image_index as usize;
    let (Some(&image), Some(&framebuffer)) = (shadow.images.get(index), shadow.framebuffers.get(index)) else {
        warn!(
            "image index {} out of range for swapchain {:#x}",
            target.image_index,
            target.swapchain.as_raw()
        );
        return None;
    };
    Some(DrawTarget {
        shadow,
        image,
        framebuffer,
    })
}

/// Present an entry without compositing while keeping the batch ordered
/// behind the application's semaphores.
///
/// If later entries still need those semaphores, an empty submission takes
/// them over and signals the private semaphore under the overlay fence, so
/// the later entries can order themselves by waiting on the fence.
unsafe fn pass_through(
    dispatch: &dyn DeviceDispatch,
    queue: vk::Queue,
    device: vk::Device,
    overlay: &mut DeviceOverlay,
    target: &PresentTarget,
    waits: &mut BatchWaits<'_>,
) -> vk::Result {
    if waits.pending.is_empty() || target.last {
        if waits.fenced {
            let idle = overlay.wait_idle(dispatch, device);
            if idle != vk::Result::SUCCESS {
                return idle;
            }
        }
        return forward_present(dispatch, queue, target, waits.take());
    }

    let idle = overlay.wait_idle(dispatch, device);
    if idle != vk::Result::SUCCESS {
        return idle;
    }
    let consumed = waits.take();
    let wait_stages = vec![HANDOFF_WAIT_STAGE; consumed.len()];
    let signals = [overlay.semaphore];
    let submit = vk::SubmitInfo::default()
        .wait_semaphores(consumed)
        .wait_dst_stage_mask(&wait_stages)
        .signal_semaphores(&signals);
    let submitted = submit_gated(dispatch, queue, device, overlay, &submit);
    if submitted != vk::Result::SUCCESS {
        return submitted;
    }
    waits.fenced = true;
    forward_present(dispatch, queue, target, &signals)
}

/// Submit with the overlay fence. The fence must be signaled on entry.
unsafe fn submit_gated(
    dispatch: &dyn DeviceDispatch,
    queue: vk::Queue,
    device: vk::Device,
    overlay: &mut DeviceOverlay,
    submit: &vk::SubmitInfo<'_>,
) -> vk::Result {
    let reset = dispatch.reset_fence(device, overlay.fence);
    if reset != vk::Result::SUCCESS {
        return reset;
    }
    let submitted = dispatch.queue_submit(queue, submit, overlay.fence);
    if submitted != vk::Result::SUCCESS {
        disable_overlay(overlay, device, submitted);
    }
    submitted
}

/// Forward a single-swapchain present waiting on `waits`.
unsafe fn forward_present(
    dispatch: &dyn DeviceDispatch,
    queue: vk::Queue,
    target: &PresentTarget,
    waits: &[vk::Semaphore],
) -> vk::Result {
    let swapchains = [target.swapchain];
    let image_indices = [target.image_index];
    let mut info = vk::PresentInfoKHR::default()
        .wait_semaphores(waits)
        .swapchains(&swapchains)
        .image_indices(&image_indices);
    info.p_next = target.p_next;
    info.p_results = target.p_result;
    dispatch.queue_present(queue, &info)
}

fn disable_overlay(overlay: &mut DeviceOverlay, device: vk::Device, result: vk::Result) {
    error!(
        "overlay submission on device {:#x} failed with {result:?}; overlay disabled",
        device.as_raw()
    );
    overlay.active = false;
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

// ── Hook ────────────────────────────────────────────────────────────────────

pub(crate) unsafe extern "system" fn queue_present(
    queue: vk::Queue,
    p_present_info: *const vk::PresentInfoKHR<'_>,
) -> vk::Result {
    let ctx = crate::context();
    ctx.queue_present(queue, p_present_info)
        .unwrap_or_else(|e| ctx.fail("vkQueuePresentKHR", e))
}
