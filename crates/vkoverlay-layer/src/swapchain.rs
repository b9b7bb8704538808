//! Shadow render targets for each swapchain: a load-preserving render pass
//! plus one view and framebuffer per image the driver handed out.

use ash::vk;
use ash::vk::Handle;
use tracing::{info, warn};
use vkoverlay_core::LayerError;

use crate::context::LayerContext;
use crate::dispatch::DeviceDispatch;

pub const COLOR_SUBRESOURCE_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

pub struct SwapchainRecord {
    pub device: vk::Device,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    /// `None` when this swapchain is presented without compositing.
    pub shadow: Option<ShadowPass>,
}

#[derive(Debug, Default)]
pub struct ShadowPass {
    pub render_pass: vk::RenderPass,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl ShadowPass {
    unsafe fn build(
        dispatch: &dyn DeviceDispatch,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self, LayerError> {
        let mut shadow = Self::default();
        if let Err(e) = shadow.create_objects(dispatch, device, swapchain, format, extent) {
            shadow.destroy(dispatch, device);
            return Err(e);
        }
        Ok(shadow)
    }

    unsafe fn create_objects(
        &mut self,
        dispatch: &dyn DeviceDispatch,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<(), LayerError> {
        self.render_pass = create_render_pass(dispatch, device, format)?;
        self.images = dispatch
            .get_swapchain_images(device, swapchain)
            .map_err(LayerError::overlay("swapchain images"))?;

        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(COLOR_SUBRESOURCE_RANGE);
            let view = dispatch
                .create_image_view(device, &view_info)
                .map_err(LayerError::overlay("image view"))?;
            self.image_views.push(view);

            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = dispatch
                .create_framebuffer(device, &framebuffer_info)
                .map_err(LayerError::overlay("framebuffer"))?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Framebuffers, then views, then the render pass they reference.
    unsafe fn destroy(&self, dispatch: &dyn DeviceDispatch, device: vk::Device) {
        for &framebuffer in &self.framebuffers {
            dispatch.destroy_framebuffer(device, framebuffer);
        }
        for &view in &self.image_views {
            dispatch.destroy_image_view(device, view);
        }
        if self.render_pass != vk::RenderPass::null() {
            dispatch.destroy_render_pass(device, self.render_pass);
        }
    }
}

/// One color attachment that keeps what the application rendered and leaves
/// the image ready to present.
unsafe fn create_render_pass(
    dispatch: &dyn DeviceDispatch,
    device: vk::Device,
    format: vk::Format,
) -> Result<vk::RenderPass, LayerError> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::LOAD)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];
    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];
    let dependencies = [vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }];
    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    dispatch
        .create_render_pass(device, &info)
        .map_err(LayerError::overlay("render pass"))
}

impl LayerContext {
    pub unsafe fn create_swapchain(
        &self,
        device: vk::Device,
        p_create_info: *const vk::SwapchainCreateInfoKHR<'_>,
        p_allocator: *const vk::AllocationCallbacks<'_>,
        p_swapchain: *mut vk::SwapchainKHR,
    ) -> Result<(), LayerError> {
        let record = self.devices.get(device)?;
        record
            .dispatch
            .create_swapchain(device, p_create_info, p_allocator, p_swapchain)
            .result()?;

        let swapchain = *p_swapchain;
        let info = &*p_create_info;
        let shadow = if record.is_inert() {
            None
        } else if !info.image_usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT) {
            warn!(
                "swapchain {:#x} images are not color attachments; presenting without overlay",
                swapchain.as_raw()
            );
            None
        } else {
            match ShadowPass::build(&*record.dispatch, device, swapchain, info.image_format, info.image_extent) {
                Ok(shadow) => Some(shadow),
                Err(e) => {
                    warn!("swapchain {:#x} left without overlay: {e}", swapchain.as_raw());
                    None
                }
            }
        };

        info!(
            "swapchain {:#x} created: {}x{} {:?}, {} shadow framebuffers",
            swapchain.as_raw(),
            info.image_extent.width,
            info.image_extent.height,
            info.image_format,
            shadow.as_ref().map_or(0, |s| s.framebuffers.len())
        );
        self.swapchains.insert(
            swapchain,
            SwapchainRecord {
                device,
                format: info.image_format,
                extent: info.image_extent,
                shadow,
            },
        );
        Ok(())
    }

    pub unsafe fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        p_allocator: *const vk::AllocationCallbacks<'_>,
    ) -> Result<(), LayerError> {
        let record = self.devices.get(device)?;
        if swapchain == vk::SwapchainKHR::null() {
            record.dispatch.destroy_swapchain(device, swapchain, p_allocator);
            return Ok(());
        }
        let lookup = self.swapchains.get(swapchain);
        if let Ok(swapchain_record) = &lookup {
            if let (Some(shadow), Some(overlay)) = (&swapchain_record.shadow, &record.overlay) {
                // The last overlay submission may still target these framebuffers.
                let overlay = overlay.lock();
                let idle = overlay.wait_idle(&*record.dispatch, device);
                if idle != vk::Result::SUCCESS {
                    warn!("overlay fence wait on swapchain teardown returned {idle:?}");
                }
                shadow.destroy(&*record.dispatch, device);
            }
        }
        record.dispatch.destroy_swapchain(device, swapchain, p_allocator);
        lookup?;
        self.swapchains.remove(swapchain)?;
        info!("swapchain {:#x} destroyed", swapchain.as_raw());
        Ok(())
    }
}

// ── Hooks ───────────────────────────────────────────────────────────────────

pub(crate) unsafe extern "system" fn create_swapchain(
    device: vk::Device,
    p_create_info: *const vk::SwapchainCreateInfoKHR<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_swapchain: *mut vk::SwapchainKHR,
) -> vk::Result {
    let ctx = crate::context();
    match ctx.create_swapchain(device, p_create_info, p_allocator, p_swapchain) {
        Ok(()) => vk::Result::SUCCESS,
        Err(e) => ctx.fail("vkCreateSwapchainKHR", e),
    }
}

pub(crate) unsafe extern "system" fn destroy_swapchain(
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    let ctx = crate::context();
    if let Err(e) = ctx.destroy_swapchain(device, swapchain, p_allocator) {
        ctx.fail("vkDestroySwapchainKHR", e);
    }
}
