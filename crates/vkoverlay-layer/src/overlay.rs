//! What gets drawn into the presented image.
//!
//! The painter runs inside the layer's render pass on the swapchain image, so
//! everything the application rendered is preserved and the painter only adds
//! to it.

use ash::vk;
use vkoverlay_core::config::{Corner, OverlayConfig};

use crate::dispatch::DeviceDispatch;

/// Height of the frame meter bar, in pixels.
pub const METER_HEIGHT: u32 = 4;
/// Gap between the badge and the frame meter, in pixels.
pub const METER_GAP: u32 = 2;
/// Frames for the meter to sweep the full badge width once.
pub const METER_PERIOD: u64 = 60;

const METER_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Per-present state handed to a painter.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Command buffer in recording state, inside the overlay render pass.
    pub command_buffer: vk::CommandBuffer,
    pub extent: vk::Extent2D,
    pub image_index: u32,
    /// Frames composited on this device so far.
    pub frame_index: u64,
}

/// Records the overlay's draw commands.
pub trait OverlayPainter: Send + Sync {
    unsafe fn paint(&self, frame: &FrameContext, dispatch: &dyn DeviceDispatch);
}

/// Solid badge in a configurable corner, with an optional bar under it that
/// advances once per composited frame.
pub struct BadgePainter {
    config: OverlayConfig,
}

impl BadgePainter {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    /// Badge rectangle for an image of the given size, or `None` when the
    /// image is too small to hold it.
    pub fn badge_rect(&self, extent: vk::Extent2D) -> Option<vk::Rect2D> {
        // Config values are unbounded: all arithmetic below saturates.
        let margin = self.config.margin;
        let reserved = if self.config.frame_meter { METER_GAP + METER_HEIGHT } else { 0 };
        let width = self
            .config
            .width
            .min(extent.width.saturating_sub(margin.saturating_mul(2)));
        let height = self
            .config
            .height
            .min(extent.height.saturating_sub(margin.saturating_mul(2).saturating_add(reserved)));
        if width == 0 || height == 0 {
            return None;
        }
        let x = match self.config.corner {
            Corner::TopLeft | Corner::BottomLeft => margin,
            Corner::TopRight | Corner::BottomRight => extent.width.saturating_sub(margin).saturating_sub(width),
        };
        let y = match self.config.corner {
            Corner::TopLeft | Corner::TopRight => margin,
            Corner::BottomLeft | Corner::BottomRight => extent
                .height
                .saturating_sub(margin)
                .saturating_sub(reserved)
                .saturating_sub(height),
        };
        Some(rect(x, y, width, height))
    }

    /// Meter rectangle directly under the badge for the given frame.
    pub fn meter_rect(&self, badge: vk::Rect2D, frame_index: u64) -> Option<vk::Rect2D> {
        if !self.config.frame_meter {
            return None;
        }
        let step = frame_index % METER_PERIOD + 1;
        let width = (u64::from(badge.extent.width) * step / METER_PERIOD) as u32;
        if width == 0 {
            return None;
        }
        let y = (badge.offset.y as u32)
            .saturating_add(badge.extent.height)
            .saturating_add(METER_GAP);
        Some(rect(badge.offset.x as u32, y, width, METER_HEIGHT))
    }
}

impl OverlayPainter for BadgePainter {
    unsafe fn paint(&self, frame: &FrameContext, dispatch: &dyn DeviceDispatch) {
        let Some(badge) = self.badge_rect(frame.extent) else {
            return;
        };
        dispatch.cmd_clear_attachments(
            frame.command_buffer,
            &[clear_color(self.config.color)],
            &[clear_rect(badge)],
        );
        if let Some(meter) = self.meter_rect(badge, frame.frame_index) {
            dispatch.cmd_clear_attachments(
                frame.command_buffer,
                &[clear_color(METER_COLOR)],
                &[clear_rect(meter)],
            );
        }
    }
}

fn rect(x: u32, y: u32, width: u32, height: u32) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: x as i32, y: y as i32 },
        extent: vk::Extent2D { width, height },
    }
}

fn clear_rect(rect: vk::Rect2D) -> vk::ClearRect {
    vk::ClearRect {
        rect,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn clear_color(float32: [f32; 4]) -> vk::ClearAttachment {
    vk::ClearAttachment {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        color_attachment: 0,
        clear_value: vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
    }
}
