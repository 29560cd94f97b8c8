//! Framebuffers and the other per-swapchain resources
//!
//! Everything whose lifetime is tied to the current swapchain lives in
//! `SwapchainResources`: one framebuffer per swapchain image plus the
//! shared depth attachment. Dropping and rebuilding this struct is the
//! whole of swapchain-dependent recreation.

use crate::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::vulkan::render_pass::RenderPass;
use crate::vulkan::texture::DepthBuffer;
use ash::{vk, Device};

pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let attachments = [color_view, depth_view];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, framebuffer })
    }

    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Resources rebuilt whenever the swapchain is replaced.
///
/// The depth attachment is shared across swapchain images; frames are
/// serialized at the depth test by the subpass dependency, so one is
/// enough.
pub struct SwapchainResources {
    pub depth: DepthBuffer,
    pub framebuffers: Vec<Framebuffer>,
    pub extent: vk::Extent2D,
}

impl SwapchainResources {
    /// Build framebuffers and depth attachment for the context's
    /// current swapchain.
    pub fn new(context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<Self> {
        let swapchain = context.swapchain();
        let extent = swapchain.extent();

        let depth = DepthBuffer::new(context, extent)?;

        let framebuffers: VulkanResult<Vec<_>> = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    context.raw_device(),
                    render_pass.handle(),
                    view,
                    depth.view(),
                    extent,
                )
            })
            .collect();

        Ok(Self {
            depth,
            framebuffers: framebuffers?,
            extent,
        })
    }
}
