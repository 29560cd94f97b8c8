//! Vulkan backend implementation
//!
//! Organized into context/initialization, resource wrappers, the
//! swapchain, the frame pipeline state machine, and the renderer that
//! ties them together.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod frame;
pub mod framebuffers;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use buffer::{Buffer, IndexBuffer, MappedUniformBuffer, StagingBuffer, VertexBuffer};
pub use commands::CommandManager;
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use descriptor::{DescriptorPool, DescriptorSetLayout};
pub use frame::{AcquireResult, FrameDriver, FrameOutcome, FramePipeline, PresentResult};
pub use framebuffers::{Framebuffer, SwapchainResources};
pub use pipeline::{GraphicsPipeline, ShaderModule};
pub use render_pass::RenderPass;
pub use renderer::{PanelHook, SceneUniform, VulkanRenderer};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::{DepthBuffer, Texture};
