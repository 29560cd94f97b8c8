//! A minimal real-time Vulkan renderer.
//!
//! Draws a single textured mesh with an evolving model transform. The
//! interesting machinery is the per-frame synchronization protocol in
//! [`vulkan::frame`] and the swapchain lifecycle in
//! [`vulkan::swapchain`]; everything else is setup code around them.

pub mod assets;
pub mod config;
pub mod foundation;
pub mod mesh;
pub mod vulkan;
pub mod window;

pub use config::{RendererConfig, ShaderConfig, ViewerConfig, WindowConfig};
pub use mesh::{Mesh, Vertex};
pub use vulkan::frame::FrameOutcome;
pub use vulkan::renderer::{PanelHook, SceneUniform, VulkanRenderer};
pub use vulkan::{VulkanError, VulkanResult};
pub use window::Window;
