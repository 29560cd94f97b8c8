//! The renderer: persistent GPU resources plus the frame loop driver
//!
//! `VulkanRenderer` owns everything that outlives a single frame (mesh
//! buffers, texture, uniforms, descriptor sets, pipeline, sync objects)
//! and implements the [`FrameDriver`] phases against the live device.
//! The slot-cycling logic itself lives in [`FramePipeline`]; this module
//! only supplies the Vulkan side of each phase.

use crate::config::RendererConfig;
use crate::mesh::Mesh;
use crate::vulkan::buffer::{IndexBuffer, MappedUniformBuffer, VertexBuffer};
use crate::vulkan::commands::CommandManager;
use crate::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::vulkan::descriptor::{DescriptorPool, DescriptorSetLayout};
use crate::vulkan::frame::{AcquireResult, FrameDriver, FrameOutcome, FramePipeline, PresentResult};
use crate::vulkan::framebuffers::SwapchainResources;
use crate::vulkan::pipeline::GraphicsPipeline;
use crate::vulkan::render_pass::RenderPass;
use crate::vulkan::sync::FrameSync;
use crate::vulkan::texture::{DepthBuffer, Texture};
use crate::window::{wait_for_valid_extent, Window};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use nalgebra::{Matrix4, Perspective3, Point3, Rotation3, Vector3};
use std::time::Instant;

/// Uniform block read by the vertex shader, one instance per frame slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneUniform {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

/// Extension point for drawing on top of the scene.
///
/// The hook runs inside the frame step: `update_frame_state` may adjust
/// the uniform block before it is written to the slot's buffer, and
/// `record` is called with the render pass still open, after the mesh
/// draw.
pub trait PanelHook {
    fn update_frame_state(&mut self, elapsed_seconds: f32, uniform: &mut SceneUniform);
    fn record(&mut self, cmd: vk::CommandBuffer);
}

/// Fixed camera looking at the origin from (2, 2, 2), z-up.
fn scene_uniform(model: &Matrix4<f32>, aspect: f32) -> SceneUniform {
    let view = Matrix4::look_at_rh(
        &Point3::new(2.0, 2.0, 2.0),
        &Point3::origin(),
        &Vector3::z(),
    );

    let mut proj = Perspective3::new(aspect, std::f32::consts::FRAC_PI_4, 0.1, 10.0).to_homogeneous();
    // GL-convention projection; Vulkan's clip space has Y pointing down.
    proj[(1, 1)] *= -1.0;

    SceneUniform {
        model: (*model).into(),
        view: view.into(),
        proj: proj.into(),
    }
}

/// Quarter turn per second around +Z.
fn spin(elapsed_seconds: f32) -> Matrix4<f32> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), elapsed_seconds * std::f32::consts::FRAC_PI_2)
        .to_homogeneous()
}

/// GPU resources for the loaded mesh and its texture.
struct SceneResources {
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    texture: Texture,
    uniforms: Vec<MappedUniformBuffer<SceneUniform>>,
    descriptor_pool: DescriptorPool,
}

/// Top-level renderer. Field order is teardown order; the context
/// drops last.
pub struct VulkanRenderer {
    frame_pipeline: FramePipeline,
    start_time: Instant,
    clear_color: [f32; 4],
    model_transform: Matrix4<f32>,
    auto_rotate: bool,
    panel_hook: Option<Box<dyn PanelHook>>,
    scene: Option<SceneResources>,
    targets: SwapchainResources,
    sync: FrameSync,
    commands: CommandManager,
    graphics_pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    descriptor_layout: DescriptorSetLayout,
    context: VulkanContext,
}

impl VulkanRenderer {
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, &config.application_name)?;
        let device = context.raw_device();

        let descriptor_layout = DescriptorSetLayout::new(device.clone())?;

        let depth_format = DepthBuffer::preferred_format(&context)?;
        let render_pass = RenderPass::new(device.clone(), context.swapchain().format().format, depth_format)?;

        let graphics_pipeline = GraphicsPipeline::new(
            device.clone(),
            &config.shaders,
            render_pass.handle(),
            descriptor_layout.handle(),
        )?;

        let commands = CommandManager::new(
            device.clone(),
            context.graphics_queue_family(),
            config.max_frames_in_flight,
        )?;
        let sync = FrameSync::new(&device, config.max_frames_in_flight)?;
        let targets = SwapchainResources::new(&context, &render_pass)?;
        let frame_pipeline = FramePipeline::new(config.max_frames_in_flight)?;

        log::info!(
            "Renderer initialized: {} frame slots, {} swapchain images",
            config.max_frames_in_flight,
            context.swapchain().image_count()
        );

        Ok(Self {
            frame_pipeline,
            start_time: Instant::now(),
            clear_color: config.clear_color,
            model_transform: Matrix4::identity(),
            auto_rotate: true,
            panel_hook: None,
            scene: None,
            targets,
            sync,
            commands,
            graphics_pipeline,
            render_pass,
            descriptor_layout,
            context,
        })
    }

    /// Upload the mesh and texture and wire up per-slot descriptors.
    /// Replaces any previously loaded scene.
    pub fn load_scene(&mut self, mesh: &Mesh, pixels: &RgbaImage) -> VulkanResult<()> {
        // The old scene's buffers may still be referenced by in-flight
        // frames.
        if self.scene.is_some() {
            self.context.wait_idle()?;
            self.scene = None;
        }

        let slots = self.frame_pipeline.slot_count();

        let vertex_buffer = VertexBuffer::new(&self.context, &self.commands, &mesh.vertices)?;
        let index_buffer = IndexBuffer::new(&self.context, &self.commands, &mesh.indices)?;
        let texture = Texture::from_rgba(&self.context, &self.commands, pixels)?;

        let mut uniforms = Vec::with_capacity(slots);
        for _ in 0..slots {
            uniforms.push(MappedUniformBuffer::<SceneUniform>::new(&self.context)?);
        }

        let descriptor_pool = DescriptorPool::new(self.context.raw_device(), &self.descriptor_layout, slots)?;
        for (slot, uniform) in uniforms.iter().enumerate() {
            descriptor_pool.write_set(slot, uniform.handle(), uniform.size(), texture.view(), texture.sampler());
        }

        log::info!(
            "Scene loaded: {} vertices, {} indices",
            vertex_buffer.vertex_count(),
            index_buffer.index_count()
        );

        self.scene = Some(SceneResources {
            vertex_buffer,
            index_buffer,
            texture,
            uniforms,
            descriptor_pool,
        });
        Ok(())
    }

    /// Base model transform, composed with the auto-rotation each frame.
    pub fn set_model_transform(&mut self, transform: Matrix4<f32>) {
        self.model_transform = transform;
    }

    pub fn model_transform(&self) -> Matrix4<f32> {
        self.model_transform
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn set_panel_hook(&mut self, hook: Box<dyn PanelHook>) {
        self.panel_hook = Some(hook);
    }

    pub fn current_slot(&self) -> usize {
        self.frame_pipeline.current_slot()
    }

    /// Block until all submitted GPU work has retired.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Run one frame step: wait, acquire, update, record, submit,
    /// present, advance. Transient swapchain staleness is handled
    /// internally; any returned error is fatal.
    pub fn render_frame(&mut self, window: &mut Window) -> VulkanResult<FrameOutcome> {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let model = if self.auto_rotate {
            self.model_transform * spin(elapsed)
        } else {
            self.model_transform
        };

        let Self {
            frame_pipeline,
            clear_color,
            panel_hook,
            scene,
            targets,
            sync,
            commands,
            graphics_pipeline,
            render_pass,
            context,
            ..
        } = self;

        let mut driver = StepDriver {
            context,
            sync,
            commands,
            targets,
            graphics_pipeline,
            render_pass,
            scene: scene.as_mut(),
            panel_hook: panel_hook.as_deref_mut(),
            window,
            clear_color: *clear_color,
            elapsed_seconds: elapsed,
            model,
        };

        frame_pipeline.step(&mut driver)
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // Drain the device before fields tear down in declaration order.
        let _ = self.context.wait_idle();
    }
}

/// One frame step's view of the renderer, borrowed field by field so
/// the frame pipeline can be driven mutably alongside them.
struct StepDriver<'a> {
    context: &'a mut VulkanContext,
    sync: &'a FrameSync,
    commands: &'a CommandManager,
    targets: &'a mut SwapchainResources,
    graphics_pipeline: &'a GraphicsPipeline,
    render_pass: &'a RenderPass,
    scene: Option<&'a mut SceneResources>,
    panel_hook: Option<&'a mut (dyn PanelHook + 'static)>,
    window: &'a mut Window,
    clear_color: [f32; 4],
    elapsed_seconds: f32,
    model: Matrix4<f32>,
}

impl FrameDriver for StepDriver<'_> {
    fn wait_slot_free(&mut self, slot: usize) -> VulkanResult<()> {
        self.sync.slot(slot).in_flight.wait()
    }

    fn arm_slot_gate(&mut self, slot: usize) -> VulkanResult<()> {
        self.sync.slot(slot).in_flight.reset()
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireResult> {
        let swapchain = self.context.swapchain();
        let result = unsafe {
            swapchain.loader().acquire_next_image(
                swapchain.handle(),
                u64::MAX,
                self.sync.slot(slot).image_available.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireResult::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn update_frame_state(&mut self, slot: usize) -> VulkanResult<()> {
        let Some(scene) = self.scene.as_deref_mut() else {
            return Ok(());
        };

        let extent = self.targets.extent;
        let aspect = extent.width as f32 / extent.height as f32;
        let mut uniform = scene_uniform(&self.model, aspect);

        if let Some(hook) = self.panel_hook.as_mut() {
            hook.update_frame_state(self.elapsed_seconds, &mut uniform);
        }

        scene.uniforms[slot].write(&uniform);
        Ok(())
    }

    fn record_draw_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let device = self.context.raw_device();
        let cmd = self.commands.begin(slot)?;
        let extent = self.targets.extent;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass.handle())
            .framebuffer(self.targets.framebuffers[image_index as usize].handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(cmd, &pass_begin, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);

            if let Some(scene) = self.scene.as_ref() {
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.graphics_pipeline.handle());
                device.cmd_bind_vertex_buffers(cmd, 0, &[scene.vertex_buffer.handle()], &[0]);
                device.cmd_bind_index_buffer(cmd, scene.index_buffer.handle(), 0, vk::IndexType::UINT32);
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.graphics_pipeline.layout(),
                    0,
                    &[scene.descriptor_pool.set(slot)],
                    &[],
                );
                device.cmd_draw_indexed(cmd, scene.index_buffer.index_count(), 1, 0, 0, 0);
            }

            if let Some(hook) = self.panel_hook.as_mut() {
                hook.record(cmd);
            }

            device.cmd_end_render_pass(cmd);
        }

        self.commands.end(slot)
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let slot_sync = self.sync.slot(slot);
        let wait_semaphores = [slot_sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.commands.buffer(slot)];
        let signal_semaphores = [slot_sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .raw_device()
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    slot_sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentResult> {
        let swapchain = self.context.swapchain();
        let wait_semaphores = [self.sync.slot(slot).render_finished.handle()];
        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::Stale),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn take_resize_pending(&mut self) -> bool {
        self.window.take_resize_flag()
    }

    fn rebuild_surface_resources(&mut self) -> VulkanResult<()> {
        // In-flight work may still reference the old images; drain first.
        self.context.wait_idle()?;

        let (width, height) = wait_for_valid_extent(self.window);
        self.context.recreate_swapchain(vk::Extent2D { width, height })?;
        *self.targets = SwapchainResources::new(self.context, self.render_pass)?;

        log::debug!("Surface resources rebuilt at {}x{}", width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scene_uniform_layout() {
        assert_eq!(std::mem::size_of::<SceneUniform>(), 192);
        assert_eq!(std::mem::align_of::<SceneUniform>(), 4);
    }

    #[test]
    fn test_projection_flips_y_for_vulkan_clip_space() {
        let uniform = scene_uniform(&Matrix4::identity(), 4.0 / 3.0);
        let unflipped = Perspective3::new(4.0 / 3.0, std::f32::consts::FRAC_PI_4, 0.1, 10.0).to_homogeneous();

        assert_relative_eq!(uniform.proj[1][1], -unflipped[(1, 1)]);
        assert_relative_eq!(uniform.proj[0][0], unflipped[(0, 0)]);
    }

    #[test]
    fn test_view_matrix_places_camera_at_eye() {
        let uniform = scene_uniform(&Matrix4::identity(), 1.0);
        let view = Matrix4::from(uniform.view);
        let eye = view.transform_point(&Point3::new(2.0, 2.0, 2.0));

        // The eye maps to the view-space origin.
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_spin_is_quarter_turn_per_second() {
        let rotated = spin(1.0).transform_vector(&Vector3::x());
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-6);

        let full = spin(4.0).transform_vector(&Vector3::x());
        assert_relative_eq!(full.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(full.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_scene_uniform_is_deterministic() {
        let model = spin(0.5);
        let a = scene_uniform(&model, 16.0 / 9.0);
        let b = scene_uniform(&model, 16.0 / 9.0);
        assert_eq!(a.model, b.model);
        assert_eq!(a.view, b.view);
        assert_eq!(a.proj, b.proj);
    }
}
