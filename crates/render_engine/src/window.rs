//! GLFW-based window management for Vulkan rendering.
//!
//! Owns the native window and the resize notification flag, and is the
//! renderer's surface provider: it reports the current drawable size
//! and blocks while the window is minimized to a zero-sized area.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("GLFW initialization failed")]
    InitializationFailed,

    #[error("Window creation failed")]
    CreationFailed,

    #[error("GLFW error: {0}")]
    GlfwError(String),
}

pub type WindowResult<T> = Result<T, WindowError>;

/// Anything that can report a drawable size and block for new events.
///
/// The renderer only touches the window through this seam during
/// swapchain recreation, which keeps the degenerate-size handling
/// testable without a real window system.
pub trait SurfaceProvider {
    /// Current drawable (framebuffer) size in pixels.
    fn drawable_size(&self) -> (u32, u32);
    /// Block until the window system delivers new events.
    fn wait_events(&mut self);
}

/// Block until the provider reports a non-degenerate drawable size.
///
/// A minimized window reports a zero dimension; creating swapchain
/// images against that extent is invalid, so recreation parks here
/// until the surface becomes usable again.
pub fn wait_for_valid_extent(provider: &mut dyn SurfaceProvider) -> (u32, u32) {
    loop {
        let (width, height) = provider.drawable_size();
        if width > 0 && height > 0 {
            return (width, height);
        }
        provider.wait_events();
    }
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
}

impl Window {
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        // Vulkan rendering: no OpenGL context.
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
        })
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll the window system and drain pending events.
    ///
    /// Framebuffer-size events are folded into the resize flag; all
    /// events are also returned so the application can react to input.
    pub fn poll_events(&mut self) -> Vec<glfw::WindowEvent> {
        self.glfw.poll_events();
        let mut out = Vec::new();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(_, _) = event {
                self.framebuffer_resized = true;
            }
            out.push(event);
        }
        out
    }

    /// Consume the resize notification. Returns true at most once per
    /// resize, so the frame pipeline checks it exactly where it can act.
    pub fn take_resize_flag(&mut self) -> bool {
        std::mem::replace(&mut self.framebuffer_resized, false)
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }
}

impl SurfaceProvider for Window {
    fn drawable_size(&self) -> (u32, u32) {
        self.framebuffer_size()
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(_, _) = event {
                self.framebuffer_resized = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Surface provider that replays a scripted size sequence.
    struct ScriptedProvider {
        sizes: Vec<(u32, u32)>,
        cursor: usize,
        waits: usize,
    }

    impl ScriptedProvider {
        fn new(sizes: Vec<(u32, u32)>) -> Self {
            Self { sizes, cursor: 0, waits: 0 }
        }
    }

    impl SurfaceProvider for ScriptedProvider {
        fn drawable_size(&self) -> (u32, u32) {
            self.sizes[self.cursor.min(self.sizes.len() - 1)]
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            self.cursor += 1;
        }
    }

    #[test]
    fn test_valid_extent_returned_immediately() {
        let mut provider = ScriptedProvider::new(vec![(800, 600)]);
        assert_eq!(wait_for_valid_extent(&mut provider), (800, 600));
        assert_eq!(provider.waits, 0);
    }

    #[test]
    fn test_degenerate_sizes_block_until_valid() {
        let mut provider = ScriptedProvider::new(vec![(0, 0), (0, 0), (800, 600)]);
        assert_eq!(wait_for_valid_extent(&mut provider), (800, 600));
        assert_eq!(provider.waits, 2);
    }

    #[test]
    fn test_zero_width_is_degenerate() {
        let mut provider = ScriptedProvider::new(vec![(0, 600), (640, 480)]);
        assert_eq!(wait_for_valid_extent(&mut provider), (640, 480));
        assert_eq!(provider.waits, 1);
    }

    #[test]
    fn test_zero_height_is_degenerate() {
        let mut provider = ScriptedProvider::new(vec![(640, 0), (640, 480)]);
        assert_eq!(wait_for_valid_extent(&mut provider), (640, 480));
        assert_eq!(provider.waits, 1);
    }
}
