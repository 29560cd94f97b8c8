//! Textured mesh viewer.
//!
//! Loads an OBJ model and a texture, then redraws them every frame with
//! an auto-rotating model transform. Arrow keys nudge the model, space
//! pauses the rotation, R resets, escape quits.

use glfw::{Action, Key, WindowEvent};
use image::RgbaImage;
use nalgebra::{Matrix4, Rotation3, Vector3};
use render_engine::assets::obj::ObjLoader;
use render_engine::assets::texture_image;
use render_engine::foundation::logging;
use render_engine::{ViewerConfig, VulkanRenderer, Window};
use std::process::ExitCode;

/// Radians applied per arrow-key press.
const NUDGE_ANGLE: f32 = 0.1;

fn main() -> ExitCode {
    logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "viewer.toml".to_string());
    let config = ViewerConfig::load_or_default(&config_path)?;

    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
    let mut renderer = VulkanRenderer::new(&mut window, &config.renderer)?;

    let mesh = ObjLoader::load_obj(&config.assets.model_path)?;
    log::info!(
        "Loaded {}: {} vertices, {} indices",
        config.assets.model_path,
        mesh.vertices.len(),
        mesh.index_count()
    );

    let texture = load_texture(&config)?;
    renderer.load_scene(&mesh, &texture)?;

    while !window.should_close() {
        for event in window.poll_events() {
            handle_event(&event, &mut window, &mut renderer);
        }
        if window.should_close() {
            break;
        }

        renderer.render_frame(&mut window)?;
    }

    renderer.wait_idle()?;
    Ok(())
}

fn load_texture(config: &ViewerConfig) -> Result<RgbaImage, image::ImageError> {
    match &config.assets.texture_path {
        Some(path) => {
            log::info!("Loading texture {path}");
            texture_image::load_rgba(path)
        }
        None => {
            log::info!("No texture configured, using checkerboard");
            Ok(texture_image::checkerboard(512, 8))
        }
    }
}

fn handle_event(event: &WindowEvent, window: &mut Window, renderer: &mut VulkanRenderer) {
    let WindowEvent::Key(key, _, Action::Press | Action::Repeat, _) = event else {
        return;
    };

    match key {
        Key::Escape => window.set_should_close(true),
        Key::Space => {
            let enabled = !renderer.auto_rotate();
            renderer.set_auto_rotate(enabled);
            log::debug!("Auto-rotation {}", if enabled { "resumed" } else { "paused" });
        }
        Key::R => renderer.set_model_transform(Matrix4::identity()),
        Key::Left => nudge(renderer, Vector3::z_axis(), NUDGE_ANGLE),
        Key::Right => nudge(renderer, Vector3::z_axis(), -NUDGE_ANGLE),
        Key::Up => nudge(renderer, Vector3::x_axis(), NUDGE_ANGLE),
        Key::Down => nudge(renderer, Vector3::x_axis(), -NUDGE_ANGLE),
        _ => {}
    }
}

fn nudge(renderer: &mut VulkanRenderer, axis: nalgebra::Unit<Vector3<f32>>, angle: f32) {
    let rotation = Rotation3::from_axis_angle(&axis, angle).to_homogeneous();
    renderer.set_model_transform(rotation * renderer.model_transform());
}
