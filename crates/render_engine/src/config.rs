//! Configuration for the viewer application and renderer.
//!
//! All settings are optional in the TOML file; missing sections fall
//! back to defaults that match the reference scene (800x600 window,
//! two frames in flight, dark clear color).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window creation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Mesh Viewer".to_string(),
        }
    }
}

/// Shader SPIR-V paths with automatic path resolution
///
/// Applications may be launched from different working directories, so
/// the resolver probes a few common locations for compiled shaders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Probe common shader output locations for the given file names.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = ["target/shaders/", "shaders/", "resources/shaders/", "../shaders/", "./"];

        let resolve = |name: &str| {
            for dir in &shader_dirs {
                let candidate = format!("{}{}", dir, name);
                if Path::new(&candidate).exists() {
                    return candidate;
                }
            }
            name.to_string()
        };

        Self {
            vertex_shader_path: resolve(base_vertex),
            fragment_shader_path: resolve(base_fragment),
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("mesh.vert.spv", "mesh.frag.spv")
    }
}

/// Renderer behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan driver
    pub application_name: String,
    /// Number of frame slots (frames in flight)
    pub max_frames_in_flight: usize,
    /// Render pass clear color (RGBA)
    pub clear_color: [f32; 4],
    /// Compiled shader locations
    pub shaders: ShaderConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Mesh Viewer".to_string(),
            max_frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shaders: ShaderConfig::default(),
        }
    }
}

/// Asset locations for the viewer scene
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// OBJ model to display
    pub model_path: String,
    /// Optional PNG texture; a procedural checkerboard is used when absent
    pub texture_path: Option<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_path: "resources/models/cube.obj".to_string(),
            texture_path: None,
        }
    }
}

/// Top-level viewer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub assets: AssetConfig,
}

impl ViewerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.renderer.max_frames_in_flight, 2);
        assert!(config.assets.texture_path.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ViewerConfig = toml::from_str(
            r#"
            [window]
            width = 1280
            height = 720

            [renderer]
            max_frames_in_flight = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.title, "Mesh Viewer");
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        assert_eq!(config.renderer.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_clear_color_parses() {
        let config: ViewerConfig = toml::from_str(
            r#"
            [renderer]
            clear_color = [0.45, 0.55, 0.6, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.renderer.clear_color, [0.45, 0.55, 0.6, 1.0]);
    }
}
