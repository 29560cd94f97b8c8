//! Mesh and vertex types shared between asset loading and rendering.

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex layout: position, color, texture coordinates.
///
/// Matches the vertex input bindings declared by the graphics pipeline;
/// `Pod` so vertex slices can be uploaded with a plain byte copy.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
    pub const POSITION_OFFSET: u32 = 0;
    pub const COLOR_OFFSET: u32 = 12;
    pub const TEX_COORD_OFFSET: u32 = 24;
}

/// A triangle mesh as produced by the asset loaders.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(Vertex::STRIDE, 32);
        assert_eq!(Vertex::COLOR_OFFSET, 12);
        assert_eq!(Vertex::TEX_COORD_OFFSET, 24);
    }
}
