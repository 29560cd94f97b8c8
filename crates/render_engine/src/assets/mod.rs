//! Asset loading: OBJ meshes and texture images.

pub mod obj;
pub mod texture_image;
