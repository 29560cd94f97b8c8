//! OBJ file loader with vertex deduplication.
//!
//! Parses the subset of the OBJ format needed for static triangle
//! meshes (`v`, `vt`, `vn`, `f`). Faces with more than three corners
//! are fan-triangulated. Corners that reference the same
//! position/texcoord pair collapse to a single vertex so the index
//! buffer stays compact.

use crate::mesh::{Mesh, Vertex};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Dedup key: bit patterns of the attributes that define a unique vertex.
#[derive(PartialEq, Eq, Hash)]
struct VertexKey {
    position: [u32; 3],
    tex_coord: [u32; 2],
}

impl VertexKey {
    fn of(vertex: &Vertex) -> Self {
        Self {
            position: vertex.position.map(f32::to_bits),
            tex_coord: vertex.tex_coord.map(f32::to_bits),
        }
    }
}

pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file from disk.
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, ObjError> {
        let file = std::fs::File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Parse OBJ text from any reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Mesh, ObjError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut mesh = Mesh::default();
        let mut unique: HashMap<VertexKey, u32> = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" => {
                    positions.push(parse_floats::<3>(&parts[1..], line_no + 1)?);
                }
                "vt" => {
                    tex_coords.push(parse_floats::<2>(&parts[1..], line_no + 1)?);
                }
                "f" => {
                    if parts.len() < 4 {
                        return Err(ObjError::Parse {
                            line: line_no + 1,
                            message: "face with fewer than three corners".to_string(),
                        });
                    }
                    let corners: Vec<Vertex> = parts[1..]
                        .iter()
                        .map(|corner| {
                            build_vertex(corner, &positions, &tex_coords, line_no + 1)
                        })
                        .collect::<Result<_, _>>()?;

                    // Fan triangulation for quads and larger polygons.
                    for i in 1..corners.len() - 1 {
                        for vertex in [corners[0], corners[i], corners[i + 1]] {
                            let next = mesh.vertices.len() as u32;
                            let index = *unique.entry(VertexKey::of(&vertex)).or_insert_with(|| {
                                mesh.vertices.push(vertex);
                                next
                            });
                            mesh.indices.push(index);
                        }
                    }
                }
                // Normals and other statements are tolerated but unused.
                _ => {}
            }
        }

        Ok(mesh)
    }
}

fn parse_floats<const N: usize>(parts: &[&str], line: usize) -> Result<[f32; N], ObjError> {
    if parts.len() < N {
        return Err(ObjError::Parse {
            line,
            message: format!("expected {} components", N),
        });
    }
    let mut out = [0.0f32; N];
    for (slot, raw) in out.iter_mut().zip(parts) {
        *slot = raw.parse().map_err(|_| ObjError::Parse {
            line,
            message: format!("invalid float '{}'", raw),
        })?;
    }
    Ok(out)
}

fn build_vertex(
    corner: &str,
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    line: usize,
) -> Result<Vertex, ObjError> {
    let mut refs = corner.split('/');

    let pos_index: usize = refs
        .next()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ObjError::Parse {
            line,
            message: format!("invalid face corner '{}'", corner),
        })?;
    // OBJ indices are 1-based; zero is out of range, not a subtraction.
    let position = *pos_index
        .checked_sub(1)
        .and_then(|i| positions.get(i))
        .ok_or_else(|| ObjError::Parse {
            line,
            message: format!("position index {} out of range", pos_index),
        })?;

    let tex_coord = match refs.next().filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let uv_index: usize = raw.parse().map_err(|_| ObjError::Parse {
                line,
                message: format!("invalid texcoord index '{}'", raw),
            })?;
            let uv = *uv_index
                .checked_sub(1)
                .and_then(|i| tex_coords.get(i))
                .ok_or_else(|| ObjError::Parse {
                    line,
                    message: format!("texcoord index {} out of range", uv_index),
                })?;
            // OBJ uses a bottom-left UV origin; Vulkan samples top-left.
            [uv[0], 1.0 - uv[1]]
        }
        None => [0.0, 0.0],
    };

    Ok(Vertex {
        position,
        color: [1.0, 1.0, 1.0],
        tex_coord,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3
f 1/1 3/3 4/4
";

    #[test]
    fn test_shared_corners_deduplicate() {
        let mesh = ObjLoader::parse(Cursor::new(QUAD)).unwrap();
        // Two triangles sharing an edge: 4 unique vertices, 6 indices.
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_texcoord_v_flip() {
        let mesh = ObjLoader::parse(Cursor::new(QUAD)).unwrap();
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 1.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [1.0, 0.0]);
    }

    #[test]
    fn test_quad_face_triangulates() {
        let obj = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let mesh = ObjLoader::parse(Cursor::new(obj)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_missing_texcoords_default() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";
        let mesh = ObjLoader::parse(Cursor::new(obj)).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == [0.0, 0.0]));
        assert!(mesh.vertices.iter().all(|v| v.color == [1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_bad_index_reported_with_line() {
        let obj = "v 0 0 0\nf 1 2 3\n";
        let err = ObjLoader::parse(Cursor::new(obj)).unwrap_err();
        match err {
            ObjError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_index_is_out_of_range() {
        // Indices are 1-based; a zero must surface as a parse error,
        // not underflow.
        let obj = "v 0 0 0\nf 0 1 1\n";
        let err = ObjLoader::parse(Cursor::new(obj)).unwrap_err();
        match err {
            ObjError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("out of range"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_texcoord_index_is_out_of_range() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/0 2/1 3/1\n";
        let err = ObjLoader::parse(Cursor::new(obj)).unwrap_err();
        match err {
            ObjError::Parse { line, .. } => assert_eq!(line, 5),
            other => panic!("unexpected error: {other}"),
        }
    }
}
