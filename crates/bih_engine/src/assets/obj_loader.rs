//! OBJ file loader for static geometry
//!
//! Faces are fan-triangulated into an interleaved vertex array that the
//! hierarchy reads through strided streams, so positions and texture
//! coordinates share one buffer with the normals.

use std::fs;
use std::mem::{offset_of, size_of};
use std::path::Path;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::foundation::math::Matrix4x3;
use crate::spatial::bih::{Mesh, MeshError, MeshFlags, Tri, VertexStream};

/// OBJ loading errors
#[derive(Error, Debug)]
pub enum ObjError {
    /// Reading the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A number or index did not parse
    #[error("Parse error on line {line}: {message}")]
    ParseError {
        /// One-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
    /// The file parsed but describes no usable geometry
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Interleaved vertex as stored in the loaded buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position
    pub position: [f32; 3],
    /// Shading normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

/// Triangulated geometry from an OBJ file
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Unique face corners
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Hand the geometry to a hierarchy mesh without copying it per stream
    pub fn to_mesh(&self, xform: Matrix4x3, flags: MeshFlags) -> Result<Mesh, MeshError> {
        let tris = Tri::from_indices(&self.indices)?;
        let bytes: Arc<[u8]> = Arc::from(bytemuck::cast_slice::<Vertex, u8>(&self.vertices));
        let stride = size_of::<Vertex>();
        let len = self.vertices.len();
        let positions = VertexStream::positions(bytes, offset_of!(Vertex, position), stride, len)?;
        Ok(Mesh::new(tris, positions, xform, flags))
    }

    /// Texture coordinates of the same buffer, for alpha-tested meshes
    pub fn texcoords(&self) -> Result<VertexStream, MeshError> {
        let bytes: Arc<[u8]> = Arc::from(bytemuck::cast_slice::<Vertex, u8>(&self.vertices));
        VertexStream::texcoords(bytes, offset_of!(Vertex, tex_coord), size_of::<Vertex>(), self.vertices.len())
    }
}

/// Loader for Wavefront OBJ text
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<MeshData, ObjError> {
        let path_ref = path.as_ref();
        log::debug!("Loading OBJ from: {:?}", path_ref);
        let text = fs::read_to_string(path_ref)?;
        let data = Self::parse_obj(&text)?;
        log::info!(
            "Loaded {} triangles ({} vertices) from {:?}",
            data.triangle_count(),
            data.vertices.len(),
            path_ref
        );
        Ok(data)
    }

    /// Parse OBJ text
    ///
    /// Only `v`, `vt`, `vn` and `f` records are read; everything else is
    /// skipped.
    pub fn parse_obj(text: &str) -> Result<MeshData, ObjError> {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut tex_coords = Vec::new();
        let mut data = MeshData::default();

        for (number, line) in text.lines().enumerate() {
            let line_no = number + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parse_err = |message: String| ObjError::ParseError { line: line_no, message };
            let floats = |parts: &[&str], what: &str| -> Result<Vec<f32>, ObjError> {
                parts
                    .iter()
                    .map(|p| p.parse::<f32>().map_err(|_| parse_err(format!("invalid {} component '{}'", what, p))))
                    .collect()
            };

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" if parts.len() >= 4 => {
                    let v = floats(&parts[1..4], "vertex")?;
                    positions.push([v[0], v[1], v[2]]);
                }
                "vn" if parts.len() >= 4 => {
                    let n = floats(&parts[1..4], "normal")?;
                    normals.push([n[0], n[1], n[2]]);
                }
                "vt" if parts.len() >= 3 => {
                    let t = floats(&parts[1..3], "tex coord")?;
                    tex_coords.push([t[0], t[1]]);
                }
                "f" if parts.len() >= 4 => {
                    let first = data.vertices.len();
                    for corner in &parts[1..] {
                        let mut fields = corner.split('/');
                        let index = |field: Option<&str>| -> Result<Option<usize>, ObjError> {
                            match field.filter(|f| !f.is_empty()) {
                                None => Ok(None),
                                Some(f) => match f.parse::<usize>() {
                                    Ok(i) if i > 0 => Ok(Some(i - 1)),
                                    _ => Err(parse_err(format!("invalid index '{}'", f))),
                                },
                            }
                        };
                        let pos_idx = index(fields.next())?
                            .ok_or_else(|| parse_err("face corner without a position".to_string()))?;
                        let tex_idx = index(fields.next())?;
                        let normal_idx = index(fields.next())?;

                        let position = positions
                            .get(pos_idx)
                            .ok_or_else(|| parse_err(format!("position index {} out of bounds", pos_idx + 1)))?;
                        let tex_coord = tex_idx.and_then(|i| tex_coords.get(i)).unwrap_or(&[0.0, 0.0]);
                        let normal = normal_idx.and_then(|i| normals.get(i)).unwrap_or(&[0.0, 0.0, 1.0]);
                        data.vertices.push(Vertex {
                            position: *position,
                            normal: *normal,
                            tex_coord: *tex_coord,
                        });
                    }
                    let count = data.vertices.len() - first;
                    for i in 1..count - 1 {
                        for corner in [first, first + i, first + i + 1] {
                            let corner = u32::try_from(corner)
                                .map_err(|_| ObjError::InvalidFormat("too many vertices".to_string()))?;
                            data.indices.push(corner);
                        }
                    }
                }
                _ => {}
            }
        }

        if data.indices.is_empty() {
            return Err(ObjError::InvalidFormat("no faces found".to_string()));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::spatial::bih::{Bih, RayMode};
    use approx::assert_relative_eq;

    const QUAD: &str = "\
# unit quad at z = 1
v 0 0 1
v 2 0 1
v 2 2 1
v 0 2 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let data = ObjLoader::parse_obj(QUAD).unwrap();
        assert_eq!(data.vertices.len(), 4);
        assert_eq!(data.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(data.vertices[2].tex_coord, [1.0, 1.0]);
        assert_eq!(data.vertices[3].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_loaded_mesh_is_traceable() {
        let data = ObjLoader::parse_obj(QUAD).unwrap();
        let mesh = data.to_mesh(Matrix4x3::identity(), MeshFlags::RENDER).unwrap();
        assert_eq!(mesh.world_vertices(1)[2], Vec3::new(0.0, 2.0, 1.0));
        let bih = Bih::new(vec![mesh]);
        let hit = bih
            .traverse(&Vec3::new(1.5, 1.0, 4.0), &Vec3::new(0.0, 0.0, -1.0), 10.0, RayMode::empty())
            .unwrap();
        assert_relative_eq!(hit.distance, 3.0, epsilon = 1e-5);
        let uv = data.texcoords().unwrap();
        assert_eq!(uv.texcoord(2), crate::foundation::math::Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = ObjLoader::parse_obj("v 0 0 0\nv 1 x 0\n").unwrap_err();
        assert!(matches!(err, ObjError::ParseError { line: 2, .. }));
        let err = ObjLoader::parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, ObjError::ParseError { line: 2, .. }));
        let err = ObjLoader::parse_obj("f 0 1 2\n").unwrap_err();
        assert!(matches!(err, ObjError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_no_faces_is_invalid() {
        assert!(matches!(ObjLoader::parse_obj("v 0 0 0\n"), Err(ObjError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(ObjLoader::load_obj("no/such/model.obj"), Err(ObjError::Io(_))));
    }
}
