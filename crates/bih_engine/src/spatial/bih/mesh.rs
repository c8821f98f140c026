//! Mesh records
//!
//! A [`Mesh`] points at caller-supplied triangles and vertex data through
//! shared buffers and carries the per-mesh caches the queries rely on: the
//! inverse transform, the uniform scale, the triangle bounds and the slice of
//! the tree that belongs to it.

use std::ops::Range;
use std::sync::Arc;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::AlphaMask;
use crate::foundation::math::{grid, IVec3, Mat3, Matrix4x3, SVec3, Vec2, Vec3};

bitflags! {
    /// Per-mesh query participation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MeshFlags: u32 {
        /// Visible to rays and stains
        const RENDER = 1 << 1;
        /// Ignored by collision and by non-shadow rays
        const NO_CLIP = 1 << 2;
        /// Alpha-tested surface
        const ALPHA = 1 << 3;
        /// Participates in shape collision
        const COLLIDE = 1 << 4;
        /// Back faces are invisible to non-shadow rays
        const CULL_FACE = 1 << 5;
    }
}

/// Mesh construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The byte buffer cannot hold the declared elements
    #[error("vertex buffer too short: need {needed} bytes, have {actual}")]
    BufferTooShort {
        /// Bytes required by offset, stride and count
        needed: usize,
        /// Bytes available
        actual: usize,
    },

    /// Consecutive elements would overlap
    #[error("stride {stride} is smaller than the {element} byte element")]
    StrideTooSmall {
        /// Requested stride
        stride: usize,
        /// Element size
        element: usize,
    },

    /// Index list does not describe whole triangles
    #[error("index count {0} is not a multiple of three")]
    RaggedIndices(usize),
}

/// Three vertex indices into the mesh's vertex streams
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Tri {
    /// Vertex indices
    pub vert: [u32; 3],
}

impl Tri {
    /// Create a triangle
    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Self { vert: [a, b, c] }
    }

    /// Group a flat index list into triangles
    pub fn from_indices(indices: &[u32]) -> Result<Vec<Self>, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::RaggedIndices(indices.len()));
        }
        Ok(indices
            .chunks_exact(3)
            .map(|c| Self::new(c[0], c[1], c[2]))
            .collect())
    }
}

/// Cached grid-space bounds of one transformed triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriBB {
    /// Center in grid units
    pub center: SVec3,
    /// Half extent in grid units, rounded up
    pub radius: SVec3,
}

impl TriBB {
    /// Bounds enclosing `[vmin, vmax]`
    pub fn from_bounds(vmin: &Vec3, vmax: &Vec3) -> Self {
        let (center, radius) = grid::bounds(vmin, vmax);
        Self {
            center: center.map(saturate_short),
            radius: radius.map(saturate_short),
        }
    }

    /// Lower corner
    pub fn min(&self) -> IVec3 {
        self.center.map(i32::from) - self.radius.map(i32::from)
    }

    /// Upper corner
    pub fn max(&self) -> IVec3 {
        self.center.map(i32::from) + self.radius.map(i32::from)
    }

    /// Whether a box at `bo` with half extent `br` misses this one on some axis
    pub fn outside(&self, bo: &IVec3, br: &IVec3) -> bool {
        (0..3).any(|k| {
            (bo[k] - i32::from(self.center[k])).abs() > br[k] + i32::from(self.radius[k])
        })
    }
}

/// Clamp a grid coordinate into the 16-bit range
pub(crate) fn saturate_short(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Strided view of `f32` vectors inside a shared byte buffer
#[derive(Debug, Clone)]
pub struct VertexStream {
    bytes: Arc<[u8]>,
    offset: usize,
    stride: usize,
    len: usize,
}

impl VertexStream {
    const POSITION_SIZE: usize = std::mem::size_of::<[f32; 3]>();
    const TEXCOORD_SIZE: usize = std::mem::size_of::<[f32; 2]>();

    /// Positions (`[f32; 3]`) at `offset + i * stride`
    pub fn positions(bytes: Arc<[u8]>, offset: usize, stride: usize, len: usize) -> Result<Self, MeshError> {
        Self::checked(bytes, offset, stride, len, Self::POSITION_SIZE)
    }

    /// Texture coordinates (`[f32; 2]`) at `offset + i * stride`
    pub fn texcoords(bytes: Arc<[u8]>, offset: usize, stride: usize, len: usize) -> Result<Self, MeshError> {
        Self::checked(bytes, offset, stride, len, Self::TEXCOORD_SIZE)
    }

    /// Tightly packed positions
    pub fn from_positions(positions: &[[f32; 3]]) -> Self {
        Self {
            bytes: Arc::from(bytemuck::cast_slice::<[f32; 3], u8>(positions)),
            offset: 0,
            stride: Self::POSITION_SIZE,
            len: positions.len(),
        }
    }

    /// Tightly packed texture coordinates
    pub fn from_texcoords(texcoords: &[[f32; 2]]) -> Self {
        Self {
            bytes: Arc::from(bytemuck::cast_slice::<[f32; 2], u8>(texcoords)),
            offset: 0,
            stride: Self::TEXCOORD_SIZE,
            len: texcoords.len(),
        }
    }

    fn checked(bytes: Arc<[u8]>, offset: usize, stride: usize, len: usize, element: usize) -> Result<Self, MeshError> {
        if stride < element {
            return Err(MeshError::StrideTooSmall { stride, element });
        }
        if len > 0 {
            let needed = offset + (len - 1) * stride + element;
            if needed > bytes.len() {
                return Err(MeshError::BufferTooShort {
                    needed,
                    actual: bytes.len(),
                });
            }
        }
        Ok(Self { bytes, offset, stride, len })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stream has no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn read<T: Pod>(&self, i: usize) -> T {
        let start = self.offset + i * self.stride;
        bytemuck::pod_read_unaligned(&self.bytes[start..start + std::mem::size_of::<T>()])
    }

    /// Element `i` as a position
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::from(self.read::<[f32; 3]>(i))
    }

    /// Element `i` as a texture coordinate
    pub fn texcoord(&self, i: usize) -> Vec2 {
        Vec2::from(self.read::<[f32; 2]>(i))
    }
}

/// One mesh of a hierarchy
#[derive(Debug, Clone)]
pub struct Mesh {
    xform: Matrix4x3,
    flags: MeshFlags,
    tris: Arc<[Tri]>,
    positions: VertexStream,
    texcoords: Option<VertexStream>,
    alpha_mask: Option<Arc<AlphaMask>>,

    pub(crate) inv_xform: Matrix4x3,
    pub(crate) xform_norm: Mat3,
    pub(crate) inv_xform_norm: Mat3,
    pub(crate) scale: f32,
    pub(crate) inv_scale: f32,

    pub(crate) tribbs: Vec<TriBB>,
    pub(crate) nodes: Range<usize>,
    pub(crate) bbmin: Vec3,
    pub(crate) bbmax: Vec3,
}

impl Mesh {
    /// Create a mesh placed by `xform` (rotation, uniform scale, translation)
    pub fn new(tris: impl Into<Arc<[Tri]>>, positions: VertexStream, xform: Matrix4x3, flags: MeshFlags) -> Self {
        let scale = xform.scale();
        let inv_xform = xform.invert();
        Self {
            xform,
            flags,
            tris: tris.into(),
            positions,
            texcoords: None,
            alpha_mask: None,
            inv_xform,
            xform_norm: xform.normalized_linear(),
            inv_xform_norm: inv_xform.normalized_linear(),
            scale,
            inv_scale: 1.0 / scale,
            tribbs: Vec::new(),
            nodes: 0..0,
            bbmin: Vec3::zeros(),
            bbmax: Vec3::zeros(),
        }
    }

    /// Attach texture coordinates and a cutout mask, marking the mesh alpha-tested
    pub fn with_alpha(mut self, texcoords: VertexStream, mask: Arc<AlphaMask>) -> Self {
        self.texcoords = Some(texcoords);
        self.alpha_mask = Some(mask);
        self.flags |= MeshFlags::ALPHA;
        self
    }

    /// Local-to-model transform
    pub fn xform(&self) -> &Matrix4x3 {
        &self.xform
    }

    /// Query flags
    pub fn flags(&self) -> MeshFlags {
        self.flags
    }

    /// Uniform scale of the transform
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Triangles
    pub fn tris(&self) -> &[Tri] {
        &self.tris
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }

    /// Cached triangle bounds, filled when the hierarchy is built
    pub fn tribbs(&self) -> &[TriBB] {
        &self.tribbs
    }

    /// Transformed bounding box, filled when the hierarchy is built
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bbmin, self.bbmax)
    }

    /// Index of this mesh's root node in the hierarchy, if it has one
    pub fn root(&self) -> Option<usize> {
        (!self.nodes.is_empty()).then_some(self.nodes.start)
    }

    /// Mesh-local vertices of triangle `tidx`
    pub fn vertices(&self, tidx: usize) -> [Vec3; 3] {
        self.tris[tidx].vert.map(|v| self.positions.position(v as usize))
    }

    /// Model-space vertices of triangle `tidx`
    pub fn world_vertices(&self, tidx: usize) -> [Vec3; 3] {
        self.vertices(tidx).map(|v| self.xform.transform(&v))
    }

    /// Whether the cutout mask is opaque at the given barycentric weights
    ///
    /// `v` and `w` weight the second and third vertex. Meshes without a mask
    /// are opaque everywhere.
    pub fn is_opaque_at(&self, tidx: usize, v: f32, w: f32) -> bool {
        let (Some(texcoords), Some(mask)) = (&self.texcoords, &self.alpha_mask) else {
            return true;
        };
        let [a, b, c] = self.tris[tidx].vert.map(|i| texcoords.texcoord(i as usize));
        let uv = a + (b - a) * v + (c - a) * w;
        mask.is_opaque_at(uv)
    }

    /// Compute triangle bounds and the padded mesh box
    pub(crate) fn prepare(&mut self, min_extent: f32) {
        let mut mmin = Vec3::repeat(1e16);
        let mut mmax = Vec3::repeat(-1e16);
        let mut tribbs = Vec::with_capacity(self.tris.len());
        for tidx in 0..self.tris.len() {
            let [v0, v1, v2] = self.world_vertices(tidx);
            let vmin = v0.inf(&v1).inf(&v2);
            let vmax = v0.sup(&v1).sup(&v2);
            mmin = mmin.inf(&vmin);
            mmax = mmax.sup(&vmax);
            tribbs.push(TriBB::from_bounds(&vmin, &vmax));
        }
        let half = min_extent * 0.5;
        for k in 0..3 {
            if (mmax[k] - mmin[k]).abs() < min_extent {
                let mid = (mmin[k] + mmax[k]) * 0.5;
                mmin[k] = mid - half;
                mmax[k] = mid + half;
            }
        }
        self.tribbs = tribbs;
        self.bbmin = mmin;
        self.bbmax = mmax;
    }
}
