//! Bounding interval hierarchy
//!
//! A static binary tree over the triangles of one or more meshes. Each node
//! stores two clip planes along a single axis instead of a single split, so
//! the space between them can be skipped outright. The hierarchy answers
//! three kinds of read-only query:
//!
//! - nearest-hit ray casts ([`Bih::traverse`])
//! - ellipsoid and oriented-box overlap against an entity
//!   ([`Bih::ellipse_collide`], [`Bih::box_collide`])
//! - gathering triangles around a decal sphere ([`Bih::gen_stain_tris`])
//!
//! The tree is built once from a list of meshes and never modified, so a
//! `&Bih` can be shared freely between threads.
//!
//! ```no_run
//! use bih_engine::prelude::*;
//!
//! let positions = VertexStream::from_positions(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
//! let mesh = Mesh::new(vec![Tri::new(0, 1, 2)], positions, Matrix4x3::identity(), MeshFlags::RENDER);
//! let bih = Bih::new(vec![mesh]);
//! let hit = bih.traverse(&Vec3::new(1.0, 1.0, 10.0), &Vec3::new(0.0, 0.0, -1.0), 100.0, RayMode::empty());
//! assert_eq!(hit.map(|h| h.distance), Some(10.0));
//! ```

mod build;
mod collide;
mod mesh;
mod node;
mod ray;
mod stain;
mod walk;

pub use collide::CollisionInfo;
pub use mesh::{Mesh, MeshError, MeshFlags, Tri, TriBB, VertexStream};
pub use node::{Axis, Child, Node};
pub use ray::{RayHit, RayMode};

use crate::config::BihConfig;
use crate::foundation::math::{grid, Vec3};

/// Summary of a built hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BihStats {
    /// Meshes, including empty ones
    pub meshes: usize,
    /// Triangles across all meshes
    pub triangles: usize,
    /// Nodes across all meshes
    pub nodes: usize,
    /// Deepest mesh tree
    pub max_depth: usize,
}

/// Bounding interval hierarchy over a set of meshes
#[derive(Debug, Clone)]
pub struct Bih {
    meshes: Vec<Mesh>,
    nodes: Vec<Node>,
    bbmin: Vec3,
    bbmax: Vec3,
    center: Vec3,
    radius: f32,
    ent_radius: f32,
    max_depth: usize,
}

impl Bih {
    /// Build a hierarchy with default settings
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self::with_config(meshes, &BihConfig::default())
    }

    /// Build a hierarchy
    ///
    /// Meshes without triangles are kept but get no nodes, so every query
    /// skips them.
    pub fn with_config(mut meshes: Vec<Mesh>, config: &BihConfig) -> Self {
        let mut bbmin = Vec3::repeat(1e16);
        let mut bbmax = Vec3::repeat(-1e16);
        let mut nodes = Vec::new();
        let mut max_depth = 0;

        for (i, mesh) in meshes.iter_mut().enumerate() {
            let start = nodes.len();
            if mesh.triangle_count() == 0 {
                log::trace!("Skipping empty mesh {}", i);
                mesh.nodes = start..start;
                continue;
            }
            mesh.prepare(config.min_mesh_extent);
            bbmin = bbmin.inf(&mesh.bbmin);
            bbmax = bbmax.sup(&mesh.bbmax);
            let depth = build::build_mesh(
                &mesh.tribbs,
                &grid::floor(&mesh.bbmin),
                &grid::ceil(&mesh.bbmax),
                &mut nodes,
            );
            max_depth = max_depth.max(depth);
            mesh.nodes = start..nodes.len();
        }

        let (center, radius, ent_radius) = if nodes.is_empty() {
            (Vec3::zeros(), 0.0, 0.0)
        } else {
            (
                (bbmin + bbmax) * 0.5,
                ((bbmax - bbmin) * 0.5).magnitude(),
                bbmin.magnitude_squared().max(bbmax.magnitude_squared()),
            )
        };

        let bih = Self {
            meshes,
            nodes,
            bbmin,
            bbmax,
            center,
            radius,
            ent_radius,
            max_depth,
        };
        let stats = bih.stats();
        log::debug!(
            "Built BIH: {} meshes, {} triangles, {} nodes, depth {}",
            stats.meshes,
            stats.triangles,
            stats.nodes,
            stats.max_depth
        );
        bih
    }

    /// Whether the hierarchy holds no triangles at all
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The meshes, in construction order
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// All nodes; each mesh owns the contiguous range starting at its root
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Overall bounding box
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bbmin, self.bbmax)
    }

    /// Bounding sphere center and radius
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        (self.center, self.radius)
    }

    /// Squared radius of a sphere about the model origin that holds every triangle
    pub fn ent_radius(&self) -> f32 {
        self.ent_radius
    }

    /// Size and depth summary
    pub fn stats(&self) -> BihStats {
        BihStats {
            meshes: self.meshes.len(),
            triangles: self.meshes.iter().map(Mesh::triangle_count).sum(),
            nodes: self.nodes.len(),
            max_depth: self.max_depth,
        }
    }

    /// Whether a box at `bo` with half extent `br` misses the overall bounds
    fn outside_bounds(&self, bo: &Vec3, br: &Vec3) -> bool {
        (0..3).any(|k| bo[k] + br[k] < self.bbmin[k] || bo[k] - br[k] > self.bbmax[k])
    }
}
