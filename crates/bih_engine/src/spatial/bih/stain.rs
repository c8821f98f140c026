//! Decal triangle gathering

use super::mesh::MeshFlags;
use super::walk::for_each_leaf;
use super::Bih;
use crate::foundation::math::{orientation, Vec3};

impl Bih {
    /// Triangles near a decal sphere, in world space
    ///
    /// The hierarchy is placed at `origin`, turned by `yaw`, `pitch` and
    /// `roll` and scaled by `scale`. Every visible opaque triangle whose
    /// bounds reach the box around the sphere is returned; clipping against
    /// the sphere itself is left to the caller. Alpha-tested meshes never
    /// take decals.
    #[allow(clippy::too_many_arguments)]
    pub fn gen_stain_tris(
        &self,
        center: &Vec3,
        radius: f32,
        origin: &Vec3,
        yaw: i32,
        pitch: i32,
        roll: i32,
        scale: f32,
    ) -> Vec<[Vec3; 3]> {
        let mut out = Vec::new();
        if self.is_empty() {
            return out;
        }
        let inv_scale = 1.0 / scale;
        let local = (center - origin) * inv_scale;
        let reach = Vec3::repeat(radius * inv_scale);
        let orient = orientation(yaw, pitch, roll);
        let bo = orient.transpose() * local;
        let Some((ibo, ibr)) = self.query_box(&bo, &reach) else {
            return out;
        };
        let to_world = orient * scale;

        for mesh in &self.meshes {
            let flags = mesh.flags();
            if !flags.contains(MeshFlags::RENDER) || flags.contains(MeshFlags::ALPHA) {
                continue;
            }
            let Some(root) = mesh.root() else { continue };
            let morient = mesh.xform().premul(&to_world, origin);
            for_each_leaf(&self.nodes, root, &ibo, &ibr, &mut |tidx| {
                if !mesh.tribbs[tidx].outside(&ibo, &ibr) {
                    out.push(mesh.vertices(tidx).map(|v| morient.transform(&v)));
                }
            });
        }
        log::trace!("Gathered {} stain triangles", out.len());
        out
    }
}
