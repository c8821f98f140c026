//! Nearest-hit ray traversal
//!
//! Rays are clipped against each mesh box, then walked front to back through
//! the mesh tree with a fixed-size stack of deferred far children. Triangle
//! tests run in mesh-local space: the ray is moved into that space once per
//! mesh and the hit distance is scaled back to model units.

use bitflags::bitflags;

use super::mesh::{Mesh, MeshFlags};
use super::node::{Child, Node};
use super::Bih;
use crate::foundation::math::{constants::HUGE_RECIPROCAL, Vec3};

/// Deferred subtrees kept before the walk falls back to recursion
pub(crate) const STACK_SIZE: usize = 128;

bitflags! {
    /// Ray query behaviour
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RayMode: u32 {
        /// Occlusion only: no normal, back faces always count, `NO_CLIP` meshes included
        const SHADOW = 1 << 0;
        /// Sample alpha cutout masks; only honoured together with `SHADOW`
        const ALPHA = 1 << 1;
        /// Select map models regardless of their collide flags
        const ENTITIES = 1 << 2;
        /// Alpha-aware shadow ray
        const ALPHA_SHADOW = Self::SHADOW.bits() | Self::ALPHA.bits();
    }
}

/// Nearest intersection along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance along the ray, in units of the ray direction's length
    pub distance: f32,
    /// Unit surface normal in model space; `None` for shadow rays
    pub normal: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    node: usize,
    tmin: f32,
    tmax: f32,
}

/// A ray prepared for one mesh
struct MeshRay<'a> {
    mesh: &'a Mesh,
    nodes: &'a [Node],
    origin: Vec3,
    inv_dir: Vec3,
    order: [usize; 3],
    local_origin: Vec3,
    local_dir: Vec3,
    maxdist: f32,
    mode: RayMode,
}

impl MeshRay<'_> {
    /// Current search limit: the best hit so far or the caller's range
    fn limit(&self, best: &Option<RayHit>) -> f32 {
        best.map_or(self.maxdist, |hit| hit.distance)
    }

    fn test_leaf(&self, child: Child, best: &mut Option<RayHit>, tmax: &mut f32) {
        if let Child::Leaf(tidx) = child {
            if let Some(hit) = self.intersect(tidx as usize, self.limit(best)) {
                *tmax = tmax.min(hit.distance);
                *best = Some(hit);
            }
        }
    }

    /// Ray against one triangle in mesh-local space
    ///
    /// `det` carries the facing: non-negative when the ray runs along the
    /// triangle normal (a back face). Barycentric bounds are compared against
    /// `det` directly so both facings share one path with flipped comparisons.
    fn intersect(&self, tidx: usize, maxdist: f32) -> Option<RayHit> {
        let mesh = self.mesh;
        let [a, b, c] = mesh.vertices(tidx);
        let b = b - a;
        let c = c - a;
        let n = b.cross(&c);
        let r = a - self.local_origin;
        let e = r.cross(&self.local_dir);
        let det = self.local_dir.dot(&n);

        let v = e.dot(&c);
        let w = -e.dot(&b);
        let f = r.dot(&n) * mesh.scale;
        if det >= 0.0 {
            if !self.mode.contains(RayMode::SHADOW) && mesh.flags().contains(MeshFlags::CULL_FACE) {
                return None;
            }
            if v < 0.0 || v > det || w < 0.0 || v + w > det {
                return None;
            }
            if f < 0.0 || f > maxdist * det || det == 0.0 {
                return None;
            }
        } else {
            if v > 0.0 || v < det || w > 0.0 || v + w < det {
                return None;
            }
            if f > 0.0 || f < maxdist * det {
                return None;
            }
        }

        let inv_det = 1.0 / det;
        if mesh.flags().contains(MeshFlags::ALPHA)
            && self.mode.contains(RayMode::ALPHA_SHADOW)
            && !mesh.is_opaque_at(tidx, v * inv_det, w * inv_det)
        {
            return None;
        }
        let normal = (!self.mode.contains(RayMode::SHADOW)).then(|| (mesh.xform_norm * n).normalize());
        Some(RayHit {
            distance: f * inv_det,
            normal,
        })
    }
}

/// Entry and exit parameters of a ray through a box
fn slab(origin: &Vec3, inv_dir: &Vec3, lo: &Vec3, hi: &Vec3) -> (f32, f32) {
    let mut tmin = f32::NEG_INFINITY;
    let mut tmax = f32::INFINITY;
    for k in 0..3 {
        let t1 = (lo[k] - origin[k]) * inv_dir[k];
        let t2 = (hi[k] - origin[k]) * inv_dir[k];
        let (enter, exit) = if inv_dir[k] > 0.0 { (t1, t2) } else { (t2, t1) };
        tmin = tmin.max(enter);
        tmax = tmax.min(exit);
    }
    (tmin, tmax)
}

impl Bih {
    /// Cast a ray and return the nearest hit within `maxdist`
    ///
    /// Distances are measured in multiples of `dir`, so a unit direction
    /// gives model-space distance. Only `RENDER` meshes are considered, and
    /// `NO_CLIP` meshes only for shadow rays.
    pub fn traverse(&self, origin: &Vec3, dir: &Vec3, maxdist: f32, mode: RayMode) -> Option<RayHit> {
        self.traverse_with_stack::<STACK_SIZE>(origin, dir, maxdist, mode)
    }

    pub(crate) fn traverse_with_stack<const N: usize>(
        &self,
        origin: &Vec3,
        dir: &Vec3,
        maxdist: f32,
        mode: RayMode,
    ) -> Option<RayHit> {
        let inv_dir = dir.map(|d| if d == 0.0 { HUGE_RECIPROCAL } else { 1.0 / d });
        let order = [0, 1, 2].map(|k| usize::from(inv_dir[k] <= 0.0));
        let mut best = None;

        for mesh in &self.meshes {
            let Some(root) = mesh.root() else { continue };
            let flags = mesh.flags();
            if !flags.contains(MeshFlags::RENDER)
                || (!mode.contains(RayMode::SHADOW) && flags.contains(MeshFlags::NO_CLIP))
            {
                continue;
            }
            let query = MeshRay {
                mesh,
                nodes: &self.nodes,
                origin: *origin,
                inv_dir,
                order,
                local_origin: mesh.inv_xform.transform(origin),
                local_dir: mesh.inv_xform_norm * dir,
                maxdist,
                mode,
            };
            let (tmin, tmax) = slab(origin, &inv_dir, &mesh.bbmin, &mesh.bbmax);
            let tmin = tmin.max(0.0);
            let tmax = tmax.min(query.limit(&best));
            if tmin < tmax {
                walk::<N>(&query, root, tmin, tmax, &mut best);
            }
        }
        best
    }
}

fn walk<const N: usize>(q: &MeshRay<'_>, mut at: usize, mut tmin: f32, mut tmax: f32, best: &mut Option<RayHit>) {
    let mut stack = [Frame::default(); N];
    let mut depth = 0;
    loop {
        let node = &q.nodes[at];
        let axis = node.axis().index();
        let near = q.order[axis];
        let far = near ^ 1;
        let nearsplit = (f32::from(node.split[near]) - q.origin[axis]) * q.inv_dir[axis];
        let farsplit = (f32::from(node.split[far]) - q.origin[axis]) * q.inv_dir[axis];

        if nearsplit <= tmin {
            // The ray has already left the near side
            if farsplit < tmax {
                if let Some(next) = node.child_node(far, at) {
                    at = next;
                    tmin = tmin.max(farsplit);
                    continue;
                }
                q.test_leaf(node.child[far], best, &mut tmax);
            }
        } else if let Some(near_node) = node.child_node(near, at) {
            let mut descend_near = true;
            if farsplit < tmax {
                match node.child_node(far, at) {
                    Some(far_node) if depth < N => {
                        stack[depth] = Frame {
                            node: far_node,
                            tmin: tmin.max(farsplit),
                            tmax,
                        };
                        depth += 1;
                    }
                    Some(far_node) => {
                        // Stack full: finish the near side on the call stack
                        walk::<N>(q, near_node, tmin, tmax.min(nearsplit), best);
                        descend_near = false;
                        let start = tmin.max(farsplit);
                        let limit = tmax.min(q.limit(best));
                        if start < limit {
                            at = far_node;
                            tmin = start;
                            tmax = limit;
                            continue;
                        }
                    }
                    None => q.test_leaf(node.child[far], best, &mut tmax),
                }
            }
            if descend_near {
                at = near_node;
                tmax = tmax.min(nearsplit);
                continue;
            }
        } else {
            q.test_leaf(node.child[near], best, &mut tmax);
            if farsplit < tmax {
                if let Some(next) = node.child_node(far, at) {
                    at = next;
                    tmin = tmin.max(farsplit);
                    continue;
                }
                q.test_leaf(node.child[far], best, &mut tmax);
            }
        }

        // Resume the nearest deferred subtree still in range
        loop {
            if depth == 0 {
                return;
            }
            depth -= 1;
            let frame = stack[depth];
            let limit = frame.tmax.min(q.limit(best));
            if frame.tmin < limit {
                at = frame.node;
                tmin = frame.tmin;
                tmax = limit;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{floor_triangle, random_triangles, soup};
    use super::*;
    use crate::assets::AlphaMask;
    use crate::foundation::math::Matrix4x3;
    use crate::physics::collision::{Ray, Triangle};
    use crate::spatial::bih::{Tri, VertexStream};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    const EPSILON: f32 = 1e-5;

    fn floor_bih(flags: MeshFlags) -> Bih {
        Bih::new(vec![soup(&[floor_triangle()], flags)])
    }

    #[test]
    fn test_ray_hits_floor_from_above() {
        let bih = floor_bih(MeshFlags::RENDER);
        let hit = bih
            .traverse(&Vec3::new(1.0, 1.0, 10.0), &Vec3::new(0.0, 0.0, -1.0), 100.0, RayMode::empty())
            .unwrap();
        assert_relative_eq!(hit.distance, 10.0, epsilon = EPSILON);
        assert_relative_eq!(hit.normal.unwrap(), Vec3::new(0.0, 0.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_ray_pointing_away_misses() {
        let bih = floor_bih(MeshFlags::RENDER);
        let hit = bih.traverse(&Vec3::new(1.0, 1.0, 10.0), &Vec3::new(0.0, 0.0, 1.0), 100.0, RayMode::empty());
        assert!(hit.is_none());
    }

    #[test]
    fn test_maxdist_limits_range() {
        let bih = floor_bih(MeshFlags::RENDER);
        let down = Vec3::new(0.0, 0.0, -1.0);
        assert!(bih.traverse(&Vec3::new(1.0, 1.0, 10.0), &down, 9.5, RayMode::empty()).is_none());
        assert!(bih.traverse(&Vec3::new(1.0, 1.0, 10.0), &down, 10.5, RayMode::empty()).is_some());
    }

    #[test]
    fn test_ray_idempotence() {
        let bih = Bih::new(vec![soup(&random_triangles(7, 300, 30.0), MeshFlags::RENDER)]);
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let origin = Vec3::new(rng.gen_range(-40.0..40.0), rng.gen_range(-40.0..40.0), 60.0);
            let dir = Vec3::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3), -1.0).normalize();
            let first = bih.traverse(&origin, &dir, 200.0, RayMode::empty());
            let second = bih.traverse(&origin, &dir, 200.0, RayMode::empty());
            assert_eq!(
                first.map(|h| (h.distance.to_bits(), h.normal.map(|n| n.map(f32::to_bits)))),
                second.map(|h| (h.distance.to_bits(), h.normal.map(|n| n.map(f32::to_bits))))
            );
        }
    }

    #[test]
    fn test_single_triangle_matches_moller_trumbore() {
        let [a, b, c] = [Vec3::new(-2.0, 1.0, 3.0), Vec3::new(5.0, -1.0, 4.0), Vec3::new(1.0, 6.0, -2.0)];
        let bih = Bih::new(vec![soup(&[[a, b, c]], MeshFlags::RENDER)]);
        let reference = Triangle::new(a, b, c);
        let mut rng = StdRng::seed_from_u64(3);
        let normal = (b - a).cross(&(c - a)).normalize();
        let mut hits = 0;
        for i in 0..400 {
            // Aim well inside or well outside so neither method sits on an edge
            let (u, v) = if i % 2 == 0 {
                let u: f32 = rng.gen_range(0.05..0.9);
                (u, rng.gen_range(0.05..(0.95 - u).max(0.06)))
            } else {
                (rng.gen_range(-1.0..-0.1), rng.gen_range(-1.0..2.0))
            };
            let target = a + (b - a) * u + (c - a) * v;
            let dir = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize();
            if dir.dot(&normal).abs() < 0.3 {
                continue;
            }
            // Front and back faces both get covered by the random direction
            let origin = target - dir * rng.gen_range(1.0..30.0);
            let expected = reference.intersect_ray(&Ray::new(origin, dir)).map(|(t, _, _)| t);
            let got = bih.traverse(&origin, &dir, 1000.0, RayMode::empty()).map(|h| h.distance);
            match (expected, got) {
                (Some(t), Some(d)) => {
                    hits += 1;
                    assert_relative_eq!(t, d, epsilon = 1e-3, max_relative = 1e-4);
                }
                (None, None) => {}
                other => panic!("disagreement for ray {origin:?} -> {target:?}: {other:?}"),
            }
        }
        assert!(hits > 50);
    }

    #[test]
    fn test_nearest_hit_matches_brute_force() {
        let tris = random_triangles(11, 250, 25.0);
        let bih = Bih::new(vec![soup(&tris, MeshFlags::RENDER)]);
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..200 {
            let origin = Vec3::new(rng.gen_range(-35.0..35.0), rng.gen_range(-35.0..35.0), rng.gen_range(-35.0..35.0));
            let dir = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize();
            let ray = Ray::new(origin, dir);
            let expected = tris
                .iter()
                .filter_map(|&[a, b, c]| Triangle::new(a, b, c).intersect_ray(&ray).map(|(t, _, _)| t))
                .filter(|&t| t <= 500.0)
                .fold(None, |acc: Option<f32>, t| Some(acc.map_or(t, |m| m.min(t))));
            let got = bih.traverse(&origin, &dir, 500.0, RayMode::empty()).map(|h| h.distance);
            match (expected, got) {
                (Some(t), Some(d)) => assert_relative_eq!(t, d, epsilon = 1e-3, max_relative = 1e-4),
                (None, None) => {}
                other => panic!("disagreement for ray from {origin:?} along {dir:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_stack_overflow_falls_back_to_recursion() {
        let tris = random_triangles(21, 400, 20.0);
        let bih = Bih::new(vec![soup(&tris, MeshFlags::RENDER)]);
        let mut rng = StdRng::seed_from_u64(22);
        for _ in 0..100 {
            let origin = Vec3::new(rng.gen_range(-30.0..30.0), rng.gen_range(-30.0..30.0), rng.gen_range(-30.0..30.0));
            let dir = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize();
            let full = bih.traverse(&origin, &dir, 300.0, RayMode::empty());
            assert_eq!(bih.traverse_with_stack::<0>(&origin, &dir, 300.0, RayMode::empty()), full);
            assert_eq!(bih.traverse_with_stack::<2>(&origin, &dir, 300.0, RayMode::empty()), full);
        }
    }

    #[test]
    fn test_cull_face_only_affects_visibility_rays() {
        let bih = floor_bih(MeshFlags::RENDER | MeshFlags::CULL_FACE);
        let origin = Vec3::new(1.0, 1.0, -5.0);
        let up = Vec3::new(0.0, 0.0, 1.0);
        assert!(bih.traverse(&origin, &up, 100.0, RayMode::empty()).is_none());
        let shadow = bih.traverse(&origin, &up, 100.0, RayMode::SHADOW).unwrap();
        assert_relative_eq!(shadow.distance, 5.0, epsilon = EPSILON);
        assert_eq!(shadow.normal, None);
    }

    #[test]
    fn test_back_face_hit_without_culling() {
        let bih = floor_bih(MeshFlags::RENDER);
        let hit = bih
            .traverse(&Vec3::new(2.0, 3.0, -4.0), &Vec3::new(0.0, 0.0, 1.0), 100.0, RayMode::empty())
            .unwrap();
        assert_relative_eq!(hit.distance, 4.0, epsilon = EPSILON);
        // Normal keeps the triangle's winding
        assert_relative_eq!(hit.normal.unwrap(), Vec3::new(0.0, 0.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_mesh_flags_select_meshes() {
        let origin = Vec3::new(1.0, 1.0, 10.0);
        let down = Vec3::new(0.0, 0.0, -1.0);
        let hidden = floor_bih(MeshFlags::COLLIDE);
        assert!(hidden.traverse(&origin, &down, 100.0, RayMode::SHADOW).is_none());
        let noclip = floor_bih(MeshFlags::RENDER | MeshFlags::NO_CLIP);
        assert!(noclip.traverse(&origin, &down, 100.0, RayMode::empty()).is_none());
        assert!(noclip.traverse(&origin, &down, 100.0, RayMode::SHADOW).is_some());
    }

    #[test]
    fn test_transformed_mesh_reports_model_distance() {
        let positions = VertexStream::from_positions(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        let xform = Matrix4x3::from_scale_translation(2.0, Vec3::new(0.0, 0.0, 3.0));
        let mesh = Mesh::new(vec![Tri::new(0, 1, 2)], positions, xform, MeshFlags::RENDER);
        let bih = Bih::new(vec![mesh]);
        let hit = bih
            .traverse(&Vec3::new(15.0, 2.0, 10.0), &Vec3::new(0.0, 0.0, -1.0), 100.0, RayMode::empty())
            .unwrap();
        assert_relative_eq!(hit.distance, 7.0, epsilon = EPSILON);
        assert_relative_eq!(hit.normal.unwrap(), Vec3::z(), epsilon = EPSILON);
    }

    #[test]
    fn test_nearest_of_stacked_meshes() {
        let lower = soup(&[floor_triangle()], MeshFlags::RENDER);
        let upper = soup(&[floor_triangle().map(|v| v + Vec3::new(0.0, 0.0, 4.0))], MeshFlags::RENDER);
        let bih = Bih::new(vec![lower, upper]);
        let hit = bih
            .traverse(&Vec3::new(1.0, 1.0, 10.0), &Vec3::new(0.0, 0.0, -1.0), 100.0, RayMode::empty())
            .unwrap();
        assert_relative_eq!(hit.distance, 6.0, epsilon = EPSILON);
    }

    #[test]
    fn test_alpha_cutout_only_for_alpha_shadow_rays() {
        // Left half of the texture transparent, right half opaque
        let mask = AlphaMask::from_fn(8, 8, |x, _| x >= 4);
        let positions = VertexStream::from_positions(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        let texcoords = VertexStream::from_texcoords(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        let mesh = Mesh::new(vec![Tri::new(0, 1, 2)], positions, Matrix4x3::identity(), MeshFlags::RENDER)
            .with_alpha(texcoords, Arc::new(mask));
        let bih = Bih::new(vec![mesh]);
        let down = Vec3::new(0.0, 0.0, -1.0);
        let clear = Vec3::new(1.0, 1.0, 5.0);
        let solid = Vec3::new(7.0, 1.0, 5.0);
        assert!(bih.traverse(&clear, &down, 100.0, RayMode::ALPHA_SHADOW).is_none());
        assert!(bih.traverse(&solid, &down, 100.0, RayMode::ALPHA_SHADOW).is_some());
        assert!(bih.traverse(&clear, &down, 100.0, RayMode::SHADOW).is_some());
        assert!(bih.traverse(&clear, &down, 100.0, RayMode::empty()).is_some());
    }

    #[test]
    fn test_axis_parallel_ray_inside_slab() {
        // Vertical wall in the x = 5 plane, ray along +x with zero y and z components
        let wall = [Vec3::new(5.0, -5.0, -5.0), Vec3::new(5.0, 5.0, -5.0), Vec3::new(5.0, 0.0, 5.0)];
        let bih = Bih::new(vec![soup(&[wall], MeshFlags::RENDER)]);
        let hit = bih.traverse(&Vec3::new(0.0, 0.0, 0.0), &Vec3::x(), 100.0, RayMode::empty()).unwrap();
        assert_relative_eq!(hit.distance, 5.0, epsilon = EPSILON);
        assert_relative_eq!(hit.normal.unwrap().x.abs(), 1.0, epsilon = EPSILON);
    }
}
