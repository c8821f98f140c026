//! Ellipsoid and oriented-box collision
//!
//! Both queries place the entity's volume in the model's frame, reject it
//! against the overall bounds, then walk every collidable mesh with a grid
//! box around the volume. Each surviving triangle yields a signed separation
//! along its normal; the shallowest penetration that is not moving away
//! from the surface wins.

use super::mesh::{Mesh, MeshFlags};
use super::walk::for_each_leaf;
use super::Bih;
use crate::foundation::math::{abs_transposed_transform, grid, orientation, yaw_matrix, IVec3, Mat3, Vec3};
use crate::physics::collision::Triangle;
use crate::physics::PhysEnt;

/// Starting separation; anything accepted is larger
const NO_CONTACT: f32 = -1e10;
/// Separations above this count as a collision
const MAX_COLLIDE_DISTANCE: f32 = -1e9;

/// Outcome of a shape collision query
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionInfo {
    /// Whether some contact blocks the motion
    pub collided: bool,
    /// Unit normal of the blocking triangle in the placed model frame
    pub wall: Vec3,
    /// Whether any triangle overlapped the volume, blocking or not
    pub inside: bool,
    /// Signed separation of the blocking contact; negative when penetrating
    pub depth: f32,
}

/// Best contact so far across all meshes of one query
struct Contact<'a> {
    ent: &'a PhysEnt,
    dir: Vec3,
    cutoff: f32,
    radius: Vec3,
    dist: f32,
    wall: Vec3,
    inside: bool,
}

impl<'a> Contact<'a> {
    fn new(ent: &'a PhysEnt, dir: Vec3, cutoff: f32, radius: Vec3) -> Self {
        Self {
            ent,
            dir,
            cutoff,
            radius,
            dist: NO_CONTACT,
            wall: Vec3::zeros(),
            inside: false,
        }
    }

    /// Offer an overlap deeper-than-none but shallower than the best so far
    fn offer(&mut self, pdist: f32, n: Vec3) {
        if pdist > 0.0 || pdist <= self.dist {
            return;
        }
        self.inside = true;
        if self.dir != Vec3::zeros() {
            // Moving away from the surface
            if n.dot(&self.dir) >= -self.cutoff * self.dir.magnitude() {
                return;
            }
            if self.ent.player_collide_check(&self.dir, pdist, &n, &self.radius) {
                return;
            }
        }
        self.dist = pdist;
        self.wall = n;
    }

    fn finish(self, to_model: &Mat3) -> CollisionInfo {
        let collided = self.dist > MAX_COLLIDE_DISTANCE;
        CollisionInfo {
            collided,
            wall: if collided { to_model * self.wall } else { Vec3::zeros() },
            inside: self.inside,
            depth: if collided { self.dist } else { 0.0 },
        }
    }
}

/// The entity volume relative to a placed model
struct Placement {
    /// Volume center relative to the model origin, in model units
    center: Vec3,
    /// Half extents in model units
    radius: Vec3,
    orient: Mat3,
    /// `center` in the unrotated model frame
    bo: Vec3,
}

impl Placement {
    fn new(d: &PhysEnt, half_xy: (f32, f32), origin: &Vec3, angles: (i32, i32, i32), scale: f32) -> Self {
        let inv_scale = 1.0 / scale;
        let center = (d.volume_center() - origin) * inv_scale;
        let radius = Vec3::new(half_xy.0, half_xy.1, d.half_height()) * inv_scale;
        let orient = orientation(angles.0, angles.1, angles.2);
        let bo = orient.transpose() * center;
        Self {
            center,
            radius,
            orient,
            bo,
        }
    }
}

/// Unit normal of a mesh-space triangle; `None` when degenerate
fn face_normal([a, b, c]: &[Vec3; 3]) -> Option<Vec3> {
    (b - a).cross(&(c - a)).try_normalize(f32::EPSILON)
}

impl Bih {
    /// Meshes that take part in collision, with their roots
    fn collidable(&self) -> impl Iterator<Item = (&Mesh, usize)> {
        self.meshes.iter().filter_map(|mesh| {
            let flags = mesh.flags();
            if !flags.contains(MeshFlags::COLLIDE) || flags.contains(MeshFlags::NO_CLIP) {
                return None;
            }
            mesh.root().map(|root| (mesh, root))
        })
    }

    /// Collide an entity's ellipsoid with the hierarchy placed at `origin`
    ///
    /// The ellipsoid has horizontal radius `d.radius` and spans from the feet
    /// to `aboveeye` over the eye. It is tested as a segment along the
    /// vertical axis swept by a sphere of the horizontal radius. `dir` is the
    /// attempted motion; when non-zero, contacts whose normal does not face
    /// against it by more than `cutoff` are ignored. `yaw`, `pitch`, `roll`
    /// and `scale` describe the model placement.
    #[allow(clippy::too_many_arguments)]
    pub fn ellipse_collide(
        &self,
        d: &PhysEnt,
        dir: &Vec3,
        cutoff: f32,
        origin: &Vec3,
        yaw: i32,
        pitch: i32,
        roll: i32,
        scale: f32,
    ) -> CollisionInfo {
        if self.is_empty() {
            return CollisionInfo::default();
        }
        let place = Placement::new(d, (d.radius, d.radius), origin, (yaw, pitch, roll), scale);
        let radius = place.radius;
        let br = abs_transposed_transform(&place.orient, &radius);
        let Some((ibo, ibr)) = self.query_box(&place.bo, &br) else {
            return CollisionInfo::default();
        };

        let mut contact = Contact::new(d, *dir, cutoff, radius);
        for (mesh, root) in self.collidable() {
            let morient = mesh.xform().premul(&place.orient, &Vec3::zeros());
            let center = mesh.inv_xform.transform(&place.bo);
            let inv_scale2 = mesh.inv_scale * mesh.inv_scale;
            let zdir = morient.row_z() * (inv_scale2 * (radius.z - radius.x));
            let reach2 = inv_scale2 * radius.x * radius.x;
            for_each_leaf(&self.nodes, root, &ibo, &ibr, &mut |tidx| {
                if mesh.tribbs[tidx].outside(&ibo, &ibr) {
                    return;
                }
                let verts = mesh.vertices(tidx);
                let tri = Triangle::from_vertices(verts);
                if tri.segment_distance_squared(&(center - zdir), &(center + zdir)) > reach2 {
                    return;
                }
                let Some(n) = face_normal(&verts) else { return };
                let pdist = (n.dot(&(center - verts[0])) - n.dot(&zdir).abs()) * mesh.scale - radius.x;
                contact.offer(pdist, morient.transform_normal(&n) * mesh.inv_scale);
            });
        }
        contact.finish(&Mat3::identity())
    }

    /// Collide an entity's box with the hierarchy placed at `origin`
    ///
    /// The box has half extents `xradius`, `yradius` and half the entity
    /// height, turned about z by the entity's yaw. Triangles are moved into
    /// the box frame and must pass a separating axis test; the separation is
    /// measured along the triangle normal less the box's reach along it.
    /// Arguments are as for [`Bih::ellipse_collide`].
    #[allow(clippy::too_many_arguments)]
    pub fn box_collide(
        &self,
        d: &PhysEnt,
        dir: &Vec3,
        cutoff: f32,
        origin: &Vec3,
        yaw: i32,
        pitch: i32,
        roll: i32,
        scale: f32,
    ) -> CollisionInfo {
        if self.is_empty() {
            return CollisionInfo::default();
        }
        let place = Placement::new(d, (d.xradius, d.yradius), origin, (yaw, pitch, roll), scale);
        let radius = place.radius;
        // Any yaw of the box stays inside its horizontal diagonal
        let reach = radius.x.hypot(radius.y);
        let br = abs_transposed_transform(&place.orient, &Vec3::new(reach, reach, radius.z));
        let Some((ibo, ibr)) = self.query_box(&place.bo, &br) else {
            return CollisionInfo::default();
        };

        let drot = yaw_matrix(d.yaw);
        let dcenter = -(drot * place.center);
        let dorient = drot * place.orient;
        let mut contact = Contact::new(d, drot * dir, cutoff, radius);
        for (mesh, root) in self.collidable() {
            let morient = mesh.xform().premul(&dorient, &dcenter);
            for_each_leaf(&self.nodes, root, &ibo, &ibr, &mut |tidx| {
                if mesh.tribbs[tidx].outside(&ibo, &ibr) {
                    return;
                }
                let verts = mesh.vertices(tidx).map(|v| morient.transform(&v));
                if !Triangle::from_vertices(verts).overlaps_box(&radius) {
                    return;
                }
                let Some(n) = face_normal(&verts) else { return };
                let pdist = -n.dot(&verts[0]);
                let r = radius.dot(&n.abs());
                if pdist.abs() > r {
                    return;
                }
                contact.offer(pdist - r, n);
            });
        }
        contact.finish(&drot.transpose())
    }

    /// Grid box around a query volume, or `None` if it misses the hierarchy
    pub(crate) fn query_box(&self, bo: &Vec3, br: &Vec3) -> Option<(IVec3, IVec3)> {
        if self.outside_bounds(bo, br) {
            return None;
        }
        Some(grid::bounds(&(bo - br), &(bo + br)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{floor_triangle, soup};
    use super::*;
    use crate::physics::PhysEntType;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn floor(flags: MeshFlags) -> Bih {
        Bih::new(vec![soup(&[floor_triangle()], flags)])
    }

    /// Ellipsoid of radius 0.5 and half height 1.0 centered 0.8 below the eye
    fn walker(eye_z: f32) -> PhysEnt {
        PhysEnt::new(Vec3::new(1.0, 1.0, eye_z)).with_size(0.5, 1.8, 0.2)
    }

    /// Unit cube of a box entity centered on the eye
    fn crate_at(o: Vec3) -> PhysEnt {
        PhysEnt::new(o).with_size(0.5, 0.5, 0.5).with_box(0.5, 0.5)
    }

    fn ellipse(bih: &Bih, d: &PhysEnt, dir: Vec3) -> CollisionInfo {
        bih.ellipse_collide(d, &dir, 0.0, &Vec3::zeros(), 0, 0, 0, 1.0)
    }

    fn boxed(bih: &Bih, d: &PhysEnt, dir: Vec3) -> CollisionInfo {
        bih.box_collide(d, &dir, 0.0, &Vec3::zeros(), 0, 0, 0, 1.0)
    }

    #[test]
    fn test_ellipse_resting_on_floor() {
        let bih = floor(MeshFlags::COLLIDE);
        let info = ellipse(&bih, &walker(1.75), Vec3::zeros());
        assert!(info.collided);
        assert!(info.inside);
        assert_relative_eq!(info.wall, Vec3::z(), epsilon = EPSILON);
        assert_relative_eq!(info.depth, -0.05, epsilon = EPSILON);
    }

    #[test]
    fn test_ellipse_lifted_off_floor() {
        let bih = floor(MeshFlags::COLLIDE);
        let info = ellipse(&bih, &walker(2.0), Vec3::zeros());
        assert!(!info.collided);
        assert!(!info.inside);
        assert_eq!(info.wall, Vec3::zeros());
    }

    #[test]
    fn test_motion_away_from_surface_is_not_blocked() {
        let bih = floor(MeshFlags::COLLIDE);
        let up = ellipse(&bih, &walker(1.75), Vec3::z());
        assert!(!up.collided);
        assert!(up.inside);
        let down = ellipse(&bih, &walker(1.75), -Vec3::z());
        assert!(down.collided);
    }

    #[test]
    fn test_player_forgiven_deep_step_contact() {
        let bih = floor(MeshFlags::COLLIDE);
        // Center 0.2 above the floor: separation -0.8, past the -2/3 step allowance
        let player = walker(1.0);
        let info = ellipse(&bih, &player, -Vec3::z());
        assert!(!info.collided);
        assert!(info.inside);
        let bounce = walker(1.0).with_kind(PhysEntType::Bounce);
        assert!(ellipse(&bih, &bounce, -Vec3::z()).collided);
    }

    #[test]
    fn test_box_on_floor() {
        let bih = floor(MeshFlags::COLLIDE);
        let info = boxed(&bih, &crate_at(Vec3::new(1.0, 1.0, 0.4)), Vec3::zeros());
        assert!(info.collided);
        assert_relative_eq!(info.wall, Vec3::z(), epsilon = EPSILON);
        assert_relative_eq!(info.depth, -0.1, epsilon = EPSILON);
        assert!(!boxed(&bih, &crate_at(Vec3::new(1.0, 1.0, 0.6)), Vec3::zeros()).collided);
    }

    #[test]
    fn test_box_across_gap_between_siblings() {
        let left = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0), Vec3::new(4.0, 4.0, 0.0)];
        let right = [Vec3::new(8.0, 0.0, 0.0), Vec3::new(12.0, 0.0, 0.0), Vec3::new(8.0, 4.0, 0.0)];
        let bih = Bih::new(vec![soup(&[left, right], MeshFlags::COLLIDE)]);
        // Reaches back over the left triangle's edge
        let wide = crate_at(Vec3::new(5.0, 1.0, 0.3)).with_box(1.2, 0.5);
        let info = boxed(&bih, &wide, Vec3::zeros());
        assert!(info.collided);
        assert_relative_eq!(info.wall, Vec3::z(), epsilon = EPSILON);
        // Entirely over the gap
        let narrow = crate_at(Vec3::new(6.0, 1.0, 0.3)).with_box(1.0, 0.5);
        assert!(!boxed(&bih, &narrow, Vec3::zeros()).collided);
    }

    #[test]
    fn test_box_yaw_turns_extents() {
        let wall = [Vec3::new(1.5, -5.0, -5.0), Vec3::new(1.5, 0.0, 5.0), Vec3::new(1.5, 5.0, -5.0)];
        let bih = Bih::new(vec![soup(&[wall], MeshFlags::COLLIDE)]);
        let long = crate_at(Vec3::zeros()).with_box(2.0, 0.2);
        let info = boxed(&bih, &long, Vec3::zeros());
        assert!(info.collided);
        assert_relative_eq!(info.wall, -Vec3::x(), epsilon = EPSILON);
        assert_relative_eq!(info.depth, -0.5, epsilon = EPSILON);
        assert!(!boxed(&bih, &long.with_yaw(90.0), Vec3::zeros()).collided);
    }

    #[test]
    fn test_yawed_box_corner_reaches_wall() {
        let wall = [Vec3::new(1.3, -5.0, -5.0), Vec3::new(1.3, 0.0, 5.0), Vec3::new(1.3, 5.0, -5.0)];
        let bih = Bih::new(vec![soup(&[wall], MeshFlags::COLLIDE)]);
        let cube = crate_at(Vec3::zeros()).with_box(1.0, 1.0);
        assert!(!boxed(&bih, &cube, Vec3::zeros()).collided);
        // Turned 45 degrees a corner sits on the x axis at the half diagonal
        let info = boxed(&bih, &cube.with_yaw(45.0), Vec3::zeros());
        assert!(info.collided);
        assert_relative_eq!(info.wall, -Vec3::x(), epsilon = 1e-4);
        assert_relative_eq!(info.depth, 1.3 - 2.0_f32.sqrt(), epsilon = 1e-4);
    }

    #[test]
    fn test_collide_skips_non_colliding_meshes() {
        let d = walker(1.75);
        assert!(!ellipse(&floor(MeshFlags::RENDER), &d, Vec3::zeros()).collided);
        assert!(!ellipse(&floor(MeshFlags::COLLIDE | MeshFlags::NO_CLIP), &d, Vec3::zeros()).collided);
        assert!(!boxed(&floor(MeshFlags::RENDER), &crate_at(Vec3::new(1.0, 1.0, 0.4)), Vec3::zeros()).collided);
    }

    #[test]
    fn test_model_placement_and_scale() {
        let bih = floor(MeshFlags::COLLIDE);
        let origin = Vec3::new(100.0, 0.0, 0.0);
        // Half-size model units: center (1, 1, 0.2), half extent 0.25
        let d = crate_at(Vec3::new(102.0, 2.0, 0.4));
        let info = bih.box_collide(&d, &Vec3::zeros(), 0.0, &origin, 0, 0, 0, 2.0);
        assert!(info.collided);
        assert_relative_eq!(info.depth, -0.05, epsilon = EPSILON);
        let stray = crate_at(Vec3::new(2.0, 2.0, 0.4));
        assert!(!bih.box_collide(&stray, &Vec3::zeros(), 0.0, &origin, 0, 0, 0, 2.0).collided);
    }

    #[test]
    fn test_rotated_model_reports_placed_normal() {
        let bih = floor(MeshFlags::COLLIDE);
        // Pitched a quarter turn the floor stands as a wall facing -y
        let d = PhysEnt::new(Vec3::new(1.0, -0.3, 1.0)).with_size(0.5, 0.5, 0.5);
        let info = bih.ellipse_collide(&d, &Vec3::zeros(), 0.0, &Vec3::zeros(), 0, 90, 0, 1.0);
        assert!(info.collided);
        assert_relative_eq!(info.wall, -Vec3::y(), epsilon = EPSILON);
    }

    #[test]
    fn test_empty_hierarchy_never_collides() {
        let bih = Bih::new(Vec::new());
        assert_eq!(ellipse(&bih, &walker(1.0), Vec3::zeros()), CollisionInfo::default());
        assert_eq!(boxed(&bih, &crate_at(Vec3::zeros()), Vec3::zeros()), CollisionInfo::default());
    }
}
