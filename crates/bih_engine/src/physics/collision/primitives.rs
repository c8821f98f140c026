//! Primitive collision shapes and intersection algorithms
//!
//! Rays and triangles with the narrow-phase tests the hierarchy queries run
//! per leaf: segment distance for capsule-like ellipsoid checks and a
//! separating axis test against an origin-centered box.

use crate::foundation::math::Vec3;

/// Below this squared length a segment is treated as a point
const DEGENERATE_SEGMENT: f32 = 1e-4;

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }
}

/// Squared distance between two segments
///
/// The segments are `s1 + s * d1` and `s2 + t * d2` for `s, t` in `[0, 1]`,
/// and `r` is `s2 - s1`. Degenerate segments collapse to points.
pub fn segment_distance_squared(d1: &Vec3, d2: &Vec3, r: &Vec3) -> f32 {
    let a = d1.magnitude_squared();
    let e = d2.magnitude_squared();
    let f = d2.dot(r);
    let (s, t);
    if a <= DEGENERATE_SEGMENT {
        if e <= DEGENERATE_SEGMENT {
            return r.magnitude_squared();
        }
        s = 0.0;
        t = (-f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= DEGENERATE_SEGMENT {
            t = 0.0;
            s = (c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s0 = if denom != 0.0 {
                ((c * e - b * f) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t0 = b * s0 - f;
            if t0 < 0.0 {
                t = 0.0;
                s = (c / a).clamp(0.0, 1.0);
            } else if t0 > e {
                t = 1.0;
                s = ((b + c) / a).clamp(0.0, 1.0);
            } else {
                t = t0 / e;
                s = s0;
            }
        }
    }
    (d2 * t - d1 * s + r).magnitude_squared()
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// From an array of vertices
    pub fn from_vertices([v0, v1, v2]: [Vec3; 3]) -> Self {
        Self { v0, v1, v2 }
    }

    /// Möller-Trumbore ray-triangle intersection
    ///
    /// Returns `(t, u, v)` with `u` and `v` weighting the second and third
    /// vertex. Both facings are hit.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 0.000001;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (t >= 0.0).then_some((t, u, v))
    }

    /// Squared distance from the segment `p..q` to the triangle
    ///
    /// Zero when the segment touches or pierces the triangle. The endpoints
    /// are classified against the three edge planes first; a segment with
    /// an endpoint outside some edge is measured against that edge and,
    /// where the other endpoint lies over the face, against the plane.
    pub fn segment_distance_squared(&self, p: &Vec3, q: &Vec3) -> f32 {
        let (a, b, c) = (self.v0, self.v1, self.v2);
        let pq = q - p;
        let ab = b - a;
        let bc = c - b;
        let ca = a - c;
        let ap = p - a;
        let bp = p - b;
        let cp = p - c;
        let aq = q - a;
        let bq = q - b;

        let n = ab.cross(&bc);
        let nn = n.magnitude_squared();
        let nab = n.cross(&ab);
        let nbc = n.cross(&bc);
        let nca = n.cross(&ca);
        let dp = n.dot(&ap);
        let dq = n.dot(&aq);

        // Endpoint outside an edge plane
        let p_out = [ap.dot(&nab) < 0.0, bp.dot(&nbc) < 0.0, cp.dot(&nca) < 0.0];
        let q_out = [aq.dot(&nab) < 0.0, bq.dot(&nbc) < 0.0, aq.dot(&nca) < 0.0];
        let edge = |k: usize| match k {
            0 => segment_distance_squared(&ab, &pq, &ap),
            1 => segment_distance_squared(&bc, &pq, &bp),
            _ => segment_distance_squared(&ca, &pq, &cp),
        };

        let dist = if let Some(k) = (0..3).find(|&k| p_out[k]) {
            let dist = edge(k);
            // The other endpoint's edges in the order that follows `k`
            let (next, prev) = ((k + 1) % 3, (k + 2) % 3);
            if q_out[next] {
                dist.min(edge(next))
            } else if q_out[prev] {
                dist.min(edge(prev))
            } else if !q_out[k] {
                dist.min(dq * dq / nn)
            } else {
                return dist;
            }
        } else if let Some(k) = (0..3).find(|&k| q_out[k]) {
            edge(k).min(dp * dp / nn)
        } else {
            // Both endpoints over the face
            let crosses = if dp > 0.0 { dq <= 0.0 } else { dq >= 0.0 };
            return if crosses { 0.0 } else { dp.powi(2).min(dq.powi(2)) / nn };
        };

        let same_side = if dp > 0.0 { dq >= 0.0 } else { dq <= 0.0 };
        if same_side {
            return dist;
        }

        // The segment crosses the plane: is the crossing inside the triangle?
        let e = pq.cross(&ap);
        let det = (dq - dp).abs();
        let facing = if dq > dp { -1.0 } else { 1.0 };
        let v = ca.dot(&e) * facing;
        if v < 0.0 || v > det {
            return dist;
        }
        let w = ab.dot(&e) * facing;
        if w < 0.0 || v + w > det {
            return dist;
        }
        0.0
    }

    /// Separating axis test against the box `[-half_extents, half_extents]`
    ///
    /// Checks the nine edge-cross-axis directions, then the three box face
    /// normals. The triangle's own normal is left to the caller.
    pub fn overlaps_box(&self, half_extents: &Vec3) -> bool {
        // Axis `e x basis`: `s` and `t` pick the two components it spans
        fn edge_axis_separates(v0: &Vec3, v1: &Vec3, v2: &Vec3, e: &Vec3, s: usize, t: usize, rad: &Vec3) -> bool {
            let p = v0[s] * v1[t] - v0[t] * v1[s];
            let q = v2[s] * e[t] - v2[t] * e[s];
            let r = rad[s] * e[t].abs() + rad[t] * e[s].abs();
            if p < q {
                q < -r || p > r
            } else {
                p < -r || q > r
            }
        }

        fn face_separates(a: f32, b: f32, c: f32, r: f32) -> bool {
            let (lo, hi) = (a.min(b).min(c), a.max(b).max(c));
            hi < -r || lo > r
        }

        let (a, b, c) = (&self.v0, &self.v1, &self.v2);
        let edges = [(a, b, c, b - a), (b, c, a, c - b), (c, a, b, a - c)];
        for (v0, v1, v2, e) in &edges {
            for (s, t) in [(2, 1), (0, 2), (1, 0)] {
                if edge_axis_separates(v0, v1, v2, e, s, t, half_extents) {
                    return false;
                }
            }
        }

        (0..3).all(|k| !face_separates(a[k], b[k], c[k], half_extents[k]))
    }
}
