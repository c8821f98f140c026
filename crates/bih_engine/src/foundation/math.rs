//! Math utilities and types
//!
//! Provides the vector and matrix types used by the spatial queries, plus the
//! affine 4x3 transform that places a mesh in its model frame and the
//! degree-based rotation helpers used for entity and model orientation.
//!
//! Matrices are column-major: a [`Matrix4x3`] is three basis columns plus a
//! translation column, and rotating "around z" right-multiplies by the
//! standard rotation about that axis.

pub use nalgebra::{Matrix3, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// Integer grid vector, used for conservative bounds
pub type IVec3 = Vector3<i32>;

/// Reduced precision grid vector, used for cached triangle bounds
pub type SVec3 = Vector3<i16>;

/// Affine transform with three basis columns and a translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4x3 {
    /// Rotation and scale part
    pub linear: Mat3,
    /// Translation part
    pub translation: Vec3,
}

impl Default for Matrix4x3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix4x3 {
    /// Create a transform from its linear part and translation
    pub fn new(linear: Mat3, translation: Vec3) -> Self {
        Self { linear, translation }
    }

    /// The identity transform
    pub fn identity() -> Self {
        Self {
            linear: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Uniform scale plus translation
    pub fn from_scale_translation(scale: f32, translation: Vec3) -> Self {
        Self {
            linear: Mat3::identity() * scale,
            translation,
        }
    }

    /// Transform a point
    pub fn transform(&self, point: &Vec3) -> Vec3 {
        self.linear * point + self.translation
    }

    /// Transform a direction, ignoring translation
    pub fn transform_normal(&self, normal: &Vec3) -> Vec3 {
        self.linear * normal
    }

    /// Length of the first basis column, taken as the uniform scale
    pub fn scale(&self) -> f32 {
        self.linear.column(0).magnitude()
    }

    /// The z row of the linear part: world up expressed in the source frame
    pub fn row_z(&self) -> Vec3 {
        self.linear.row(2).transpose()
    }

    /// Linear part with every column scaled to unit length
    pub fn normalized_linear(&self) -> Mat3 {
        normalize_columns(&self.linear)
    }

    /// Inverse of a transform whose basis columns are mutually orthogonal
    ///
    /// Each column is divided by its squared length and the result
    /// transposed, so rotation combined with per-axis scale inverts exactly.
    /// Skewed matrices are not handled.
    pub fn invert(&self) -> Self {
        let inverse_column = |i: usize| {
            let col: Vec3 = self.linear.column(i).into_owned();
            (col / col.magnitude_squared()).transpose()
        };
        let linear = Mat3::from_rows(&[inverse_column(0), inverse_column(1), inverse_column(2)]);
        let translation = -(linear * self.translation);
        Self { linear, translation }
    }

    /// `rotation * self`, then offset: maps through `self` first
    pub fn premul(&self, rotation: &Mat3, offset: &Vec3) -> Self {
        Self {
            linear: rotation * self.linear,
            translation: rotation * self.translation + offset,
        }
    }
}

/// Scale every column of a matrix to unit length
pub fn normalize_columns(m: &Mat3) -> Mat3 {
    let mut out = *m;
    for mut col in out.column_iter_mut() {
        let len = col.magnitude();
        if len > 0.0 {
            col /= len;
        }
    }
    out
}

/// `|m|^T * v`: the half extents of a box of radius `v` seen through `m`
pub fn abs_transposed_transform(m: &Mat3, v: &Vec3) -> Vec3 {
    m.abs().transpose() * v
}

/// Cosine and sine of an angle in whole degrees, wrapped into [0, 360)
///
/// Quarter turns are returned exactly.
pub fn sincos_mod360(degrees: i32) -> (f32, f32) {
    match degrees.rem_euclid(360) {
        0 => (1.0, 0.0),
        90 => (0.0, 1.0),
        180 => (-1.0, 0.0),
        270 => (0.0, -1.0),
        angle => {
            let (sin, cos) = (angle as f32 * constants::DEG_TO_RAD).sin_cos();
            (cos, sin)
        }
    }
}

/// Rotation about z from a cosine/sine pair
pub fn rotation_z(cos: f32, sin: f32) -> Mat3 {
    Mat3::new(
        cos, -sin, 0.0,
        sin, cos, 0.0,
        0.0, 0.0, 1.0,
    )
}

/// Rotation about x from a cosine/sine pair
pub fn rotation_x(cos: f32, sin: f32) -> Mat3 {
    Mat3::new(
        1.0, 0.0, 0.0,
        0.0, cos, -sin,
        0.0, sin, cos,
    )
}

/// Rotation about y from a cosine/sine pair
pub fn rotation_y(cos: f32, sin: f32) -> Mat3 {
    Mat3::new(
        cos, 0.0, sin,
        0.0, 1.0, 0.0,
        -sin, 0.0, cos,
    )
}

/// Model orientation from yaw, pitch and roll in whole degrees
///
/// Yaw turns about z, then pitch about the turned x, then roll about the
/// turned y in the negative sense. The transpose takes a vector from the
/// placed frame back into the model frame.
pub fn orientation(yaw: i32, pitch: i32, roll: i32) -> Mat3 {
    let mut orient = Mat3::identity();
    if yaw != 0 {
        let (c, s) = sincos_mod360(yaw);
        orient *= rotation_z(c, s);
    }
    if pitch != 0 {
        let (c, s) = sincos_mod360(pitch);
        orient *= rotation_x(c, s);
    }
    if roll != 0 {
        let (c, s) = sincos_mod360(-roll);
        orient *= rotation_y(c, s);
    }
    orient
}

/// Rotation about z for a yaw given in (fractional) degrees
pub fn yaw_matrix(yaw_degrees: f32) -> Mat3 {
    let (sin, cos) = (yaw_degrees * constants::DEG_TO_RAD).sin_cos();
    rotation_z(cos, sin)
}

/// Integer grid helpers for conservative bounds
pub mod grid {
    use super::{IVec3, Vec3};

    /// Componentwise floor onto the grid
    pub fn floor(v: &Vec3) -> IVec3 {
        v.map(|x| x.floor() as i32)
    }

    /// Componentwise ceiling onto the grid
    pub fn ceil(v: &Vec3) -> IVec3 {
        v.map(|x| x.ceil() as i32)
    }

    /// Componentwise minimum
    pub fn min(a: &IVec3, b: &IVec3) -> IVec3 {
        a.zip_map(b, std::cmp::Ord::min)
    }

    /// Componentwise maximum
    pub fn max(a: &IVec3, b: &IVec3) -> IVec3 {
        a.zip_map(b, std::cmp::Ord::max)
    }

    /// Center and half extent of the grid cells covering `[lo, hi]`
    ///
    /// The half extent is rounded up so that `center ± radius` always
    /// encloses the floored/ceiled box.
    pub fn bounds(lo: &Vec3, hi: &Vec3) -> (IVec3, IVec3) {
        let imin = floor(lo);
        let imax = ceil(hi);
        let center = (imin + imax).map(|x| x / 2);
        let radius = (imax - imin).map(|x| (x + 1) / 2);
        (center, radius)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Reciprocal used in place of `1 / 0` for axis-parallel rays
    pub const HUGE_RECIPROCAL: f32 = 1e16;
}
