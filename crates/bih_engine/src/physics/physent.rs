//! Physics entities as seen by the collision queries
//!
//! Only the shape of an entity matters here: where it stands, which way it
//! faces and how far its bounding volume reaches above and below the eye.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// What kind of entity is moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysEntType {
    /// A walking player; gets step and slope leniency
    #[default]
    Player,
    /// A free camera
    Camera,
    /// A bouncing projectile
    Bounce,
}

/// Bounding volume used for collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CollideType {
    /// Axis-aligned ellipsoid of `radius` and eye heights
    #[default]
    Ellipse,
    /// Box of `xradius` by `yradius`, turned by the entity's yaw
    OrientedBoundingBox,
}

/// A moving entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysEnt {
    /// Eye position
    pub o: Vec3,
    /// Heading in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Roll in degrees
    pub roll: f32,
    /// Horizontal radius of the ellipsoid
    pub radius: f32,
    /// Distance from the feet up to the eye
    pub eyeheight: f32,
    /// Distance from the eye up to the top of the head
    pub aboveeye: f32,
    /// Box half extent along the entity's facing
    pub xradius: f32,
    /// Box half extent across the entity's facing
    pub yradius: f32,
    /// Step leniency used by the player check
    pub zmargin: f32,
    /// Entity kind
    #[serde(rename = "type")]
    pub kind: PhysEntType,
    /// Collision volume
    pub collidetype: CollideType,
}

impl Default for PhysEnt {
    fn default() -> Self {
        Self {
            o: Vec3::zeros(),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            radius: 4.0,
            eyeheight: 14.0,
            aboveeye: 2.0,
            xradius: 4.1,
            yradius: 4.1,
            zmargin: 0.0,
            kind: PhysEntType::Player,
            collidetype: CollideType::Ellipse,
        }
    }
}

impl PhysEnt {
    /// Create an entity standing with its eye at `o`
    pub fn new(o: Vec3) -> Self {
        Self { o, ..Self::default() }
    }

    /// Set the ellipsoid size
    pub fn with_size(mut self, radius: f32, eyeheight: f32, aboveeye: f32) -> Self {
        self.radius = radius;
        self.eyeheight = eyeheight;
        self.aboveeye = aboveeye;
        self
    }

    /// Set the box half extents
    pub fn with_box(mut self, xradius: f32, yradius: f32) -> Self {
        self.xradius = xradius;
        self.yradius = yradius;
        self.collidetype = CollideType::OrientedBoundingBox;
        self
    }

    /// Set the heading in degrees
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    /// Set the entity kind
    pub fn with_kind(mut self, kind: PhysEntType) -> Self {
        self.kind = kind;
        self
    }

    /// Center of the bounding volume, halfway between feet and head
    pub fn volume_center(&self) -> Vec3 {
        self.o + Vec3::z() * (0.5 * (self.aboveeye - self.eyeheight))
    }

    /// Half height of the bounding volume
    pub fn half_height(&self) -> f32 {
        0.5 * (self.eyeheight + self.aboveeye)
    }

    /// Whether a player should ignore a contact that is a step or slope edge
    ///
    /// `pdist` is the signed separation along the contact normal `n`, `dir`
    /// the motion and `radius` the half extents of the colliding volume.
    /// Returns true when the contact should be skipped. Non-players never skip.
    pub fn player_collide_check(&self, dir: &Vec3, pdist: f32, n: &Vec3, radius: &Vec3) -> bool {
        if self.kind != PhysEntType::Player {
            return false;
        }
        let lean = if dir.z < 0.0 { 1.0 / 3.0 } else { 1.0 / 4.0 };
        let step = 2.0 * radius.z * (self.zmargin / (self.aboveeye + self.eyeheight) - lean);
        let slide = if dir.x * n.x < 0.0 || dir.y * n.y < 0.0 { -radius.x } else { 0.0 };
        let threshold = if dir.z * n.z < 0.0 { step } else { slide };
        pdist < threshold
    }
}
