//! Scene description loaded by the query tool

use std::path::Path;

use bih_engine::assets::{self, AssetError};
use bih_engine::config::{BihConfig, Config, ConfigError};
use bih_engine::foundation::math::{Matrix4x3, Vec3};
use bih_engine::physics::{CollideType, PhysEnt};
use bih_engine::spatial::bih::{Mesh, MeshFlags, Tri, VertexStream};
use serde::{Deserialize, Serialize};

/// Where the scene model sits in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    /// World position of the model origin
    pub origin: Vec3,
    /// Heading in degrees
    pub yaw: i32,
    /// Pitch in degrees
    pub pitch: i32,
    /// Roll in degrees
    pub roll: i32,
    /// Size in percent
    pub scale_percent: i32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            yaw: 0,
            pitch: 0,
            roll: 0,
            scale_percent: 100,
        }
    }
}

impl Placement {
    /// Model-to-world scale
    pub fn scale(&self) -> f32 {
        if self.scale_percent > 0 {
            self.scale_percent as f32 / 100.0
        } else {
            1.0
        }
    }
}

/// One mesh of the scene model, from an OBJ file or inline triangles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneMesh {
    /// OBJ file, relative to the scene file
    pub obj: Option<String>,
    /// Alpha texture for cutout meshes, relative to the scene file
    pub alpha_texture: Option<String>,
    /// Inline triangles, used when no OBJ is given
    pub triangles: Vec<[[f32; 3]; 3]>,
    /// Query participation
    pub flags: MeshFlags,
    /// Offset of the mesh within the model
    pub translation: Vec3,
    /// Uniform scale of the mesh within the model
    pub scale: f32,
}

impl Default for SceneMesh {
    fn default() -> Self {
        Self {
            obj: None,
            alpha_texture: None,
            triangles: Vec::new(),
            flags: MeshFlags::RENDER | MeshFlags::COLLIDE,
            translation: Vec3::zeros(),
            scale: 1.0,
        }
    }
}

impl SceneMesh {
    /// Build the hierarchy mesh, resolving files against `base`
    pub fn load(&self, base: &Path, config: &BihConfig) -> Result<Mesh, AssetError> {
        let xform = Matrix4x3::from_scale_translation(self.scale, self.translation);
        if let Some(obj) = &self.obj {
            let texture = self.alpha_texture.as_ref().map(|t| base.join(t));
            return assets::load_mesh(base.join(obj), texture.as_deref(), xform, self.flags, config);
        }
        let positions: Vec<[f32; 3]> = self.triangles.iter().flatten().copied().collect();
        let count = u32::try_from(self.triangles.len())
            .map_err(|_| AssetError::InvalidData("too many inline triangles".to_string()))?;
        let tris: Vec<Tri> = (0..count).map(|i| Tri::new(3 * i, 3 * i + 1, 3 * i + 2)).collect();
        Ok(Mesh::new(tris, VertexStream::from_positions(&positions), xform, self.flags))
    }
}

/// A ray to cast against the placed model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayQuery {
    /// Start point
    pub origin: Vec3,
    /// Direction; normalized before casting
    pub dir: Vec3,
    /// Distance limit; zero for none
    pub maxdist: f32,
    /// Cast as an alpha-aware shadow ray
    pub shadow: bool,
}

impl Default for RayQuery {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            dir: Vec3::new(0.0, 0.0, -1.0),
            maxdist: 0.0,
            shadow: false,
        }
    }
}

/// The player preset moved to a spot and tested against the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollideQuery {
    /// Eye position
    pub at: Vec3,
    /// Attempted motion
    pub dir: Vec3,
    /// Facing tolerance for contacts
    pub cutoff: f32,
    /// Override of the preset's volume
    pub shape: Option<CollideType>,
}

impl Default for CollideQuery {
    fn default() -> Self {
        Self {
            at: Vec3::zeros(),
            dir: Vec3::zeros(),
            cutoff: 0.0,
            shape: None,
        }
    }
}

/// A decal sphere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StainQuery {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl Default for StainQuery {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            radius: 1.0,
        }
    }
}

/// Complete query scene
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Hierarchy build settings
    pub bih: BihConfig,
    /// Entity used by collision queries
    pub player: PhysEnt,
    /// Placement of the scene model
    pub placement: Placement,
    /// Meshes of the scene model
    pub meshes: Vec<SceneMesh>,
    /// Rays to cast
    pub rays: Vec<RayQuery>,
    /// Collision queries
    pub collisions: Vec<CollideQuery>,
    /// Decal queries
    pub stains: Vec<StainQuery>,
}

impl Config for DemoConfig {}

impl DemoConfig {
    /// Load and validate a scene file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.bih.validate()?;
        if config.meshes.is_empty() {
            return Err(ConfigError::Invalid(format!("{} describes no meshes", path)));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
[player]
o = [2.0, 2.0, 13.9]
type = "Bounce"

[placement]
origin = [0.0, 0.0, 0.0]

[[meshes]]
flags = "RENDER | COLLIDE"
triangles = [[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]]

[[rays]]
origin = [1.0, 1.0, 5.0]

[[stains]]
center = [1.0, 1.0, 0.0]
radius = 0.5
"#;

    #[test]
    fn test_scene_parses_with_defaults() {
        let config = DemoConfig::from_str_with_format(SCENE, "scene.toml").unwrap();
        assert_eq!(config.meshes.len(), 1);
        assert_eq!(config.meshes[0].flags, MeshFlags::RENDER | MeshFlags::COLLIDE);
        assert_eq!(config.meshes[0].scale, 1.0);
        assert_eq!(config.rays[0].dir, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(config.placement.scale_percent, 100);
        assert_eq!(config.player.radius, 4.0);
        assert_eq!(config.bih, BihConfig::default());
    }

    #[test]
    fn test_inline_triangles_become_a_mesh() {
        let config = DemoConfig::from_str_with_format(SCENE, "scene.toml").unwrap();
        let mesh = config.meshes[0].load(Path::new("."), &config.bih).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.world_vertices(0)[1], Vec3::new(10.0, 0.0, 0.0));
    }

    const SCENE_RON: &str = r#"(
    player: (o: (2.0, 2.0, 13.9), type: Bounce),
    placement: (origin: (100.0, 0.0, 0.0), yaw: 90, scale_percent: 200),
    meshes: [
        (flags: "RENDER | COLLIDE", triangles: [((0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (0.0, 10.0, 0.0))]),
    ],
    rays: [(origin: (1.0, 1.0, 5.0), shadow: true)],
    collisions: [(at: (1.0, 1.0, 14.0), shape: Some(OrientedBoundingBox))],
)"#;

    #[test]
    fn test_ron_scene_parses() {
        let config = DemoConfig::from_str_with_format(SCENE_RON, "scene.ron").unwrap();
        assert_eq!(config.player.o, Vec3::new(2.0, 2.0, 13.9));
        assert_eq!(config.player.kind, bih_engine::physics::PhysEntType::Bounce);
        assert_eq!(config.placement.origin, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(config.placement.scale(), 2.0);
        assert_eq!(config.meshes[0].flags, MeshFlags::RENDER | MeshFlags::COLLIDE);
        assert_eq!(config.meshes[0].triangles[0][1], [10.0, 0.0, 0.0]);
        assert!(config.rays[0].shadow);
        assert_eq!(config.rays[0].dir, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(config.collisions[0].shape, Some(CollideType::OrientedBoundingBox));
        assert!(config.stains.is_empty());
    }

    #[test]
    fn test_scene_survives_ron_round_trip() {
        let config = DemoConfig::from_str_with_format(SCENE, "scene.toml").unwrap();
        let text = config.to_string_with_format("scene.ron").unwrap();
        let parsed = DemoConfig::from_str_with_format(&text, "scene.ron").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_obj_is_reported() {
        let mesh = SceneMesh {
            obj: Some("nowhere.obj".to_string()),
            ..SceneMesh::default()
        };
        assert!(matches!(
            mesh.load(Path::new("."), &BihConfig::default()),
            Err(AssetError::NotFound(_))
        ));
    }
}
