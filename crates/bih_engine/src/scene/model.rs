//! Models and their placements in a map
//!
//! A model owns its meshes; its hierarchy is built the first time a query
//! needs it. A [`MapModel`] puts a model into the world with a position, a
//! whole-degree orientation and a percentage scale.

use std::sync::OnceLock;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::BihConfig;
use crate::foundation::collections::{HandleMap, TypedHandle};
use crate::foundation::math::{orientation, Vec3};
use crate::spatial::bih::{Bih, Mesh, RayHit, RayMode};

/// Search distance used when a ray has no limit
const UNLIMITED: f32 = 1e16;

/// A named set of meshes sharing one hierarchy
#[derive(Debug)]
pub struct Model {
    name: String,
    meshes: Vec<Mesh>,
    /// Casts shadows
    pub shadow: bool,
    /// Blocks non-shadow rays
    pub collide: bool,
    bih: OnceLock<Bih>,
}

impl Model {
    /// Create a model that casts shadows and collides
    pub fn new(name: impl Into<String>, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.into(),
            meshes,
            shadow: true,
            collide: true,
            bih: OnceLock::new(),
        }
    }

    /// Set whether the model casts shadows
    pub fn with_shadow(mut self, shadow: bool) -> Self {
        self.shadow = shadow;
        self
    }

    /// Set whether the model blocks rays
    pub fn with_collide(mut self, collide: bool) -> Self {
        self.collide = collide;
        self
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source meshes
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// The hierarchy, building it on first use
    pub fn bih(&self, config: &BihConfig) -> &Bih {
        self.bih.get_or_init(|| {
            log::debug!("Building hierarchy for model '{}'", self.name);
            Bih::with_config(self.meshes.clone(), config)
        })
    }

    /// Whether the hierarchy has been built yet
    pub fn is_built(&self) -> bool {
        self.bih.get().is_some()
    }
}

bitflags! {
    /// Per-placement overrides
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MapModelFlags: u32 {
        /// Never shadows
        const NO_SHADOW = 1 << 0;
        /// Never blocks non-shadow rays
        const NO_COLLIDE = 1 << 1;
    }
}

/// A model placed in the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapModel {
    /// Placed model
    pub model: TypedHandle<Model>,
    /// World position of the model origin
    pub origin: Vec3,
    /// Heading in degrees
    pub yaw: i32,
    /// Pitch in degrees
    pub pitch: i32,
    /// Roll in degrees
    pub roll: i32,
    /// Size in percent; zero or less means unscaled
    pub scale_percent: i32,
    /// Overrides
    pub flags: MapModelFlags,
}

impl MapModel {
    /// Place `model` at `origin` unrotated and unscaled
    pub fn new(model: TypedHandle<Model>, origin: Vec3) -> Self {
        Self {
            model,
            origin,
            yaw: 0,
            pitch: 0,
            roll: 0,
            scale_percent: 100,
            flags: MapModelFlags::empty(),
        }
    }

    /// Set the orientation in degrees
    pub fn with_angles(mut self, yaw: i32, pitch: i32, roll: i32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self.roll = roll;
        self
    }

    /// Set the size in percent
    pub fn with_scale_percent(mut self, scale_percent: i32) -> Self {
        self.scale_percent = scale_percent;
        self
    }

    /// Set the overrides
    pub fn with_flags(mut self, flags: MapModelFlags) -> Self {
        self.flags = flags;
        self
    }

    /// World-to-model scale factor
    fn inv_scale(&self) -> f32 {
        if self.scale_percent > 0 {
            100.0 / self.scale_percent as f32
        } else {
            1.0
        }
    }
}

/// Named models with lazily built hierarchies
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HandleMap<Model>,
    config: BihConfig,
}

impl ModelRegistry {
    /// Create an empty registry building with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry building with `config`
    pub fn with_config(config: BihConfig) -> Self {
        Self {
            models: HandleMap::new(),
            config,
        }
    }

    /// Add a model
    pub fn insert(&mut self, model: Model) -> TypedHandle<Model> {
        log::debug!("Registered model '{}' ({} meshes)", model.name, model.meshes.len());
        TypedHandle::new(self.models.insert(model))
    }

    /// Remove a model, returning it
    pub fn remove(&mut self, handle: TypedHandle<Model>) -> Option<Model> {
        self.models.remove(handle.key())
    }

    /// Look up a model
    pub fn get(&self, handle: TypedHandle<Model>) -> Option<&Model> {
        self.models.get(handle.key())
    }

    /// Find a model by name
    pub fn find(&self, name: &str) -> Option<TypedHandle<Model>> {
        self.models
            .iter()
            .find(|(_, model)| model.name == name)
            .map(|(key, _)| TypedHandle::new(key))
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no models are registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The hierarchy of a model, building it on first use
    pub fn bih(&self, handle: TypedHandle<Model>) -> Option<&Bih> {
        self.get(handle).map(|model| model.bih(&self.config))
    }

    /// Cast a world-space ray against a placed model
    ///
    /// `ray` should be unit length so distances come back in world units.
    /// A `maxdist` of zero means no limit. Shadow rays skip models and
    /// placements that do not cast shadows; other rays skip those that do
    /// not collide unless `mode` includes [`RayMode::ENTITIES`]. The hit
    /// normal is in world space.
    pub fn intersect_ray(&self, mm: &MapModel, o: &Vec3, ray: &Vec3, maxdist: f32, mode: RayMode) -> Option<RayHit> {
        let model = self.get(mm.model)?;
        if mode.contains(RayMode::SHADOW) {
            if !model.shadow || mm.flags.contains(MapModelFlags::NO_SHADOW) {
                return None;
            }
        } else if !mode.contains(RayMode::ENTITIES)
            && (!model.collide || mm.flags.contains(MapModelFlags::NO_COLLIDE))
        {
            return None;
        }
        let bih = model.bih(&self.config);
        if bih.is_empty() {
            return None;
        }

        let scale = mm.inv_scale();
        let mo = (o - mm.origin) * scale;
        let v = mo.dot(ray);
        let inside = bih.ent_radius() - mo.magnitude_squared();
        if (inside < 0.0 && v > 0.0) || inside + v * v < 0.0 {
            return None;
        }

        let orient = orientation(mm.yaw, mm.pitch, mm.roll);
        let local_origin = orient.transpose() * mo;
        let local_ray = orient.transpose() * ray;
        let limit = if maxdist > 0.0 { maxdist * scale } else { UNLIMITED };
        let hit = bih.traverse(&local_origin, &local_ray, limit, mode)?;
        Some(RayHit {
            distance: hit.distance / scale,
            normal: hit.normal.map(|n| orient * n),
        })
    }
}
