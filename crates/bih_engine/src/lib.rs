//! # BIH Engine
//!
//! Spatial queries over static triangle meshes, backed by a bounding
//! interval hierarchy.
//!
//! ## Features
//!
//! - **Ray casts**: nearest hit with surface normal, shadow rays with alpha cutouts
//! - **Shape collision**: ellipsoid and oriented-box entities against world geometry
//! - **Decals**: gathering the triangles a stain sphere may touch
//! - **Map models**: placed, rotated and scaled instances sharing one hierarchy
//! - **Asset loading**: OBJ geometry and alpha masks from textures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bih_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     logging::init();
//!     let mesh = ObjLoader::load_obj("level.obj")?.to_mesh(Matrix4x3::identity(), MeshFlags::RENDER | MeshFlags::COLLIDE)?;
//!     let bih = Bih::new(vec![mesh]);
//!
//!     let player = PhysEnt::new(Vec3::new(0.0, 0.0, 20.0));
//!     let info = bih.ellipse_collide(&player, &Vec3::new(0.0, 0.0, -1.0), 0.0, &Vec3::zeros(), 0, 0, 0, 1.0);
//!     if info.collided {
//!         println!("blocked by wall {:?}", info.wall);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod physics;
pub mod scene;
pub mod spatial;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{load_mesh, AlphaMask, AssetError, MeshData, ObjLoader},
        config::{BihConfig, Config, ConfigError},
        foundation::{
            logging,
            math::{orientation, Matrix4x3, Vec2, Vec3},
        },
        physics::{CollideType, PhysEnt, PhysEntType},
        scene::{MapModel, MapModelFlags, Model, ModelRegistry},
        spatial::bih::{
            Bih, BihStats, CollisionInfo, Mesh, MeshError, MeshFlags, RayHit, RayMode, Tri, VertexStream,
        },
    };
}
