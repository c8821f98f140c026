//! Hierarchy query tool
//!
//! Loads a scene description, builds the hierarchy for its model and runs
//! the ray, collision and decal queries it lists, logging each result.
//!
//! Usage: `bih_query [--verbose] [scene.toml|scene.ron]`

mod scene;

use std::path::Path;

use bih_engine::assets::AssetError;
use bih_engine::config::ConfigError;
use bih_engine::foundation::logging;
use bih_engine::physics::{CollideType, PhysEnt};
use bih_engine::scene::{MapModel, Model, ModelRegistry};
use bih_engine::spatial::bih::{Bih, RayMode};
use thiserror::Error;

use scene::{CollideQuery, DemoConfig, Placement};

const DEFAULT_SCENE: &str = "bih_demo/scene.toml";

/// Query tool errors
#[derive(Error, Debug)]
enum DemoError {
    #[error("Scene error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Model '{0}' was not registered")]
    MissingModel(String),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut verbose = false;
    let mut path = DEFAULT_SCENE.to_string();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            _ => path = arg,
        }
    }
    logging::init_with_level(if verbose {
        logging::LevelFilter::Trace
    } else {
        logging::LevelFilter::Info
    });

    run(&path)?;
    Ok(())
}

fn run(path: &str) -> Result<(), DemoError> {
    log::info!("Loading scene from {}", path);
    let config = DemoConfig::load(path)?;
    let base = Path::new(path).parent().unwrap_or_else(|| Path::new("."));

    let meshes = config
        .meshes
        .iter()
        .map(|mesh| mesh.load(base, &config.bih))
        .collect::<Result<Vec<_>, _>>()?;
    let mut registry = ModelRegistry::with_config(config.bih.clone());
    let handle = registry.insert(Model::new("scene", meshes));
    let bih = registry
        .bih(handle)
        .ok_or_else(|| DemoError::MissingModel("scene".to_string()))?;
    let stats = bih.stats();
    log::info!(
        "Hierarchy: {} meshes, {} triangles, {} nodes, depth {}",
        stats.meshes,
        stats.triangles,
        stats.nodes,
        stats.max_depth
    );

    let place = &config.placement;
    let mm = MapModel::new(handle, place.origin)
        .with_angles(place.yaw, place.pitch, place.roll)
        .with_scale_percent(place.scale_percent);

    for (i, query) in config.rays.iter().enumerate() {
        let Some(dir) = query.dir.try_normalize(f32::EPSILON) else {
            log::warn!("Ray {}: zero direction, skipped", i);
            continue;
        };
        let mode = if query.shadow { RayMode::ALPHA_SHADOW } else { RayMode::empty() };
        match registry.intersect_ray(&mm, &query.origin, &dir, query.maxdist, mode) {
            Some(hit) => log::info!(
                "Ray {}: hit at {:.3} ({:?}), normal {:?}",
                i,
                hit.distance,
                query.origin + dir * hit.distance,
                hit.normal.map(|n| [n.x, n.y, n.z])
            ),
            None => log::info!("Ray {}: miss", i),
        }
    }

    for (i, query) in config.collisions.iter().enumerate() {
        let info = collide(bih, &config.player, query, place);
        log::info!(
            "Collision {}: collided {}, inside {}, depth {:.3}, wall {:?}",
            i,
            info.collided,
            info.inside,
            info.depth,
            [info.wall.x, info.wall.y, info.wall.z]
        );
    }

    for (i, query) in config.stains.iter().enumerate() {
        let tris = bih.gen_stain_tris(
            &query.center,
            query.radius,
            &place.origin,
            place.yaw,
            place.pitch,
            place.roll,
            place.scale(),
        );
        log::info!("Stain {}: {} candidate triangles", i, tris.len());
        for tri in &tris {
            log::debug!("  {:?}", tri.map(|v| [v.x, v.y, v.z]));
        }
    }
    Ok(())
}

/// Run one collision query with the preset moved to its spot
fn collide(bih: &Bih, preset: &PhysEnt, query: &CollideQuery, place: &Placement) -> bih_engine::spatial::CollisionInfo {
    let mut d = *preset;
    d.o = query.at;
    if let Some(shape) = query.shape {
        d.collidetype = shape;
    }
    let (origin, scale) = (&place.origin, place.scale());
    match d.collidetype {
        CollideType::Ellipse => {
            bih.ellipse_collide(&d, &query.dir, query.cutoff, origin, place.yaw, place.pitch, place.roll, scale)
        }
        CollideType::OrientedBoundingBox => {
            bih.box_collide(&d, &query.dir, query.cutoff, origin, place.yaw, place.pitch, place.roll, scale)
        }
    }
}
