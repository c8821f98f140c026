//! Asset loading for hierarchy geometry
//!
//! Meshes come from OBJ files and alpha-tested meshes take a cutout mask
//! built from a texture's alpha channel.

pub mod alpha_mask;
pub mod obj_loader;

pub use alpha_mask::AlphaMask;
pub use obj_loader::{MeshData, ObjError, ObjLoader, Vertex};

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::BihConfig;
use crate::foundation::math::Matrix4x3;
use crate::spatial::bih::{Mesh, MeshError, MeshFlags};

/// Load an OBJ file as a hierarchy mesh
///
/// With an `alpha_texture` the mesh is marked [`MeshFlags::ALPHA`] and gets
/// a cutout mask using the configured alpha cutoff.
pub fn load_mesh<P: AsRef<Path>>(
    obj_path: P,
    alpha_texture: Option<&Path>,
    xform: Matrix4x3,
    flags: MeshFlags,
    config: &BihConfig,
) -> Result<Mesh, AssetError> {
    let path_ref = obj_path.as_ref();
    if !path_ref.exists() {
        return Err(AssetError::NotFound(path_ref.display().to_string()));
    }
    let data = ObjLoader::load_obj(path_ref)?;
    let Some(texture) = alpha_texture else {
        return Ok(data.to_mesh(xform, flags)?);
    };
    let mask = AlphaMask::from_file(texture, config.alpha_cutoff)?;
    let mesh = data
        .to_mesh(xform, flags | MeshFlags::ALPHA)?
        .with_alpha(data.texcoords()?, Arc::new(mask));
    Ok(mesh)
}

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// OBJ text could not be turned into geometry
    #[error("OBJ error: {0}")]
    Obj(#[from] ObjError),

    /// Geometry was rejected by the hierarchy
    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
