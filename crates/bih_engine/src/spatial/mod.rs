//! Spatial acceleration structures

pub mod bih;

pub use bih::{Bih, BihStats, CollisionInfo, Mesh, MeshError, MeshFlags, RayHit, RayMode, Tri, VertexStream};
