//! Models placed in a map
//!
//! The registry owns each model's meshes and its lazily built hierarchy;
//! placements reference models by handle and carry their own transform.

mod model;

pub use model::{MapModel, MapModelFlags, Model, ModelRegistry};
