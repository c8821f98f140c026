//! Physics entities and collision primitives
//!
//! The entity description consumed by the shape collision queries, and the
//! triangle-level tests those queries are built from.

pub mod collision;
pub mod physent;

pub use collision::{Ray, Triangle};
pub use physent::{CollideType, PhysEnt, PhysEntType};
