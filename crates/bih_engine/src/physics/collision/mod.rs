//! Narrow-phase geometry
//!
//! The per-triangle tests run at the leaves of the hierarchy queries.
//!
//! # Key Types
//!
//! - [`Ray`] - Origin and unit direction
//! - [`Triangle`] - Three vertices with ray, segment and box tests

pub mod primitives;

pub use primitives::{segment_distance_squared, Ray, Triangle};
