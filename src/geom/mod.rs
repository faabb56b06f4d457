pub mod aabb;
pub mod point;
pub mod sphere;
pub mod triangle;
pub mod vector;

/// Geometric precision
pub(crate) const EPS: f64 = 1e-13;

/// Minimum hit distance; intersections closer than this are treated as
/// self-intersections and skipped.
pub const HIT_EPS: f64 = 1e-3;

/// Distance a reflected ray origin is advanced along its new direction to
/// escape the surface it just bounced off.
pub const SURFACE_OFFSET: f64 = 1e-3;
