use crate::{Point, Vector};

/// A spherical receiver volume.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: Point,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Nearest positive ray intersection distance, if any.
    ///
    /// `direction` must be unit length. A ray starting inside the sphere
    /// returns the exit distance.
    pub fn intersect(&self, origin: Point, direction: Vector) -> Option<f64> {
        let oc = Vector::from_points(origin, self.center);
        let h = direction.dot(&oc);
        let c = oc.dot(&oc) - self.radius * self.radius;

        let discriminant = h * h - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Nearest root in front of the origin
        let root = h - sqrtd;
        if root > 0.0 {
            return Some(root);
        }
        let root = h + sqrtd;
        if root > 0.0 {
            return Some(root);
        }
        None
    }

    /// Checks if a point is within the sphere.
    pub fn contains(&self, point: Point) -> bool {
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        let dz = point.z - self.center.z;
        let dist2 = dx * dx + dy * dy + dz * dz;
        dist2 <= self.radius * self.radius
    }
}
