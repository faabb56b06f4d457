use crate::geom::aabb::Aabb;
use crate::{Point, Vector};

/// Triangles with an area below this are considered degenerate.
const DEGENERATE_AREA: f64 = 1e-12;

/// A mesh triangle with a precomputed unit face normal and bounds.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: Point,
    pub b: Point,
    pub c: Point,
    /// Unit face normal, consistent with the a->b->c winding.
    pub normal: Vector,
    pub bounds: Aabb,
}

impl Triangle {
    /// Builds a triangle from three vertices.
    ///
    /// Returns None for degenerate triangles (collinear vertices, area ~ 0).
    pub fn new(a: Point, b: Point, c: Point) -> Option<Self> {
        let edge1 = Vector::from_points(a, b);
        let edge2 = Vector::from_points(a, c);
        let cross = edge1.cross(edge2);
        if 0.5 * cross.length() < DEGENERATE_AREA {
            return None;
        }
        let normal = cross.normalize().ok()?;
        let bounds = Aabb::from_points(&[a, b, c]);
        Some(Self {
            a,
            b,
            c,
            normal,
            bounds,
        })
    }

    /// Möller-Trumbore ray-triangle intersection.
    ///
    /// Returns the ray parameter t of the hit, or None. Both triangle sides
    /// are hit; backface culling would lose hits on outward-wound rooms.
    pub fn intersect(&self, origin: Point, direction: Vector) -> Option<f64> {
        let edge1 = Vector::from_points(self.a, self.b);
        let edge2 = Vector::from_points(self.a, self.c);

        let h = direction.cross(edge2);
        let det = edge1.dot(&h);

        // Ray parallel to the triangle plane
        if det.abs() < 1e-12 {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = Vector::from_points(self.a, origin);
        let u = inv_det * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = inv_det * direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * edge2.dot(&q);
        if t > 0.0 { Some(t) } else { None }
    }

    pub fn centroid(&self) -> Point {
        Point::new(
            (self.a.x + self.b.x + self.c.x) / 3.0,
            (self.a.y + self.b.y + self.c.y) / 3.0,
            (self.a.z + self.b.z + self.c.z) / 3.0,
        )
    }
}
