use crate::{Point, Vector};

/// Axis-aligned bounding box used by the BVH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    /// Creates a box from two opposite corners (in any order).
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Creates the tightest box enclosing a set of points.
    ///
    /// Returns a degenerate box at the origin for an empty slice.
    pub fn from_points(pts: &[Point]) -> Self {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in pts {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        if pts.is_empty() {
            return Self {
                min: Point::new(0., 0., 0.),
                max: Point::new(0., 0., 0.),
            };
        }
        Self { min, max }
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Center of the box.
    pub fn centroid(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Index of the axis with the largest extent (0=x, 1=y, 2=z).
    pub fn longest_axis(&self) -> usize {
        let ex = self.max.x - self.min.x;
        let ey = self.max.y - self.min.y;
        let ez = self.max.z - self.min.z;
        if ex > ey && ex > ez {
            0
        } else if ey > ez {
            1
        } else {
            2
        }
    }

    /// Slab test: does the ray hit the box within `[t_min, t_max]`?
    ///
    /// Division by a zero direction component yields infinities, which the
    /// min/max comparisons handle correctly.
    pub fn hit(&self, origin: Point, direction: Vector, t_min: f64, t_max: f64) -> bool {
        let mut t0 = t_min;
        let mut t1 = t_max;

        for axis in 0..3 {
            let (o, d, lo, hi) = match axis {
                0 => (origin.x, direction.dx, self.min.x, self.max.x),
                1 => (origin.y, direction.dy, self.min.y, self.max.y),
                _ => (origin.z, direction.dz, self.min.z, self.max.z),
            };
            let inv = 1.0 / d;
            let mut near = (lo - o) * inv;
            let mut far = (hi - o) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = near.max(t0);
            t1 = far.min(t1);
            if t1 < t0 {
                return false;
            }
        }
        true
    }

    /// Distance at which the ray enters the box, or None when it misses.
    pub fn entry_distance(
        &self,
        origin: Point,
        direction: Vector,
        t_min: f64,
        t_max: f64,
    ) -> Option<f64> {
        let mut t0 = t_min;
        let mut t1 = t_max;

        for axis in 0..3 {
            let (o, d, lo, hi) = match axis {
                0 => (origin.x, direction.dx, self.min.x, self.max.x),
                1 => (origin.y, direction.dy, self.min.y, self.max.y),
                _ => (origin.z, direction.dz, self.min.z, self.max.z),
            };
            let inv = 1.0 / d;
            let mut near = (lo - o) * inv;
            let mut far = (hi - o) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = near.max(t0);
            t1 = far.min(t1);
            if t1 < t0 {
                return None;
            }
        }
        Some(t0)
    }
}
