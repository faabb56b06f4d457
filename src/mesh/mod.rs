//! Triangle mesh enclosures with BVH-accelerated ray queries.

pub mod bvh;

use crate::error::EngineError;
use crate::geom::aabb::Aabb;
use crate::geom::triangle::Triangle;
use crate::geom::HIT_EPS;
use crate::{Point, Vector};

use bvh::Bvh;

/// Result of a closest-hit query against the mesh.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    /// Distance along the (unit) ray direction. Always > `HIT_EPS`.
    pub distance: f64,
    /// Intersection point.
    pub point: Point,
    /// Unit face normal oriented against the incoming ray.
    pub normal: Vector,
    /// Index of the hit triangle.
    pub triangle_id: usize,
}

/// An immutable triangle mesh that owns its acceleration structure.
#[derive(Debug)]
pub struct Mesh {
    triangles: Vec<Triangle>,
    bvh: Bvh,
    bounds: Aabb,
}

impl Mesh {
    /// Builds a mesh from flat vertex positions and optional indices.
    ///
    /// `positions` is a flat `[x0, y0, z0, x1, ...]` array. When `indices`
    /// is absent, every 3 consecutive positions form a triangle. Face
    /// normals are recomputed from the winding; caller-supplied vertex
    /// normals play no role in intersection. Degenerate triangles are
    /// skipped; a mesh with no valid triangles fails.
    pub fn build(positions: &[f64], indices: Option<&[usize]>) -> Result<Self, EngineError> {
        if positions.is_empty() {
            return Err(EngineError::InvalidGeometry("no vertices".into()));
        }
        if positions.len() % 3 != 0 {
            return Err(EngineError::InvalidGeometry(format!(
                "positions length {} is not a multiple of 3",
                positions.len()
            )));
        }
        if positions.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::InvalidGeometry(
                "positions contain NaN or infinite values".into(),
            ));
        }

        let vertices: Vec<Point> = positions
            .chunks_exact(3)
            .map(|c| Point::new(c[0], c[1], c[2]))
            .collect();

        let vertex_at = |i: usize| -> Result<Point, EngineError> {
            vertices.get(i).copied().ok_or_else(|| {
                EngineError::InvalidGeometry(format!(
                    "index {} out of range ({} vertices)",
                    i,
                    vertices.len()
                ))
            })
        };

        let mut triangles = Vec::new();
        match indices {
            Some(idx) => {
                if idx.len() % 3 != 0 {
                    return Err(EngineError::InvalidGeometry(format!(
                        "indices length {} is not a multiple of 3",
                        idx.len()
                    )));
                }
                for tri in idx.chunks_exact(3) {
                    let (a, b, c) = (vertex_at(tri[0])?, vertex_at(tri[1])?, vertex_at(tri[2])?);
                    if let Some(t) = Triangle::new(a, b, c) {
                        triangles.push(t);
                    }
                }
            }
            None => {
                for tri in vertices.chunks_exact(3) {
                    if let Some(t) = Triangle::new(tri[0], tri[1], tri[2]) {
                        triangles.push(t);
                    }
                }
            }
        }

        if triangles.is_empty() {
            return Err(EngineError::InvalidGeometry(
                "mesh has no non-degenerate triangles".into(),
            ));
        }

        let bounds = triangles
            .iter()
            .map(|t| t.bounds)
            .reduce(|a, b| a.union(&b))
            .expect("non-empty triangle list");
        let bvh = Bvh::build(&triangles);

        Ok(Self {
            triangles,
            bvh,
            bounds,
        })
    }

    /// Builds a closed axis-aligned box room of the given dimensions.
    ///
    /// The optional origin is the min corner (default the coordinate
    /// origin). Faces are wound so normals point into the box interior.
    pub fn from_box(
        dx: f64,
        dy: f64,
        dz: f64,
        origin: Option<(f64, f64, f64)>,
    ) -> Result<Self, EngineError> {
        let (ox, oy, oz) = origin.unwrap_or((0.0, 0.0, 0.0));
        let corners = [
            (ox, oy, oz),
            (ox + dx, oy, oz),
            (ox + dx, oy + dy, oz),
            (ox, oy + dy, oz),
            (ox, oy, oz + dz),
            (ox + dx, oy, oz + dz),
            (ox + dx, oy + dy, oz + dz),
            (ox, oy + dy, oz + dz),
        ];
        // Faces wound counter-clockwise as seen from inside
        const FACES: [[usize; 4]; 6] = [
            [0, 1, 2, 3], // floor (z = min)
            [7, 6, 5, 4], // ceiling (z = max)
            [4, 5, 1, 0], // y = min
            [6, 7, 3, 2], // y = max
            [5, 6, 2, 1], // x = max
            [7, 4, 0, 3], // x = min
        ];

        let mut positions = Vec::with_capacity(6 * 2 * 9);
        for face in FACES {
            let quad = [
                corners[face[0]],
                corners[face[1]],
                corners[face[2]],
                corners[face[3]],
            ];
            for tri in [[0, 1, 2], [0, 2, 3]] {
                for &v in &tri {
                    let (x, y, z) = quad[v];
                    positions.extend_from_slice(&[x, y, z]);
                }
            }
        }

        Self::build(&positions, None)
    }

    /// Finds the nearest mesh intersection further than `HIT_EPS`.
    ///
    /// The returned normal is flipped, when needed, to face the incoming
    /// ray so that reflection and hemisphere sampling stay on the hit side.
    pub fn closest_hit(&self, origin: Point, direction: Vector) -> Option<Hit> {
        let (triangle_id, distance) =
            self.bvh
                .closest_hit(&self.triangles, origin, direction, HIT_EPS)?;
        let point = origin + direction * distance;
        let face_normal = self.triangles[triangle_id].normal;
        let normal = if direction.dot(&face_normal) > 0.0 {
            face_normal * -1.0
        } else {
            face_normal
        };
        Some(Hit {
            distance,
            point,
            normal,
            triangle_id,
        })
    }

    /// All intersections further than `HIT_EPS`, unordered.
    pub fn all_hits(&self, origin: Point, direction: Vector) -> Vec<(usize, f64)> {
        self.bvh
            .all_hits(&self.triangles, origin, direction, HIT_EPS)
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounding box of the whole mesh.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }
}
