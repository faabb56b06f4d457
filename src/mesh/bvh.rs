use crate::geom::aabb::Aabb;
use crate::geom::triangle::Triangle;
use crate::{Point, Vector};

/// Maximum triangles per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Node of the hierarchy: internal nodes carry two children, leaves carry a
/// contiguous range into the reordered triangle index list.
#[derive(Debug)]
enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bounds: Aabb,
    },
    Leaf {
        start: usize,
        count: usize,
        bounds: Aabb,
    },
}

impl BvhNode {
    fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Branch { bounds, .. } => bounds,
            BvhNode::Leaf { bounds, .. } => bounds,
        }
    }
}

/// Bounding volume hierarchy over a triangle list. Immutable after build.
#[derive(Debug)]
pub struct Bvh {
    root: Option<BvhNode>,
    /// Triangle indices, reordered so that every leaf references a
    /// contiguous range.
    order: Vec<usize>,
}

impl Bvh {
    /// Builds the hierarchy with top-down longest-axis midpoint splits.
    pub fn build(triangles: &[Triangle]) -> Self {
        let mut order: Vec<usize> = (0..triangles.len()).collect();
        let root = if order.is_empty() {
            None
        } else {
            let end = order.len();
            Some(Self::build_node(triangles, &mut order, 0, end))
        };
        Self { root, order }
    }

    fn build_node(triangles: &[Triangle], order: &mut [usize], start: usize, end: usize) -> BvhNode {
        let count = end - start;
        let bounds = order[start..end]
            .iter()
            .map(|&i| triangles[i].bounds)
            .reduce(|a, b| a.union(&b))
            .expect("non-empty range");

        if count <= LEAF_MAX_SIZE {
            return BvhNode::Leaf {
                start,
                count,
                bounds,
            };
        }

        // Split on the axis with the largest centroid spread
        let centroids: Vec<Point> = order[start..end]
            .iter()
            .map(|&i| triangles[i].centroid())
            .collect();
        let centroid_bounds = Aabb::from_points(&centroids);
        let axis = centroid_bounds.longest_axis();

        order[start..end].sort_unstable_by(|&a, &b| {
            let ca = triangles[a].centroid();
            let cb = triangles[b].centroid();
            let (va, vb) = match axis {
                0 => (ca.x, cb.x),
                1 => (ca.y, cb.y),
                _ => (ca.z, cb.z),
            };
            va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = start + count / 2;
        let left = Self::build_node(triangles, order, start, mid);
        let right = Self::build_node(triangles, order, mid, end);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bounds,
        }
    }

    /// Finds the closest triangle hit beyond `t_min`.
    ///
    /// Traversal descends into the nearer child first and prunes children
    /// whose box entry distance exceeds the current best hit.
    pub fn closest_hit(
        &self,
        triangles: &[Triangle],
        origin: Point,
        direction: Vector,
        t_min: f64,
    ) -> Option<(usize, f64)> {
        let root = self.root.as_ref()?;
        let mut best: Option<(usize, f64)> = None;
        self.hit_node(root, triangles, origin, direction, t_min, &mut best);
        best
    }

    fn hit_node(
        &self,
        node: &BvhNode,
        triangles: &[Triangle],
        origin: Point,
        direction: Vector,
        t_min: f64,
        best: &mut Option<(usize, f64)>,
    ) {
        match node {
            BvhNode::Leaf { start, count, .. } => {
                for &tri_idx in &self.order[*start..*start + *count] {
                    if let Some(t) = triangles[tri_idx].intersect(origin, direction) {
                        if t > t_min && best.map_or(true, |(_, bt)| t < bt) {
                            *best = Some((tri_idx, t));
                        }
                    }
                }
            }
            BvhNode::Branch { left, right, .. } => {
                let t_max = best.map_or(f64::INFINITY, |(_, bt)| bt);
                let t_left = left.bounds().entry_distance(origin, direction, t_min, t_max);
                let t_right = right
                    .bounds()
                    .entry_distance(origin, direction, t_min, t_max);

                let children = match (t_left, t_right) {
                    (Some(tl), Some(tr)) if tr < tl => {
                        [Some((right.as_ref(), tr)), Some((left.as_ref(), tl))]
                    }
                    (tl, tr) => [
                        tl.map(|t| (left.as_ref(), t)),
                        tr.map(|t| (right.as_ref(), t)),
                    ],
                };

                for child in children.into_iter().flatten() {
                    let (node, entry) = child;
                    if best.is_some_and(|(_, bt)| entry > bt) {
                        continue;
                    }
                    self.hit_node(node, triangles, origin, direction, t_min, best);
                }
            }
        }
    }

    /// Finds all triangle hits beyond `t_min`, unordered.
    pub fn all_hits(
        &self,
        triangles: &[Triangle],
        origin: Point,
        direction: Vector,
        t_min: f64,
    ) -> Vec<(usize, f64)> {
        let mut hits = Vec::new();
        if let Some(root) = self.root.as_ref() {
            self.collect_hits(root, triangles, origin, direction, t_min, &mut hits);
        }
        hits
    }

    fn collect_hits(
        &self,
        node: &BvhNode,
        triangles: &[Triangle],
        origin: Point,
        direction: Vector,
        t_min: f64,
        hits: &mut Vec<(usize, f64)>,
    ) {
        if !node.bounds().hit(origin, direction, t_min, f64::INFINITY) {
            return;
        }
        match node {
            BvhNode::Leaf { start, count, .. } => {
                for &tri_idx in &self.order[*start..*start + *count] {
                    if let Some(t) = triangles[tri_idx].intersect(origin, direction) {
                        if t > t_min {
                            hits.push((tri_idx, t));
                        }
                    }
                }
            }
            BvhNode::Branch { left, right, .. } => {
                self.collect_hits(left, triangles, origin, direction, t_min, hits);
                self.collect_hits(right, triangles, origin, direction, t_min, hits);
            }
        }
    }
}
