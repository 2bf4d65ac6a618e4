//! Ball-tree over the unit sphere
//!
//! Points are stored in radians; every node carries a bounding ball
//! (center + radius in km) so radius and k-NN queries can prune whole
//! subtrees via the triangle inequality.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::haversine_rad;

/// Leaf capacity; below this a linear scan beats further splitting
const LEAF_SIZE: usize = 8;

#[derive(Debug)]
enum Node {
    Leaf {
        center: (f64, f64),
        radius_km: f64,
        /// indices into the original point list
        points: Vec<usize>,
    },
    Branch {
        center: (f64, f64),
        radius_km: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn center(&self) -> (f64, f64) {
        match self {
            Node::Leaf { center, .. } | Node::Branch { center, .. } => *center,
        }
    }

    fn radius_km(&self) -> f64 {
        match self {
            Node::Leaf { radius_km, .. } | Node::Branch { radius_km, .. } => *radius_km,
        }
    }
}

/// Max-heap entry for k-NN candidate tracking
struct Candidate {
    distance_km: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance_km == other.distance_km
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km
            .partial_cmp(&other.distance_km)
            .unwrap_or(Ordering::Equal)
    }
}

/// Metric tree over (lat, lng) points with Haversine distance
pub struct BallTree {
    /// points in radians, original order preserved
    points: Vec<(f64, f64)>,
    root: Option<Node>,
}

impl BallTree {
    /// Build a tree from (lat, lng) points in degrees
    pub fn build(points_deg: Vec<(f64, f64)>) -> Self {
        let points: Vec<(f64, f64)> = points_deg
            .into_iter()
            .map(|(lat, lng)| (lat.to_radians(), lng.to_radians()))
            .collect();
        let root = if points.is_empty() {
            None
        } else {
            let indices: Vec<usize> = (0..points.len()).collect();
            Some(Self::build_node(&points, indices))
        };
        Self { points, root }
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True iff the tree holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn bounding_ball(points: &[(f64, f64)], indices: &[usize]) -> ((f64, f64), f64) {
        // centroid in radian space is a fine ball center at country scale
        let n = indices.len() as f64;
        let center = indices.iter().fold((0.0, 0.0), |acc, &i| {
            (acc.0 + points[i].0 / n, acc.1 + points[i].1 / n)
        });
        let radius = indices
            .iter()
            .map(|&i| haversine_rad(center, points[i]))
            .fold(0.0_f64, f64::max);
        (center, radius)
    }

    fn build_node(points: &[(f64, f64)], indices: Vec<usize>) -> Node {
        let (center, radius_km) = Self::bounding_ball(points, &indices);

        if indices.len() <= LEAF_SIZE {
            return Node::Leaf { center, radius_km, points: indices };
        }

        // split along the farthest pair: a = farthest from the first point,
        // b = farthest from a
        let first = indices[0];
        let a = *indices
            .iter()
            .max_by(|&&x, &&y| {
                haversine_rad(points[first], points[x])
                    .partial_cmp(&haversine_rad(points[first], points[y]))
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(&first);
        let b = *indices
            .iter()
            .max_by(|&&x, &&y| {
                haversine_rad(points[a], points[x])
                    .partial_cmp(&haversine_rad(points[a], points[y]))
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(&a);

        let (mut left, mut right): (Vec<usize>, Vec<usize>) = indices.into_iter().partition(|&i| {
            haversine_rad(points[i], points[a]) <= haversine_rad(points[i], points[b])
        });

        // degenerate split (duplicate coordinates): force a balanced cut
        if left.is_empty() || right.is_empty() {
            let mut all: Vec<usize> = left.drain(..).chain(right.drain(..)).collect();
            let mid = all.len() / 2;
            right = all.split_off(mid);
            left = all;
        }

        Node::Branch {
            center,
            radius_km,
            left: Box::new(Self::build_node(points, left)),
            right: Box::new(Self::build_node(points, right)),
        }
    }

    /// All points within `radius_km` of `center` (degrees), sorted by
    /// distance ascending. Returns (original index, distance km) pairs.
    pub fn radius(&self, center_deg: (f64, f64), radius_km: f64) -> Vec<(usize, f64)> {
        let center = (center_deg.0.to_radians(), center_deg.1.to_radians());
        let mut hits = Vec::new();
        if let Some(root) = &self.root {
            self.collect_radius(root, center, radius_km, &mut hits);
        }
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        hits
    }

    fn collect_radius(
        &self,
        node: &Node,
        center: (f64, f64),
        radius_km: f64,
        hits: &mut Vec<(usize, f64)>,
    ) {
        if haversine_rad(center, node.center()) - node.radius_km() > radius_km {
            return;
        }
        match node {
            Node::Leaf { points, .. } => {
                for &i in points {
                    let d = haversine_rad(center, self.points[i]);
                    if d <= radius_km {
                        hits.push((i, d));
                    }
                }
            }
            Node::Branch { left, right, .. } => {
                self.collect_radius(left, center, radius_km, hits);
                self.collect_radius(right, center, radius_km, hits);
            }
        }
    }

    /// The `k` nearest points to `center` (degrees), sorted by distance
    /// ascending. Returns (original index, distance km) pairs.
    pub fn nearest(&self, center_deg: (f64, f64), k: usize) -> Vec<(usize, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let center = (center_deg.0.to_radians(), center_deg.1.to_radians());
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = &self.root {
            self.collect_nearest(root, center, k, &mut heap);
        }
        // into_sorted_vec is ascending by distance, i.e. nearest first
        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.index, c.distance_km))
            .collect()
    }

    fn collect_nearest(
        &self,
        node: &Node,
        center: (f64, f64),
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let bound = if heap.len() == k {
            heap.peek().map(|c| c.distance_km).unwrap_or(f64::INFINITY)
        } else {
            f64::INFINITY
        };
        if haversine_rad(center, node.center()) - node.radius_km() > bound {
            return;
        }
        match node {
            Node::Leaf { points, .. } => {
                for &i in points {
                    let d = haversine_rad(center, self.points[i]);
                    if heap.len() < k {
                        heap.push(Candidate { distance_km: d, index: i });
                    } else if heap.peek().is_some_and(|worst| d < worst.distance_km) {
                        heap.pop();
                        heap.push(Candidate { distance_km: d, index: i });
                    }
                }
            }
            Node::Branch { left, right, .. } => {
                // visit the closer child first so the bound tightens early
                let dl = haversine_rad(center, left.center());
                let dr = haversine_rad(center, right.center());
                let (first, second) = if dl <= dr { (left, right) } else { (right, left) };
                self.collect_nearest(first, center, k, heap);
                self.collect_nearest(second, center, k, heap);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
