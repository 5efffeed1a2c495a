//! Spatial index - KD-tree over center positions
//!
//! The tree is a snapshot. It ranks by Euclidean distance only; the field
//! decides how far to trust it (see [`Approximation`](crate::Approximation)).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::point::Point;

/// A center returned by a spatial query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Index of the center in the field at build time.
    pub index: usize,
    /// Euclidean distance to the query point.
    pub distance: f32,
}

/// Shape summary of a built tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexStats {
    pub nodes: usize,
    pub max_depth: usize,
    pub average_depth: f32,
    /// `ceil(log2(nodes + 1)) / (max_depth + 1)`; 1.0 for a perfectly balanced tree.
    pub balance: f32,
}

#[derive(Clone, Debug)]
struct Node {
    item: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Balanced KD-tree built by recursive median split on alternating axes.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    dims: usize,
    coords: Vec<f32>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

/// Max-heap entry: the worst candidate sits on top.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    dist_sq: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
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
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl SpatialIndex {
    /// Build from positions. Every point must share one dimension.
    pub fn build<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut dims = 0;
        let mut count = 0;
        let mut coords = Vec::new();
        for p in points {
            if count == 0 {
                dims = p.dims();
            }
            debug_assert_eq!(p.dims(), dims);
            coords.extend_from_slice(p.coords());
            count += 1;
        }

        let mut index = Self {
            dims,
            coords,
            nodes: Vec::with_capacity(count),
            root: None,
        };
        let mut order: Vec<usize> = (0..count).collect();
        index.root = index.build_recursive(&mut order, 0);
        index
    }

    fn build_recursive(&mut self, items: &mut [usize], depth: usize) -> Option<usize> {
        if items.is_empty() || self.dims == 0 {
            return None;
        }
        let axis = depth % self.dims;
        let median = items.len() / 2;
        {
            let coords = &self.coords;
            let dims = self.dims;
            items.select_nth_unstable_by(median, |&a, &b| {
                coords[a * dims + axis].total_cmp(&coords[b * dims + axis])
            });
        }

        let node = self.nodes.len();
        self.nodes.push(Node {
            item: items[median],
            axis,
            left: None,
            right: None,
        });

        let (lower, rest) = items.split_at_mut(median);
        let left = self.build_recursive(lower, depth + 1);
        let right = self.build_recursive(&mut rest[1..], depth + 1);
        self.nodes[node].left = left;
        self.nodes[node].right = right;
        Some(node)
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dimension of indexed points (0 when empty).
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    fn item_coords(&self, item: usize) -> &[f32] {
        &self.coords[item * self.dims..(item + 1) * self.dims]
    }

    #[inline]
    fn dist_sq(&self, item: usize, query: &[f32]) -> f32 {
        self.item_coords(item)
            .iter()
            .zip(query)
            .map(|(a, b)| {
                let d = a - b;
                d * d
            })
            .sum()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Up to `k` nearest points, closest first.
    pub fn k_nearest(&self, point: &Point, k: usize) -> Vec<Neighbor> {
        if k == 0 || point.dims() != self.dims {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.knn_recursive(self.root, point.coords(), k, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                index: c.index,
                distance: c.dist_sq.sqrt(),
            })
            .collect()
    }

    fn knn_recursive(
        &self,
        node: Option<usize>,
        query: &[f32],
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let Some(id) = node else {
            return;
        };
        let node = &self.nodes[id];

        heap.push(Candidate {
            dist_sq: self.dist_sq(node.item, query),
            index: node.item,
        });
        if heap.len() > k {
            heap.pop();
        }

        let diff = query[node.axis] - self.item_coords(node.item)[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.knn_recursive(near, query, k, heap);

        let worst = heap.peek().map_or(f32::INFINITY, |c| c.dist_sq);
        if heap.len() < k || diff * diff < worst {
            self.knn_recursive(far, query, k, heap);
        }
    }

    /// Every point within `radius`, closest first.
    pub fn within_radius(&self, point: &Point, radius: f32) -> Vec<Neighbor> {
        if point.dims() != self.dims || radius < 0.0 {
            return Vec::new();
        }
        let mut found = Vec::new();
        self.radius_recursive(self.root, point.coords(), radius * radius, &mut found);
        found.sort_by(|a, b| a.dist_sq.total_cmp(&b.dist_sq));
        found
            .into_iter()
            .map(|c| Neighbor {
                index: c.index,
                distance: c.dist_sq.sqrt(),
            })
            .collect()
    }

    fn radius_recursive(
        &self,
        node: Option<usize>,
        query: &[f32],
        radius_sq: f32,
        found: &mut Vec<Candidate>,
    ) {
        let Some(id) = node else {
            return;
        };
        let node = &self.nodes[id];

        let dist_sq = self.dist_sq(node.item, query);
        if dist_sq <= radius_sq {
            found.push(Candidate {
                dist_sq,
                index: node.item,
            });
        }

        let diff = query[node.axis] - self.item_coords(node.item)[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        self.radius_recursive(near, query, radius_sq, found);
        if diff * diff <= radius_sq {
            self.radius_recursive(far, query, radius_sq, found);
        }
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    pub fn stats(&self) -> IndexStats {
        let mut max_depth = 0;
        let mut total_depth = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();

        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            total_depth += depth;
            let node = &self.nodes[id];
            stack.extend(node.left.map(|l| (l, depth + 1)));
            stack.extend(node.right.map(|r| (r, depth + 1)));
        }

        let nodes = self.nodes.len();
        let average_depth = if nodes == 0 {
            0.0
        } else {
            total_depth as f32 / nodes as f32
        };
        let balance = if nodes == 0 {
            1.0
        } else {
            ((nodes + 1) as f32).log2().ceil() / (max_depth + 1) as f32
        };
        IndexStats {
            nodes,
            max_depth,
            average_depth,
            balance,
        }
    }
}
