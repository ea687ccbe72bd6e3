//! Nearest-neighbor queries over segment midpoints.
//!
//! The proximity traversal in the connection detector only needs two
//! queries: everything within a radius, and the single nearest point. A
//! median-split k-d tree over 2D points covers both; the payload is an index
//! into whatever the caller is searching (paths, instances).

use pidgraph_core::geom::{Point, distance};

#[derive(Debug, Clone, Copy)]
struct Entry {
    point: Point,
    payload: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<Entry>),
    Split {
        axis: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

const LEAF_SIZE: usize = 8;

/// Static k-d tree over `(point, payload index)` pairs.
#[derive(Debug, Clone)]
pub struct PointIndex {
    root: Option<Node>,
    len: usize,
}

impl PointIndex {
    /// Builds the index; `points[i]` carries payload `i`.
    pub fn build(points: &[Point]) -> Self {
        let entries: Vec<Entry> = points
            .iter()
            .enumerate()
            .map(|(payload, &point)| Entry { point, payload })
            .collect();
        let len = entries.len();
        let root = if entries.is_empty() {
            None
        } else {
            Some(split(entries, 0))
        };
        Self { root, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload indices of all points within `radius` of `center`, in
    /// ascending payload order (deterministic regardless of tree shape).
    pub fn within_radius(&self, center: Point, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        if let Some(root) = &self.root {
            collect_within(root, center, radius, &mut found);
        }
        found.sort_unstable();
        found
    }

    /// Payload of the nearest point, with its distance.
    pub fn nearest(&self, center: Point) -> Option<(usize, f64)> {
        let root = self.root.as_ref()?;
        let mut best: Option<(usize, f64)> = None;
        nearest_in(root, center, &mut best);
        best
    }
}

fn split(mut entries: Vec<Entry>, depth: usize) -> Node {
    if entries.len() <= LEAF_SIZE {
        return Node::Leaf(entries);
    }
    let axis = depth % 2;
    let key = |e: &Entry| if axis == 0 { e.point.x } else { e.point.y };
    let mid = entries.len() / 2;
    entries.sort_by(|a, b| key(a).total_cmp(&key(b)));
    let value = key(&entries[mid]);
    let right = entries.split_off(mid);
    Node::Split {
        axis,
        value,
        left: Box::new(split(entries, depth + 1)),
        right: Box::new(split(right, depth + 1)),
    }
}

fn axis_coord(p: Point, axis: usize) -> f64 {
    if axis == 0 { p.x } else { p.y }
}

fn collect_within(node: &Node, center: Point, radius: f64, found: &mut Vec<usize>) {
    match node {
        Node::Leaf(entries) => {
            for e in entries {
                if distance(e.point, center) <= radius {
                    found.push(e.payload);
                }
            }
        }
        Node::Split {
            axis,
            value,
            left,
            right,
        } => {
            let c = axis_coord(center, *axis);
            if c - radius <= *value {
                collect_within(left, center, radius, found);
            }
            if c + radius >= *value {
                collect_within(right, center, radius, found);
            }
        }
    }
}

fn nearest_in(node: &Node, center: Point, best: &mut Option<(usize, f64)>) {
    match node {
        Node::Leaf(entries) => {
            for e in entries {
                let d = distance(e.point, center);
                let better = match best {
                    None => true,
                    // Lower payload wins ties to keep results deterministic.
                    Some((payload, bd)) => d < *bd || (d == *bd && e.payload < *payload),
                };
                if better {
                    *best = Some((e.payload, d));
                }
            }
        }
        Node::Split {
            axis,
            value,
            left,
            right,
        } => {
            let c = axis_coord(center, *axis);
            let (near, far) = if c <= *value {
                (left, right)
            } else {
                (right, left)
            };
            nearest_in(near, center, best);
            let plane_distance = (c - *value).abs();
            let must_check_far = match best {
                Some((_, d)) => plane_distance <= *d,
                None => true,
            };
            if must_check_far {
                nearest_in(far, center, best);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidgraph_core::geom::point;

    #[test]
    fn within_radius_finds_only_close_points() {
        let points = vec![
            point(0.0, 0.0),
            point(1.0, 0.0),
            point(10.0, 0.0),
            point(0.0, 2.0),
        ];
        let index = PointIndex::build(&points);
        assert_eq!(index.within_radius(point(0.0, 0.0), 2.5), vec![0, 1, 3]);
    }

    #[test]
    fn nearest_returns_the_closest_payload() {
        let points: Vec<_> = (0..100).map(|i| point(i as f64, (i % 7) as f64)).collect();
        let index = PointIndex::build(&points);
        let (payload, d) = index.nearest(point(42.2, 0.1)).unwrap();
        assert_eq!(payload, 42);
        assert!(d < 1.0);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = PointIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.nearest(point(0.0, 0.0)).is_none());
        assert!(index.within_radius(point(0.0, 0.0), 5.0).is_empty());
    }
}
