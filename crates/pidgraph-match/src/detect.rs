//! Line and connection detection: turning raw, unclassified path segments
//! plus known symbol instances into the per-document adjacency graph.
//!
//! The traversal starts from the symbols and grows outward by spatial
//! proximity, so noise segments with no topological role never enter the
//! graph. A post-pass promotes qualifying candidate chains to `Line`
//! instances and discards the rest.

use crate::spatial::PointIndex;
use pidgraph_core::document::{DiagramKind, PathRegistry};
use pidgraph_core::error::Result;
use pidgraph_core::geom::{self, Point};
use pidgraph_core::instance::{DiagramConnection, LineInstance, SymbolInstance, connection_exists};
use pidgraph_core::path::PathSegment;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DetectorOptions {
    /// Plain proximity threshold between two entities.
    pub proximity_threshold: f64,
    /// Larger threshold for line jumps (crossing lines drawn with a gap).
    pub jump_threshold: f64,
    /// Closest points must sit within this fraction of the segment length
    /// from an endpoint for a jump (at least one unit).
    pub edge_fraction: f64,
    /// Max angle between two segments for them to count as collinear.
    pub collinearity_tolerance_degrees: f64,
    /// ISO lines are always straight; curves are rejected as candidates.
    pub allow_curved_lines: bool,
    /// P&ID line candidates must carry a visible stroke.
    pub require_visible_stroke: bool,
}

impl DetectorOptions {
    pub fn for_kind(kind: DiagramKind) -> Self {
        match kind {
            DiagramKind::PId => Self {
                proximity_threshold: 5.0,
                jump_threshold: 10.0,
                edge_fraction: 0.05,
                collinearity_tolerance_degrees: 5.0,
                allow_curved_lines: true,
                require_visible_stroke: true,
            },
            DiagramKind::Iso => Self {
                proximity_threshold: 15.0,
                jump_threshold: 30.0,
                edge_fraction: 0.05,
                collinearity_tolerance_degrees: 5.0,
                allow_curved_lines: false,
                require_visible_stroke: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Candidate paths promoted to genuine line instances.
    pub line_instances: Vec<LineInstance>,
    /// Deduplicated undirected connections between instances.
    pub connections: Vec<DiagramConnection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRole {
    Symbol,
    KnownLine,
    Candidate,
}

struct Node {
    id: String,
    role: NodeRole,
    segments: Vec<PathSegment>,
}

impl Node {
    fn single_straight_segment(&self) -> Option<&PathSegment> {
        match self.segments.as_slice() {
            [segment @ PathSegment::Line { .. }] if self.role == NodeRole::Candidate => {
                Some(segment)
            }
            _ => None,
        }
    }
}

/// Builds the instance adjacency graph for one document.
///
/// `potential_line_ids` are the ids of registry paths not consumed by any
/// symbol instance, in document order. Unknown instance path ids are the one
/// fatal input error.
pub fn detect_lines_and_connections(
    registry: &PathRegistry,
    symbols: &[SymbolInstance],
    known_lines: &[LineInstance],
    potential_line_ids: &[String],
    options: &DetectorOptions,
) -> Result<DetectionResult> {
    let mut nodes: Vec<Node> = Vec::new();
    for s in symbols {
        nodes.push(Node {
            id: s.id.clone(),
            role: NodeRole::Symbol,
            segments: registry.instance_segments(&s.path_ids)?,
        });
    }
    for l in known_lines {
        nodes.push(Node {
            id: l.id.clone(),
            role: NodeRole::KnownLine,
            segments: registry.instance_segments(&l.path_ids)?,
        });
    }
    for id in potential_line_ids {
        let Some(path) = registry.get(id) else {
            continue;
        };
        if !options.allow_curved_lines && path.segments.iter().any(PathSegment::is_curve) {
            continue;
        }
        if options.require_visible_stroke && !path.style.has_visible_stroke() {
            continue;
        }
        if path.segments.is_empty() {
            continue;
        }
        nodes.push(Node {
            id: path.id.clone(),
            role: NodeRole::Candidate,
            segments: path.segments.clone(),
        });
    }

    // Segment-level spatial index; each segment midpoint maps back to the
    // owning node.
    let mut segment_mids: Vec<Point> = Vec::new();
    let mut segment_owner: Vec<usize> = Vec::new();
    let mut max_half_length: f64 = 0.0;
    for (i, node) in nodes.iter().enumerate() {
        for segment in &node.segments {
            segment_mids.push(segment.mid_point());
            segment_owner.push(i);
            max_half_length = max_half_length.max(segment.length() / 2.0);
        }
    }
    let index = PointIndex::build(&segment_mids);

    let jumps = best_jumps(&nodes, options);

    let mut discovered: FxHashSet<usize> = FxHashSet::default();
    let mut queue: VecDeque<usize> = VecDeque::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.role == NodeRole::Symbol {
            discovered.insert(i);
            queue.push_back(i);
        }
    }

    let mut connections: Vec<DiagramConnection> = Vec::new();
    let mut seen_pairs: FxHashSet<(usize, usize)> = FxHashSet::default();

    while let Some(current) = queue.pop_front() {
        let mut neighbors =
            proximity_neighbors(current, &nodes, &index, &segment_owner, max_half_length, options);
        neighbors.extend(jumps.get(&current).into_iter().flatten().copied());
        neighbors.sort_unstable();
        neighbors.dedup();

        for neighbor in neighbors {
            if neighbor == current {
                continue;
            }
            let pair = if current < neighbor {
                (current, neighbor)
            } else {
                (neighbor, current)
            };
            if seen_pairs.insert(pair) {
                let connection =
                    DiagramConnection::unknown(&nodes[current].id, &nodes[neighbor].id);
                // The pair set already prevents duplicates; the explicit
                // check also guards reversed duplicates from caller input.
                if !connection_exists(&connections, &connection) {
                    connections.push(connection);
                }
            }
            if discovered.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    Ok(classify_chains(nodes, connections))
}

/// Node indices within plain proximity of `current`, via the segment index.
fn proximity_neighbors(
    current: usize,
    nodes: &[Node],
    index: &PointIndex,
    segment_owner: &[usize],
    max_half_length: f64,
    options: &DetectorOptions,
) -> Vec<usize> {
    let node = &nodes[current];
    let mut result: Vec<usize> = Vec::new();
    for segment in &node.segments {
        let radius = options.proximity_threshold + segment.length() / 2.0 + max_half_length;
        for seg_idx in index.within_radius(segment.mid_point(), radius) {
            let owner = segment_owner[seg_idx];
            if owner == current || result.contains(&owner) {
                continue;
            }
            if node_distance(node, &nodes[owner]) <= options.proximity_threshold {
                result.push(owner);
            }
        }
    }
    result
}

/// Minimum closest-point distance between any segment pair of two nodes.
fn node_distance(a: &Node, b: &Node) -> f64 {
    let mut best = f64::INFINITY;
    for sa in &a.segments {
        for sb in &b.segments {
            let r = geom::closest_points_on_segments(sa.start(), sa.stop(), sb.start(), sb.stop());
            best = best.min(r.distance);
        }
    }
    best
}

/// The line-jump pre-pass: for every single-straight-segment candidate, keep
/// at most one best jump partner off each end (closest wins).
fn best_jumps(nodes: &[Node], options: &DetectorOptions) -> FxHashMap<usize, Vec<usize>> {
    struct Side {
        partner: usize,
        distance: f64,
    }
    let singles: Vec<(usize, &PathSegment)> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, n)| n.single_straight_segment().map(|s| (i, s)))
        .collect();

    let mut jumps: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for &(i, si) in &singles {
        let mut start_side: Option<Side> = None;
        let mut stop_side: Option<Side> = None;
        for &(j, sj) in &singles {
            if i == j {
                continue;
            }
            let r = geom::closest_points_on_segments(si.start(), si.stop(), sj.start(), sj.stop());
            if r.distance > options.jump_threshold {
                continue;
            }
            if !is_jump(si, sj, &r, options) {
                continue;
            }
            // Which end of `si` does this jump leave from?
            let side = if geom::distance(r.on_first, si.start())
                <= geom::distance(r.on_first, si.stop())
            {
                &mut start_side
            } else {
                &mut stop_side
            };
            let closer = side.as_ref().map(|s| r.distance < s.distance).unwrap_or(true);
            if closer {
                *side = Some(Side {
                    partner: j,
                    distance: r.distance,
                });
            }
        }
        let partners: Vec<usize> = [start_side, stop_side]
            .into_iter()
            .flatten()
            .map(|s| s.partner)
            .collect();
        if !partners.is_empty() {
            debug!(node = %nodes[i].id, count = partners.len(), "line jumps kept");
            jumps.insert(i, partners);
        }
    }

    // Jumps connect both ways so the traversal can cross them from either end.
    let mut symmetric = jumps.clone();
    for (&i, partners) in &jumps {
        for &j in partners {
            let back = symmetric.entry(j).or_default();
            if !back.contains(&i) {
                back.push(i);
            }
        }
    }
    symmetric
}

/// A jump requires the closest points of both segments near an endpoint and
/// the two segments nearly collinear.
fn is_jump(
    a: &PathSegment,
    b: &PathSegment,
    closest: &geom::ClosestPoints,
    options: &DetectorOptions,
) -> bool {
    let near_edge = |p: Point, segment: &PathSegment| {
        let margin = (segment.length() * options.edge_fraction).max(1.0);
        geom::distance(p, segment.start()) <= margin || geom::distance(p, segment.stop()) <= margin
    };
    if !near_edge(closest.on_first, a) || !near_edge(closest.on_second, b) {
        return false;
    }
    let angle_a = geom::angle_degrees(a.start(), a.stop());
    let angle_b = geom::angle_degrees(b.start(), b.stop());
    let diff = geom::angle_difference(angle_a, angle_b);
    diff <= options.collinearity_tolerance_degrees
        || (diff - 180.0).abs() <= options.collinearity_tolerance_degrees
}

/// Post-pass: promote candidate chains that connect exactly two known
/// endpoints; discard dead ends and self-contained loops, along with every
/// connection touching them.
fn classify_chains(nodes: Vec<Node>, connections: Vec<DiagramConnection>) -> DetectionResult {
    let index_of: FxHashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for c in &connections {
        let (Some(&a), Some(&b)) = (index_of.get(c.start.as_str()), index_of.get(c.end.as_str()))
        else {
            continue;
        };
        adjacency[a].push(b);
        adjacency[b].push(a);
    }

    // Connected components over candidate nodes only, walked depth-first in
    // input order.
    let mut component: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut component_count = 0usize;
    for i in 0..nodes.len() {
        if nodes[i].role != NodeRole::Candidate || component[i].is_some() {
            continue;
        }
        let id = component_count;
        component_count += 1;
        let mut stack = vec![i];
        component[i] = Some(id);
        while let Some(v) = stack.pop() {
            for &w in &adjacency[v] {
                if nodes[w].role == NodeRole::Candidate && component[w].is_none() {
                    component[w] = Some(id);
                    stack.push(w);
                }
            }
        }
    }

    // Known endpoints adjacent to each component.
    let mut endpoints: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); component_count];
    for (v, comp) in component.iter().enumerate() {
        let Some(comp) = comp else { continue };
        for &w in &adjacency[v] {
            if nodes[w].role != NodeRole::Candidate {
                endpoints[*comp].insert(w);
            }
        }
    }

    let keep_candidate = |i: usize| -> bool {
        match component[i] {
            Some(comp) => endpoints[comp].len() == 2,
            None => false,
        }
    };

    let mut line_instances = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.role == NodeRole::Candidate && keep_candidate(i) {
            line_instances.push(LineInstance::new(vec![node.id.clone()]));
        }
    }

    let kept_connections = connections
        .into_iter()
        .filter(|c| {
            [c.start.as_str(), c.end.as_str()].into_iter().all(|id| {
                let Some(&i) = index_of.get(id) else {
                    return false;
                };
                nodes[i].role != NodeRole::Candidate || keep_candidate(i)
            })
        })
        .collect();

    DetectionResult {
        line_instances,
        connections: kept_connections,
    }
}
