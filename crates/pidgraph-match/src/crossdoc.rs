//! Cross-document matching: anchoring a P&ID graph against the ISO graphs of
//! the same physical line and assigning symbol correspondences.
//!
//! The pipeline is anchor discovery, multi-source shortest-path enumeration,
//! edit-distance scoring over instance-kind sequences, then a greedy
//! score-ordered assignment. The assignment is an intentional speed/quality
//! tradeoff; the cutoff and degree-cap constants are product-tuned.

use indexmap::IndexMap;
use pidgraph_core::instance::InstanceKind;
use pidgraph_core::merge::{FileRef, MergedGraph, SymbolConnection};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// An instance participating in more anchor pairs than this is too
    /// ambiguous to anchor on and is dropped.
    pub max_anchor_degree: usize,
    /// Greedy assignment stops committing pairs above this average distance.
    pub distance_cutoff: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_anchor_degree: 3,
            distance_cutoff: 1.4,
        }
    }
}

/// A pair of instances across the two sides known to correspond a priori.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPair {
    pub pid_instance_id: String,
    pub iso_instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedSymbol {
    pub iso_instance_id: String,
    /// Every edit distance that contributed to this pair, one per
    /// (anchor, path) combination that reached it.
    pub distances: Vec<f64>,
}

/// Diagnostic row of the full distance matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceEntry {
    pub pid_instance_id: String,
    pub iso_instance_id: String,
    pub distances: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossDocumentMatch {
    /// pid instance id -> matched iso instance + contributing distances.
    pub symbol_mapping: IndexMap<String, MatchedSymbol>,
    pub distances: Vec<DistanceEntry>,
    pub anchors: Vec<AnchorPair>,
}

impl CrossDocumentMatch {
    /// The debug artifact: the mapping as JSON, path objects already
    /// stripped (only ids and distance traces are serialized).
    pub fn symbol_mapping_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.symbol_mapping).unwrap_or_default()
    }

    /// Resolved cross-file links for every committed pair.
    pub fn symbol_connections(&self) -> Vec<SymbolConnection> {
        self.symbol_mapping
            .iter()
            .map(|(pid_id, matched)| SymbolConnection {
                from: FileRef::from_global_id(pid_id),
                to: FileRef::from_global_id(&matched.iso_instance_id),
            })
            .collect()
    }
}

/// Matches the merged P&ID graph against the merged ISO graph.
///
/// Never fails: empty, disconnected or fully-unmatched inputs yield empty
/// collections.
pub fn match_graphs(
    pid: &MergedGraph,
    iso: &MergedGraph,
    options: &MatchOptions,
) -> CrossDocumentMatch {
    let pid_side = SideGraph::build(pid);
    let iso_side = SideGraph::build(iso);

    let anchors = discover_anchors(&pid_side, &iso_side, options.max_anchor_degree);
    debug!(count = anchors.len(), "anchor pairs discovered");

    // Per anchor, every shortest path from the anchor to a match-relevant
    // instance, on each side independently.
    let mut distance_lists: IndexMap<(String, String), Vec<f64>> = IndexMap::new();
    for anchor in &anchors {
        let pid_paths = pid_side.relevant_paths_from(&anchor.pid_instance_id);
        let iso_paths = iso_side.relevant_paths_from(&anchor.iso_instance_id);
        for pid_path in &pid_paths {
            let Some(&pid_terminal) = pid_path.last() else {
                continue;
            };
            for iso_path in &iso_paths {
                let Some(&iso_terminal) = iso_path.last() else {
                    continue;
                };
                if !terminal_compatible(
                    pid_side.kind(pid_terminal),
                    iso_side.kind(iso_terminal),
                ) {
                    continue;
                }
                let d = path_edit_distance(pid_path, iso_path, &pid_side, &iso_side);
                distance_lists
                    .entry((pid_terminal.to_string(), iso_terminal.to_string()))
                    .or_default()
                    .push(d);
            }
        }
    }

    // Average, sort ascending, commit greedily under the cutoff.
    struct Scored {
        pid_id: String,
        iso_id: String,
        average: f64,
        distances: Vec<f64>,
    }
    let mut scored: Vec<Scored> = distance_lists
        .into_iter()
        .map(|((pid_id, iso_id), distances)| {
            let average = distances.iter().sum::<f64>() / distances.len() as f64;
            Scored {
                pid_id,
                iso_id,
                average,
                distances,
            }
        })
        .collect();
    scored.sort_by(|a, b| a.average.total_cmp(&b.average));

    let mut result = CrossDocumentMatch {
        anchors,
        ..Default::default()
    };
    for s in &scored {
        result.distances.push(DistanceEntry {
            pid_instance_id: s.pid_id.clone(),
            iso_instance_id: s.iso_id.clone(),
            distances: s.distances.clone(),
        });
    }

    let mut used_iso: FxHashSet<&str> = FxHashSet::default();
    for s in &scored {
        if s.average > options.distance_cutoff {
            break;
        }
        if result.symbol_mapping.contains_key(&s.pid_id) || used_iso.contains(s.iso_id.as_str()) {
            continue;
        }
        used_iso.insert(&s.iso_id);
        result.symbol_mapping.insert(
            s.pid_id.clone(),
            MatchedSymbol {
                iso_instance_id: s.iso_id.clone(),
                distances: s.distances.clone(),
            },
        );
    }
    debug!(mapped = result.symbol_mapping.len(), "symbol mapping committed");
    result
}

/// One side of the match: flattened instance attributes plus the
/// connection adjacency, iteration order preserved from the input.
struct SideGraph<'a> {
    order: Vec<&'a str>,
    kinds: FxHashMap<&'a str, &'a InstanceKind>,
    label_sets: FxHashMap<&'a str, BTreeSet<String>>,
    line_number_sets: FxHashMap<&'a str, BTreeSet<String>>,
    adjacency: FxHashMap<&'a str, Vec<&'a str>>,
}

impl<'a> SideGraph<'a> {
    fn build(graph: &'a MergedGraph) -> Self {
        let mut side = SideGraph {
            order: Vec::new(),
            kinds: FxHashMap::default(),
            label_sets: FxHashMap::default(),
            line_number_sets: FxHashMap::default(),
            adjacency: FxHashMap::default(),
        };

        let mut add = |id: &'a str,
                       kind: &'a InstanceKind,
                       label_ids: &'a [String],
                       inferred: &'a [String],
                       side: &mut SideGraph<'a>| {
            side.order.push(id);
            side.kinds.insert(id, kind);
            side.label_sets
                .insert(id, graph.label_texts(label_ids).into_iter().collect());
            side.line_number_sets
                .insert(id, inferred.iter().cloned().collect());
        };

        for i in &graph.symbol_instances {
            add(&i.id, &i.kind, &i.label_ids, &i.inferred_line_numbers, &mut side);
        }
        for l in &graph.lines {
            add(&l.id, &l.kind, &l.label_ids, &l.inferred_line_numbers, &mut side);
        }
        for t in &graph.tags {
            add(&t.id, &t.kind, &t.label_ids, &t.inferred_line_numbers, &mut side);
        }

        for c in &graph.connections {
            if side.kinds.contains_key(c.start.as_str()) && side.kinds.contains_key(c.end.as_str())
            {
                side.adjacency
                    .entry(&c.start)
                    .or_default()
                    .push(&c.end);
                side.adjacency
                    .entry(&c.end)
                    .or_default()
                    .push(&c.start);
            }
        }
        side
    }

    fn kind(&self, id: &str) -> Option<&InstanceKind> {
        self.kinds.get(id).copied()
    }

    fn labels(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.label_sets.get(id)
    }

    /// Equipment-tag identity string: the sorted label texts joined.
    fn equipment_tag(&self, id: &str) -> Option<String> {
        let labels = self.label_sets.get(id)?;
        if labels.is_empty() {
            return None;
        }
        Some(labels.iter().cloned().collect::<Vec<_>>().join(" "))
    }

    fn line_numbers(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.line_number_sets.get(id)
    }

    /// Instances the anchor predicate can name at all.
    fn nameable(&self) -> Vec<&'a str> {
        self.order
            .iter()
            .filter(|id| {
                matches!(
                    self.kinds.get(*id),
                    Some(
                        InstanceKind::Instrument
                            | InstanceKind::Equipment
                            | InstanceKind::EquipmentTag
                            | InstanceKind::LineBreak
                    )
                )
            })
            .copied()
            .collect()
    }

    /// BFS from `start`, recording the full ordered path to every reached
    /// match-relevant instance (including `start` itself when relevant).
    /// Neighbor expansion order follows connection input order, keeping the
    /// result deterministic.
    fn relevant_paths_from(&self, start: &str) -> Vec<Vec<&'a str>> {
        let Some((&start_key, _)) = self.kinds.get_key_value(start) else {
            return Vec::new();
        };
        let mut parent: FxHashMap<&str, &str> = FxHashMap::default();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        visited.insert(start_key);
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start_key);
        let mut paths = Vec::new();

        while let Some(current) = queue.pop_front() {
            if self.kind(current).map(InstanceKind::is_match_relevant) == Some(true) {
                let mut path = vec![current];
                let mut walk = current;
                while let Some(&p) = parent.get(walk) {
                    path.push(p);
                    walk = p;
                }
                path.reverse();
                paths.push(path);
            }
            let Some(neighbors) = self.adjacency.get(current) else {
                continue;
            };
            for &next in neighbors {
                if visited.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        paths
    }
}

/// The anchor predicate: instruments by identical label-text sets,
/// equipment-like by equal tag string, line breaks by equal inferred
/// line-number sets.
fn anchor_equal(pid_side: &SideGraph, pid_id: &str, iso_side: &SideGraph, iso_id: &str) -> bool {
    match (pid_side.kind(pid_id), iso_side.kind(iso_id)) {
        (Some(InstanceKind::Instrument), Some(InstanceKind::Instrument)) => {
            match (pid_side.labels(pid_id), iso_side.labels(iso_id)) {
                (Some(a), Some(b)) => !a.is_empty() && a == b,
                _ => false,
            }
        }
        (
            Some(InstanceKind::Equipment | InstanceKind::EquipmentTag),
            Some(InstanceKind::Equipment | InstanceKind::EquipmentTag),
        ) => match (pid_side.equipment_tag(pid_id), iso_side.equipment_tag(iso_id)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Some(InstanceKind::LineBreak), Some(InstanceKind::LineBreak)) => {
            match (pid_side.line_numbers(pid_id), iso_side.line_numbers(iso_id)) {
                (Some(a), Some(b)) => !a.is_empty() && a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// All anchor pairs, with over-shared instances (more than `max_degree`
/// pairs) dropped as ambiguous.
fn discover_anchors(
    pid_side: &SideGraph,
    iso_side: &SideGraph,
    max_degree: usize,
) -> Vec<AnchorPair> {
    let pid_nameable = pid_side.nameable();
    let iso_nameable = iso_side.nameable();

    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for &pid_id in &pid_nameable {
        for &iso_id in &iso_nameable {
            if anchor_equal(pid_side, pid_id, iso_side, iso_id) {
                pairs.push((pid_id, iso_id));
            }
        }
    }

    let mut pid_degree: FxHashMap<&str, usize> = FxHashMap::default();
    let mut iso_degree: FxHashMap<&str, usize> = FxHashMap::default();
    for &(p, i) in &pairs {
        *pid_degree.entry(p).or_default() += 1;
        *iso_degree.entry(i).or_default() += 1;
    }

    pairs
        .into_iter()
        .filter(|&(p, i)| pid_degree[p] <= max_degree && iso_degree[i] <= max_degree)
        .map(|(p, i)| AnchorPair {
            pid_instance_id: p.to_string(),
            iso_instance_id: i.to_string(),
        })
        .collect()
}

fn terminal_compatible(pid: Option<&InstanceKind>, iso: Option<&InstanceKind>) -> bool {
    match (pid, iso) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Levenshtein distance over the two ordered instance sequences.
///
/// Two instrument elements only compare equal through the anchor predicate
/// (same label-text set); every other kind compares by kind equality.
fn path_edit_distance(
    pid_path: &[&str],
    iso_path: &[&str],
    pid_side: &SideGraph,
    iso_side: &SideGraph,
) -> f64 {
    let eq = |pid_id: &str, iso_id: &str| -> bool {
        match (pid_side.kind(pid_id), iso_side.kind(iso_id)) {
            (Some(InstanceKind::Instrument), Some(InstanceKind::Instrument)) => {
                anchor_equal(pid_side, pid_id, iso_side, iso_id)
            }
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    };

    let n = pid_path.len();
    let m = iso_path.len();
    let mut previous: Vec<usize> = (0..=m).collect();
    let mut current: Vec<usize> = vec![0; m + 1];
    for i in 1..=n {
        current[0] = i;
        for j in 1..=m {
            let substitution_cost = if eq(pid_path[i - 1], iso_path[j - 1]) {
                0
            } else {
                1
            };
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + substitution_cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[m] as f64
}
