//! The per-file graph document: parsed diagram content plus its geometry
//! registry, and the maintenance passes (dangling-connection pruning,
//! line-number propagation) every document needs before matching.

use crate::error::{Error, Result};
use crate::geom::BoundingBox;
use crate::instance::{
    DiagramConnection, InstanceKind, LineInstance, SymbolInstance, TagInstance,
};
use crate::path::{self, PathSegment};
use crate::symbol::DiagramSymbol;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagramKind {
    #[serde(rename = "p&id")]
    PId,
    #[serde(rename = "iso")]
    Iso,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub kind: DiagramKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramLabel {
    pub id: String,
    pub text: String,
    pub bounding_box: BoundingBox,
}

/// Stroke/fill presentation of a raw path, used by the detector's validity
/// rules (a P&ID line candidate must carry a visible stroke).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

impl PathStyle {
    pub fn has_visible_stroke(&self) -> bool {
        match self.stroke.as_deref() {
            None => false,
            Some("none") | Some("transparent") => false,
            Some(_) => true,
        }
    }
}

/// One raw path of a diagram file, keyed by its SVG element id.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramPath {
    pub id: String,
    pub segments: Vec<PathSegment>,
    pub style: PathStyle,
}

impl DiagramPath {
    pub fn from_commands(id: impl Into<String>, commands: &str, style: PathStyle) -> Self {
        Self {
            id: id.into(),
            segments: path::parse_path_data(commands),
            style,
        }
    }

    pub fn mid_point(&self) -> Option<crate::geom::Point> {
        let boxed = path::segment_list_bounding_box(&self.segments)?;
        Some(boxed.center())
    }
}

/// Geometry lookup for a document, insertion-ordered so downstream passes
/// iterate deterministically.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    paths: IndexMap<String, DiagramPath>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: DiagramPath) {
        self.paths.insert(path.id.clone(), path);
    }

    pub fn get(&self, id: &str) -> Option<&DiagramPath> {
        self.paths.get(id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagramPath> {
        self.paths.values()
    }

    /// Concatenated segments of a path-id group, in the given order.
    ///
    /// A missing id is the structurally-fatal case: the instance claims
    /// geometry the document does not have.
    pub fn instance_segments(&self, path_ids: &[String]) -> Result<Vec<PathSegment>> {
        let mut segments = Vec::new();
        for id in path_ids {
            let p = self
                .paths
                .get(id)
                .ok_or_else(|| Error::UnknownPathId { id: id.clone() })?;
            segments.extend_from_slice(&p.segments);
        }
        Ok(segments)
    }

    pub fn instance_bounding_box(&self, path_ids: &[String]) -> Result<Option<BoundingBox>> {
        let segments = self.instance_segments(path_ids)?;
        Ok(path::segment_list_bounding_box(&segments))
    }
}

/// One parsed diagram file in its interchange shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub document_metadata: DocumentMetadata,
    pub view_box: BoundingBox,
    #[serde(default)]
    pub symbols: Vec<DiagramSymbol>,
    #[serde(default)]
    pub symbol_instances: Vec<SymbolInstance>,
    #[serde(default)]
    pub lines: Vec<LineInstance>,
    #[serde(default)]
    pub connections: Vec<DiagramConnection>,
    #[serde(default)]
    pub tags: Vec<TagInstance>,
    #[serde(default)]
    pub labels: Vec<DiagramLabel>,
    #[serde(default)]
    pub line_numbers: Vec<String>,
}

impl GraphDocument {
    pub fn new(kind: DiagramKind, name: impl Into<String>, view_box: BoundingBox) -> Self {
        Self {
            document_metadata: DocumentMetadata {
                kind,
                name: name.into(),
                unit: None,
            },
            view_box,
            symbols: Vec::new(),
            symbol_instances: Vec::new(),
            lines: Vec::new(),
            connections: Vec::new(),
            tags: Vec::new(),
            labels: Vec::new(),
            line_numbers: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All instance ids (symbols, lines, tags) in document order.
    pub fn instance_ids(&self) -> impl Iterator<Item = &str> {
        self.symbol_instances
            .iter()
            .map(|i| i.id.as_str())
            .chain(self.lines.iter().map(|l| l.id.as_str()))
            .chain(self.tags.iter().map(|t| t.id.as_str()))
    }

    pub fn has_instance(&self, id: &str) -> bool {
        self.instance_ids().any(|i| i == id)
    }

    pub fn instance_kind(&self, id: &str) -> Option<&InstanceKind> {
        if let Some(s) = self.symbol_instances.iter().find(|s| s.id == id) {
            return Some(&s.kind);
        }
        if let Some(l) = self.lines.iter().find(|l| l.id == id) {
            return Some(&l.kind);
        }
        self.tags.iter().find(|t| t.id == id).map(|t| &t.kind)
    }

    pub fn label_texts(&self, label_ids: &[String]) -> Vec<String> {
        label_ids
            .iter()
            .filter_map(|id| self.labels.iter().find(|l| &l.id == id))
            .map(|l| l.text.clone())
            .collect()
    }

    /// Drops connections whose endpoints do not exist as instances. Required
    /// before matching; a dangling endpoint is warned about, never fatal.
    pub fn prune_dangling_connections(&mut self) -> usize {
        let ids: FxHashSet<&str> = self.instance_ids().collect();
        let keep: Vec<bool> = self
            .connections
            .iter()
            .map(|c| {
                let ok = ids.contains(c.start.as_str()) && ids.contains(c.end.as_str());
                if !ok {
                    warn!(
                        start = %c.start,
                        end = %c.end,
                        "connection references a missing instance id; pruning"
                    );
                }
                ok
            })
            .collect();
        let before = self.connections.len();
        let mut it = keep.iter();
        self.connections.retain(|_| *it.next().unwrap_or(&false));
        before - self.connections.len()
    }

    /// Recomputes `inferred_line_numbers` for every instance from scratch.
    ///
    /// Declared line numbers flow outward across connections through
    /// unlabelled instances. Propagation stops at line breaks and at
    /// instances that declare their own numbers; both still receive the
    /// incoming number (a line break must know the numbers on both of its
    /// sides for cross-document anchoring).
    pub fn infer_line_numbers(&mut self) {
        for i in &mut self.symbol_instances {
            i.inferred_line_numbers.clear();
        }
        for l in &mut self.lines {
            l.inferred_line_numbers.clear();
        }
        for t in &mut self.tags {
            t.inferred_line_numbers.clear();
        }

        struct Node {
            declared: Vec<String>,
            is_break: bool,
        }
        let mut nodes: IndexMap<String, Node> = IndexMap::new();
        for i in &self.symbol_instances {
            nodes.insert(
                i.id.clone(),
                Node {
                    declared: i.line_numbers.clone(),
                    is_break: i.kind == InstanceKind::LineBreak,
                },
            );
        }
        for l in &self.lines {
            nodes.insert(
                l.id.clone(),
                Node {
                    declared: l.line_numbers.clone(),
                    is_break: false,
                },
            );
        }
        for t in &self.tags {
            nodes.insert(
                t.id.clone(),
                Node {
                    declared: t.line_numbers.clone(),
                    is_break: t.kind == InstanceKind::LineBreak,
                },
            );
        }

        let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for c in &self.connections {
            if nodes.contains_key(&c.start) && nodes.contains_key(&c.end) {
                adjacency.entry(&c.start).or_default().push(&c.end);
                adjacency.entry(&c.end).or_default().push(&c.start);
            }
        }

        let mut inferred: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for (source_id, source) in &nodes {
            for number in &source.declared {
                let mut visited: FxHashSet<&str> = FxHashSet::default();
                visited.insert(source_id);
                let mut queue: VecDeque<&str> = VecDeque::new();
                queue.push_back(source_id);
                while let Some(current) = queue.pop_front() {
                    let Some(neighbors) = adjacency.get(current) else {
                        continue;
                    };
                    for &next in neighbors {
                        if !visited.insert(next) {
                            continue;
                        }
                        let node = &nodes[next];
                        let entry = inferred.entry(next.to_string()).or_default();
                        if !entry.contains(number) {
                            entry.push(number.clone());
                        }
                        // Terminal nodes absorb the number without passing it on.
                        if node.is_break || !node.declared.is_empty() {
                            continue;
                        }
                        queue.push_back(next);
                    }
                }
            }
        }

        for i in &mut self.symbol_instances {
            if let Some(numbers) = inferred.remove(&i.id) {
                i.inferred_line_numbers = numbers;
            }
        }
        for l in &mut self.lines {
            if let Some(numbers) = inferred.remove(&l.id) {
                l.inferred_line_numbers = numbers;
            }
        }
        for t in &mut self.tags {
            if let Some(numbers) = inferred.remove(&t.id) {
                t.inferred_line_numbers = numbers;
            }
        }
    }
}
