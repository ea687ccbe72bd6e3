//! Global-id namespacing and multi-file merge.
//!
//! A match run spans several diagram files, so local instance ids are
//! prefixed with the owning file name before merging. Both directions are
//! immutable transforms returning a new document; a failed run can never
//! leave a half-globalized document behind.

use crate::document::{DiagramKind, DiagramLabel, GraphDocument};
use crate::instance::{DiagramConnection, LineInstance, SymbolInstance, TagInstance};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator between file name and local id. Never occurs in local ids,
/// which are `-`-joined path ids.
pub const GLOBAL_ID_SEPARATOR: &str = "::";

pub fn global_id(file_name: &str, local_id: &str) -> String {
    format!("{file_name}{GLOBAL_ID_SEPARATOR}{local_id}")
}

/// Splits a global id back into `(file name, local id)`.
pub fn split_global_id(id: &str) -> Option<(&str, &str)> {
    id.split_once(GLOBAL_ID_SEPARATOR)
}

/// Returns a copy of `doc` with every instance id, connection endpoint and
/// tag id prefixed by the document's file name.
///
/// A connection endpoint that does not reference a known instance is still
/// rewritten, with a warning; pruning is the caller's pre-step.
pub fn globalized(doc: &GraphDocument) -> GraphDocument {
    let file_name = doc.document_metadata.name.clone();
    map_ids(doc, |id| {
        if !doc.has_instance(id) {
            warn!(%id, file = %file_name, "globalizing an id with no matching instance");
        }
        global_id(&file_name, id)
    })
}

/// Exact inverse of [`globalized`]: strips the file-name prefix from every
/// id. Ids without the document's own prefix are left untouched (warned).
pub fn unglobalized(doc: &GraphDocument) -> GraphDocument {
    let file_name = doc.document_metadata.name.clone();
    map_ids(doc, |id| match split_global_id(id) {
        Some((file, local)) if file == file_name => local.to_string(),
        _ => {
            warn!(%id, file = %file_name, "id is not globalized for this document");
            id.to_string()
        }
    })
}

fn map_ids(doc: &GraphDocument, f: impl Fn(&str) -> String) -> GraphDocument {
    let mut out = doc.clone();
    for i in &mut out.symbol_instances {
        i.id = f(&i.id);
    }
    for l in &mut out.lines {
        l.id = f(&l.id);
    }
    for t in &mut out.tags {
        t.id = f(&t.id);
    }
    for c in &mut out.connections {
        c.start = f(&c.start);
        c.end = f(&c.end);
    }
    out
}

/// Several globalized documents of one diagram kind, concatenated into a
/// single matching space. No deduplication happens; callers keep the inputs
/// disjoint (e.g. all P&ID pages of one physical line).
#[derive(Debug, Clone, Default)]
pub struct MergedGraph {
    pub symbol_instances: Vec<SymbolInstance>,
    pub lines: Vec<LineInstance>,
    pub connections: Vec<DiagramConnection>,
    pub tags: Vec<TagInstance>,
    pub labels: Vec<DiagramLabel>,
}

impl MergedGraph {
    pub fn label_texts(&self, label_ids: &[String]) -> Vec<String> {
        label_ids
            .iter()
            .filter_map(|id| self.labels.iter().find(|l| &l.id == id))
            .map(|l| l.text.clone())
            .collect()
    }
}

pub fn merge_documents(docs: &[GraphDocument]) -> MergedGraph {
    let mut merged = MergedGraph::default();
    let mut kinds: Vec<DiagramKind> = Vec::new();
    for doc in docs {
        if !kinds.contains(&doc.document_metadata.kind) {
            kinds.push(doc.document_metadata.kind);
        }
        merged
            .symbol_instances
            .extend(doc.symbol_instances.iter().cloned());
        merged.lines.extend(doc.lines.iter().cloned());
        merged.connections.extend(doc.connections.iter().cloned());
        merged.tags.extend(doc.tags.iter().cloned());
        merged.labels.extend(doc.labels.iter().cloned());
    }
    if kinds.len() > 1 {
        warn!("merging documents of mixed diagram kinds into one matching space");
    }
    merged
}

/// A resolved cross-file link between two instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub file_name: String,
    pub instance_id: String,
}

impl FileRef {
    /// Splits a global id; ids without a separator keep an empty file name.
    pub fn from_global_id(id: &str) -> Self {
        match split_global_id(id) {
            Some((file, local)) => Self {
                file_name: file.to_string(),
                instance_id: local.to_string(),
            },
            None => Self {
                file_name: String::new(),
                instance_id: id.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolConnection {
    pub from: FileRef,
    pub to: FileRef,
}
