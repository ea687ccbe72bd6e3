#![forbid(unsafe_code)]

//! P&ID / isometric diagram graph extraction and cross-document matching.
//!
//! The heavy lifting lives in [`pidgraph_core`] (geometry, path parsing,
//! graph model) and [`pidgraph_match`] (instance matching, connection
//! detection, cross-document matching); this crate re-exports both and adds
//! the one-call pipeline over whole document sets.

pub use pidgraph_core as core;
pub use pidgraph_match as matching;

pub use pidgraph_core::{
    BoundingBox, DiagramConnection, DiagramKind, DiagramLabel, DiagramPath, DiagramSymbol,
    Error, GraphDocument, InstanceKind, LineInstance, PathRegistry, PathSegment, Point, Result,
    SymbolConnection, SymbolInstance, TagInstance,
};
pub use pidgraph_match::{
    CrossDocumentMatch, DetectorOptions, InstanceMatcher, MatchOptions, MatchResult,
    MatcherOptions, detect_lines_and_connections, match_graphs,
};

use pidgraph_core::merge;

/// Matches a set of P&ID documents against the ISO documents of the same
/// physical line.
///
/// Inputs are taken by reference and never mutated: each document is pruned
/// of dangling connections, gets its line numbers re-inferred, and is
/// globalized into the shared matching space on a private copy. The returned
/// mapping therefore uses global (`file::local`) ids; split them with
/// [`pidgraph_core::split_global_id`] or via
/// [`CrossDocumentMatch::symbol_connections`].
pub fn match_documents(
    pid_documents: &[GraphDocument],
    iso_documents: &[GraphDocument],
    options: &MatchOptions,
) -> CrossDocumentMatch {
    let prepare = |documents: &[GraphDocument]| -> Vec<GraphDocument> {
        documents
            .iter()
            .map(|doc| {
                let mut doc = doc.clone();
                doc.prune_dangling_connections();
                doc.infer_line_numbers();
                merge::globalized(&doc)
            })
            .collect()
    };
    let pid = merge::merge_documents(&prepare(pid_documents));
    let iso = merge::merge_documents(&prepare(iso_documents));
    pidgraph_match::match_graphs(&pid, &iso, options)
}
