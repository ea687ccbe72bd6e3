#![forbid(unsafe_code)]

//! Geometry kernel, path parsing and the diagram graph model.
//!
//! Design goals:
//! - pure, deterministic value operations (no I/O inside the algorithms)
//! - one JSON `GraphDocument` per diagram file as the interchange shape
//! - degraded-but-non-fatal handling of malformed drawing input

pub mod document;
pub mod error;
pub mod geom;
pub mod instance;
pub mod merge;
pub mod path;
pub mod symbol;

pub use document::{
    DiagramKind, DiagramLabel, DiagramPath, DocumentMetadata, GraphDocument, PathRegistry,
    PathStyle,
};
pub use error::{Error, Result};
pub use geom::{BoundingBox, Point, Vector};
pub use instance::{
    ConnectionDirection, DiagramConnection, InstanceKind, LineInstance, SymbolInstance,
    TagInstance, connection_exists, instance_id,
};
pub use merge::{
    FileRef, GLOBAL_ID_SEPARATOR, MergedGraph, SymbolConnection, global_id, globalized,
    merge_documents, split_global_id, unglobalized,
};
pub use path::{PathSegment, SubPath, parse_path_data, parse_sub_paths, to_path_data};
pub use symbol::{DiagramSymbol, SvgPath, SvgRepresentation};
