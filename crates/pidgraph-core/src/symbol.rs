//! Reusable symbol templates.

use crate::geom::{self, BoundingBox};
use crate::instance::InstanceKind;
use crate::path::{self, PathSegment, SubPath};
use serde::{Deserialize, Serialize};

/// One path fragment of a symbol's drawn form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub svg_commands: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgRepresentation {
    pub svg_paths: Vec<SvgPath>,
    pub bounding_box: BoundingBox,
}

impl SvgRepresentation {
    pub fn from_commands<I: IntoIterator<Item = String>>(commands: I) -> Self {
        let svg_paths: Vec<SvgPath> = commands
            .into_iter()
            .map(|svg_commands| SvgPath {
                id: None,
                svg_commands,
            })
            .collect();
        let segments: Vec<PathSegment> = svg_paths
            .iter()
            .flat_map(|p| path::parse_path_data(&p.svg_commands))
            .collect();
        let bounding_box = path::segment_list_bounding_box(&segments).unwrap_or_default();
        Self {
            svg_paths,
            bounding_box,
        }
    }
}

/// A reusable symbol template: the drawn form plus the typed meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSymbol {
    pub id: String,
    #[serde(rename = "symbolType")]
    pub symbol_kind: InstanceKind,
    pub description: String,
    pub svg_representation: SvgRepresentation,
}

impl DiagramSymbol {
    /// All segments of the template in fragment order.
    pub fn segments(&self) -> Vec<PathSegment> {
        self.svg_representation
            .svg_paths
            .iter()
            .flat_map(|p| path::parse_path_data(&p.svg_commands))
            .collect()
    }

    /// Segments grouped by subpath, keeping closedness for the matcher's
    /// cyclic-offset handling.
    pub fn sub_paths(&self) -> Vec<SubPath> {
        self.svg_representation
            .svg_paths
            .iter()
            .flat_map(|p| path::parse_sub_paths(&p.svg_commands))
            .collect()
    }

    /// Template segments mapped into a `[0, size]` reference box (min corner
    /// at the origin, larger bounding-box side scaled to `size`).
    pub fn normalized_segments(&self, size: f64) -> Vec<PathSegment> {
        let segments = self.segments();
        let Some(bbox) = path::segment_list_bounding_box(&segments) else {
            return segments;
        };
        let extent = bbox.width.max(bbox.height);
        if extent <= 0.0 {
            return segments;
        }
        let translation = geom::vector(-bbox.x, -bbox.y);
        let scale = size / extent;
        segments
            .iter()
            .map(|s| s.translated_and_scaled(translation, scale))
            .collect()
    }
}
