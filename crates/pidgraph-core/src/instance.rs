//! Typed symbol/line/tag instances and connections.
//!
//! The interchange format tags every instance with a `type` string. In the
//! model that tag is the closed [`InstanceKind`] sum type so each consumer
//! matches exhaustively; unknown strings round-trip through
//! [`InstanceKind::Custom`].

use crate::symbol::SvgRepresentation;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    Line,
    Instrument,
    Equipment,
    EquipmentTag,
    Valve,
    Flange,
    Reducer,
    Cap,
    LineBreak,
    LineConnection,
    Arrow,
    Custom(String),
}

impl InstanceKind {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceKind::Line => "Line",
            InstanceKind::Instrument => "Instrument",
            InstanceKind::Equipment => "Equipment",
            InstanceKind::EquipmentTag => "Equipment Tag",
            InstanceKind::Valve => "Valve",
            InstanceKind::Flange => "Flange",
            InstanceKind::Reducer => "Reducer",
            InstanceKind::Cap => "Cap",
            InstanceKind::LineBreak => "Line Break",
            InstanceKind::LineConnection => "Line Connection",
            InstanceKind::Arrow => "Arrow",
            InstanceKind::Custom(s) => s,
        }
    }

    pub fn parse(s: &str) -> InstanceKind {
        match s {
            "Line" => InstanceKind::Line,
            "Instrument" => InstanceKind::Instrument,
            "Equipment" => InstanceKind::Equipment,
            "Equipment Tag" => InstanceKind::EquipmentTag,
            "Valve" => InstanceKind::Valve,
            "Flange" => InstanceKind::Flange,
            "Reducer" => InstanceKind::Reducer,
            "Cap" => InstanceKind::Cap,
            "Line Break" => InstanceKind::LineBreak,
            "Line Connection" => InstanceKind::LineConnection,
            "Arrow" => InstanceKind::Arrow,
            other => InstanceKind::Custom(other.to_string()),
        }
    }

    /// Kinds the cross-document matcher records shortest paths to.
    pub fn is_match_relevant(&self) -> bool {
        matches!(
            self,
            InstanceKind::Instrument
                | InstanceKind::Equipment
                | InstanceKind::Cap
                | InstanceKind::Valve
                | InstanceKind::Flange
                | InstanceKind::Reducer
        )
    }

    pub fn is_line(&self) -> bool {
        matches!(self, InstanceKind::Line)
    }
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InstanceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(InstanceKind::parse(&s))
    }
}

/// Deterministic instance id: the sorted constituent path ids joined with
/// `-`. Two instances built from the same path-id set always compare equal.
pub fn instance_id(path_ids: &[String]) -> String {
    let mut ids: Vec<&str> = path_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.join("-")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InstanceKind,
    pub path_ids: Vec<String>,
    pub symbol_id: String,
    pub scale: f64,
    pub rotation: f64,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub line_numbers: Vec<String>,
    #[serde(default)]
    pub inferred_line_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_representation: Option<SvgRepresentation>,
}

impl SymbolInstance {
    pub fn new(kind: InstanceKind, path_ids: Vec<String>, symbol_id: String) -> Self {
        Self {
            id: instance_id(&path_ids),
            kind,
            path_ids,
            symbol_id,
            scale: 1.0,
            rotation: 0.0,
            label_ids: Vec::new(),
            line_numbers: Vec::new(),
            inferred_line_numbers: Vec::new(),
            svg_representation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InstanceKind,
    pub path_ids: Vec<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub line_numbers: Vec<String>,
    #[serde(default)]
    pub inferred_line_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_representation: Option<SvgRepresentation>,
}

impl LineInstance {
    pub fn new(path_ids: Vec<String>) -> Self {
        Self {
            id: instance_id(&path_ids),
            kind: InstanceKind::Line,
            path_ids,
            label_ids: Vec::new(),
            line_numbers: Vec::new(),
            inferred_line_numbers: Vec::new(),
            svg_representation: None,
        }
    }
}

/// Labelled tag occurrence (equipment tags and similar annotations carried in
/// the document's `tags` array).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InstanceKind,
    #[serde(default)]
    pub path_ids: Vec<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub line_numbers: Vec<String>,
    #[serde(default)]
    pub inferred_line_numbers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    Directed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramConnection {
    pub start: String,
    pub end: String,
    pub direction: ConnectionDirection,
}

impl DiagramConnection {
    pub fn unknown(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            direction: ConnectionDirection::Unknown,
        }
    }

    /// True when the two connections join the same unordered instance pair.
    pub fn is_same_pair(&self, other: &DiagramConnection) -> bool {
        (self.start == other.start && self.end == other.end)
            || (self.start == other.end && self.end == other.start)
    }

    pub fn touches(&self, id: &str) -> bool {
        self.start == id || self.end == id
    }

    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.start == id {
            Some(&self.end)
        } else if self.end == id {
            Some(&self.start)
        } else {
            None
        }
    }
}

/// Duplicate check over the unordered `(start, end)` pair. Callers must use
/// this before pushing a new connection; the stored list never carries the
/// same pair twice, in either orientation.
pub fn connection_exists(connections: &[DiagramConnection], candidate: &DiagramConnection) -> bool {
    connections.iter().any(|c| c.is_same_pair(candidate))
}
