//! Path segments and the SVG-style path command parser.
//!
//! The accepted command subset is absolute/relative `M, L, H, V, Z, C`, which
//! covers the path data emitted by the DWG conversion pipeline. Anything else
//! is logged and skipped so one bad path never aborts a whole document.

use crate::geom::{self, BoundingBox, Point, Vector, point};
use tracing::warn;

/// A single drawable segment of a path.
///
/// Curves deliberately use the straight start/stop chord for `mid_point`,
/// `length` and `bounding_box`. The control points only participate in the
/// similarity and equality predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    Line {
        start: Point,
        stop: Point,
    },
    Curve {
        start: Point,
        stop: Point,
        control1: Point,
        control2: Point,
    },
}

impl PathSegment {
    pub fn line(start: Point, stop: Point) -> Self {
        PathSegment::Line { start, stop }
    }

    pub fn start(&self) -> Point {
        match self {
            PathSegment::Line { start, .. } | PathSegment::Curve { start, .. } => *start,
        }
    }

    pub fn stop(&self) -> Point {
        match self {
            PathSegment::Line { stop, .. } | PathSegment::Curve { stop, .. } => *stop,
        }
    }

    pub fn mid_point(&self) -> Point {
        geom::mid_point(self.start(), self.stop())
    }

    pub fn length(&self) -> f64 {
        geom::distance(self.start(), self.stop())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points([self.start(), self.stop()])
            .unwrap_or_default()
    }

    pub fn is_curve(&self) -> bool {
        matches!(self, PathSegment::Curve { .. })
    }

    /// Shape similarity ignoring position: the start->stop deltas (and, for
    /// curves, the control point offsets) must agree within the absolute
    /// `epsilon`, in either traversal direction.
    pub fn is_similar(&self, other: &PathSegment, epsilon: f64) -> bool {
        let close = |a: Vector, b: Vector| (a.x - b.x).abs() <= epsilon && (a.y - b.y).abs() <= epsilon;
        match (self, other) {
            (PathSegment::Line { start, stop }, PathSegment::Line { start: os, stop: ot }) => {
                let d = *stop - *start;
                let od = *ot - *os;
                close(d, od) || close(d, -od)
            }
            (
                PathSegment::Curve {
                    start,
                    stop,
                    control1,
                    control2,
                },
                PathSegment::Curve {
                    start: os,
                    stop: ot,
                    control1: oc1,
                    control2: oc2,
                },
            ) => {
                let forward = close(*stop - *start, *ot - *os)
                    && close(*control1 - *start, *oc1 - *os)
                    && close(*control2 - *start, *oc2 - *os);
                let reversed = close(*stop - *start, *os - *ot)
                    && close(*control1 - *start, *oc2 - *ot)
                    && close(*control2 - *start, *oc1 - *ot);
                forward || reversed
            }
            _ => false,
        }
    }

    /// Strict coordinate-for-coordinate equality, used by round-trip tests.
    pub fn is_equal(&self, other: &PathSegment) -> bool {
        self == other
    }

    pub fn translated(&self, v: Vector) -> PathSegment {
        self.map_points(|p| p + v)
    }

    /// Translates every point by `translation`, then scales about the origin.
    pub fn translated_and_scaled(&self, translation: Vector, scale: f64) -> PathSegment {
        self.map_points(|p| geom::translate_and_scale(p, translation, scale))
    }

    pub fn rotated(&self, pivot: Point, degrees: f64) -> PathSegment {
        self.map_points(|p| geom::rotate_about(p, pivot, degrees))
    }

    fn map_points(&self, f: impl Fn(Point) -> Point) -> PathSegment {
        match *self {
            PathSegment::Line { start, stop } => PathSegment::Line {
                start: f(start),
                stop: f(stop),
            },
            PathSegment::Curve {
                start,
                stop,
                control1,
                control2,
            } => PathSegment::Curve {
                start: f(start),
                stop: f(stop),
                control1: f(control1),
                control2: f(control2),
            },
        }
    }
}

/// One `M ... [Z]` run of a path. `closed` records whether the subpath ended
/// in `Z`, which matters to the matcher: a closed loop has no distinguished
/// first segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SubPath {
    pub segments: Vec<PathSegment>,
    pub closed: bool,
}

/// Bounding box of a whole segment list; `None` for an empty list.
pub fn segment_list_bounding_box(segments: &[PathSegment]) -> Option<BoundingBox> {
    let mut boxes = segments.iter().map(PathSegment::bounding_box);
    let first = boxes.next()?;
    Some(boxes.fold(first, |acc, b| acc.union(&b)))
}

/// Parses path data into a flat segment list.
pub fn parse_path_data(data: &str) -> Vec<PathSegment> {
    parse_sub_paths(data)
        .into_iter()
        .flat_map(|sp| sp.segments)
        .collect()
}

/// Parses path data keeping subpath boundaries and closedness.
///
/// `Z` emits an explicit closing line back to the subpath start. A new `M`
/// restarts the current point without emitting a segment. Consecutive
/// coordinate pairs after `M`/`m` are implicit line-tos, per the SVG spec.
pub fn parse_sub_paths(data: &str) -> Vec<SubPath> {
    let mut scanner = Scanner::new(data);
    let mut sub_paths: Vec<SubPath> = Vec::new();
    let mut current: Vec<PathSegment> = Vec::new();

    let mut cursor = point(0.0, 0.0);
    let mut sub_path_start = cursor;

    let mut flush = |segments: &mut Vec<PathSegment>, closed: bool| {
        if !segments.is_empty() {
            sub_paths.push(SubPath {
                segments: std::mem::take(segments),
                closed,
            });
        }
    };

    while let Some(command) = scanner.next_command() {
        let relative = command.is_ascii_lowercase();
        match command.to_ascii_uppercase() {
            'M' => {
                let Some((x, y)) = scanner.pair() else {
                    warn!(command = %command, "path command is missing coordinates; skipping");
                    continue;
                };
                flush(&mut current, false);
                cursor = resolve(point(x, y), cursor, relative);
                sub_path_start = cursor;
                // Implicit line-tos for any further coordinate pairs.
                while let Some((x, y)) = scanner.pair_if_number() {
                    let stop = resolve(point(x, y), cursor, relative);
                    current.push(PathSegment::line(cursor, stop));
                    cursor = stop;
                }
            }
            'L' => {
                let mut seen = false;
                while let Some((x, y)) = scanner.pair_if_number() {
                    seen = true;
                    let stop = resolve(point(x, y), cursor, relative);
                    current.push(PathSegment::line(cursor, stop));
                    cursor = stop;
                }
                if !seen {
                    warn!(command = %command, "path command is missing coordinates; skipping");
                }
            }
            'H' => {
                let mut seen = false;
                while let Some(x) = scanner.number_if_number() {
                    seen = true;
                    let stop = if relative {
                        point(cursor.x + x, cursor.y)
                    } else {
                        point(x, cursor.y)
                    };
                    current.push(PathSegment::line(cursor, stop));
                    cursor = stop;
                }
                if !seen {
                    warn!(command = %command, "path command is missing coordinates; skipping");
                }
            }
            'V' => {
                let mut seen = false;
                while let Some(y) = scanner.number_if_number() {
                    seen = true;
                    let stop = if relative {
                        point(cursor.x, cursor.y + y)
                    } else {
                        point(cursor.x, y)
                    };
                    current.push(PathSegment::line(cursor, stop));
                    cursor = stop;
                }
                if !seen {
                    warn!(command = %command, "path command is missing coordinates; skipping");
                }
            }
            'C' => {
                while scanner.peek_number() {
                    let Some(coords) = scanner.numbers::<6>() else {
                        warn!(command = %command, "curve command has a truncated coordinate list; skipping");
                        break;
                    };
                    let control1 = resolve(point(coords[0], coords[1]), cursor, relative);
                    let control2 = resolve(point(coords[2], coords[3]), cursor, relative);
                    let stop = resolve(point(coords[4], coords[5]), cursor, relative);
                    current.push(PathSegment::Curve {
                        start: cursor,
                        stop,
                        control1,
                        control2,
                    });
                    cursor = stop;
                }
            }
            'Z' => {
                if cursor != sub_path_start {
                    current.push(PathSegment::line(cursor, sub_path_start));
                }
                cursor = sub_path_start;
                flush(&mut current, true);
            }
            other => {
                warn!(command = %other, "unsupported path command; skipping");
                scanner.skip_numbers();
            }
        }
    }
    flush(&mut current, false);
    sub_paths
}

/// Serializes segments back into path data.
///
/// The output is not byte-identical to the input that produced the segments,
/// but re-parsing it yields segment-for-segment equal geometry.
pub fn to_path_data(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    let mut cursor: Option<Point> = None;
    for segment in segments {
        if cursor != Some(segment.start()) {
            let s = segment.start();
            push_command(&mut out, 'M', &[s.x, s.y]);
        }
        match segment {
            PathSegment::Line { stop, .. } => push_command(&mut out, 'L', &[stop.x, stop.y]),
            PathSegment::Curve {
                stop,
                control1,
                control2,
                ..
            } => push_command(
                &mut out,
                'C',
                &[control1.x, control1.y, control2.x, control2.y, stop.x, stop.y],
            ),
        }
        cursor = Some(segment.stop());
    }
    out
}

fn push_command(out: &mut String, command: char, coords: &[f64]) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push(command);
    for c in coords {
        out.push(' ');
        out.push_str(&format_coordinate(*c));
    }
}

fn format_coordinate(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn resolve(p: Point, cursor: Point, relative: bool) -> Point {
    if relative { cursor + (p - point(0.0, 0.0)) } else { p }
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            bytes: data.as_bytes(),
            pos: 0,
        }
    }

    fn skip_separators(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r' | b',')
        {
            self.pos += 1;
        }
    }

    fn next_command(&mut self) -> Option<char> {
        loop {
            self.skip_separators();
            let b = *self.bytes.get(self.pos)?;
            self.pos += 1;
            if b.is_ascii_alphabetic() {
                return Some(b as char);
            }
            // Stray byte between commands; drop it and keep scanning.
        }
    }

    fn peek_number(&mut self) -> bool {
        self.skip_separators();
        matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.'))
    }

    fn number_if_number(&mut self) -> Option<f64> {
        if !self.peek_number() {
            return None;
        }
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            let ok = match b {
                b'0'..=b'9' => true,
                b'-' | b'+' => {
                    self.pos == start || matches!(self.bytes[self.pos - 1], b'e' | b'E')
                }
                b'.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    true
                }
                b'e' | b'E' if !seen_exp && self.pos > start => {
                    seen_exp = true;
                    true
                }
                _ => false,
            };
            if !ok {
                break;
            }
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        match text.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(token = %text, "unparseable coordinate; skipping");
                None
            }
        }
    }

    fn pair_if_number(&mut self) -> Option<(f64, f64)> {
        if !self.peek_number() {
            return None;
        }
        self.pair()
    }

    fn pair(&mut self) -> Option<(f64, f64)> {
        let x = self.number_if_number()?;
        let y = self.number_if_number()?;
        Some((x, y))
    }

    fn numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let mut out = [0.0; N];
        for slot in &mut out {
            *slot = self.number_if_number()?;
        }
        Some(out)
    }

    fn skip_numbers(&mut self) {
        while self.number_if_number().is_some() {}
    }
}
