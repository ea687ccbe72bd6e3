#![forbid(unsafe_code)]

//! Matching engines for pidgraph: symbol instance matching against
//! templates, line/connection detection over raw segments, and the
//! cross-document P&ID-to-ISO matcher.
//!
//! Everything here is synchronous, CPU-bound and deterministic: results
//! depend only on the inputs and their ordering.

pub mod crossdoc;
pub mod detect;
pub mod matcher;
pub mod spatial;

pub use crossdoc::{
    AnchorPair, CrossDocumentMatch, DistanceEntry, MatchOptions, MatchedSymbol, match_graphs,
};
pub use detect::{DetectionResult, DetectorOptions, detect_lines_and_connections};
pub use matcher::{
    InstanceMatch, InstanceMatcher, MatchResult, MatcherOptions, PathFragment,
    is_too_spread_out, spread_fingerprint,
};
pub use spatial::PointIndex;
