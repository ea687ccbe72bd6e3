//! Shape-invariant matching of path fragments against symbol templates.
//!
//! A candidate matches a template when its segments match the template's
//! segments one-for-one up to translation, uniform scale and a fixed set of
//! rotations. Symbols drawn as several disjoint SVG paths are handled by a
//! depth-bounded combination search over nearby fragments.

use pidgraph_core::geom::{self, Point};
use pidgraph_core::path::{PathSegment, SubPath, segment_list_bounding_box};
use pidgraph_core::symbol::DiagramSymbol;
use rustc_hash::FxHashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    NotMatch,
    SubMatch,
    Match,
}

#[derive(Debug, Clone)]
pub struct MatcherOptions {
    /// Absolute tolerance for per-segment delta comparison.
    pub segment_epsilon: f64,
    /// Relative tolerance for the spread-fingerprint comparison.
    pub spread_epsilon: f64,
    /// Candidate rotations in degrees; geometric duplicates are dropped.
    pub rotations: Vec<f64>,
    /// Fragments farther than this factor times the template's max internal
    /// spread are never pulled into a combination.
    pub neighbor_spread_factor: f64,
    /// Depth bound for the combination search stack.
    pub max_combination_depth: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            segment_epsilon: 2.0,
            spread_epsilon: 0.2,
            rotations: vec![0.0, 90.0, 180.0, 270.0],
            neighbor_spread_factor: 1.2,
            max_combination_depth: 6,
        }
    }
}

/// One unclassified SVG path offered to the matcher.
#[derive(Debug, Clone)]
pub struct PathFragment {
    pub path_id: String,
    pub sub_paths: Vec<SubPath>,
}

impl PathFragment {
    pub fn new(path_id: impl Into<String>, sub_paths: Vec<SubPath>) -> Self {
        Self {
            path_id: path_id.into(),
            sub_paths,
        }
    }

    pub fn segments(&self) -> Vec<PathSegment> {
        self.sub_paths
            .iter()
            .flat_map(|sp| sp.segments.iter().copied())
            .collect()
    }

    fn mid_point(&self) -> Option<Point> {
        let segments = self.segments();
        segment_list_bounding_box(&segments).map(|b| b.center())
    }
}

/// A successful (full) match of a fragment group against one template.
#[derive(Debug, Clone)]
pub struct InstanceMatch {
    pub path_ids: Vec<String>,
    pub scale: f64,
    pub rotation: f64,
}

/// Sorted pairwise midpoint distances; the cheap shape fingerprint used for
/// fast rejection.
pub fn spread_fingerprint(segments: &[PathSegment]) -> Vec<f64> {
    let mids: Vec<Point> = segments.iter().map(PathSegment::mid_point).collect();
    let mut distances = Vec::with_capacity(mids.len().saturating_sub(1) * mids.len() / 2);
    for i in 0..mids.len() {
        for j in (i + 1)..mids.len() {
            distances.push(geom::distance(mids[i], mids[j]));
        }
    }
    distances.sort_by(f64::total_cmp);
    distances
}

/// Spread comparison behind the fast-reject step.
///
/// Equal-length fingerprints must agree pairwise within the relative
/// epsilon. Unequal lengths only reject when the candidate's maximum spread
/// exceeds `(1 + epsilon)` times the template's maximum, which lets genuine
/// sub-matches proceed.
pub fn is_too_spread_out(template: &[f64], candidate: &[f64], epsilon: f64) -> bool {
    if template.len() == candidate.len() {
        return template.iter().zip(candidate).any(|(&t, &c)| {
            let scale = t.abs().max(c.abs());
            (t - c).abs() > epsilon * scale
        });
    }
    match (template.last(), candidate.last()) {
        (Some(&t_max), Some(&c_max)) => c_max > (1.0 + epsilon) * t_max,
        _ => false,
    }
}

pub struct InstanceMatcher {
    symbol_id: String,
    template: Vec<SubPath>,
    options: MatcherOptions,
}

impl InstanceMatcher {
    pub fn new(symbol_id: impl Into<String>, template: Vec<SubPath>, options: MatcherOptions) -> Self {
        Self {
            symbol_id: symbol_id.into(),
            template,
            options,
        }
    }

    pub fn from_symbol(symbol: &DiagramSymbol, options: MatcherOptions) -> Self {
        Self::new(symbol.id.clone(), symbol.sub_paths(), options)
    }

    pub fn symbol_id(&self) -> &str {
        &self.symbol_id
    }

    fn template_segments(&self) -> Vec<PathSegment> {
        self.template
            .iter()
            .flat_map(|sp| sp.segments.iter().copied())
            .collect()
    }

    /// Rotated copies of the template, with geometric duplicates removed
    /// (a fully symmetric symbol collapses to a single rotation).
    fn rotated_templates(&self) -> Vec<(f64, Vec<PathSegment>)> {
        let base = self.template_segments();
        let pivot = segment_list_bounding_box(&base)
            .map(|b| b.center())
            .unwrap_or_else(|| geom::point(0.0, 0.0));
        let mut out: Vec<(f64, Vec<PathSegment>)> = Vec::new();
        for &degrees in &self.options.rotations {
            let rotated: Vec<PathSegment> =
                base.iter().map(|s| s.rotated(pivot, degrees)).collect();
            let duplicate = out
                .iter()
                .any(|(_, existing)| segment_sets_congruent(existing, &rotated, 1e-6));
            if !duplicate {
                out.push((degrees, rotated));
            }
        }
        out
    }

    /// Matches an already-assembled candidate segment list, trying every
    /// deduplicated rotation. Returns the best outcome and the inferred
    /// scale (candidate units per template unit).
    pub fn match_segments(&self, candidate: &[PathSegment]) -> (MatchResult, f64) {
        let mut best = (MatchResult::NotMatch, 1.0);
        for (_, template) in self.rotated_templates() {
            let t_spread = spread_fingerprint(&template);
            let (result, scale) = self.match_ordered(&template, &t_spread, candidate);
            match result {
                MatchResult::Match => return (MatchResult::Match, scale),
                MatchResult::SubMatch if best.0 == MatchResult::NotMatch => {
                    best = (MatchResult::SubMatch, scale);
                }
                _ => {}
            }
        }
        best
    }

    /// Finds all full instances of the template among `fragments`.
    ///
    /// Seeds are tried in input order; fragments consumed by a committed
    /// instance never participate again, so the output is deterministic for
    /// a fixed input ordering.
    pub fn find_instances(&self, fragments: &[PathFragment]) -> Vec<InstanceMatch> {
        let mut consumed: FxHashSet<usize> = FxHashSet::default();
        let mut instances = Vec::new();

        for seed in 0..fragments.len() {
            if consumed.contains(&seed) {
                continue;
            }
            if let Some((members, scale, rotation)) =
                self.search_from_seed(seed, fragments, &consumed)
            {
                debug!(
                    symbol = %self.symbol_id,
                    paths = members.len(),
                    scale,
                    rotation,
                    "matched symbol instance"
                );
                for &m in &members {
                    consumed.insert(m);
                }
                let mut path_ids: Vec<String> = members
                    .iter()
                    .map(|&m| fragments[m].path_id.clone())
                    .collect();
                path_ids.sort_unstable();
                instances.push(InstanceMatch {
                    path_ids,
                    scale,
                    rotation,
                });
            }
        }
        instances
    }

    /// Combination search from one seed fragment: an explicit stack of
    /// fragment groups, growing by spread-pruned neighbors, depth-bounded.
    ///
    /// Each rotated template is tried at every uniform scale the seed's
    /// segment lengths imply against the template's. A lone fragment of a
    /// scaled symbol under-estimates the symbol's extent, so the scale must
    /// come from a hypothesis here; the final equal-count comparison then
    /// refines it from the spread ratio.
    fn search_from_seed(
        &self,
        seed: usize,
        fragments: &[PathFragment],
        consumed: &FxHashSet<usize>,
    ) -> Option<(Vec<usize>, f64, f64)> {
        let seed_segments = fragments[seed].segments();
        for (rotation, template) in self.rotated_templates() {
            for hypothesis in scale_hypotheses(&template, &seed_segments) {
                let scaled: Vec<PathSegment> = template
                    .iter()
                    .map(|s| s.translated_and_scaled(geom::vector(0.0, 0.0), hypothesis))
                    .collect();
                let t_spread = spread_fingerprint(&scaled);
                let max_spread = t_spread.last().copied().unwrap_or(0.0);
                let reach = self.options.neighbor_spread_factor * max_spread;

                struct State {
                    members: Vec<usize>,
                    depth: usize,
                }
                let mut stack = vec![State {
                    members: vec![seed],
                    depth: 0,
                }];

                while let Some(state) = stack.pop() {
                    let candidate = concat_segments(fragments, &state.members);
                    let (result, scale) = self.match_ordered(&scaled, &t_spread, &candidate);
                    match result {
                        MatchResult::Match => {
                            return Some((state.members, hypothesis * scale, rotation));
                        }
                        MatchResult::SubMatch
                            if state.depth < self.options.max_combination_depth =>
                        {
                            for next in
                                self.neighbor_candidates(fragments, &state.members, consumed, reach)
                            {
                                let mut members = state.members.clone();
                                members.push(next);
                                // A group that stops matching once `next` joins is
                                // simply not pushed again with it; that is the one
                                // permitted level of backtracking.
                                stack.push(State {
                                    members,
                                    depth: state.depth + 1,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        None
    }

    /// Tries every valid enumeration order of the candidate against one
    /// template; a closed-loop template has no distinguished first segment,
    /// so any cyclic offset may be the one the greedy assignment needs.
    fn match_ordered(
        &self,
        template: &[PathSegment],
        template_spread: &[f64],
        candidate: &[PathSegment],
    ) -> (MatchResult, f64) {
        let mut best = (MatchResult::NotMatch, 1.0);
        for order in candidate_orders(candidate, &self.template) {
            let (result, scale) =
                match_with_fingerprint(template, template_spread, &order, &self.options);
            match result {
                MatchResult::Match => return (MatchResult::Match, scale),
                MatchResult::SubMatch if best.0 == MatchResult::NotMatch => {
                    best = (MatchResult::SubMatch, scale);
                }
                _ => {}
            }
        }
        best
    }

    fn neighbor_candidates(
        &self,
        fragments: &[PathFragment],
        members: &[usize],
        consumed: &FxHashSet<usize>,
        reach: f64,
    ) -> Vec<usize> {
        let member_mids: Vec<Point> = members
            .iter()
            .filter_map(|&m| fragments[m].mid_point())
            .collect();
        let mut out = Vec::new();
        for (i, fragment) in fragments.iter().enumerate() {
            if members.contains(&i) || consumed.contains(&i) {
                continue;
            }
            let Some(mid) = fragment.mid_point() else {
                continue;
            };
            let close = member_mids
                .iter()
                .any(|&m| geom::distance(m, mid) <= reach);
            if close {
                out.push(i);
            }
        }
        out
    }
}

fn concat_segments(fragments: &[PathFragment], members: &[usize]) -> Vec<PathSegment> {
    members
        .iter()
        .flat_map(|&m| fragments[m].segments())
        .collect()
}

/// Candidate enumeration orders. Closed subpaths have no distinguished first
/// segment, so each closed loop contributes its cyclic rotations as
/// alternative orders for the greedy assignment's tie-breaking; open
/// polylines keep their single natural order.
fn candidate_orders(candidate: &[PathSegment], template: &[SubPath]) -> Vec<Vec<PathSegment>> {
    let template_has_closed = template.iter().any(|sp| sp.closed);
    if !template_has_closed || candidate.len() <= 1 {
        return vec![candidate.to_vec()];
    }
    let mut orders = Vec::with_capacity(candidate.len());
    for offset in 0..candidate.len() {
        let mut order = Vec::with_capacity(candidate.len());
        order.extend_from_slice(&candidate[offset..]);
        order.extend_from_slice(&candidate[..offset]);
        orders.push(order);
    }
    orders
}

/// Uniform scales a seed fragment could imply: every ratio of a seed
/// segment's length to a template segment's length, unit scale first,
/// near-duplicates collapsed.
fn scale_hypotheses(template: &[PathSegment], seed: &[PathSegment]) -> Vec<f64> {
    let mut out = vec![1.0];
    for c in seed {
        let c_len = c.length();
        if c_len <= 0.0 {
            continue;
        }
        for t in template {
            let t_len = t.length();
            if t_len <= 0.0 {
                continue;
            }
            let ratio = c_len / t_len;
            if out
                .iter()
                .all(|&s| (s - ratio).abs() > 1e-6 * ratio.max(1.0))
            {
                out.push(ratio);
            }
        }
    }
    out
}

/// Steps 1-3 of the matching pipeline: fast reject on the spread
/// fingerprint, greedy first-hit segment assignment, classification by
/// consumed template segments.
fn match_with_fingerprint(
    template: &[PathSegment],
    template_spread: &[f64],
    candidate: &[PathSegment],
    options: &MatcherOptions,
) -> (MatchResult, f64) {
    if candidate.is_empty() || template.is_empty() {
        return (MatchResult::NotMatch, 1.0);
    }
    if candidate.len() > template.len() {
        return (MatchResult::NotMatch, 1.0);
    }

    let c_spread = spread_fingerprint(candidate);

    // Scale is only trustworthy when the candidate plausibly covers the whole
    // template; fragment attempts compare at unit scale here and rely on the
    // seed's scale hypotheses in the combination search.
    let scale = inferred_scale(template, template_spread, candidate, &c_spread);
    let scaled_template: Vec<PathSegment>;
    let (effective_template, effective_spread) = if scale != 1.0 {
        scaled_template = template
            .iter()
            .map(|s| s.translated_and_scaled(geom::vector(0.0, 0.0), scale))
            .collect();
        (
            &scaled_template[..],
            template_spread.iter().map(|d| d * scale).collect::<Vec<f64>>(),
        )
    } else {
        (template, template_spread.to_vec())
    };

    if is_too_spread_out(&effective_spread, &c_spread, options.spread_epsilon) {
        return (MatchResult::NotMatch, scale);
    }

    let mut used = vec![false; effective_template.len()];
    for segment in candidate {
        let mut assigned = false;
        for (i, t) in effective_template.iter().enumerate() {
            if used[i] {
                continue;
            }
            if segment.is_similar(t, options.segment_epsilon) {
                used[i] = true;
                assigned = true;
                break;
            }
        }
        if !assigned {
            return (MatchResult::NotMatch, scale);
        }
    }

    let consumed = used.iter().filter(|u| **u).count();
    let result = if consumed == effective_template.len() {
        MatchResult::Match
    } else if consumed > 0 {
        MatchResult::SubMatch
    } else {
        MatchResult::NotMatch
    };
    (result, scale)
}

fn inferred_scale(
    template: &[PathSegment],
    template_spread: &[f64],
    candidate: &[PathSegment],
    candidate_spread: &[f64],
) -> f64 {
    if candidate.len() != template.len() {
        return 1.0;
    }
    match (template_spread.last(), candidate_spread.last()) {
        (Some(&t_max), Some(&c_max)) if t_max > 0.0 && c_max > 0.0 => c_max / t_max,
        _ => {
            // Single-segment shapes have no spread; fall back to length.
            let t_len: f64 = template.iter().map(PathSegment::length).sum();
            let c_len: f64 = candidate.iter().map(PathSegment::length).sum();
            if t_len > 0.0 && c_len > 0.0 {
                c_len / t_len
            } else {
                1.0
            }
        }
    }
}

/// Order-insensitive congruence of two segment sets, used for rotation
/// deduplication. Midpoints are compared relative to the shared centroid so
/// translation does not defeat the check.
fn segment_sets_congruent(a: &[PathSegment], b: &[PathSegment], epsilon: f64) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let centroid = |segments: &[PathSegment]| {
        let mids: Vec<Point> = segments.iter().map(PathSegment::mid_point).collect();
        geom::average(&mids)
    };
    let ca = centroid(a);
    let cb = centroid(b);
    let mut used = vec![false; b.len()];
    for sa in a {
        let ma = sa.mid_point();
        let rel_a = (ma.x - ca.x, ma.y - ca.y);
        let mut found = false;
        for (i, sb) in b.iter().enumerate() {
            if used[i] {
                continue;
            }
            let mb = sb.mid_point();
            let rel_b = (mb.x - cb.x, mb.y - cb.y);
            if (rel_a.0 - rel_b.0).abs() <= epsilon
                && (rel_a.1 - rel_b.1).abs() <= epsilon
                && sa.is_similar(sb, epsilon)
            {
                used[i] = true;
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidgraph_core::path::parse_sub_paths;

    #[test]
    fn symmetric_template_collapses_to_one_rotation() {
        let m = InstanceMatcher::new(
            "square",
            parse_sub_paths("M 0 0 L 10 0 L 10 10 L 0 10 Z"),
            MatcherOptions::default(),
        );
        assert_eq!(m.rotated_templates().len(), 1);
    }

    #[test]
    fn asymmetric_template_keeps_all_rotations() {
        let m = InstanceMatcher::new(
            "ell",
            parse_sub_paths("M 0 0 L 10 0 L 10 10"),
            MatcherOptions::default(),
        );
        assert_eq!(m.rotated_templates().len(), 4);
    }
}
