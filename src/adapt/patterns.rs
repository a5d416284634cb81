//! Sequence/context similarity and frequent-subsequence mining.

use std::collections::BTreeMap;

use crate::graph::{MetaValue, NodeType};

use super::LearningPattern;

/// Shortest window the miner considers.
pub const MIN_WINDOW: usize = 3;
/// Longest window the miner considers.
pub const MAX_WINDOW: usize = 5;
/// Effectiveness assigned to a pattern with no similar precedent.
pub const COLD_START_EFFECTIVENESS: f64 = 0.6;

/// Similarity threshold above which an existing pattern contributes to a new
/// pattern's initial effectiveness.
const PRECEDENT_THRESHOLD: f64 = 0.3;

/// Normalized longest-common-subsequence similarity of two type sequences:
/// `LCS(a, b) / max(len(a), len(b))`.
///
/// A sequence is fully similar to itself; two disjoint sequences of equal
/// length score 0.0. Two empty sequences are trivially identical.
pub fn sequence_similarity(a: &[NodeType], b: &[NodeType]) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    lcs_length(a, b) as f64 / max_len as f64
}

fn lcs_length(a: &[NodeType], b: &[NodeType]) -> usize {
    // One-row DP over the shorter side.
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; short.len() + 1];
    for &x in long {
        let mut diag = 0;
        for (j, &y) in short.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if x == y { diag + 1 } else { up.max(row[j]) };
            diag = up;
        }
    }
    row[short.len()]
}

/// Jaccard index of two string lists (treated as sets).
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    use std::collections::BTreeSet;
    let sa: BTreeSet<&String> = a.iter().collect();
    let sb: BTreeSet<&String> = b.iter().collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 1.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// Similarity of two metadata values of matching kind; mismatched kinds score 0.
pub fn value_similarity(a: &MetaValue, b: &MetaValue) -> f64 {
    match (a, b) {
        (MetaValue::Num(x), MetaValue::Num(y)) => {
            1.0 - (x - y).abs() / x.abs().max(y.abs()).max(1.0)
        }
        (MetaValue::Str(x), MetaValue::Str(y)) => f64::from(x == y),
        (MetaValue::Bool(x), MetaValue::Bool(y)) => f64::from(x == y),
        (MetaValue::List(x), MetaValue::List(y)) => jaccard(x, y),
        _ => 0.0,
    }
}

/// Average per-field similarity over the union of keys.
///
/// A key present on only one side contributes 0. Two empty feature maps have
/// nothing to disagree on and score a neutral 0.5.
pub fn context_similarity(
    a: &BTreeMap<String, MetaValue>,
    b: &BTreeMap<String, MetaValue>,
) -> f64 {
    use std::collections::BTreeSet;
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    if keys.is_empty() {
        return 0.5;
    }
    let total: f64 = keys
        .iter()
        .map(|k| match (a.get(*k), b.get(*k)) {
            (Some(x), Some(y)) => value_similarity(x, y),
            _ => 0.0,
        })
        .sum();
    total / keys.len() as f64
}

/// Mine frequent contiguous subsequences from a chronological type sequence.
///
/// Windows of length 3–5 occurring at least `min_support` times (overlapping
/// occurrences count) become candidate patterns, minus any sequence already
/// in `existing`. A new pattern's initial effectiveness is the
/// similarity-weighted mean of sufficiently similar existing patterns, or
/// the cold-start default when there is no precedent.
pub fn discover_new_patterns(
    existing: &[LearningPattern],
    sequence: &[NodeType],
    min_support: usize,
) -> Vec<LearningPattern> {
    // First-seen order keeps the result deterministic.
    let mut counts: Vec<(Vec<NodeType>, usize)> = Vec::new();
    for width in MIN_WINDOW..=MAX_WINDOW {
        if sequence.len() < width {
            break;
        }
        for window in sequence.windows(width) {
            match counts.iter_mut().find(|(seq, _)| seq == window) {
                Some((_, n)) => *n += 1,
                None => counts.push((window.to_vec(), 1)),
            }
        }
    }

    counts
        .into_iter()
        .filter(|(_, n)| *n >= min_support)
        .filter(|(seq, _)| !existing.iter().any(|p| p.sequence == *seq))
        .map(|(seq, _)| {
            let effectiveness = initial_effectiveness(existing, &seq);
            LearningPattern::new(seq, effectiveness)
        })
        .collect()
}

fn initial_effectiveness(existing: &[LearningPattern], sequence: &[NodeType]) -> f64 {
    let mut weight_sum = 0.0;
    let mut weighted = 0.0;
    for pattern in existing {
        let sim = sequence_similarity(sequence, &pattern.sequence);
        if sim > PRECEDENT_THRESHOLD {
            weight_sum += sim;
            weighted += sim * pattern.effectiveness;
        }
    }
    if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        COLD_START_EFFECTIVENESS
    }
}
