//! Coarse progress computation over a student's trajectory.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{InquiryGraph, NodeType};

/// Coarse inquiry stage, derived from which node types are present.
///
/// The furthest type wins: a single Insight puts the trajectory in the
/// Insight stage regardless of what else exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing yet, or only orientation material (goals, topics, needs).
    Orientation,
    /// At least one Question.
    Questioning,
    /// At least one Hypothesis.
    Conjecture,
    /// At least one Method.
    Investigation,
    /// At least one Data node.
    Evidence,
    /// At least one Insight.
    Insight,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Orientation => "orientation",
            Stage::Questioning => "questioning",
            Stage::Conjecture => "conjecture",
            Stage::Investigation => "investigation",
            Stage::Evidence => "evidence",
            Stage::Insight => "insight",
        };
        f.write_str(s)
    }
}

/// Progress summary for one student.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    /// Coarse stage.
    pub stage: Stage,
    /// Completed Insight ↔ Hypothesis revision cycles:
    /// `min(count(Insight), count(Hypothesis))`.
    pub completed_cycles: usize,
    /// Node counts by type.
    pub node_counts: BTreeMap<NodeType, usize>,
    /// Total nodes for this student.
    pub total_nodes: usize,
}

/// Derive a progress report from a student's node population.
pub fn calculate_progress(graph: &InquiryGraph, student: &str) -> ProgressReport {
    let mut node_counts: BTreeMap<NodeType, usize> = BTreeMap::new();
    for node in graph.student_nodes(student) {
        *node_counts.entry(node.node_type).or_insert(0) += 1;
    }

    let has = |ty: NodeType| node_counts.get(&ty).copied().unwrap_or(0) > 0;
    let stage = if has(NodeType::Insight) {
        Stage::Insight
    } else if has(NodeType::Data) {
        Stage::Evidence
    } else if has(NodeType::Method) {
        Stage::Investigation
    } else if has(NodeType::Hypothesis) {
        Stage::Conjecture
    } else if has(NodeType::Question) {
        Stage::Questioning
    } else {
        Stage::Orientation
    };

    let count = |ty: NodeType| node_counts.get(&ty).copied().unwrap_or(0);
    let completed_cycles = count(NodeType::Insight).min(count(NodeType::Hypothesis));
    let total_nodes = node_counts.values().sum();

    ProgressReport {
        stage,
        completed_cycles,
        node_counts,
        total_nodes,
    }
}
