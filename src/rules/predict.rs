//! Multi-step lookahead prediction and alternative-path ranking.

use serde::Serialize;

use crate::error::RuleError;
use crate::graph::{InquiryGraph, InquiryNode, NodeId, NodeType, traverse};

use super::{RuleResult, SupportType, engine::RuleEngine};

/// Hop budget for path searches. Generous against the longest allowed
/// trajectory but still a hard bound on cyclic graphs.
const MAX_PATH_DEPTH: usize = 8;

/// Confidence multiplier per additional lookahead step. A design choice for
/// diminishing certainty with distance, not a calibrated decay.
const LOOKAHEAD_DECAY: f64 = 0.9;

/// One step of a lookahead prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Lookahead step, 1-based.
    pub step: usize,
    /// The node type the learner is predicted to produce at this step.
    pub node_type: NodeType,
    /// Support the rule engine would give at this step.
    pub support: SupportType,
    /// Step-1 confidence decayed by 0.9 per additional step.
    pub confidence: f64,
    /// The rule that produced this step.
    pub rule: String,
}

/// Chain up to `depth` hypothetical continuations from a node.
///
/// Each step runs the rule table against a virtual node of the previously
/// predicted type; the chain stops early when a step predicts no next type.
/// Confidence at step k is the step-1 confidence × 0.9^(k−1).
pub fn predict_next_nodes(
    engine: &RuleEngine,
    node: &InquiryNode,
    graph: &InquiryGraph,
    depth: usize,
) -> RuleResult<Vec<Prediction>> {
    if depth == 0 {
        return Err(RuleError::InvalidDepth { depth });
    }

    let mut predictions = Vec::new();
    let mut cursor = node.clone();
    let mut base_confidence = 0.0;

    for step in 1..=depth {
        let guidance = engine.infer_next_step(&cursor, graph);
        let Some(next_type) = guidance.next_node_type else {
            break;
        };
        if step == 1 {
            base_confidence = guidance.confidence;
        }
        let confidence = base_confidence * LOOKAHEAD_DECAY.powi(step as i32 - 1);
        predictions.push(Prediction {
            step,
            node_type: next_type,
            support: guidance.support,
            confidence,
            rule: guidance.applied_rule,
        });
        // The virtual node is never inserted; it only anchors the next
        // round of rule evaluation.
        cursor = InquiryNode::new(
            format!("virtual:{}:{step}", node.id),
            next_type,
            node.student.clone(),
            "",
        );
    }
    Ok(predictions)
}

/// Which strategy produced an alternative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Straight on from the current node.
    Direct,
    /// Through an Insight and its feedback cycle.
    InsightCycle,
    /// Restart from the student's first Question.
    QuestionReset,
}

/// A candidate path with its quality score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPath {
    /// Strategy that produced the path.
    pub kind: PathKind,
    /// Node ids along the path, endpoints included.
    pub nodes: Vec<NodeId>,
    /// Quality after the strategy discount.
    pub quality: f64,
}

/// Score a path: existing-edge count, plus a flat +2 when the path's type
/// sequence prefix-matches a declared allowed path, normalized by
/// (path length + 2).
pub fn calculate_path_quality(graph: &InquiryGraph, path: &[NodeId]) -> f64 {
    if path.is_empty() {
        return 0.0;
    }
    let mut edge_count = 0usize;
    for pair in path.windows(2) {
        if graph.edges_from(&pair[0]).iter().any(|e| e.dst == pair[1]) {
            edge_count += 1;
        }
    }

    let types: Vec<NodeType> = path
        .iter()
        .filter_map(|id| graph.get(id).map(|n| n.node_type))
        .collect();
    let prefix_bonus = if types.len() == path.len()
        && graph
            .schema()
            .ontology
            .allowed_paths()
            .iter()
            .any(|allowed| allowed.len() >= types.len() && allowed[..types.len()] == types[..])
    {
        2.0
    } else {
        0.0
    };

    (edge_count as f64 + prefix_bonus) / (path.len() as f64 + 2.0)
}

/// Offer up to three alternative routes from a node toward a goal type.
///
/// Candidates: the direct path, an Insight-mediated cyclic path (×0.9), and
/// a reset from the student's first Question (×0.7). Ranked by discounted
/// quality, ties keeping candidate order.
pub fn suggest_alternative_paths(
    graph: &InquiryGraph,
    node: &InquiryNode,
    goal_type: NodeType,
) -> Vec<ScoredPath> {
    let mut candidates = Vec::new();

    if let Some(path) = traverse::find_path(graph, &node.id, goal_type, MAX_PATH_DEPTH) {
        let quality = calculate_path_quality(graph, &path);
        candidates.push(ScoredPath {
            kind: PathKind::Direct,
            nodes: path,
            quality,
        });
    }

    if let Some(to_insight) =
        traverse::find_path(graph, &node.id, NodeType::Insight, MAX_PATH_DEPTH)
    {
        if let Some(insight) = to_insight.last() {
            if let Some(onward) = traverse::find_path(graph, insight, goal_type, MAX_PATH_DEPTH) {
                let mut path = to_insight.clone();
                path.extend(onward.into_iter().skip(1));
                let quality = calculate_path_quality(graph, &path) * 0.9;
                candidates.push(ScoredPath {
                    kind: PathKind::InsightCycle,
                    nodes: path,
                    quality,
                });
            }
        }
    }

    let first_question = graph
        .chronology(&node.student)
        .into_iter()
        .find(|n| n.node_type == NodeType::Question)
        .map(|n| n.id.clone());
    if let Some(question) = first_question {
        if let Some(path) = traverse::find_path(graph, &question, goal_type, MAX_PATH_DEPTH) {
            let quality = calculate_path_quality(graph, &path) * 0.7;
            candidates.push(ScoredPath {
                kind: PathKind::QuestionReset,
                nodes: path,
                quality,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(3);
    candidates
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::graph::{InquiryEdge, Relation};
    use crate::schema::Schema;

    use super::*;

    fn chain_graph() -> InquiryGraph {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        for (id, ty) in [
            ("q1", NodeType::Question),
            ("h1", NodeType::Hypothesis),
            ("m1", NodeType::Method),
            ("d1", NodeType::Data),
            ("i1", NodeType::Insight),
        ] {
            g.add_node(InquiryNode::new(id, ty, "s1", id)).unwrap();
        }
        g.add_edge(InquiryEdge::new("q1", Relation::Generates, "h1")).unwrap();
        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m1")).unwrap();
        g.add_edge(InquiryEdge::new("m1", Relation::ResultsIn, "d1")).unwrap();
        g.add_edge(InquiryEdge::new("d1", Relation::LeadsToInsight, "i1")).unwrap();
        g
    }

    #[test]
    fn lookahead_chains_the_progression_rules() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let q = InquiryNode::new("q1", NodeType::Question, "s1", "why?").with_clarity(0.8);
        g.add_node(q.clone()).unwrap();

        let engine = RuleEngine::default();
        let predictions = predict_next_nodes(&engine, &q, &g, 3).unwrap();
        let types: Vec<NodeType> = predictions.iter().map(|p| p.node_type).collect();
        assert_eq!(
            types,
            vec![NodeType::Hypothesis, NodeType::Method, NodeType::Data]
        );
    }

    #[test]
    fn lookahead_confidence_decays_geometrically() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let q = InquiryNode::new("q1", NodeType::Question, "s1", "why?").with_clarity(0.8);
        g.add_node(q.clone()).unwrap();

        let engine = RuleEngine::default();
        let predictions = predict_next_nodes(&engine, &q, &g, 4).unwrap();
        assert!(predictions.len() >= 3);
        let base = predictions[0].confidence;
        for p in &predictions {
            let expected = base * 0.9f64.powi(p.step as i32 - 1);
            assert!((p.confidence - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_depth_is_an_error() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let q = InquiryNode::new("q1", NodeType::Question, "s1", "why?");
        g.add_node(q.clone()).unwrap();
        let err = predict_next_nodes(&RuleEngine::default(), &q, &g, 0).unwrap_err();
        assert!(matches!(err, RuleError::InvalidDepth { depth: 0 }));
    }

    #[test]
    fn path_quality_rewards_existing_edges_and_allowed_prefix() {
        let g = chain_graph();
        let full: Vec<NodeId> = ["q1", "h1", "m1", "d1", "i1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // 4 edges + 2 prefix bonus over length 5 + 2.
        let q = calculate_path_quality(&g, &full);
        assert!((q - 6.0 / 7.0).abs() < 1e-12);

        // A disconnected pair gets no edge credit.
        let loose = vec!["q1".to_string(), "d1".to_string()];
        assert!(calculate_path_quality(&g, &loose) < q);
    }

    #[test]
    fn alternative_paths_rank_direct_above_discounted() {
        let g = chain_graph();
        let q = g.get("q1").unwrap().clone();
        let paths = suggest_alternative_paths(&g, &q, NodeType::Insight);
        assert!(!paths.is_empty());
        assert!(paths.len() <= 3);
        assert_eq!(paths[0].kind, PathKind::Direct);
        for pair in paths.windows(2) {
            assert!(pair[0].quality >= pair[1].quality);
        }
        // The reset candidate carries the heaviest discount.
        if let Some(reset) = paths.iter().find(|p| p.kind == PathKind::QuestionReset) {
            assert!(reset.quality <= paths[0].quality * 0.7 + 1e-12);
        }
    }

    #[test]
    fn no_reachable_goal_means_no_direct_candidate() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let h = InquiryNode::new("h1", NodeType::Hypothesis, "s1", "h");
        g.add_node(h.clone()).unwrap();
        let paths = suggest_alternative_paths(&g, &h, NodeType::Insight);
        assert!(paths.is_empty());
    }
}
