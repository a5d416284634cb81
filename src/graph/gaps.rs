//! Structural-gap detection and guard checking.
//!
//! A structural gap is a required relation or node missing from a student's
//! graph per the constraints pack. Gaps drive the highest-priority tutoring
//! moves: the adaptive engine short-circuits on them before any scoring.

use serde::Serialize;

use crate::schema::{Cmp, GuardAttr};

pub use crate::schema::GapPriority;

use super::{InquiryGraph, InquiryNode, NodeId, NodeType, Relation, traverse};

/// What kind of check produced a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// A per-type structural requirement.
    Structural,
    /// A Question lacking an `aligned_with` edge to any Goal.
    Alignment,
    /// The inquiry chain is shorter than the configured minimum.
    Depth,
    /// An Insight lacking a `modifies` edge back to a Hypothesis.
    Cycle,
}

/// A required relation or node missing from the graph.
#[derive(Debug, Clone, Serialize)]
pub struct StructuralGap {
    /// Which check produced this gap.
    pub kind: GapKind,
    /// The node type that is missing. `None` for depth gaps, which point at
    /// the chain as a whole rather than a single absent node.
    pub missing_element: Option<NodeType>,
    /// The relation that would close the gap, where one is implied.
    pub relation: Option<Relation>,
    /// The existing node the gap hangs off.
    pub existing_node: NodeId,
    /// Rendered clarification prompt.
    pub prompt: String,
    /// Gap priority; results are sorted high first.
    pub priority: GapPriority,
}

/// A guard whose attribute comparison held for a node.
#[derive(Debug, Clone, Serialize)]
pub struct GuardHit {
    /// The node the guard fired on.
    pub node: NodeId,
    /// The compared attribute.
    pub attr: GuardAttr,
    /// Observed attribute value.
    pub observed: f64,
    /// Comparison operator.
    pub op: Cmp,
    /// Configured threshold.
    pub threshold: f64,
    /// The pedagogical suggestion to surface.
    pub suggestion: String,
}

fn render_prompt(template: &str, node: &InquiryNode) -> String {
    template.replace("{node}", &node.text)
}

/// Scan a student's graph for structural gaps.
///
/// Runs the per-type structural requirements, then the advanced checks
/// (alignment, depth, cycle). The result is sorted high → medium → low;
/// the sort is stable, so gaps of equal priority keep discovery order.
pub fn check_structural_gaps(graph: &InquiryGraph, student: &str) -> Vec<StructuralGap> {
    let constraints = &graph.schema().constraints;
    let mut gaps = Vec::new();

    for req in &constraints.structural {
        for node in graph.nodes_of_type(student, req.if_exists) {
            if !graph.has_outgoing(&node.id, req.relation, req.must_have) {
                gaps.push(StructuralGap {
                    kind: GapKind::Structural,
                    missing_element: Some(req.must_have),
                    relation: Some(req.relation),
                    existing_node: node.id.clone(),
                    prompt: render_prompt(&req.gap_prompt, node),
                    priority: req.priority,
                });
            }
        }
    }

    let advanced = &constraints.advanced;

    if advanced.require_goal_alignment {
        for question in graph.nodes_of_type(student, NodeType::Question) {
            if !graph.has_outgoing(&question.id, Relation::AlignedWith, NodeType::Goal) {
                gaps.push(StructuralGap {
                    kind: GapKind::Alignment,
                    missing_element: Some(NodeType::Goal),
                    relation: Some(Relation::AlignedWith),
                    existing_node: question.id.clone(),
                    prompt: render_prompt(&advanced.alignment_prompt, question),
                    priority: GapPriority::Medium,
                });
            }
        }
    }

    let chronology = graph.chronology(student);
    if let Some(last) = chronology.last() {
        if traverse::max_chain_length(graph, student) < advanced.min_chain_depth {
            gaps.push(StructuralGap {
                kind: GapKind::Depth,
                missing_element: None,
                relation: None,
                existing_node: last.id.clone(),
                prompt: advanced.depth_prompt.clone(),
                priority: GapPriority::Low,
            });
        }
    }

    if advanced.require_insight_cycle {
        for insight in graph.nodes_of_type(student, NodeType::Insight) {
            if !graph.has_outgoing(&insight.id, Relation::Modifies, NodeType::Hypothesis) {
                gaps.push(StructuralGap {
                    kind: GapKind::Cycle,
                    missing_element: Some(NodeType::Hypothesis),
                    relation: Some(Relation::Modifies),
                    existing_node: insight.id.clone(),
                    prompt: render_prompt(&advanced.cycle_prompt, insight),
                    priority: GapPriority::Medium,
                });
            }
        }
    }

    gaps.sort_by_key(|g| g.priority);
    tracing::debug!(student = %student, gaps = gaps.len(), "structural gap scan");
    gaps
}

/// Return every guard whose attribute comparison holds for the node.
pub fn check_guards(graph: &InquiryGraph, node: &InquiryNode) -> Vec<GuardHit> {
    graph
        .schema()
        .constraints
        .guards
        .iter()
        .filter(|guard| guard.holds(node))
        .map(|guard| GuardHit {
            node: node.id.clone(),
            attr: guard.attr,
            observed: guard.attr.read(node),
            op: guard.op,
            threshold: guard.value,
            suggestion: guard.suggestion.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::graph::{InquiryEdge, InquiryNode};
    use crate::schema::Schema;

    use super::*;

    const MINIMAL_CONSTRAINTS: &str = r#"
        [[structural]]
        if_exists = "Hypothesis"
        relation = "is_tested_by"
        must_have = "Method"
        gap_prompt = "How could you test \"{node}\"?"
        priority = "high"

        [advanced]
        min_chain_depth = 0
        require_goal_alignment = false
        require_insight_cycle = false
    "#;

    const ONTOLOGY: &str = include_str!("../../data/schema/ontology.toml");

    fn minimal_graph() -> InquiryGraph {
        let schema = Schema::from_toml(ONTOLOGY, MINIMAL_CONSTRAINTS).unwrap();
        InquiryGraph::new(Arc::new(schema))
    }

    #[test]
    fn untested_hypothesis_yields_exactly_one_gap() {
        let mut g = minimal_graph();
        g.add_node(InquiryNode::new(
            "h1",
            NodeType::Hypothesis,
            "s1",
            "plants grow faster in blue light",
        ))
        .unwrap();

        let gaps = check_structural_gaps(&g, "s1");
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing_element, Some(NodeType::Method));
        assert_eq!(gaps[0].existing_node, "h1");
        assert_eq!(gaps[0].priority, GapPriority::High);
        assert!(gaps[0].prompt.contains("plants grow faster in blue light"));
    }

    #[test]
    fn tested_hypothesis_yields_no_gap() {
        let mut g = minimal_graph();
        g.add_node(InquiryNode::new("h1", NodeType::Hypothesis, "s1", "h")).unwrap();
        g.add_node(InquiryNode::new("m1", NodeType::Method, "s1", "m")).unwrap();
        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m1")).unwrap();
        assert!(check_structural_gaps(&g, "s1").is_empty());
    }

    #[test]
    fn gaps_are_sorted_high_to_low_with_stable_ties() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        // Two untested hypotheses (high), one unanswered question (medium,
        // plus a medium alignment gap), one dangling insight (medium cycle gap),
        // and a short chain (low).
        g.add_node(InquiryNode::new("h1", NodeType::Hypothesis, "s1", "h1")).unwrap();
        g.add_node(InquiryNode::new("h2", NodeType::Hypothesis, "s1", "h2")).unwrap();
        g.add_node(InquiryNode::new("q1", NodeType::Question, "s1", "q1")).unwrap();
        g.add_node(InquiryNode::new("i1", NodeType::Insight, "s1", "i1")).unwrap();

        let gaps = check_structural_gaps(&g, "s1");
        let priorities: Vec<GapPriority> = gaps.iter().map(|g| g.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);

        // Stable ties: h1 was scanned before h2, so its high gap comes first.
        let highs: Vec<&str> = gaps
            .iter()
            .filter(|g| g.priority == GapPriority::High)
            .map(|g| g.existing_node.as_str())
            .collect();
        assert_eq!(highs, vec!["h1", "h2"]);
    }

    #[test]
    fn question_without_goal_link_is_an_alignment_gap() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        g.add_node(InquiryNode::new("q1", NodeType::Question, "s1", "why?")).unwrap();
        let gaps = check_structural_gaps(&g, "s1");
        assert!(gaps.iter().any(|gap| gap.kind == GapKind::Alignment
            && gap.missing_element == Some(NodeType::Goal)));

        // Linking the question to a goal closes it.
        g.add_node(InquiryNode::new("g1", NodeType::Goal, "s1", "learn optics")).unwrap();
        g.add_edge(InquiryEdge::new("q1", Relation::AlignedWith, "g1")).unwrap();
        let gaps = check_structural_gaps(&g, "s1");
        assert!(!gaps.iter().any(|gap| gap.kind == GapKind::Alignment));
    }

    #[test]
    fn insight_without_modifies_is_a_cycle_gap() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        g.add_node(InquiryNode::new("i1", NodeType::Insight, "s1", "aha")).unwrap();
        let gaps = check_structural_gaps(&g, "s1");
        assert!(gaps.iter().any(|gap| gap.kind == GapKind::Cycle));

        g.add_node(InquiryNode::new("h1", NodeType::Hypothesis, "s1", "h")).unwrap();
        g.add_edge(InquiryEdge::new("i1", Relation::Modifies, "h1")).unwrap();
        let gaps = check_structural_gaps(&g, "s1");
        assert!(!gaps.iter().any(|gap| gap.kind == GapKind::Cycle));
    }

    #[test]
    fn short_chain_is_a_depth_gap() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        g.add_node(InquiryNode::new("q1", NodeType::Question, "s1", "q")).unwrap();
        let gaps = check_structural_gaps(&g, "s1");
        assert!(gaps.iter().any(|gap| gap.kind == GapKind::Depth));
        // An empty graph has no chain and therefore no depth gap.
        assert!(check_structural_gaps(&g, "nobody").is_empty());
    }

    #[test]
    fn guards_fire_on_threshold() {
        let g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let vague =
            InquiryNode::new("q1", NodeType::Question, "s1", "hm").with_clarity(0.3);
        let hits = check_guards(&g, &vague);
        assert!(hits.iter().any(|h| h.attr == GuardAttr::Clarity));

        let clear =
            InquiryNode::new("q2", NodeType::Question, "s1", "why?").with_clarity(0.6);
        let hits = check_guards(&g, &clear);
        assert!(!hits.iter().any(|h| h.attr == GuardAttr::Clarity));
    }
}
