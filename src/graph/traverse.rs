//! Graph traversal primitives: BFS path finding and chain measurement.
//!
//! The inquiry graph is cyclic by design (Insight → Hypothesis feedback), so
//! every traversal carries a visited set and a depth bound.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{InquiryGraph, NodeId, NodeType};

/// Breadth-first search from `start` to the nearest node of `target_type`.
///
/// Follows outgoing edges only. Returns the first path found (shortest in
/// hops) as a node-id sequence including both endpoints, or `None` if no
/// node of the target type is reachable within `max_depth` hops. The visited
/// set guarantees termination on cycles.
pub fn find_path(
    graph: &InquiryGraph,
    start: &str,
    target_type: NodeType,
    max_depth: usize,
) -> Option<Vec<NodeId>> {
    let start_node = graph.get(start)?;
    if start_node.node_type == target_type {
        return Some(vec![start_node.id.clone()]);
    }

    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();

    visited.insert(start_node.id.clone());
    queue.push_back((start_node.id.clone(), 0));

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for edge in graph.edges_from(&id) {
            if !visited.insert(edge.dst.clone()) {
                continue;
            }
            parent.insert(edge.dst.clone(), id.clone());
            let dst = graph.get(&edge.dst)?;
            if dst.node_type == target_type {
                return Some(reconstruct(&parent, start, &edge.dst));
            }
            queue.push_back((edge.dst.clone(), depth + 1));
        }
    }
    None
}

fn reconstruct(parent: &HashMap<NodeId, NodeId>, start: &str, end: &str) -> Vec<NodeId> {
    let mut path = vec![end.to_string()];
    let mut cursor = end.to_string();
    while cursor != start {
        match parent.get(&cursor) {
            Some(prev) => {
                path.push(prev.clone());
                cursor = prev.clone();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Length (in nodes) of the chain starting at `start`, following edges only
/// while the current node has exactly one outgoing edge.
///
/// Branching ends the chain; so does revisiting a node, which keeps the walk
/// finite on cyclic graphs.
pub fn chain_length(graph: &InquiryGraph, start: &str) -> usize {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut cursor = start.to_string();
    let mut length = 0;

    while visited.insert(cursor.clone()) {
        length += 1;
        let out = graph.edges_from(&cursor);
        if out.len() != 1 {
            break;
        }
        cursor = out[0].dst.clone();
    }
    length
}

/// The longest single-successor chain over a student's nodes.
pub fn max_chain_length(graph: &InquiryGraph, student: &str) -> usize {
    graph
        .student_nodes(student)
        .iter()
        .map(|n| chain_length(graph, &n.id))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::graph::{InquiryEdge, InquiryNode, Relation};
    use crate::schema::Schema;

    use super::*;

    fn chain_graph() -> InquiryGraph {
        // q1 -generates-> h1 -is_tested_by-> m1 -results_in-> d1 -leads_to_insight-> i1
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
    fn finds_shortest_path_to_target_type() {
        let g = chain_graph();
        let path = find_path(&g, "q1", NodeType::Insight, 10).unwrap();
        assert_eq!(path, vec!["q1", "h1", "m1", "d1", "i1"]);
    }

    #[test]
    fn start_of_target_type_is_a_trivial_path() {
        let g = chain_graph();
        let path = find_path(&g, "q1", NodeType::Question, 10).unwrap();
        assert_eq!(path, vec!["q1"]);
    }

    #[test]
    fn respects_depth_bound() {
        let g = chain_graph();
        assert!(find_path(&g, "q1", NodeType::Insight, 2).is_none());
        assert!(find_path(&g, "q1", NodeType::Insight, 4).is_some());
    }

    #[test]
    fn terminates_on_cycles() {
        let mut g = chain_graph();
        g.add_edge(InquiryEdge::new("i1", Relation::Modifies, "h1")).unwrap();
        // Goal is unreachable; the cycle must not hang the search.
        assert!(find_path(&g, "q1", NodeType::Goal, 50).is_none());
        // And a path through the cyclic region still resolves.
        let path = find_path(&g, "i1", NodeType::Method, 10).unwrap();
        assert_eq!(path, vec!["i1", "h1", "m1"]);
    }

    #[test]
    fn chain_length_follows_single_successors() {
        let g = chain_graph();
        assert_eq!(chain_length(&g, "q1"), 5);
        assert_eq!(chain_length(&g, "d1"), 2);
        assert_eq!(max_chain_length(&g, "s1"), 5);
    }

    #[test]
    fn chain_length_stops_at_branches() {
        let mut g = chain_graph();
        // Second outgoing edge from h1 ends the chain there.
        g.add_node(InquiryNode::new("m2", NodeType::Method, "s1", "m2")).unwrap();
        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m2")).unwrap();
        assert_eq!(chain_length(&g, "q1"), 2);
    }

    #[test]
    fn chain_length_is_finite_on_cycles() {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        g.add_node(InquiryNode::new("h1", NodeType::Hypothesis, "s1", "h")).unwrap();
        g.add_node(InquiryNode::new("m1", NodeType::Method, "s1", "m")).unwrap();
        g.add_node(InquiryNode::new("d1", NodeType::Data, "s1", "d")).unwrap();
        g.add_node(InquiryNode::new("i1", NodeType::Insight, "s1", "i")).unwrap();
        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m1")).unwrap();
        g.add_edge(InquiryEdge::new("m1", Relation::ResultsIn, "d1")).unwrap();
        g.add_edge(InquiryEdge::new("d1", Relation::LeadsToInsight, "i1")).unwrap();
        g.add_edge(InquiryEdge::new("i1", Relation::Modifies, "h1")).unwrap();
        assert_eq!(chain_length(&g, "h1"), 4);
    }
}
