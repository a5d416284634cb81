//! In-memory inquiry graph with schema-validated mutation.
//!
//! Uses `petgraph` for the adjacency structure and side maps for O(1)
//! lookups by node id and by student. Mutation is strict: a duplicate node
//! or a schema-violating edge is rejected with a typed error and the graph
//! is left untouched.
//!
//! The store has no internal locking. It is a single-writer structure; the
//! engine facade serializes access per student through its session map.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use petgraph::Direction as PetDirection;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::GraphError;
use crate::schema::Schema;

use super::{InquiryEdge, InquiryNode, MetaValue, NodeId, NodeState, NodeType, Relation, StudentId};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Direction of a neighbor or edge query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Incoming edges only.
    In,
    /// Outgoing edges only.
    Out,
    /// Both directions.
    Both,
}

/// Edge payload stored on petgraph edges. Endpoints live on the graph itself.
#[derive(Debug, Clone)]
pub(crate) struct EdgeData {
    pub relation: Relation,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub metadata: std::collections::BTreeMap<String, MetaValue>,
}

impl From<&InquiryEdge> for EdgeData {
    fn from(e: &InquiryEdge) -> Self {
        Self {
            relation: e.relation,
            confidence: e.confidence,
            created_at: e.created_at,
            metadata: e.metadata.clone(),
        }
    }
}

/// Mutable view of a node restricted to its mutable attributes.
///
/// Nodes are append-only facts: id, type, text, owner, and creation time are
/// fixed at insertion. Everything the engines tune afterwards goes through
/// this view.
pub struct NodeMut<'a> {
    node: &'a mut InquiryNode,
}

impl NodeMut<'_> {
    /// Set the lifecycle state.
    pub fn set_state(&mut self, state: NodeState) {
        self.node.state = state;
    }

    /// Set the confidence, clamped to [0.0, 1.0].
    pub fn set_confidence(&mut self, confidence: f64) {
        self.node.confidence = confidence.clamp(0.0, 1.0);
    }

    /// Set the clarity, clamped to [0.0, 1.0].
    pub fn set_clarity(&mut self, clarity: f64) {
        self.node.clarity = clarity.clamp(0.0, 1.0);
    }

    /// Set the depth, clamped to [0.0, 1.0].
    pub fn set_depth(&mut self, depth: f64) {
        self.node.depth = depth.clamp(0.0, 1.0);
    }

    /// Set the goal alignment, clamped to [0.0, 1.0].
    pub fn set_goal_alignment(&mut self, alignment: f64) {
        self.node.goal_alignment = alignment.clamp(0.0, 1.0);
    }

    /// Insert or replace a metadata entry.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.node.metadata.insert(key.into(), value.into());
    }

    /// Add a tag.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.node.tags.insert(tag.into());
    }
}

/// In-memory inquiry graph: a directed multigraph that may contain cycles.
pub struct InquiryGraph {
    schema: Arc<Schema>,
    /// Adjacency: node weights are ids, edge weights carry the relation data.
    graph: DiGraph<NodeId, EdgeData>,
    /// Node attributes by id.
    nodes: HashMap<NodeId, InquiryNode>,
    /// Id → petgraph index.
    node_index: HashMap<NodeId, NodeIndex>,
    /// Global insertion order, for deterministic iteration and export.
    insertion: Vec<NodeId>,
    /// Per-student node ids in insertion order.
    student_index: HashMap<StudentId, Vec<NodeId>>,
}

impl InquiryGraph {
    /// Create an empty graph validated against the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            node_index: HashMap::new(),
            insertion: Vec::new(),
            student_index: HashMap::new(),
        }
    }

    /// The schema this graph validates against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Insert a node.
    ///
    /// Fails with [`GraphError::DuplicateNode`] if the id is already present;
    /// the call is then a no-op — no state or index is touched.
    pub fn add_node(&mut self, node: InquiryNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { id: node.id });
        }
        let idx = self.graph.add_node(node.id.clone());
        self.node_index.insert(node.id.clone(), idx);
        self.insertion.push(node.id.clone());
        self.student_index
            .entry(node.student.clone())
            .or_default()
            .push(node.id.clone());
        tracing::debug!(node = %node.id, ty = %node.node_type, student = %node.student, "node added");
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Update the mutable attributes of an existing node in place.
    pub fn update_node(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut NodeMut<'_>),
    ) -> GraphResult<()> {
        let node = self.nodes.get_mut(id).ok_or_else(|| GraphError::NodeNotFound {
            id: id.to_string(),
        })?;
        f(&mut NodeMut { node });
        Ok(())
    }

    /// Insert an edge after validating endpoint existence and the relation's
    /// domain/range against the schema.
    ///
    /// On failure the graph is unchanged and the typed error tells the caller
    /// exactly which check rejected the edge.
    pub fn add_edge(&mut self, edge: InquiryEdge) -> GraphResult<()> {
        let src = self.nodes.get(&edge.src).ok_or_else(|| {
            GraphError::MissingEndpoint {
                endpoint: edge.src.clone(),
                relation: edge.relation,
            }
        })?;
        let dst = self.nodes.get(&edge.dst).ok_or_else(|| {
            GraphError::MissingEndpoint {
                endpoint: edge.dst.clone(),
                relation: edge.relation,
            }
        })?;

        if !self
            .schema
            .ontology
            .admits(src.node_type, edge.relation, dst.node_type)
        {
            tracing::warn!(
                src = %edge.src,
                relation = %edge.relation,
                dst = %edge.dst,
                "edge rejected: schema violation"
            );
            return Err(GraphError::SchemaViolation {
                src_type: src.node_type,
                relation: edge.relation,
                dst_type: dst.node_type,
            });
        }

        let src_idx = self.node_index[&edge.src];
        let dst_idx = self.node_index[&edge.dst];
        self.graph.add_edge(src_idx, dst_idx, EdgeData::from(&edge));
        Ok(())
    }

    /// Look up a node by id.
    pub fn get(&self, id: &str) -> Option<&InquiryNode> {
        self.nodes.get(id)
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All nodes in insertion order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &InquiryNode> {
        self.insertion.iter().filter_map(|id| self.nodes.get(id))
    }

    /// All edges, in petgraph edge order (insertion order for a DiGraph).
    pub fn all_edges(&self) -> Vec<InquiryEdge> {
        self.graph
            .edge_indices()
            .filter_map(|ei| {
                let (src, dst) = self.graph.edge_endpoints(ei)?;
                let data = self.graph.edge_weight(ei)?;
                Some(InquiryEdge {
                    src: self.graph[src].clone(),
                    relation: data.relation,
                    dst: self.graph[dst].clone(),
                    confidence: data.confidence,
                    created_at: data.created_at,
                    metadata: data.metadata.clone(),
                })
            })
            .collect()
    }

    /// Distinct neighbors of a node, in edge order.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<&InquiryNode> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        let mut seen: Vec<&NodeId> = Vec::new();
        let mut out = Vec::new();
        let dirs: &[PetDirection] = match direction {
            Direction::Out => &[PetDirection::Outgoing],
            Direction::In => &[PetDirection::Incoming],
            Direction::Both => &[PetDirection::Outgoing, PetDirection::Incoming],
        };
        for &dir in dirs {
            for edge in self.graph.edges_directed(idx, dir) {
                let other = if dir == PetDirection::Outgoing {
                    edge.target()
                } else {
                    edge.source()
                };
                let other_id = &self.graph[other];
                if !seen.contains(&other_id) {
                    seen.push(other_id);
                    if let Some(node) = self.nodes.get(other_id) {
                        out.push(node);
                    }
                }
            }
        }
        out
    }

    /// Outgoing edges of a node.
    pub fn edges_from(&self, id: &str) -> Vec<InquiryEdge> {
        self.edges_directed(id, PetDirection::Outgoing)
    }

    /// Incoming edges of a node.
    pub fn edges_to(&self, id: &str) -> Vec<InquiryEdge> {
        self.edges_directed(id, PetDirection::Incoming)
    }

    fn edges_directed(&self, id: &str, dir: PetDirection) -> Vec<InquiryEdge> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, dir)
            .map(|e| InquiryEdge {
                src: self.graph[e.source()].clone(),
                relation: e.weight().relation,
                dst: self.graph[e.target()].clone(),
                confidence: e.weight().confidence,
                created_at: e.weight().created_at,
                metadata: e.weight().metadata.clone(),
            })
            .collect()
    }

    /// Whether a node has an outgoing edge of `relation` to a node of `ty`.
    pub fn has_outgoing(&self, id: &str, relation: Relation, ty: NodeType) -> bool {
        self.edges_from(id).iter().any(|e| {
            e.relation == relation
                && self.nodes.get(&e.dst).is_some_and(|n| n.node_type == ty)
        })
    }

    /// A student's nodes of one type, in insertion order.
    pub fn nodes_of_type(&self, student: &str, ty: NodeType) -> Vec<&InquiryNode> {
        self.student_nodes(student)
            .into_iter()
            .filter(|n| n.node_type == ty)
            .collect()
    }

    /// A student's nodes in insertion order.
    pub fn student_nodes(&self, student: &str) -> Vec<&InquiryNode> {
        self.student_index
            .get(student)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// A student's nodes in chronological order (creation time, insertion
    /// order for ties). This is the sequence the loop detector and the
    /// pattern miner operate on.
    pub fn chronology(&self, student: &str) -> Vec<&InquiryNode> {
        let mut nodes = self.student_nodes(student);
        nodes.sort_by_key(|n| n.created_at);
        nodes
    }

    /// All students with at least one node.
    pub fn students(&self) -> Vec<&StudentId> {
        self.student_index.keys().collect()
    }
}

impl std::fmt::Debug for InquiryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InquiryGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> InquiryGraph {
        InquiryGraph::new(Arc::new(Schema::bundled().unwrap()))
    }

    fn node(id: &str, ty: NodeType) -> InquiryNode {
        InquiryNode::new(id, ty, "s1", format!("text of {id}"))
    }

    #[test]
    fn add_node_rejects_duplicate_id() {
        let mut g = graph();
        g.add_node(node("q1", NodeType::Question)).unwrap();
        let err = g.add_node(node("q1", NodeType::Hypothesis)).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode { .. }));
        // No duplicate indices, original node untouched.
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.student_nodes("s1").len(), 1);
        assert_eq!(g.get("q1").unwrap().node_type, NodeType::Question);
    }

    #[test]
    fn add_edge_requires_both_endpoints() {
        let mut g = graph();
        g.add_node(node("q1", NodeType::Question)).unwrap();
        let err = g
            .add_edge(InquiryEdge::new("q1", Relation::Generates, "h1"))
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingEndpoint { .. }));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn add_edge_enforces_domain_and_range() {
        let mut g = graph();
        g.add_node(node("d1", NodeType::Data)).unwrap();
        g.add_node(node("g1", NodeType::Goal)).unwrap();
        // Data is not in the domain of modifies.
        let err = g
            .add_edge(InquiryEdge::new("d1", Relation::Modifies, "g1"))
            .unwrap_err();
        assert!(matches!(err, GraphError::SchemaViolation { .. }));
        assert_eq!(g.edge_count(), 0);

        // Goal is not in the range of is_tested_by.
        g.add_node(node("h1", NodeType::Hypothesis)).unwrap();
        let err = g
            .add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "g1"))
            .unwrap_err();
        assert!(matches!(err, GraphError::SchemaViolation { .. }));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn multigraph_allows_parallel_edges_and_cycles() {
        let mut g = graph();
        g.add_node(node("h1", NodeType::Hypothesis)).unwrap();
        g.add_node(node("m1", NodeType::Method)).unwrap();
        g.add_node(node("d1", NodeType::Data)).unwrap();
        g.add_node(node("i1", NodeType::Insight)).unwrap();

        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m1"))
            .unwrap();
        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m1"))
            .unwrap();
        g.add_edge(InquiryEdge::new("m1", Relation::ResultsIn, "d1"))
            .unwrap();
        g.add_edge(InquiryEdge::new("d1", Relation::LeadsToInsight, "i1"))
            .unwrap();
        // Cycle back: Insight modifies Hypothesis.
        g.add_edge(InquiryEdge::new("i1", Relation::Modifies, "h1"))
            .unwrap();

        assert_eq!(g.edge_count(), 5);
        assert_eq!(g.neighbors("h1", Direction::Out).len(), 1); // distinct
        assert_eq!(g.neighbors("h1", Direction::Both).len(), 2); // m1 + i1
        assert!(g.has_outgoing("i1", Relation::Modifies, NodeType::Hypothesis));
    }

    #[test]
    fn update_node_touches_only_mutable_attributes() {
        let mut g = graph();
        g.add_node(node("q1", NodeType::Question)).unwrap();
        g.update_node("q1", |n| {
            n.set_clarity(0.9);
            n.set_state(NodeState::Confirmed);
            n.set_meta("open_options", vec!["a".to_string(), "b".to_string()]);
        })
        .unwrap();
        let q = g.get("q1").unwrap();
        assert_eq!(q.clarity, 0.9);
        assert_eq!(q.state, NodeState::Confirmed);
        assert!(q.metadata.contains_key("open_options"));

        let err = g.update_node("nope", |_| {}).unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { .. }));
    }

    #[test]
    fn chronology_sorts_by_creation_time() {
        let mut g = graph();
        let t0 = Utc::now();
        g.add_node(
            node("b", NodeType::Hypothesis).with_created_at(t0 + chrono::Duration::seconds(10)),
        )
        .unwrap();
        g.add_node(node("a", NodeType::Question).with_created_at(t0)).unwrap();
        let order: Vec<&str> = g.chronology("s1").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn neighbors_of_unknown_node_is_empty() {
        let g = graph();
        assert!(g.neighbors("ghost", Direction::Both).is_empty());
        assert!(g.edges_from("ghost").is_empty());
    }
}
