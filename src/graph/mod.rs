//! Inquiry graph: typed nodes and relations of a learner's reasoning trajectory.
//!
//! The graph records one step of inquiry per node (a goal, a question, a
//! hypothesis, ...) and one reasoning move per edge (a question *generates* a
//! hypothesis, an insight *modifies* one). It is a directed multigraph and may
//! contain cycles — the Insight → Hypothesis feedback loop is the normal case,
//! not an anomaly.
//!
//! - **Store** ([`InquiryGraph`]): petgraph-backed adjacency with schema-validated mutation
//! - **Traversal** ([`traverse`]): BFS path finding with a visited set
//! - **Diagnosis** ([`gaps`]): structural-gap and guard checking
//! - **Progress** ([`progress`]): coarse stage computation

pub mod gaps;
pub mod progress;
pub mod store;
pub mod traverse;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use gaps::{GapPriority, GuardHit, StructuralGap};
pub use progress::{ProgressReport, Stage};
pub use store::{Direction, InquiryGraph};

/// Identifier of a node. Assigned by the adapter that translates learner
/// state into nodes; unique within one student's graph.
pub type NodeId = String;

/// Identifier of a student (owner of a trajectory).
pub type StudentId = String;

/// The kind of inquiry step a node represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum NodeType {
    Goal,
    Question,
    Hypothesis,
    Method,
    Data,
    Insight,
    Reflection,
    Will,
    Need,
    Topic,
    Challenge,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Lifecycle state of a node. Nodes are never deleted; abandonment is a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Tentative,
    Confirmed,
    Revised,
    Abandoned,
}

/// The reasoning move an edge represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Generates,
    Motivates,
    Grounds,
    Frames,
    LeadsTo,
    IsTestedBy,
    ResultsIn,
    LeadsToInsight,
    Modifies,
    AlignedWith,
}

impl Relation {
    /// All relations in the fixed vocabulary.
    pub const ALL: [Relation; 10] = [
        Relation::Generates,
        Relation::Motivates,
        Relation::Grounds,
        Relation::Frames,
        Relation::LeadsTo,
        Relation::IsTestedBy,
        Relation::ResultsIn,
        Relation::LeadsToInsight,
        Relation::Modifies,
        Relation::AlignedWith,
    ];
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Relation::Generates => "generates",
            Relation::Motivates => "motivates",
            Relation::Grounds => "grounds",
            Relation::Frames => "frames",
            Relation::LeadsTo => "leads_to",
            Relation::IsTestedBy => "is_tested_by",
            Relation::ResultsIn => "results_in",
            Relation::LeadsToInsight => "leads_to_insight",
            Relation::Modifies => "modifies",
            Relation::AlignedWith => "aligned_with",
        };
        f.write_str(s)
    }
}

/// Open metadata value. Kept deliberately small: the conversation layer
/// supplies strings, numbers, flags, and string lists, nothing deeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<String>),
}

impl MetaValue {
    /// Numeric view, if this value is a number.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            MetaValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// List view, if this value is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetaValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        MetaValue::Num(n)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(items: Vec<String>) -> Self {
        MetaValue::List(items)
    }
}

/// One step in a learner's inquiry trajectory.
///
/// Nodes are append-only facts: created once by the conversation adapter,
/// thereafter only the mutable attributes (state, confidence, clarity, depth,
/// goal alignment, tags, metadata) change in place. Nodes are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InquiryNode {
    /// Unique identifier.
    pub id: NodeId,
    /// What kind of inquiry step this is.
    pub node_type: NodeType,
    /// The learner's own phrasing of the step.
    pub text: String,
    /// Owning student.
    pub student: StudentId,
    /// When the step was recorded.
    pub created_at: DateTime<Utc>,
    /// Lifecycle state.
    #[serde(default)]
    pub state: NodeState,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// How clearly the step is articulated, in [0.0, 1.0].
    pub clarity: f64,
    /// How deep into the inquiry the step reaches, in [0.0, 1.0].
    pub depth: f64,
    /// Alignment of the step to the learner's goal, in [0.0, 1.0].
    pub goal_alignment: f64,
    /// Open metadata supplied by the conversation layer.
    #[serde(default)]
    pub metadata: BTreeMap<String, MetaValue>,
}

impl InquiryNode {
    /// Create a node with neutral attribute defaults and the current timestamp.
    pub fn new(
        id: impl Into<NodeId>,
        node_type: NodeType,
        student: impl Into<StudentId>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type,
            text: text.into(),
            student: student.into(),
            created_at: Utc::now(),
            state: NodeState::Tentative,
            confidence: 0.5,
            tags: BTreeSet::new(),
            clarity: 0.5,
            depth: 0.5,
            goal_alignment: 0.5,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the confidence score, clamped to [0.0, 1.0].
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the clarity score, clamped to [0.0, 1.0].
    pub fn with_clarity(mut self, clarity: f64) -> Self {
        self.clarity = clarity.clamp(0.0, 1.0);
        self
    }

    /// Set the depth score, clamped to [0.0, 1.0].
    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth.clamp(0.0, 1.0);
        self
    }

    /// Set the goal-alignment score, clamped to [0.0, 1.0].
    pub fn with_goal_alignment(mut self, alignment: f64) -> Self {
        self.goal_alignment = alignment.clamp(0.0, 1.0);
        self
    }

    /// Set the creation timestamp (imports and tests; normal creation stamps now).
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Attach a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A reasoning move between two nodes. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InquiryEdge {
    /// Source node id.
    pub src: NodeId,
    /// The relation this edge asserts.
    pub relation: Relation,
    /// Destination node id.
    pub dst: NodeId,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// When the move was recorded.
    pub created_at: DateTime<Utc>,
    /// Open metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, MetaValue>,
}

impl InquiryEdge {
    /// Create an edge with full confidence and the current timestamp.
    pub fn new(src: impl Into<NodeId>, relation: Relation, dst: impl Into<NodeId>) -> Self {
        Self {
            src: src.into(),
            relation,
            dst: dst.into(),
            confidence: 1.0,
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the confidence score, clamped to [0.0, 1.0].
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_builder_clamps_scores() {
        let node = InquiryNode::new("q1", NodeType::Question, "s1", "why is the sky blue?")
            .with_clarity(1.7)
            .with_confidence(-0.2);
        assert_eq!(node.clarity, 1.0);
        assert_eq!(node.confidence, 0.0);
        assert_eq!(node.state, NodeState::Tentative);
    }

    #[test]
    fn relation_serializes_snake_case() {
        let json = serde_json::to_string(&Relation::IsTestedBy).unwrap();
        assert_eq!(json, "\"is_tested_by\"");
        let back: Relation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Relation::IsTestedBy);
    }

    #[test]
    fn node_type_round_trips_as_string() {
        for ty in [NodeType::Goal, NodeType::Insight, NodeType::Challenge] {
            let json = serde_json::to_string(&ty).unwrap();
            let back: NodeType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn meta_value_untagged_round_trip() {
        let meta = MetaValue::List(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&meta).unwrap();
        let back: MetaValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
        assert_eq!(MetaValue::Num(2.5).as_num(), Some(2.5));
    }
}
