//! Schema packs: ontology and constraints for the inquiry graph.
//!
//! A schema pack is a TOML-defined bundle loaded at engine construction.
//! Two packs are bundled into the binary: `ontology` (relation domain/range
//! signatures and allowed type paths) and `constraints` (structural
//! requirements, attribute guards, advanced checks). External packs can
//! replace the bundled ones; a malformed pack fails construction — schema
//! errors are fatal, not recoverable.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::graph::{InquiryNode, NodeType, Relation};

/// Result type for schema operations.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

// ---------------------------------------------------------------------------
// Ontology
// ---------------------------------------------------------------------------

/// Domain and range of one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSignature {
    /// Node types allowed as edge source.
    pub domain: BTreeSet<NodeType>,
    /// Node types allowed as edge destination.
    pub range: BTreeSet<NodeType>,
}

/// The relation vocabulary with declared signatures, plus allowed type paths
/// used for path-quality scoring.
#[derive(Debug, Clone)]
pub struct Ontology {
    signatures: BTreeMap<Relation, RelationSignature>,
    allowed_paths: Vec<Vec<NodeType>>,
}

impl Ontology {
    /// Whether the ontology admits an edge `src -relation-> dst`.
    ///
    /// A relation with no declared signature admits nothing.
    pub fn admits(&self, src: NodeType, relation: Relation, dst: NodeType) -> bool {
        self.signatures
            .get(&relation)
            .is_some_and(|sig| sig.domain.contains(&src) && sig.range.contains(&dst))
    }

    /// The declared signature of a relation, if any.
    pub fn signature(&self, relation: Relation) -> Option<&RelationSignature> {
        self.signatures.get(&relation)
    }

    /// Declared valid type sequences, used by path-quality scoring.
    pub fn allowed_paths(&self) -> &[Vec<NodeType>] {
        &self.allowed_paths
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Priority of a structural gap. Ordering is High < Medium < Low so that an
/// ascending sort puts high-priority gaps first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GapPriority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for GapPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapPriority::High => f.write_str("high"),
            GapPriority::Medium => f.write_str("medium"),
            GapPriority::Low => f.write_str("low"),
        }
    }
}

/// "If a node of type X exists, it must have an outgoing edge of relation R
/// to a node of type Y."
#[derive(Debug, Clone, Deserialize)]
pub struct StructuralRequirement {
    /// The node type that triggers the requirement.
    pub if_exists: NodeType,
    /// The required outgoing relation.
    pub relation: Relation,
    /// The required destination type.
    pub must_have: NodeType,
    /// Clarification prompt template; `{node}` is replaced with the node text.
    pub gap_prompt: String,
    /// Priority of the resulting gap.
    pub priority: GapPriority,
}

/// Node attribute a guard can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardAttr {
    Clarity,
    Depth,
    Confidence,
    GoalAlignment,
}

impl GuardAttr {
    /// Read the attribute from a node.
    pub fn read(self, node: &InquiryNode) -> f64 {
        match self {
            GuardAttr::Clarity => node.clarity,
            GuardAttr::Depth => node.depth,
            GuardAttr::Confidence => node.confidence,
            GuardAttr::GoalAlignment => node.goal_alignment,
        }
    }
}

/// Comparison operator in a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Cmp {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Cmp::Lt => lhs < rhs,
            Cmp::Le => lhs <= rhs,
            Cmp::Gt => lhs > rhs,
            Cmp::Ge => lhs >= rhs,
        }
    }
}

/// "If node.type == T and attr op value, then suggest."
#[derive(Debug, Clone, Deserialize)]
pub struct Guard {
    /// Node type the guard applies to.
    pub node_type: NodeType,
    /// Attribute to compare.
    pub attr: GuardAttr,
    /// Comparison operator.
    pub op: Cmp,
    /// Threshold value.
    pub value: f64,
    /// Pedagogical suggestion emitted when the guard fires.
    pub suggestion: String,
}

impl Guard {
    /// Whether this guard fires for the given node.
    pub fn holds(&self, node: &InquiryNode) -> bool {
        node.node_type == self.node_type && self.op.holds(self.attr.read(node), self.value)
    }
}

/// Advanced structural checks beyond per-type requirements.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvancedChecks {
    /// Minimum inquiry-chain length before a depth gap is reported.
    pub min_chain_depth: usize,
    /// Report Questions lacking an `aligned_with` edge to any Goal.
    pub require_goal_alignment: bool,
    /// Report Insights lacking a `modifies` edge back to a Hypothesis.
    pub require_insight_cycle: bool,
    /// Prompt for the alignment gap.
    pub alignment_prompt: String,
    /// Prompt for the depth gap.
    pub depth_prompt: String,
    /// Prompt for the cycle gap.
    pub cycle_prompt: String,
}

impl Default for AdvancedChecks {
    fn default() -> Self {
        Self {
            min_chain_depth: 3,
            require_goal_alignment: true,
            require_insight_cycle: true,
            alignment_prompt: "How does \"{node}\" connect to your goal?".to_string(),
            depth_prompt: "Your inquiry chain is still short. What would the next step be?"
                .to_string(),
            cycle_prompt: "Does \"{node}\" change any of your hypotheses?".to_string(),
        }
    }
}

/// The constraints pack: structural requirements, guards, advanced checks.
#[derive(Debug, Clone)]
pub struct Constraints {
    /// Per-type structural requirements.
    pub structural: Vec<StructuralRequirement>,
    /// Attribute guards.
    pub guards: Vec<Guard>,
    /// Advanced checks.
    pub advanced: AdvancedChecks,
}

// ---------------------------------------------------------------------------
// TOML deserialization helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OntologyToml {
    #[serde(default)]
    relation: Vec<RelationToml>,
    #[serde(default)]
    allowed_path: Vec<AllowedPathToml>,
}

#[derive(Debug, Deserialize)]
struct RelationToml {
    name: Relation,
    domain: Vec<NodeType>,
    range: Vec<NodeType>,
}

#[derive(Debug, Deserialize)]
struct AllowedPathToml {
    sequence: Vec<NodeType>,
}

#[derive(Debug, Deserialize)]
struct ConstraintsToml {
    #[serde(default)]
    structural: Vec<StructuralRequirement>,
    #[serde(default)]
    guard: Vec<Guard>,
    #[serde(default)]
    advanced: AdvancedChecks,
}

// ---------------------------------------------------------------------------
// Bundled packs
// ---------------------------------------------------------------------------

const ONTOLOGY_TOML: &str = include_str!("../../data/schema/ontology.toml");
const CONSTRAINTS_TOML: &str = include_str!("../../data/schema/constraints.toml");

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The complete schema: ontology plus constraints.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Relation signatures and allowed paths.
    pub ontology: Ontology,
    /// Structural requirements, guards, advanced checks.
    pub constraints: Constraints,
}

impl Schema {
    /// Load the packs bundled into the binary.
    pub fn bundled() -> SchemaResult<Self> {
        Self::from_toml(ONTOLOGY_TOML, CONSTRAINTS_TOML)
    }

    /// Parse a schema from TOML pack sources.
    pub fn from_toml(ontology: &str, constraints: &str) -> SchemaResult<Self> {
        let raw_ontology: OntologyToml =
            toml::from_str(ontology).map_err(|e| SchemaError::OntologyParse {
                message: e.to_string(),
            })?;
        let raw_constraints: ConstraintsToml =
            toml::from_str(constraints).map_err(|e| SchemaError::ConstraintsParse {
                message: e.to_string(),
            })?;

        let mut signatures: BTreeMap<Relation, RelationSignature> = BTreeMap::new();
        for rel in raw_ontology.relation {
            if rel.domain.is_empty() || rel.range.is_empty() {
                return Err(SchemaError::EmptySignature { relation: rel.name });
            }
            let sig = RelationSignature {
                domain: rel.domain.into_iter().collect(),
                range: rel.range.into_iter().collect(),
            };
            if signatures.insert(rel.name, sig).is_some() {
                return Err(SchemaError::DuplicateRelation { relation: rel.name });
            }
        }

        let ontology = Ontology {
            signatures,
            allowed_paths: raw_ontology
                .allowed_path
                .into_iter()
                .map(|p| p.sequence)
                .collect(),
        };
        let constraints = Constraints {
            structural: raw_constraints.structural,
            guards: raw_constraints.guard,
            advanced: raw_constraints.advanced,
        };

        tracing::debug!(
            relations = ontology.signatures.len(),
            allowed_paths = ontology.allowed_paths.len(),
            structural = constraints.structural.len(),
            guards = constraints.guards.len(),
            "schema loaded"
        );
        Ok(Self {
            ontology,
            constraints,
        })
    }

    /// Load a schema from external pack files.
    pub fn from_files(ontology: &Path, constraints: &Path) -> SchemaResult<Self> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        Self::from_toml(&read(ontology)?, &read(constraints)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_packs_parse() {
        let schema = Schema::bundled().unwrap();
        assert!(schema.ontology.signature(Relation::IsTestedBy).is_some());
        assert!(!schema.constraints.structural.is_empty());
        assert!(!schema.constraints.guards.is_empty());
    }

    #[test]
    fn bundled_ontology_admits_core_chain() {
        let schema = Schema::bundled().unwrap();
        let ont = &schema.ontology;
        assert!(ont.admits(NodeType::Question, Relation::Generates, NodeType::Hypothesis));
        assert!(ont.admits(NodeType::Hypothesis, Relation::IsTestedBy, NodeType::Method));
        assert!(ont.admits(NodeType::Method, Relation::ResultsIn, NodeType::Data));
        assert!(ont.admits(NodeType::Data, Relation::LeadsToInsight, NodeType::Insight));
        assert!(ont.admits(NodeType::Insight, Relation::Modifies, NodeType::Hypothesis));
        // Domain violation: Data never modifies anything.
        assert!(!ont.admits(NodeType::Data, Relation::Modifies, NodeType::Goal));
    }

    #[test]
    fn empty_domain_is_fatal() {
        let ontology = r#"
            [[relation]]
            name = "modifies"
            domain = []
            range = ["Hypothesis"]
        "#;
        let err = Schema::from_toml(ontology, "").unwrap_err();
        assert!(matches!(err, SchemaError::EmptySignature { .. }));
    }

    #[test]
    fn duplicate_relation_is_fatal() {
        let ontology = r#"
            [[relation]]
            name = "modifies"
            domain = ["Insight"]
            range = ["Hypothesis"]

            [[relation]]
            name = "modifies"
            domain = ["Reflection"]
            range = ["Goal"]
        "#;
        let err = Schema::from_toml(ontology, "").unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateRelation { .. }));
    }

    #[test]
    fn malformed_toml_is_fatal() {
        let err = Schema::from_toml("[[relation]]\nname = 42", "").unwrap_err();
        assert!(matches!(err, SchemaError::OntologyParse { .. }));
    }

    #[test]
    fn guard_holds_checks_type_and_threshold() {
        let guard = Guard {
            node_type: NodeType::Question,
            attr: GuardAttr::Clarity,
            op: Cmp::Lt,
            value: 0.4,
            suggestion: "restate it".into(),
        };
        let vague = InquiryNode::new("q1", NodeType::Question, "s1", "hm").with_clarity(0.3);
        let clear = InquiryNode::new("q2", NodeType::Question, "s1", "why?").with_clarity(0.6);
        let goal = InquiryNode::new("g1", NodeType::Goal, "s1", "learn").with_clarity(0.3);
        assert!(guard.holds(&vague));
        assert!(!guard.holds(&clear));
        assert!(!guard.holds(&goal));
    }

    #[test]
    fn gap_priority_orders_high_first() {
        let mut priorities = vec![GapPriority::Low, GapPriority::High, GapPriority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![GapPriority::High, GapPriority::Medium, GapPriority::Low]
        );
    }
}
