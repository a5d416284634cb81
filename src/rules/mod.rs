//! Pedagogical rule engine: priority-ordered condition → action rules.
//!
//! The rule engine is a deterministic policy, not a best-match search:
//! rules are evaluated in descending priority and the first whose condition
//! holds wins. Same-priority rules fire in seed-list order — that ordering
//! is part of the contract, not an accident.

pub mod engine;
pub mod predict;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::graph::{InquiryGraph, InquiryNode, NodeType};

pub use engine::{RuleConfig, RuleEngine};
pub use predict::{PathKind, Prediction, ScoredPath};

/// Result type for rule operations.
pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// The kind of tutoring support a rule recommends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SupportType {
    /// Help the learner understand what they are asking.
    Understanding,
    /// Help the learner find the next step.
    Pathfinding,
    /// Help the learner put a half-formed thought into words.
    Articulation,
    /// Push the learner to go deeper on an existing step.
    Deepening,
    /// Help the learner cut down an overgrown option space.
    Narrowing,
    /// Help the learner step back and reframe.
    Reframing,
}

impl std::fmt::Display for SupportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SupportType::Understanding => "understanding",
            SupportType::Pathfinding => "pathfinding",
            SupportType::Articulation => "articulation",
            SupportType::Deepening => "deepening",
            SupportType::Narrowing => "narrowing",
            SupportType::Reframing => "reframing",
        };
        f.write_str(s)
    }
}

/// A speech act the response generator should perform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpeechAct {
    Clarify,
    Probe,
    Suggest,
    Encourage,
    Challenge,
    Summarize,
    Narrow,
    Reframe,
}

impl std::fmt::Display for SpeechAct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SpeechAct::Clarify => "clarify",
            SpeechAct::Probe => "probe",
            SpeechAct::Suggest => "suggest",
            SpeechAct::Encourage => "encourage",
            SpeechAct::Challenge => "challenge",
            SpeechAct::Summarize => "summarize",
            SpeechAct::Narrow => "narrow",
            SpeechAct::Reframe => "reframe",
        };
        f.write_str(s)
    }
}

/// The recommendation a rule action produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    /// Kind of support to give.
    pub support: SupportType,
    /// Speech acts for the response generator.
    pub acts: Vec<SpeechAct>,
    /// Why this recommendation was made.
    pub reason: String,
    /// The node type the learner should produce next, if the rule implies one.
    pub next_node_type: Option<NodeType>,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Name of the rule that produced this guidance.
    pub applied_rule: String,
}

/// Evaluation context handed to rule conditions and actions.
pub struct RuleCtx<'a> {
    /// The node the inference is anchored on.
    pub node: &'a InquiryNode,
    /// The student's graph.
    pub graph: &'a InquiryGraph,
    /// Engine tunables.
    pub cfg: &'a engine::RuleConfig,
}

/// A static pedagogical rule.
///
/// Conditions and actions are plain function pointers: the rule table is a
/// fixed policy, fully known at compile time, and stays trivially
/// deterministic.
pub struct Rule {
    /// Stable rule name, also used as `applied_rule` in the guidance.
    pub name: &'static str,
    /// Priority 1–10; higher fires first.
    pub priority: u8,
    /// Whether the rule applies to the node.
    pub condition: fn(&RuleCtx<'_>) -> bool,
    /// Produce the guidance. An error here skips the rule, never the call.
    pub action: fn(&RuleCtx<'_>) -> RuleResult<Guidance>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}
