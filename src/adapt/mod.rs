//! Adaptive inference: learned patterns, templated rules, user profiles.
//!
//! The adaptive engine extends the static rule engine with three online-tuned
//! stores: mined [`LearningPattern`]s, [`AdaptiveRule`]s whose confidence
//! tracks outcome feedback, and per-user [`UserProfile`]s updated by
//! exponential moving average.
//!
//! Adaptive rule conditions are a closed set of typed [`Predicate`]s with
//! explicit numeric thresholds. Thresholds may reference a dimension of the
//! user's learning style, substituted at evaluation time. A predicate that
//! cannot be evaluated (e.g. a missing metadata key) makes its rule
//! inapplicable; it never fails the inference call.

pub mod engine;
pub mod patterns;
pub mod profile;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{InquiryGraph, InquiryNode, MetaValue, NodeType};
use crate::rules::{SpeechAct, SupportType};
use crate::schema::GuardAttr;

pub use engine::{AdaptConfig, AdaptiveEngine, CandidateKind, FusionWeights, Inference};
pub use profile::{AdaptationEvent, LearningStyle, StyleDimension, UserProfile};

/// The sorted-and-joined key under which a speech-act combination is tracked
/// in profiles and candidate scoring.
pub fn acts_key(acts: &[SpeechAct]) -> String {
    let mut acts = acts.to_vec();
    acts.sort();
    acts.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("+")
}

/// Conversation-derived features supplied by the dialogue layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    /// Current topic of conversation, if identified.
    pub topic: Option<String>,
    /// Entities mentioned recently.
    #[serde(default)]
    pub entities: Vec<String>,
    /// Key phrases from recent turns.
    #[serde(default)]
    pub phrases: Vec<String>,
}

/// Learner feedback on one tutoring move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// How satisfied the learner was, in [0.0, 1.0].
    pub satisfaction: f64,
    /// How effective the move was, in [0.0, 1.0].
    pub effectiveness: f64,
    /// The support type the move used.
    pub support: SupportType,
    /// The speech acts the move used.
    pub acts: Vec<SpeechAct>,
}

impl Feedback {
    /// The sorted-and-joined key under which act combinations are tracked.
    pub fn acts_key(&self) -> String {
        acts_key(&self.acts)
    }
}

/// A mined, reusable node-type sequence with a tracked effectiveness score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPattern {
    /// Stable id, derived from the type sequence.
    pub id: String,
    /// The mined type sequence.
    pub sequence: Vec<NodeType>,
    /// Fraction of uses followed by positive feedback.
    pub success_rate: f64,
    /// How often this pattern has matched an inference.
    pub usage_count: u64,
    /// When the pattern last matched.
    pub last_used: DateTime<Utc>,
    /// Effectiveness in [0.0, 1.0], tuned by feedback EMA.
    pub effectiveness: f64,
    /// Context features the pattern was mined under.
    #[serde(default)]
    pub context_conditions: BTreeMap<String, MetaValue>,
}

impl LearningPattern {
    /// Create a fresh pattern for a type sequence.
    pub fn new(sequence: Vec<NodeType>, effectiveness: f64) -> Self {
        let id = format!(
            "seq:{}",
            sequence
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(">")
        );
        Self {
            id,
            sequence,
            success_rate: 0.0,
            usage_count: 0,
            last_used: Utc::now(),
            effectiveness: effectiveness.clamp(0.0, 1.0),
            context_conditions: BTreeMap::new(),
        }
    }
}

/// Where a predicate threshold comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRef {
    /// A literal value.
    Fixed(f64),
    /// A dimension of the user's learning style, read at evaluation time.
    Style(StyleDimension),
}

impl ThresholdRef {
    fn resolve(&self, style: &LearningStyle) -> f64 {
        match self {
            ThresholdRef::Fixed(v) => *v,
            ThresholdRef::Style(dim) => style.get(*dim),
        }
    }
}

/// Typed condition of an adaptive rule.
///
/// This is a closed vocabulary: no rule condition is ever parsed or executed
/// from a string, config-supplied or otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Node attribute strictly below the threshold.
    AttrBelow { attr: GuardAttr, threshold: ThresholdRef },
    /// Node attribute at or above the threshold.
    AttrAtLeast { attr: GuardAttr, threshold: ThresholdRef },
    /// Node is of the given type.
    TypeIs(NodeType),
    /// Numeric metadata entry at or above the threshold.
    /// Inapplicable when the key is missing or not numeric.
    MetaAtLeast { key: String, threshold: ThresholdRef },
    /// Node has fewer outgoing edges than `count`.
    OutDegreeBelow(usize),
    /// All sub-predicates hold.
    All(Vec<Predicate>),
    /// At least one sub-predicate holds.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against a node. `None` means the predicate is inapplicable
    /// in this context, which makes its rule silently not fire.
    pub fn eval(
        &self,
        node: &InquiryNode,
        graph: &InquiryGraph,
        style: &LearningStyle,
    ) -> Option<bool> {
        match self {
            Predicate::AttrBelow { attr, threshold } => {
                Some(attr.read(node) < threshold.resolve(style))
            }
            Predicate::AttrAtLeast { attr, threshold } => {
                Some(attr.read(node) >= threshold.resolve(style))
            }
            Predicate::TypeIs(ty) => Some(node.node_type == *ty),
            Predicate::MetaAtLeast { key, threshold } => {
                let value = node.metadata.get(key)?.as_num()?;
                Some(value >= threshold.resolve(style))
            }
            Predicate::OutDegreeBelow(count) => Some(graph.edges_from(&node.id).len() < *count),
            Predicate::All(preds) => {
                for p in preds {
                    if !p.eval(node, graph, style)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            Predicate::Any(preds) => {
                let mut applicable = false;
                for p in preds {
                    match p.eval(node, graph, style) {
                        Some(true) => return Some(true),
                        Some(false) => applicable = true,
                        None => {}
                    }
                }
                applicable.then_some(false)
            }
        }
    }
}

/// The guidance shape an adaptive rule produces when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTemplate {
    /// Kind of support.
    pub support: SupportType,
    /// Speech acts.
    pub acts: Vec<SpeechAct>,
    /// Suggested next node type.
    pub next_node_type: Option<NodeType>,
    /// Reason template.
    pub reason: String,
}

/// A templated condition/action pair whose confidence is tuned from outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveRule {
    /// Stable id; style and node-type keywords in the id feed the fit terms.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Typed condition.
    pub predicate: Predicate,
    /// Action template.
    pub action: ActionTemplate,
    /// Priority among adaptive candidates.
    pub priority: u8,
    /// Current confidence, clamped to [0.10, 0.95] after every update.
    pub confidence: f64,
    /// Positive outcomes.
    pub successes: u32,
    /// Negative outcomes.
    pub failures: u32,
    /// Pattern ids this rule was derived from.
    #[serde(default)]
    pub derived_from: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last feedback time.
    pub updated_at: DateTime<Utc>,
}

impl AdaptiveRule {
    /// Clamp bounds for tuned confidence.
    pub const CONFIDENCE_MIN: f64 = 0.10;
    pub const CONFIDENCE_MAX: f64 = 0.95;

    /// Record one outcome and recompute confidence from the success ratio.
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        let total = self.successes + self.failures;
        let ratio = f64::from(self.successes) / f64::from(total);
        self.confidence = ratio.clamp(Self::CONFIDENCE_MIN, Self::CONFIDENCE_MAX);
        self.updated_at = Utc::now();
    }

    /// Total recorded uses.
    pub fn uses(&self) -> u32 {
        self.successes + self.failures
    }

    /// Historical success rate, if the rule has been used.
    pub fn success_rate(&self) -> Option<f64> {
        (self.uses() > 0).then(|| f64::from(self.successes) / f64::from(self.uses()))
    }
}
