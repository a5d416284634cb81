//! The adaptive inference engine: candidate generation, scoring, and fusion.
//!
//! `infer_next_step_advanced` layers three candidate sources over the static
//! rule table — structural gaps (absolute priority), tuned adaptive rules,
//! and mined learning patterns — and fuses them with fixed weights plus a
//! per-user preference adjustment. Feedback flows back into the profile,
//! the patterns, and the rule confidences.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdaptError;
use crate::graph::{
    Direction, InquiryGraph, InquiryNode, MetaValue, NodeId, NodeType, gaps,
};
use crate::rules::{Guidance, RuleConfig, RuleEngine, SpeechAct, SupportType};

use super::patterns::{context_similarity, sequence_similarity};
use super::profile::UserProfile;
use super::{
    ActionTemplate, AdaptiveRule, Context, Feedback, LearningPattern, Predicate, ThresholdRef,
    acts_key, patterns,
};

/// Result type for adaptive operations.
pub type AdaptResult<T> = std::result::Result<T, AdaptError>;

/// Confidence of a gap-derived result. Gaps bypass all scoring.
const GAP_CONFIDENCE: f64 = 0.95;

/// EMA smoothing factor for pattern effectiveness updates.
const PATTERN_ALPHA: f64 = 0.2;

/// Tunables for the adaptive engine.
#[derive(Debug, Clone)]
pub struct AdaptConfig {
    /// Pattern matches below this similarity are discarded.
    pub pattern_similarity_threshold: f64,
    /// How many pattern matches are kept per inference.
    pub max_pattern_matches: usize,
    /// How many pattern candidates enter fusion.
    pub fused_pattern_candidates: usize,
    /// How many adaptive-rule candidates enter fusion.
    pub fused_rule_candidates: usize,
    /// Rolling-statistics window over the student's most recent nodes.
    pub rolling_window: usize,
    /// History length that triggers trimming.
    pub history_trim_threshold: usize,
    /// History length kept after a trim.
    pub history_keep: usize,
    /// How many recent inferences feedback reaches for patterns.
    pub feedback_pattern_lookback: usize,
    /// How many recent inferences feedback reaches for adaptive rules.
    pub feedback_rule_lookback: usize,
}

impl Default for AdaptConfig {
    fn default() -> Self {
        Self {
            pattern_similarity_threshold: 0.3,
            max_pattern_matches: 5,
            fused_pattern_candidates: 2,
            fused_rule_candidates: 3,
            rolling_window: 5,
            history_trim_threshold: 10_000,
            history_keep: 5_000,
            feedback_pattern_lookback: 10,
            feedback_rule_lookback: 5,
        }
    }
}

/// Fixed fusion weights per scoring dimension.
///
/// The weighted scores mix heterogeneous scales (raw confidence, similarity)
/// without cross-candidate renormalization. This replicates the observed
/// policy; it is a contract, not a claim of optimality.
#[derive(Debug, Clone)]
pub struct FusionWeights {
    pub pattern_match: f64,
    pub rule_confidence: f64,
    pub user_preference: f64,
    pub context_similarity: f64,
    pub temporal_relevance: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            pattern_match: 0.3,
            rule_confidence: 0.25,
            user_preference: 0.2,
            context_similarity: 0.15,
            temporal_relevance: 0.1,
        }
    }
}

/// Which candidate source won an inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Structural gap short-circuit.
    StructuralGap,
    /// The static rule table.
    BasicRule,
    /// A tuned adaptive rule.
    AdaptiveRule,
    /// A mined learning pattern.
    Pattern,
}

/// One recorded inference, the unit feedback refers back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inference {
    /// Engine-assigned sequential id.
    pub id: u64,
    /// The learner the inference was made for.
    pub user: String,
    /// The node the inference was anchored on.
    pub node: NodeId,
    /// The winning guidance.
    pub guidance: Guidance,
    /// Which candidate source won.
    pub kind: CandidateKind,
    /// The winning fused score (1.0 for gap short-circuits).
    pub score: f64,
    /// Patterns that matched during this inference.
    pub used_patterns: Vec<String>,
    /// Adaptive rules that were applicable during this inference.
    pub used_rules: Vec<String>,
    /// When the inference was made.
    pub at: DateTime<Utc>,
}

/// A scored fusion candidate.
struct Candidate {
    kind: CandidateKind,
    guidance: Guidance,
    score: f64,
}

/// The adaptive engine: static rules plus three online-tuned stores.
///
/// Single-writer by design; the engine facade serializes access.
pub struct AdaptiveEngine {
    rules: RuleEngine,
    cfg: AdaptConfig,
    weights: FusionWeights,
    patterns: Vec<LearningPattern>,
    adaptive_rules: Vec<AdaptiveRule>,
    profiles: BTreeMap<String, UserProfile>,
    history: Vec<Inference>,
    next_id: u64,
}

fn seed_adaptive_rules() -> Vec<AdaptiveRule> {
    let now = Utc::now();
    let rule = |id: &str,
                name: &str,
                predicate: Predicate,
                action: ActionTemplate,
                priority: u8| AdaptiveRule {
        id: id.to_string(),
        name: name.to_string(),
        predicate,
        action,
        priority,
        confidence: 0.6,
        successes: 0,
        failures: 0,
        derived_from: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    vec![
        rule(
            "analytical_deepen_hypothesis",
            "stress-test a confident hypothesis",
            Predicate::All(vec![
                Predicate::TypeIs(NodeType::Hypothesis),
                Predicate::AttrAtLeast {
                    attr: crate::schema::GuardAttr::Confidence,
                    threshold: ThresholdRef::Style(super::StyleDimension::Analytical),
                },
            ]),
            ActionTemplate {
                support: SupportType::Deepening,
                acts: vec![SpeechAct::Probe, SpeechAct::Challenge],
                next_node_type: Some(NodeType::Method),
                reason: "the hypothesis is held confidently enough to be worth stress-testing"
                    .to_string(),
            },
            6,
        ),
        rule(
            "structured_progress_question",
            "move a clear question forward",
            Predicate::All(vec![
                Predicate::TypeIs(NodeType::Question),
                Predicate::AttrAtLeast {
                    attr: crate::schema::GuardAttr::Clarity,
                    threshold: ThresholdRef::Style(super::StyleDimension::Structured),
                },
                Predicate::OutDegreeBelow(1),
            ]),
            ActionTemplate {
                support: SupportType::Pathfinding,
                acts: vec![SpeechAct::Suggest],
                next_node_type: Some(NodeType::Hypothesis),
                reason: "the question is clear and nothing hangs off it yet".to_string(),
            },
            5,
        ),
        rule(
            "exploratory_open_topic",
            "open up a shallow topic",
            Predicate::All(vec![
                Predicate::TypeIs(NodeType::Topic),
                Predicate::AttrBelow {
                    attr: crate::schema::GuardAttr::Depth,
                    threshold: ThresholdRef::Fixed(0.7),
                },
            ]),
            ActionTemplate {
                support: SupportType::Articulation,
                acts: vec![SpeechAct::Probe, SpeechAct::Suggest],
                next_node_type: Some(NodeType::Question),
                reason: "the topic has room left to explore".to_string(),
            },
            4,
        ),
        rule(
            "creative_reframe_insight",
            "reframe a shallow insight",
            Predicate::All(vec![
                Predicate::TypeIs(NodeType::Insight),
                Predicate::AttrBelow {
                    attr: crate::schema::GuardAttr::Depth,
                    threshold: ThresholdRef::Style(super::StyleDimension::Creative),
                },
            ]),
            ActionTemplate {
                support: SupportType::Reframing,
                acts: vec![SpeechAct::Reframe, SpeechAct::Probe],
                next_node_type: Some(NodeType::Reflection),
                reason: "the insight is stated but not yet grounded; a reframe may deepen it"
                    .to_string(),
            },
            5,
        ),
    ]
}

impl AdaptiveEngine {
    /// Create the engine with the seed adaptive rules and empty stores.
    pub fn new(rule_cfg: RuleConfig, cfg: AdaptConfig) -> Self {
        Self {
            rules: RuleEngine::new(rule_cfg),
            cfg,
            weights: FusionWeights::default(),
            patterns: Vec::new(),
            adaptive_rules: seed_adaptive_rules(),
            profiles: BTreeMap::new(),
            history: Vec::new(),
            next_id: 1,
        }
    }

    /// The underlying static rule engine.
    pub fn basic(&self) -> &RuleEngine {
        &self.rules
    }

    /// The learned pattern store.
    pub fn patterns(&self) -> &[LearningPattern] {
        &self.patterns
    }

    /// The adaptive rule store.
    pub fn adaptive_rules(&self) -> &[AdaptiveRule] {
        &self.adaptive_rules
    }

    /// All user profiles.
    pub fn profiles(&self) -> &BTreeMap<String, UserProfile> {
        &self.profiles
    }

    /// The bounded inference history, oldest first.
    pub fn history(&self) -> &[Inference] {
        &self.history
    }

    /// A user's profile, created lazily on first reference.
    pub fn profile(&mut self, user: &str) -> &UserProfile {
        self.profiles
            .entry(user.to_string())
            .or_insert_with(|| UserProfile::new(user))
    }

    /// Replace the learned stores from a loaded snapshot. An empty rule set
    /// keeps the seeds so a fresh deployment still has adaptive behavior.
    pub fn install_model(
        &mut self,
        patterns: Vec<LearningPattern>,
        rules: Vec<AdaptiveRule>,
        profiles: BTreeMap<String, UserProfile>,
    ) {
        self.patterns = patterns;
        if !rules.is_empty() {
            self.adaptive_rules = rules;
        }
        self.profiles = profiles;
    }

    // -----------------------------------------------------------------------
    // Advanced inference
    // -----------------------------------------------------------------------

    /// Infer the next pedagogical step for a node, with adaptive scoring.
    ///
    /// Structural gaps short-circuit everything: a non-empty gap scan turns
    /// its top entry directly into the result at fixed confidence. Otherwise
    /// candidates from the static rules, the adaptive rules, and the pattern
    /// store are fused by weighted score; the arg-max wins, first-seen on
    /// ties (candidate insertion order is part of the contract).
    pub fn infer_next_step_advanced(
        &mut self,
        node: &InquiryNode,
        graph: &InquiryGraph,
        context: &Context,
    ) -> Inference {
        let gap_scan = gaps::check_structural_gaps(graph, &node.student);
        if let Some(top) = gap_scan.first() {
            let guidance = Guidance {
                support: SupportType::Pathfinding,
                acts: vec![SpeechAct::Clarify, SpeechAct::Suggest],
                reason: top.prompt.clone(),
                next_node_type: top.missing_element,
                confidence: GAP_CONFIDENCE,
                applied_rule: "structural_gap".to_string(),
            };
            tracing::debug!(node = %node.id, gap = ?top.kind, "gap short-circuit");
            return self.record(
                node,
                guidance,
                CandidateKind::StructuralGap,
                1.0,
                Vec::new(),
                Vec::new(),
            );
        }

        let features = self.context_features(node, graph, context);
        let type_sequence: Vec<NodeType> = graph
            .chronology(&node.student)
            .iter()
            .map(|n| n.node_type)
            .collect();

        let pattern_matches = self.match_patterns(&type_sequence, &features);
        let used_patterns: Vec<String> = pattern_matches
            .iter()
            .map(|&(i, _)| self.patterns[i].id.clone())
            .collect();

        let profile = self
            .profiles
            .entry(node.student.clone())
            .or_insert_with(|| UserProfile::new(&node.student))
            .clone();

        let rule_matches = self.evaluate_adaptive_rules(node, graph, &profile);
        let used_rules: Vec<String> = rule_matches
            .iter()
            .map(|&(i, _)| self.adaptive_rules[i].id.clone())
            .collect();

        // Candidate order is basic, adaptive, pattern; ties keep first-seen.
        let mut candidates = Vec::new();

        let basic = self.rules.infer_next_step(node, graph);
        candidates.push(Candidate {
            kind: CandidateKind::BasicRule,
            score: basic.confidence * self.weights.rule_confidence
                + self.preference_adjustment(&profile, &basic),
            guidance: basic,
        });

        for &(i, adjusted) in rule_matches.iter().take(self.cfg.fused_rule_candidates) {
            let rule = &self.adaptive_rules[i];
            let guidance = Guidance {
                support: rule.action.support,
                acts: rule.action.acts.clone(),
                reason: rule.action.reason.clone(),
                next_node_type: rule.action.next_node_type,
                confidence: adjusted,
                applied_rule: rule.id.clone(),
            };
            candidates.push(Candidate {
                kind: CandidateKind::AdaptiveRule,
                score: adjusted * self.weights.rule_confidence
                    + temporal_fit(node, &rule.id) * self.weights.temporal_relevance
                    + self.preference_adjustment(&profile, &guidance),
                guidance,
            });
        }

        for &(i, similarity) in pattern_matches
            .iter()
            .take(self.cfg.fused_pattern_candidates)
        {
            let pattern = &self.patterns[i];
            let context_sim = context_similarity(&features, &pattern.context_conditions);
            let guidance = pattern_guidance(pattern, similarity, node);
            candidates.push(Candidate {
                kind: CandidateKind::Pattern,
                score: similarity * self.weights.pattern_match
                    + context_sim * self.weights.context_similarity
                    + self.preference_adjustment(&profile, &guidance),
                guidance,
            });
        }

        // Strict comparison keeps the first-seen maximum on ties.
        let mut winner = 0;
        for (i, candidate) in candidates.iter().enumerate() {
            if candidate.score > candidates[winner].score {
                winner = i;
            }
        }
        let Candidate {
            kind,
            guidance,
            score,
        } = candidates.swap_remove(winner);

        tracing::debug!(
            node = %node.id,
            kind = ?kind,
            rule = %guidance.applied_rule,
            score,
            "adaptive inference"
        );
        self.record(node, guidance, kind, score, used_patterns, used_rules)
    }

    /// Node attributes, conversation fields, neighbor-type counts, and
    /// rolling statistics over the student's most recent nodes.
    fn context_features(
        &self,
        node: &InquiryNode,
        graph: &InquiryGraph,
        context: &Context,
    ) -> BTreeMap<String, MetaValue> {
        let mut features = BTreeMap::new();
        features.insert("clarity".to_string(), MetaValue::Num(node.clarity));
        features.insert("depth".to_string(), MetaValue::Num(node.depth));
        features.insert("confidence".to_string(), MetaValue::Num(node.confidence));
        features.insert(
            "goal_alignment".to_string(),
            MetaValue::Num(node.goal_alignment),
        );

        if let Some(topic) = &context.topic {
            features.insert("topic".to_string(), MetaValue::Str(topic.clone()));
        }
        if !context.entities.is_empty() {
            features.insert(
                "entities".to_string(),
                MetaValue::List(context.entities.clone()),
            );
        }
        if !context.phrases.is_empty() {
            features.insert(
                "phrases".to_string(),
                MetaValue::List(context.phrases.clone()),
            );
        }

        let mut neighbor_counts: BTreeMap<NodeType, usize> = BTreeMap::new();
        for neighbor in graph.neighbors(&node.id, Direction::Both) {
            *neighbor_counts.entry(neighbor.node_type).or_insert(0) += 1;
        }
        for (ty, count) in neighbor_counts {
            features.insert(format!("neighbors:{ty}"), MetaValue::Num(count as f64));
        }

        let chronology = graph.chronology(&node.student);
        let recent: Vec<_> = chronology
            .iter()
            .rev()
            .take(self.cfg.rolling_window)
            .collect();
        if !recent.is_empty() {
            let n = recent.len() as f64;
            let mean_clarity = recent.iter().map(|x| x.clarity).sum::<f64>() / n;
            let mean_depth = recent.iter().map(|x| x.depth).sum::<f64>() / n;
            features.insert("recent_mean_clarity".to_string(), MetaValue::Num(mean_clarity));
            features.insert("recent_mean_depth".to_string(), MetaValue::Num(mean_depth));
        }
        features
    }

    /// Pattern indices with combined similarity above the threshold, best
    /// first, capped at the configured match count.
    ///
    /// Combined similarity is 0.6 × sequence + 0.4 × context. The sequence
    /// side compares the pattern against the trailing window of the
    /// student's type sequence, sized to the pattern.
    fn match_patterns(
        &self,
        type_sequence: &[NodeType],
        features: &BTreeMap<String, MetaValue>,
    ) -> Vec<(usize, f64)> {
        let mut matches: Vec<(usize, f64)> = self
            .patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                let tail_start = type_sequence.len().saturating_sub(pattern.sequence.len());
                let seq_sim = sequence_similarity(&type_sequence[tail_start..], &pattern.sequence);
                let ctx_sim = context_similarity(features, &pattern.context_conditions);
                (i, 0.6 * seq_sim + 0.4 * ctx_sim)
            })
            .filter(|&(_, sim)| sim > self.cfg.pattern_similarity_threshold)
            .collect();
        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(self.cfg.max_pattern_matches);
        matches
    }

    /// Applicable adaptive rules with adjusted confidence, best first.
    ///
    /// A predicate that cannot be evaluated makes its rule inapplicable;
    /// it never fails the inference. Adjustment terms: historical success
    /// rate (when the rule has prior uses), a style-fit bonus when the rule
    /// id names the user's dominant style dimension, and a temporal-fit term
    /// from node recency and a type keyword in the rule id.
    fn evaluate_adaptive_rules(
        &self,
        node: &InquiryNode,
        graph: &InquiryGraph,
        profile: &UserProfile,
    ) -> Vec<(usize, f64)> {
        let mut matches: Vec<(usize, f64)> = self
            .adaptive_rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| {
                rule.predicate.eval(node, graph, &profile.style) == Some(true)
            })
            .map(|(i, rule)| {
                let mut adjusted = rule.confidence;
                if let Some(rate) = rule.success_rate() {
                    adjusted = 0.7 * adjusted + 0.3 * rate;
                }
                if rule.id.contains(profile.style.dominant().as_str()) {
                    adjusted += 0.05;
                }
                adjusted += temporal_fit(node, &rule.id);
                (i, adjusted.clamp(0.0, 1.0))
            })
            .collect();
        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }

    /// Preference term added to every candidate: the profile's weights for
    /// the candidate's support type and act combination, under the fixed
    /// user-preference fusion weight.
    fn preference_adjustment(&self, profile: &UserProfile, guidance: &Guidance) -> f64 {
        let support = profile.support_weight(guidance.support);
        let combo = profile.act_combo_weight(&acts_key(&guidance.acts));
        self.weights.user_preference * (0.5 * support + 0.5 * combo)
    }

    fn record(
        &mut self,
        node: &InquiryNode,
        guidance: Guidance,
        kind: CandidateKind,
        score: f64,
        used_patterns: Vec<String>,
        used_rules: Vec<String>,
    ) -> Inference {
        let inference = Inference {
            id: self.next_id,
            user: node.student.clone(),
            node: node.id.clone(),
            guidance,
            kind,
            score,
            used_patterns,
            used_rules,
            at: Utc::now(),
        };
        self.next_id += 1;
        self.history.push(inference.clone());
        if self.history.len() > self.cfg.history_trim_threshold {
            let excess = self.history.len() - self.cfg.history_keep;
            self.history.drain(..excess);
            tracing::info!(kept = self.cfg.history_keep, "inference history trimmed");
        }
        inference
    }

    // -----------------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------------

    /// Fold one feedback event into the profile, the patterns used in the
    /// user's recent inferences, and the adaptive rules used in the most
    /// recent ones.
    pub fn learn_from_feedback(
        &mut self,
        inference_id: u64,
        user: &str,
        feedback: &Feedback,
    ) -> AdaptResult<()> {
        for (field, value) in [
            ("satisfaction", feedback.satisfaction),
            ("effectiveness", feedback.effectiveness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AdaptError::FeedbackRange { field, value });
            }
        }
        if !self
            .history
            .iter()
            .any(|inf| inf.id == inference_id && inf.user == user)
        {
            return Err(AdaptError::UnknownInference {
                id: inference_id,
                user: user.to_string(),
            });
        }

        self.profiles
            .entry(user.to_string())
            .or_insert_with(|| UserProfile::new(user))
            .absorb(feedback);

        let success = feedback.satisfaction >= 0.5;
        let user_inferences: Vec<&Inference> = self
            .history
            .iter()
            .rev()
            .filter(|inf| inf.user == user)
            .take(self.cfg.feedback_pattern_lookback)
            .collect();

        let mut touched_patterns: Vec<&str> = Vec::new();
        for inference in &user_inferences {
            for id in &inference.used_patterns {
                if !touched_patterns.contains(&id.as_str()) {
                    touched_patterns.push(id);
                }
            }
        }
        let touched_patterns: Vec<String> =
            touched_patterns.iter().map(ToString::to_string).collect();
        for id in &touched_patterns {
            if let Some(pattern) = self.patterns.iter_mut().find(|p| &p.id == id) {
                pattern.effectiveness = (pattern.effectiveness * (1.0 - PATTERN_ALPHA)
                    + feedback.effectiveness * PATTERN_ALPHA)
                    .clamp(0.0, 1.0);
                let uses = pattern.usage_count as f64;
                pattern.success_rate =
                    (pattern.success_rate * uses + f64::from(success)) / (uses + 1.0);
                pattern.usage_count += 1;
                pattern.last_used = Utc::now();
            }
        }

        let mut touched_rules: Vec<&str> = Vec::new();
        for inference in user_inferences
            .iter()
            .take(self.cfg.feedback_rule_lookback)
        {
            for id in &inference.used_rules {
                if !touched_rules.contains(&id.as_str()) {
                    touched_rules.push(id);
                }
            }
        }
        let touched_rules: Vec<String> = touched_rules.iter().map(ToString::to_string).collect();
        for id in &touched_rules {
            if let Some(rule) = self.adaptive_rules.iter_mut().find(|r| &r.id == id) {
                rule.record_outcome(success);
            }
        }

        tracing::info!(
            user = %user,
            inference = inference_id,
            patterns = touched_patterns.len(),
            rules = touched_rules.len(),
            success,
            "feedback absorbed"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pattern mining
    // -----------------------------------------------------------------------

    /// Mine the student's chronological type sequence for new patterns and
    /// add them to the store. Returns the freshly discovered patterns.
    pub fn discover_new_patterns(
        &mut self,
        graph: &InquiryGraph,
        user: &str,
        min_support: usize,
    ) -> Vec<LearningPattern> {
        let sequence: Vec<NodeType> = graph
            .chronology(user)
            .iter()
            .map(|n| n.node_type)
            .collect();
        let fresh = patterns::discover_new_patterns(&self.patterns, &sequence, min_support);
        if !fresh.is_empty() {
            tracing::info!(user = %user, found = fresh.len(), "new patterns mined");
        }
        self.patterns.extend(fresh.iter().cloned());
        fresh
    }
}

impl std::fmt::Debug for AdaptiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveEngine")
            .field("patterns", &self.patterns.len())
            .field("adaptive_rules", &self.adaptive_rules.len())
            .field("profiles", &self.profiles.len())
            .field("history", &self.history.len())
            .finish()
    }
}

/// Guidance derived from a matched pattern: the type following the node's
/// type in the mined sequence is the suggested continuation.
fn pattern_guidance(pattern: &LearningPattern, similarity: f64, node: &InquiryNode) -> Guidance {
    let next = pattern
        .sequence
        .iter()
        .position(|&t| t == node.node_type)
        .and_then(|i| pattern.sequence.get(i + 1))
        .copied();
    Guidance {
        support: SupportType::Pathfinding,
        acts: vec![SpeechAct::Suggest, SpeechAct::Encourage],
        reason: format!("this trajectory has worked for you before ({})", pattern.id),
        next_node_type: next,
        confidence: (similarity * pattern.effectiveness).clamp(0.0, 1.0),
        applied_rule: pattern.id.clone(),
    }
}

/// Recency of the node plus a small bonus when the rule id names the node's
/// type.
fn temporal_fit(node: &InquiryNode, rule_id: &str) -> f64 {
    let age = Utc::now().signed_duration_since(node.created_at);
    let recency = if age < Duration::hours(1) {
        0.05
    } else if age < Duration::days(1) {
        0.02
    } else {
        0.0
    };
    let type_bonus = if rule_id.contains(&node.node_type.to_string().to_lowercase()) {
        0.03
    } else {
        0.0
    };
    recency + type_bonus
}
