//! The static rule table and its first-match-wins evaluator.

use crate::graph::{InquiryGraph, InquiryNode, NodeType, Relation};

use super::{Guidance, Rule, RuleCtx, RuleResult, SpeechAct, SupportType};

/// Tunables for the static rules.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    /// Smallest trailing window the loop detector compares.
    pub loop_window_min: usize,
    /// Largest trailing window the loop detector compares.
    pub loop_window_max: usize,
    /// An `open_options` metadata list longer than this triggers narrowing.
    pub max_open_options: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            loop_window_min: 2,
            loop_window_max: 4,
            max_open_options: 5,
        }
    }
}

/// Whether the trailing `w`-window of `seq` equals its immediate predecessor
/// window, for any `w` in the configured range. Returns the matched width.
pub(crate) fn trailing_repeat(seq: &[NodeType], min_w: usize, max_w: usize) -> Option<usize> {
    for w in min_w..=max_w {
        if seq.len() >= 2 * w && seq[seq.len() - w..] == seq[seq.len() - 2 * w..seq.len() - w] {
            return Some(w);
        }
    }
    None
}

fn student_type_sequence(graph: &InquiryGraph, student: &str) -> Vec<NodeType> {
    graph
        .chronology(student)
        .iter()
        .map(|n| n.node_type)
        .collect()
}

// ---------------------------------------------------------------------------
// Seed rules
// ---------------------------------------------------------------------------

fn loop_break_condition(ctx: &RuleCtx<'_>) -> bool {
    let seq = student_type_sequence(ctx.graph, &ctx.node.student);
    trailing_repeat(&seq, ctx.cfg.loop_window_min, ctx.cfg.loop_window_max).is_some()
}

fn loop_break_action(ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    let seq = student_type_sequence(ctx.graph, &ctx.node.student);
    let width = trailing_repeat(&seq, ctx.cfg.loop_window_min, ctx.cfg.loop_window_max)
        .unwrap_or(ctx.cfg.loop_window_min);
    Ok(Guidance {
        support: SupportType::Reframing,
        acts: vec![SpeechAct::Challenge, SpeechAct::Reframe],
        reason: format!(
            "the last {width} steps repeat the {width} before them; the inquiry is circling"
        ),
        next_node_type: Some(NodeType::Reflection),
        confidence: 0.85,
        applied_rule: "loop_break".to_string(),
    })
}

fn clarify_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node.node_type == NodeType::Question && ctx.node.clarity < 0.5
}

fn clarify_action(ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    Ok(Guidance {
        support: SupportType::Understanding,
        acts: vec![SpeechAct::Clarify, SpeechAct::Probe],
        reason: format!(
            "the question is not yet clearly articulated (clarity {:.2})",
            ctx.node.clarity
        ),
        next_node_type: None,
        confidence: 0.9,
        applied_rule: "clarify_unclear_question".to_string(),
    })
}

fn insight_feedback_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node.node_type == NodeType::Insight
        && !ctx
            .graph
            .has_outgoing(&ctx.node.id, Relation::Modifies, NodeType::Hypothesis)
}

fn insight_feedback_action(ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    Ok(Guidance {
        support: SupportType::Deepening,
        acts: vec![SpeechAct::Challenge, SpeechAct::Probe],
        reason: "a fresh insight should feed back into the hypotheses it bears on".to_string(),
        next_node_type: Some(NodeType::Hypothesis),
        confidence: 0.8,
        applied_rule: "insight_feeds_hypothesis".to_string(),
    })
}

fn question_progress_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node.node_type == NodeType::Question
        && ctx.node.clarity >= 0.5
        && !ctx
            .graph
            .edges_from(&ctx.node.id)
            .iter()
            .any(|e| e.relation == Relation::Generates)
}

fn question_progress_action(_ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    Ok(Guidance {
        support: SupportType::Pathfinding,
        acts: vec![SpeechAct::Suggest, SpeechAct::Encourage],
        reason: "the question is clear but has no hypothesis yet".to_string(),
        next_node_type: Some(NodeType::Hypothesis),
        confidence: 0.75,
        applied_rule: "question_to_hypothesis".to_string(),
    })
}

fn data_insight_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node.node_type == NodeType::Data
        && !ctx
            .graph
            .has_outgoing(&ctx.node.id, Relation::LeadsToInsight, NodeType::Insight)
}

fn data_insight_action(_ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    Ok(Guidance {
        support: SupportType::Deepening,
        acts: vec![SpeechAct::Probe, SpeechAct::Summarize],
        reason: "observations are in; what do they mean?".to_string(),
        next_node_type: Some(NodeType::Insight),
        confidence: 0.75,
        applied_rule: "data_to_insight".to_string(),
    })
}

fn hypothesis_method_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node.node_type == NodeType::Hypothesis
        && !ctx
            .graph
            .has_outgoing(&ctx.node.id, Relation::IsTestedBy, NodeType::Method)
}

fn hypothesis_method_action(_ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    Ok(Guidance {
        support: SupportType::Pathfinding,
        acts: vec![SpeechAct::Suggest],
        reason: "an untested hypothesis needs a way to be tested".to_string(),
        next_node_type: Some(NodeType::Method),
        confidence: 0.7,
        applied_rule: "hypothesis_to_method".to_string(),
    })
}

fn method_data_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node.node_type == NodeType::Method
        && !ctx
            .graph
            .has_outgoing(&ctx.node.id, Relation::ResultsIn, NodeType::Data)
}

fn method_data_action(_ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    Ok(Guidance {
        support: SupportType::Pathfinding,
        acts: vec![SpeechAct::Encourage, SpeechAct::Suggest],
        reason: "the method is planned but has produced no data yet".to_string(),
        next_node_type: Some(NodeType::Data),
        confidence: 0.7,
        applied_rule: "method_to_data".to_string(),
    })
}

fn narrow_options_condition(ctx: &RuleCtx<'_>) -> bool {
    ctx.node
        .metadata
        .get("open_options")
        .and_then(|v| v.as_list())
        .is_some_and(|opts| opts.len() > ctx.cfg.max_open_options)
}

fn narrow_options_action(ctx: &RuleCtx<'_>) -> RuleResult<Guidance> {
    let count = ctx
        .node
        .metadata
        .get("open_options")
        .and_then(|v| v.as_list())
        .map_or(0, <[String]>::len);
    Ok(Guidance {
        support: SupportType::Narrowing,
        acts: vec![SpeechAct::Narrow, SpeechAct::Probe],
        reason: format!("{count} options are open; too many to pursue at once"),
        next_node_type: None,
        confidence: 0.7,
        applied_rule: "narrow_options".to_string(),
    })
}

fn seed_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "loop_break",
            priority: 10,
            condition: loop_break_condition,
            action: loop_break_action,
        },
        Rule {
            name: "clarify_unclear_question",
            priority: 9,
            condition: clarify_condition,
            action: clarify_action,
        },
        Rule {
            name: "insight_feeds_hypothesis",
            priority: 8,
            condition: insight_feedback_condition,
            action: insight_feedback_action,
        },
        Rule {
            name: "question_to_hypothesis",
            priority: 7,
            condition: question_progress_condition,
            action: question_progress_action,
        },
        Rule {
            name: "data_to_insight",
            priority: 7,
            condition: data_insight_condition,
            action: data_insight_action,
        },
        Rule {
            name: "hypothesis_to_method",
            priority: 6,
            condition: hypothesis_method_condition,
            action: hypothesis_method_action,
        },
        Rule {
            name: "method_to_data",
            priority: 6,
            condition: method_data_condition,
            action: method_data_action,
        },
        Rule {
            name: "narrow_options",
            priority: 6,
            condition: narrow_options_condition,
            action: narrow_options_action,
        },
    ]
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The static rule engine: a fixed priority-ranked rule table.
pub struct RuleEngine {
    rules: Vec<Rule>,
    cfg: RuleConfig,
}

impl RuleEngine {
    /// Create the engine with the seed rule table.
    pub fn new(cfg: RuleConfig) -> Self {
        Self::custom(seed_rules(), cfg)
    }

    /// Create an engine with a custom rule table. The table is stably sorted
    /// by descending priority; ties keep the given list order.
    pub fn custom(mut rules: Vec<Rule>, cfg: RuleConfig) -> Self {
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Self { rules, cfg }
    }

    /// The rule table in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The configured tunables.
    pub fn config(&self) -> &RuleConfig {
        &self.cfg
    }

    /// Evaluate the rule table against a node: first matching rule wins.
    ///
    /// A failing action skips its rule and evaluation continues; no rule
    /// failure ever aborts the call. With no match, a fixed pathfinding
    /// default is returned.
    pub fn infer_next_step(&self, node: &InquiryNode, graph: &InquiryGraph) -> Guidance {
        let ctx = RuleCtx {
            node,
            graph,
            cfg: &self.cfg,
        };
        for rule in &self.rules {
            if !(rule.condition)(&ctx) {
                continue;
            }
            match (rule.action)(&ctx) {
                Ok(guidance) => {
                    tracing::debug!(rule = rule.name, node = %node.id, "rule fired");
                    return guidance;
                }
                Err(e) => {
                    tracing::debug!(rule = rule.name, error = %e, "rule action failed, skipping");
                }
            }
        }
        Self::default_guidance()
    }

    /// The fixed fallback when no rule matches.
    pub fn default_guidance() -> Guidance {
        Guidance {
            support: SupportType::Pathfinding,
            acts: vec![SpeechAct::Suggest],
            reason: "no specific rule applies; offer a way forward".to_string(),
            next_node_type: None,
            confidence: 0.5,
            applied_rule: "default_pathfinding".to_string(),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::error::RuleError;
    use crate::graph::{InquiryEdge, InquiryNode};
    use crate::schema::Schema;

    use super::*;

    fn graph() -> InquiryGraph {
        InquiryGraph::new(Arc::new(Schema::bundled().unwrap()))
    }

    #[test]
    fn unclear_question_triggers_clarification() {
        let mut g = graph();
        let q = InquiryNode::new("q1", NodeType::Question, "s1", "stuff?").with_clarity(0.3);
        g.add_node(q.clone()).unwrap();

        let guidance = RuleEngine::default().infer_next_step(&q, &g);
        assert_eq!(guidance.support, SupportType::Understanding);
        assert_eq!(guidance.acts, vec![SpeechAct::Clarify, SpeechAct::Probe]);
        assert_eq!(guidance.confidence, 0.9);
        assert_eq!(guidance.applied_rule, "clarify_unclear_question");
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let mut g = graph();
        let q = InquiryNode::new("q1", NodeType::Question, "s1", "stuff?").with_clarity(0.3);
        g.add_node(q.clone()).unwrap();
        let engine = RuleEngine::default();
        let a = engine.infer_next_step(&q, &g);
        let b = engine.infer_next_step(&q, &g);
        assert_eq!(a, b);
    }

    #[test]
    fn loop_break_overrides_lower_priority_matches() {
        let mut g = graph();
        let t0 = Utc::now();
        // Alternating Question/Hypothesis six times: the trailing 2-window
        // repeats its predecessor window.
        for i in 0..6 {
            let ty = if i % 2 == 0 {
                NodeType::Question
            } else {
                NodeType::Hypothesis
            };
            let node = InquiryNode::new(format!("n{i}"), ty, "s1", "x")
                .with_clarity(0.3)
                .with_created_at(t0 + Duration::seconds(i));
            g.add_node(node).unwrap();
        }
        // The anchor is an unclear question, which would otherwise match
        // clarify_unclear_question at priority 9.
        let anchor = g.get("n4").unwrap().clone();
        let guidance = RuleEngine::default().infer_next_step(&anchor, &g);
        assert_eq!(guidance.applied_rule, "loop_break");
        assert_eq!(guidance.support, SupportType::Reframing);
    }

    #[test]
    fn trailing_repeat_window_detection() {
        use crate::graph::NodeType::{Hypothesis as H, Method as M, Question as Q};
        assert_eq!(trailing_repeat(&[Q, H, Q, H, Q, H], 2, 4), Some(2));
        assert_eq!(trailing_repeat(&[Q, H, M, Q, H, M], 2, 4), Some(3));
        assert_eq!(trailing_repeat(&[Q, H, M], 2, 4), None);
        assert_eq!(trailing_repeat(&[Q, Q, H], 2, 4), None);
        assert_eq!(trailing_repeat(&[], 2, 4), None);
    }

    #[test]
    fn progression_rules_follow_the_chain() {
        let mut g = graph();
        let h = InquiryNode::new("h1", NodeType::Hypothesis, "s1", "h");
        g.add_node(h.clone()).unwrap();
        let guidance = RuleEngine::default().infer_next_step(&h, &g);
        assert_eq!(guidance.applied_rule, "hypothesis_to_method");
        assert_eq!(guidance.next_node_type, Some(NodeType::Method));

        // Once tested, the hypothesis no longer matches its progression rule.
        g.add_node(InquiryNode::new("m1", NodeType::Method, "s1", "m")).unwrap();
        g.add_edge(InquiryEdge::new("h1", Relation::IsTestedBy, "m1")).unwrap();
        let guidance = RuleEngine::default().infer_next_step(&h, &g);
        assert_ne!(guidance.applied_rule, "hypothesis_to_method");
    }

    #[test]
    fn too_many_open_options_triggers_narrowing() {
        let mut g = graph();
        let options: Vec<String> = (0..6).map(|i| format!("option {i}")).collect();
        let t = InquiryNode::new("t1", NodeType::Topic, "s1", "topic")
            .with_meta("open_options", options);
        g.add_node(t.clone()).unwrap();
        let guidance = RuleEngine::default().infer_next_step(&t, &g);
        assert_eq!(guidance.applied_rule, "narrow_options");
        assert_eq!(guidance.support, SupportType::Narrowing);
    }

    #[test]
    fn no_match_falls_back_to_default() {
        let mut g = graph();
        let goal = InquiryNode::new("g1", NodeType::Goal, "s1", "learn");
        g.add_node(goal.clone()).unwrap();
        let guidance = RuleEngine::default().infer_next_step(&goal, &g);
        assert_eq!(guidance.applied_rule, "default_pathfinding");
        assert_eq!(guidance.support, SupportType::Pathfinding);
        assert_eq!(guidance.confidence, 0.5);
    }

    #[test]
    fn failing_action_is_skipped_not_fatal() {
        fn always(_: &RuleCtx<'_>) -> bool {
            true
        }
        fn broken(_: &RuleCtx<'_>) -> RuleResult<Guidance> {
            Err(RuleError::ActionFailed {
                rule: "broken".into(),
                message: "boom".into(),
            })
        }
        fn works(_: &RuleCtx<'_>) -> RuleResult<Guidance> {
            Ok(Guidance {
                support: SupportType::Articulation,
                acts: vec![SpeechAct::Clarify],
                reason: "fallback".into(),
                next_node_type: None,
                confidence: 0.6,
                applied_rule: "works".into(),
            })
        }
        let engine = RuleEngine::custom(
            vec![
                Rule { name: "broken", priority: 9, condition: always, action: broken },
                Rule { name: "works", priority: 5, condition: always, action: works },
            ],
            RuleConfig::default(),
        );
        let mut g = graph();
        let n = InquiryNode::new("n1", NodeType::Goal, "s1", "x");
        g.add_node(n.clone()).unwrap();
        assert_eq!(engine.infer_next_step(&n, &g).applied_rule, "works");
    }

    #[test]
    fn same_priority_ties_fire_in_list_order() {
        fn always(_: &RuleCtx<'_>) -> bool {
            true
        }
        fn first(_: &RuleCtx<'_>) -> RuleResult<Guidance> {
            Ok(Guidance {
                support: SupportType::Pathfinding,
                acts: vec![],
                reason: String::new(),
                next_node_type: None,
                confidence: 0.5,
                applied_rule: "first".into(),
            })
        }
        fn second(_: &RuleCtx<'_>) -> RuleResult<Guidance> {
            Ok(Guidance {
                support: SupportType::Pathfinding,
                acts: vec![],
                reason: String::new(),
                next_node_type: None,
                confidence: 0.5,
                applied_rule: "second".into(),
            })
        }
        let engine = RuleEngine::custom(
            vec![
                Rule { name: "first", priority: 7, condition: always, action: first },
                Rule { name: "second", priority: 7, condition: always, action: second },
            ],
            RuleConfig::default(),
        );
        let mut g = graph();
        let n = InquiryNode::new("n1", NodeType::Goal, "s1", "x");
        g.add_node(n.clone()).unwrap();
        assert_eq!(engine.infer_next_step(&n, &g).applied_rule, "first");
    }
}
