//! # heuresis
//!
//! An inquiry-learning tutoring engine: a typed knowledge graph of a
//! learner's reasoning trajectory, a priority-ordered rule engine that
//! decides the next pedagogical move, and an adaptive layer that mines
//! sequence patterns and tunes itself from feedback.
//!
//! ## Architecture
//!
//! - **Schema** (`schema`): ontology (relation domain/range, allowed paths)
//!   and constraints (structural requirements, guards), loaded from TOML packs
//! - **Inquiry graph** (`graph`): schema-validated directed multigraph with
//!   BFS traversal, gap detection, and progress computation
//! - **Rule engine** (`rules`): static first-match-wins rules, loop
//!   detection, lookahead prediction, alternative-path ranking
//! - **Adaptive engine** (`adapt`): learned patterns, tuned rules, user
//!   profiles, candidate fusion
//! - **Persistence** (`export`): JSON Lines graph exchange and versioned
//!   model snapshots
//!
//! ## Library usage
//!
//! ```no_run
//! use heuresis::engine::{Engine, EngineConfig};
//! use heuresis::graph::{InquiryEdge, InquiryNode, NodeType, Relation};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine
//!     .add_node(InquiryNode::new("q1", NodeType::Question, "ada", "why is the sky blue?"))
//!     .unwrap();
//! engine
//!     .add_node(InquiryNode::new("h1", NodeType::Hypothesis, "ada", "light scatters"))
//!     .unwrap();
//! engine
//!     .add_edge("ada", InquiryEdge::new("q1", Relation::Generates, "h1"))
//!     .unwrap();
//! let guidance = engine.suggest_next_step("ada").unwrap();
//! println!("{}: {}", guidance.applied_rule, guidance.reason);
//! ```

pub mod adapt;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod rules;
pub mod schema;
