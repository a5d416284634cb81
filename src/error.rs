//! Rich diagnostic error types for the heuresis engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::graph::{NodeType, Relation};

/// Top-level error type for the heuresis engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum HeuresisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Adapt(#[from] AdaptError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("failed to parse ontology pack: {message}")]
    #[diagnostic(
        code(heuresis::schema::ontology_parse),
        help(
            "Check the ontology TOML syntax. Every [[relation]] table needs \
             `name`, `domain`, and `range` fields using known node types."
        )
    )]
    OntologyParse { message: String },

    #[error("failed to parse constraints pack: {message}")]
    #[diagnostic(
        code(heuresis::schema::constraints_parse),
        help(
            "Check the constraints TOML syntax. Structural requirements need \
             `if_exists`, `relation`, `must_have`, `gap_prompt`, and `priority`."
        )
    )]
    ConstraintsParse { message: String },

    #[error("relation {relation} declared with empty domain or range")]
    #[diagnostic(
        code(heuresis::schema::empty_signature),
        help("Every relation must list at least one domain and one range node type.")
    )]
    EmptySignature { relation: Relation },

    #[error("relation declared twice in ontology: {relation}")]
    #[diagnostic(
        code(heuresis::schema::duplicate_relation),
        help("Each relation may carry exactly one domain/range signature.")
    )]
    DuplicateRelation { relation: Relation },

    #[error("failed to read schema file: {path}")]
    #[diagnostic(
        code(heuresis::schema::io),
        help("Ensure the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("duplicate node id: {id}")]
    #[diagnostic(
        code(heuresis::graph::duplicate_node),
        help(
            "A node with this id already exists. Node insertion is append-only \
             and idempotent on collision; use `update_node` to change the \
             mutable attributes of an existing node."
        )
    )]
    DuplicateNode { id: String },

    #[error("node not found: {id}")]
    #[diagnostic(
        code(heuresis::graph::node_not_found),
        help("Insert the node with `add_node` before referring to it.")
    )]
    NodeNotFound { id: String },

    #[error("edge endpoint missing: {endpoint} (relation {relation})")]
    #[diagnostic(
        code(heuresis::graph::missing_endpoint),
        help(
            "Both endpoints of an edge must exist in the node set before the \
             edge is inserted. Add the missing node first."
        )
    )]
    MissingEndpoint { endpoint: String, relation: Relation },

    #[error("schema violation: {src_type} -{relation}-> {dst_type}")]
    #[diagnostic(
        code(heuresis::graph::schema_violation),
        help(
            "The (source type, relation) pair must match the relation's declared \
             domain and (relation, destination type) its declared range. \
             Check the ontology pack for the allowed signatures."
        )
    )]
    SchemaViolation {
        src_type: NodeType,
        relation: Relation,
        dst_type: NodeType,
    },
}

// ---------------------------------------------------------------------------
// Rule engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("rule action failed: {rule}: {message}")]
    #[diagnostic(
        code(heuresis::rules::action_failed),
        help(
            "A single rule's action failed. The engine skips the rule and \
             continues with the next candidate; this error only surfaces when \
             invoking an individual rule directly."
        )
    )]
    ActionFailed { rule: String, message: String },

    #[error("prediction depth must be >= 1, got {depth}")]
    #[diagnostic(
        code(heuresis::rules::invalid_depth),
        help("Request at least one lookahead step from `predict_next_nodes`.")
    )]
    InvalidDepth { depth: usize },
}

// ---------------------------------------------------------------------------
// Adaptive engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AdaptError {
    #[error("feedback value out of range: {field} = {value}")]
    #[diagnostic(
        code(heuresis::adapt::feedback_range),
        help("`satisfaction` and `effectiveness` must both lie in [0.0, 1.0].")
    )]
    FeedbackRange { field: &'static str, value: f64 },

    #[error("no recorded inference with id {id} for user {user}")]
    #[diagnostic(
        code(heuresis::adapt::unknown_inference),
        help(
            "Feedback must reference an inference this engine produced for \
             this user. Inference ids are returned by `infer_next_step_advanced` \
             and kept in a bounded history; very old ids may have been trimmed."
        )
    )]
    UnknownInference { id: u64, user: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(heuresis::persist::io),
        help(
            "A filesystem operation failed. Check that the target directory \
             exists, has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(heuresis::persist::serde),
        help("Failed to serialize engine state. This is a bug; please report it.")
    )]
    Serialization { message: String },

    #[error("unsupported model snapshot version: {found} (supported: {supported})")]
    #[diagnostic(
        code(heuresis::persist::snapshot_version),
        help(
            "The model snapshot was written by a newer heuresis release. \
             Upgrade the engine, or regenerate the snapshot from raw feedback."
        )
    )]
    SnapshotVersion { found: u32, supported: u32 },
}

impl From<std::io::Error> for PersistError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(heuresis::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("unknown student: {student}")]
    #[diagnostic(
        code(heuresis::engine::unknown_student),
        help("No state exists for this student yet. State is created on the first `add_node`.")
    )]
    UnknownStudent { student: String },
}

/// Convenience alias for functions returning heuresis results.
pub type HeuresisResult<T> = std::result::Result<T, HeuresisError>;
