//! Engine facade: top-level API for the heuresis system.
//!
//! The `Engine` owns the schema and the learned model, and keeps one
//! inquiry graph per student. Mutual exclusion is explicit: student graphs
//! live in a sharded concurrent map whose `get_mut`/`entry` guards give one
//! exclusive access path per student id, and the learned model sits behind
//! a single engine-wide lock. Lock order is always session first, then
//! model; the inner stores themselves stay lock-free single-writer
//! structures.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::adapt::{AdaptConfig, AdaptiveEngine, Context, Feedback, Inference, LearningPattern};
use crate::error::{EngineError, GraphError, HeuresisResult};
use crate::export::{self, ImportReport, ModelSnapshot};
use crate::graph::{
    GuardHit, InquiryEdge, InquiryGraph, InquiryNode, NodeType, ProgressReport, StructuralGap,
    StudentId, gaps, progress,
};
use crate::graph::store::NodeMut;
use crate::rules::{Guidance, Prediction, RuleConfig, ScoredPath, predict};
use crate::schema::Schema;

/// Where the schema packs come from.
#[derive(Debug, Clone, Default)]
pub enum SchemaSource {
    /// The packs compiled into the binary.
    #[default]
    Bundled,
    /// External TOML pack files.
    Files {
        ontology: PathBuf,
        constraints: PathBuf,
    },
}

/// Configuration for the heuresis engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Ontology and constraints packs.
    pub schema: SchemaSource,
    /// Static rule tunables.
    pub rules: RuleConfig,
    /// Adaptive engine tunables.
    pub adapt: AdaptConfig,
    /// Where the learned model persists. `None` for memory-only mode.
    pub model_path: Option<PathBuf>,
}

/// The heuresis inquiry-tutoring engine.
///
/// Owns the schema, one graph per student, and the shared adaptive model.
pub struct Engine {
    schema: Arc<Schema>,
    config: EngineConfig,
    sessions: DashMap<StudentId, InquiryGraph>,
    model: Mutex<AdaptiveEngine>,
}

impl Engine {
    /// Create an engine. Malformed configuration or schema packs are fatal
    /// here; nothing is constructed partially.
    pub fn new(config: EngineConfig) -> HeuresisResult<Self> {
        if config.rules.loop_window_min < 1 {
            return Err(EngineError::InvalidConfig {
                message: "loop_window_min must be >= 1".into(),
            }
            .into());
        }
        if config.rules.loop_window_min > config.rules.loop_window_max {
            return Err(EngineError::InvalidConfig {
                message: "loop_window_min must be <= loop_window_max".into(),
            }
            .into());
        }
        if config.adapt.history_keep > config.adapt.history_trim_threshold {
            return Err(EngineError::InvalidConfig {
                message: "history_keep must be <= history_trim_threshold".into(),
            }
            .into());
        }

        let schema = match &config.schema {
            SchemaSource::Bundled => Schema::bundled()?,
            SchemaSource::Files {
                ontology,
                constraints,
            } => Schema::from_files(ontology, constraints)?,
        };

        let mut adaptive = AdaptiveEngine::new(config.rules.clone(), config.adapt.clone());
        if let Some(path) = &config.model_path {
            if let Some(snapshot) = ModelSnapshot::load(path)? {
                snapshot.install(&mut adaptive);
                tracing::info!(path = %path.display(), "learned model restored");
            }
        }

        tracing::info!(
            relations = crate::graph::Relation::ALL.len(),
            persistent = config.model_path.is_some(),
            "initializing heuresis engine"
        );
        Ok(Self {
            schema: Arc::new(schema),
            config,
            sessions: DashMap::new(),
            model: Mutex::new(adaptive),
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The loaded schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Students with at least one node.
    pub fn students(&self) -> Vec<StudentId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    fn read_session<T>(
        &self,
        student: &str,
        f: impl FnOnce(&InquiryGraph) -> HeuresisResult<T>,
    ) -> HeuresisResult<T> {
        let session = self
            .sessions
            .get(student)
            .ok_or_else(|| EngineError::UnknownStudent {
                student: student.to_string(),
            })?;
        f(&session)
    }

    fn write_session<T>(
        &self,
        student: &str,
        f: impl FnOnce(&mut InquiryGraph) -> HeuresisResult<T>,
    ) -> HeuresisResult<T> {
        let mut session = self
            .sessions
            .entry(student.to_string())
            .or_insert_with(|| InquiryGraph::new(Arc::clone(&self.schema)));
        f(&mut session)
    }

    fn model(&self) -> std::sync::MutexGuard<'_, AdaptiveEngine> {
        // A poisoned lock means a panic mid-update; the stores stay usable.
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Graph mutation and inspection
    // -----------------------------------------------------------------------

    /// Insert a node into its student's graph, creating the session on
    /// first contact.
    pub fn add_node(&self, node: InquiryNode) -> HeuresisResult<()> {
        let student = node.student.clone();
        self.write_session(&student, |graph| graph.add_node(node).map_err(Into::into))
    }

    /// Insert an edge into a student's graph after schema validation.
    pub fn add_edge(&self, student: &str, edge: InquiryEdge) -> HeuresisResult<()> {
        self.read_session_mut(student, |graph| graph.add_edge(edge).map_err(Into::into))
    }

    /// Update the mutable attributes of an existing node in place.
    pub fn update_node(
        &self,
        student: &str,
        id: &str,
        f: impl FnOnce(&mut NodeMut<'_>),
    ) -> HeuresisResult<()> {
        self.read_session_mut(student, |graph| graph.update_node(id, f).map_err(Into::into))
    }

    fn read_session_mut<T>(
        &self,
        student: &str,
        f: impl FnOnce(&mut InquiryGraph) -> HeuresisResult<T>,
    ) -> HeuresisResult<T> {
        let mut session = self
            .sessions
            .get_mut(student)
            .ok_or_else(|| EngineError::UnknownStudent {
                student: student.to_string(),
            })?;
        f(&mut session)
    }

    /// A copy of a node.
    pub fn get_node(&self, student: &str, id: &str) -> HeuresisResult<InquiryNode> {
        self.read_session(student, |graph| {
            graph
                .get(id)
                .cloned()
                .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() }.into())
        })
    }

    /// Scan a student's graph for structural gaps, highest priority first.
    pub fn check_structural_gaps(&self, student: &str) -> HeuresisResult<Vec<StructuralGap>> {
        self.read_session(student, |graph| Ok(gaps::check_structural_gaps(graph, student)))
    }

    /// All guards that hold for a node.
    pub fn check_guards(&self, student: &str, id: &str) -> HeuresisResult<Vec<GuardHit>> {
        self.read_session(student, |graph| {
            let node = graph
                .get(id)
                .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
            Ok(gaps::check_guards(graph, node))
        })
    }

    /// Coarse progress report for a student.
    pub fn calculate_progress(&self, student: &str) -> HeuresisResult<ProgressReport> {
        self.read_session(student, |graph| Ok(progress::calculate_progress(graph, student)))
    }

    // -----------------------------------------------------------------------
    // Inference
    // -----------------------------------------------------------------------

    /// Run the static rule table against a node.
    pub fn infer_next_step(&self, student: &str, id: &str) -> HeuresisResult<Guidance> {
        self.read_session(student, |graph| {
            let node = graph
                .get(id)
                .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
            Ok(self.model().basic().infer_next_step(node, graph))
        })
    }

    /// Guidance for a student's most recent step.
    pub fn suggest_next_step(&self, student: &str) -> HeuresisResult<Guidance> {
        self.read_session(student, |graph| {
            let node = graph
                .chronology(student)
                .last()
                .copied()
                .ok_or_else(|| EngineError::UnknownStudent {
                    student: student.to_string(),
                })?;
            Ok(self.model().basic().infer_next_step(node, graph))
        })
    }

    /// Full adaptive inference for a node with conversation context.
    pub fn infer_next_step_advanced(
        &self,
        student: &str,
        id: &str,
        context: &Context,
    ) -> HeuresisResult<Inference> {
        self.read_session(student, |graph| {
            let node = graph
                .get(id)
                .cloned()
                .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
            Ok(self.model().infer_next_step_advanced(&node, graph, context))
        })
    }

    /// Chain hypothetical continuations from a node.
    pub fn predict_next_nodes(
        &self,
        student: &str,
        id: &str,
        depth: usize,
    ) -> HeuresisResult<Vec<Prediction>> {
        self.read_session(student, |graph| {
            let node = graph
                .get(id)
                .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
            predict::predict_next_nodes(self.model().basic(), node, graph, depth)
                .map_err(Into::into)
        })
    }

    /// Ranked alternative routes from a node toward a goal type.
    pub fn suggest_alternative_paths(
        &self,
        student: &str,
        id: &str,
        goal_type: NodeType,
    ) -> HeuresisResult<Vec<ScoredPath>> {
        self.read_session(student, |graph| {
            let node = graph
                .get(id)
                .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
            Ok(predict::suggest_alternative_paths(graph, node, goal_type))
        })
    }

    // -----------------------------------------------------------------------
    // Learning
    // -----------------------------------------------------------------------

    /// Fold one feedback event into the learned stores, then persist them
    /// when a model path is configured.
    pub fn learn_from_feedback(
        &self,
        inference_id: u64,
        user: &str,
        feedback: &Feedback,
    ) -> HeuresisResult<()> {
        {
            let mut model = self.model();
            model.learn_from_feedback(inference_id, user, feedback)?;
        }
        if let Some(path) = &self.config.model_path {
            self.save_model(path)?;
        }
        Ok(())
    }

    /// Mine a student's trajectory for new patterns.
    pub fn discover_new_patterns(
        &self,
        student: &str,
        min_support: usize,
    ) -> HeuresisResult<Vec<LearningPattern>> {
        self.read_session(student, |graph| {
            Ok(self.model().discover_new_patterns(graph, student, min_support))
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Export a student's graph as JSON Lines. Returns the record count.
    pub fn export(&self, student: &str, out: &mut impl Write) -> HeuresisResult<usize> {
        self.read_session(student, |graph| {
            export::export_graph(graph, out).map_err(Into::into)
        })
    }

    /// Import JSON Lines into a student's graph, best-effort, creating the
    /// session if needed.
    pub fn import(&self, student: &str, input: impl BufRead) -> HeuresisResult<ImportReport> {
        self.write_session(student, |graph| {
            export::import_graph(graph, input).map_err(Into::into)
        })
    }

    /// Snapshot the learned model to disk.
    pub fn save_model(&self, path: &Path) -> HeuresisResult<()> {
        let snapshot = ModelSnapshot::capture(&self.model());
        snapshot.save(path)?;
        Ok(())
    }

    /// Replace the learned model from a snapshot on disk. A missing file
    /// leaves the current model untouched.
    pub fn load_model(&self, path: &Path) -> HeuresisResult<()> {
        if let Some(snapshot) = ModelSnapshot::load(path)? {
            snapshot.install(&mut self.model());
        }
        Ok(())
    }

    /// Summary of engine state.
    pub fn info(&self) -> EngineInfo {
        let (nodes, edges) = self
            .sessions
            .iter()
            .fold((0, 0), |(n, e), s| (n + s.node_count(), e + s.edge_count()));
        let model = self.model();
        EngineInfo {
            students: self.sessions.len(),
            nodes,
            edges,
            patterns: model.patterns().len(),
            adaptive_rules: model.adaptive_rules().len(),
            inferences: model.history().len(),
            persistent: self.config.model_path.is_some(),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("students", &self.sessions.len())
            .field("persistent", &self.config.model_path.is_some())
            .finish()
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub students: usize,
    pub nodes: usize,
    pub edges: usize,
    pub patterns: usize,
    pub adaptive_rules: usize,
    pub inferences: usize,
    pub persistent: bool,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "heuresis engine info")?;
        writeln!(f, "  students:        {}", self.students)?;
        writeln!(f, "  nodes:           {}", self.nodes)?;
        writeln!(f, "  edges:           {}", self.edges)?;
        writeln!(f, "  patterns:        {}", self.patterns)?;
        writeln!(f, "  adaptive rules:  {}", self.adaptive_rules)?;
        writeln!(f, "  inferences:      {}", self.inferences)?;
        writeln!(f, "  persistent:      {}", self.persistent)?;
        Ok(())
    }
}
