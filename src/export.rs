//! Line-delimited graph export/import and versioned model snapshots.
//!
//! Graph state travels as JSON Lines: one object per node or edge, nodes
//! first, timestamps in ISO-8601, enums as strings. Import is lenient — a
//! malformed or schema-violating record is skipped with a warning and
//! counted, never fatal — while direct graph mutation stays strict.
//!
//! The learned model (patterns, rules, profiles) persists as a single
//! versioned JSON document. A snapshot written by a newer release is
//! rejected with a typed error rather than misread.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adapt::{AdaptiveEngine, AdaptiveRule, LearningPattern, UserProfile};
use crate::error::PersistError;
use crate::graph::{InquiryEdge, InquiryGraph, InquiryNode};

/// Result type for persistence operations.
pub type PersistResult<T> = std::result::Result<T, PersistError>;

/// One line of a graph export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum GraphRecord {
    Node(InquiryNode),
    Edge(InquiryEdge),
}

/// What an import run accepted and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Nodes inserted.
    pub nodes: usize,
    /// Edges inserted.
    pub edges: usize,
    /// Records skipped: unparsable lines and rejected mutations.
    pub skipped: usize,
}

/// Write a graph as JSON Lines: all nodes in insertion order, then all edges.
///
/// Returns the number of records written.
pub fn export_graph<W: Write>(graph: &InquiryGraph, out: &mut W) -> PersistResult<usize> {
    let mut written = 0;
    for node in graph.all_nodes() {
        write_record(out, &GraphRecord::Node(node.clone()))?;
        written += 1;
    }
    for edge in graph.all_edges() {
        write_record(out, &GraphRecord::Edge(edge))?;
        written += 1;
    }
    Ok(written)
}

fn write_record<W: Write>(out: &mut W, record: &GraphRecord) -> PersistResult<()> {
    let line = serde_json::to_string(record).map_err(|e| PersistError::Serialization {
        message: e.to_string(),
    })?;
    writeln!(out, "{line}")?;
    Ok(())
}

/// Read JSON Lines into a graph, best-effort.
///
/// Unparsable lines and records the graph rejects (duplicate ids, missing
/// endpoints, schema violations) are logged and counted in the report.
/// I/O failure is the only fatal outcome.
pub fn import_graph<R: BufRead>(graph: &mut InquiryGraph, input: R) -> PersistResult<ImportReport> {
    let mut report = ImportReport::default();
    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<GraphRecord>(&line) {
            Ok(GraphRecord::Node(node)) => match graph.add_node(node) {
                Ok(()) => report.nodes += 1,
                Err(e) => {
                    tracing::warn!(line = lineno + 1, error = %e, "import: node rejected");
                    report.skipped += 1;
                }
            },
            Ok(GraphRecord::Edge(edge)) => match graph.add_edge(edge) {
                Ok(()) => report.edges += 1,
                Err(e) => {
                    tracing::warn!(line = lineno + 1, error = %e, "import: edge rejected");
                    report.skipped += 1;
                }
            },
            Err(e) => {
                tracing::warn!(line = lineno + 1, error = %e, "import: malformed record");
                report.skipped += 1;
            }
        }
    }
    tracing::info!(
        nodes = report.nodes,
        edges = report.edges,
        skipped = report.skipped,
        "graph import finished"
    );
    Ok(report)
}

/// Current model snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Versioned serialization of the learned model stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Format version; snapshots from newer releases are rejected.
    pub version: u32,
    /// Mined learning patterns.
    pub patterns: Vec<LearningPattern>,
    /// Tuned adaptive rules.
    pub rules: Vec<AdaptiveRule>,
    /// Per-user profiles.
    pub profiles: BTreeMap<String, UserProfile>,
}

impl ModelSnapshot {
    /// Capture the learned stores of an adaptive engine.
    pub fn capture(engine: &AdaptiveEngine) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            patterns: engine.patterns().to_vec(),
            rules: engine.adaptive_rules().to_vec(),
            profiles: engine.profiles().clone(),
        }
    }

    /// Install this snapshot's stores into an adaptive engine.
    pub fn install(self, engine: &mut AdaptiveEngine) {
        engine.install_model(self.patterns, self.rules, self.profiles);
    }

    /// Write the snapshot as JSON.
    pub fn save(&self, path: &Path) -> PersistResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            PersistError::Serialization {
                message: e.to_string(),
            }
        })?;
        std::fs::write(path, json)?;
        tracing::info!(
            path = %path.display(),
            patterns = self.patterns.len(),
            rules = self.rules.len(),
            profiles = self.profiles.len(),
            "model snapshot saved"
        );
        Ok(())
    }

    /// Read a snapshot from disk. A missing file is an empty model, not an
    /// error; an unsupported version is.
    pub fn load(path: &Path) -> PersistResult<Option<Self>> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Self =
            serde_json::from_str(&json).map_err(|e| PersistError::Serialization {
                message: e.to_string(),
            })?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(PersistError::SnapshotVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::sync::Arc;

    use crate::adapt::AdaptConfig;
    use crate::graph::{NodeType, Relation};
    use crate::rules::RuleConfig;
    use crate::schema::Schema;

    use super::*;

    fn sample_graph() -> InquiryGraph {
        let mut g = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        g.add_node(
            InquiryNode::new("q1", NodeType::Question, "s1", "why is the sky blue?")
                .with_clarity(0.7)
                .with_meta("topic", "optics"),
        )
        .unwrap();
        g.add_node(InquiryNode::new("h1", NodeType::Hypothesis, "s1", "scattering")).unwrap();
        g.add_edge(InquiryEdge::new("q1", Relation::Generates, "h1")).unwrap();
        g
    }

    #[test]
    fn export_import_round_trip_is_isomorphic() {
        let g = sample_graph();
        let mut buf = Vec::new();
        let written = export_graph(&g, &mut buf).unwrap();
        assert_eq!(written, 3);

        let mut restored = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let report = import_graph(&mut restored, BufReader::new(buf.as_slice())).unwrap();
        assert_eq!(report, ImportReport { nodes: 2, edges: 1, skipped: 0 });

        assert_eq!(restored.node_count(), g.node_count());
        assert_eq!(restored.edge_count(), g.edge_count());
        for node in g.all_nodes() {
            assert_eq!(restored.get(&node.id), Some(node));
        }
        assert_eq!(restored.all_edges(), g.all_edges());
    }

    #[test]
    fn timestamps_and_enums_serialize_readably() {
        let g = sample_graph();
        let mut buf = Vec::new();
        export_graph(&g, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first = text.lines().next().unwrap();
        assert!(first.contains("\"record\":\"node\""));
        assert!(first.contains("\"Question\""));
        // chrono serializes DateTime<Utc> as RFC 3339 / ISO-8601.
        assert!(first.contains('T') && first.contains('Z'));
    }

    #[test]
    fn corrupted_lines_are_skipped_not_fatal() {
        let g = sample_graph();
        let mut buf = Vec::new();
        export_graph(&g, &mut buf).unwrap();
        let mut text = String::from_utf8(buf).unwrap();
        text.insert_str(0, "{ not json\n");
        text.push_str("{\"record\":\"edge\",\"src\":\"ghost\",\"relation\":\"generates\",\"dst\":\"q1\",\"confidence\":1.0,\"created_at\":\"2026-01-01T00:00:00Z\"}\n");

        let mut restored = InquiryGraph::new(Arc::new(Schema::bundled().unwrap()));
        let report =
            import_graph(&mut restored, BufReader::new(text.as_bytes())).unwrap();
        // The garbage line and the dangling edge are skipped; the rest lands.
        assert_eq!(report.nodes, 2);
        assert_eq!(report.edges, 1);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn model_snapshot_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        let mut engine = AdaptiveEngine::new(RuleConfig::default(), AdaptConfig::default());
        let g = sample_graph();
        // Give the stores something to remember.
        let node = g.get("q1").unwrap().clone();
        engine.infer_next_step_advanced(&node, &g, &crate::adapt::Context::default());

        let snapshot = ModelSnapshot::capture(&engine);
        snapshot.save(&path).unwrap();

        let loaded = ModelSnapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.rules.len(), engine.adaptive_rules().len());
        assert_eq!(loaded.profiles.len(), engine.profiles().len());

        let mut fresh = AdaptiveEngine::new(RuleConfig::default(), AdaptConfig::default());
        loaded.install(&mut fresh);
        assert_eq!(fresh.adaptive_rules().len(), engine.adaptive_rules().len());
    }

    #[test]
    fn missing_snapshot_is_an_empty_model() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ModelSnapshot::load(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn future_snapshot_version_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "patterns": [], "rules": [], "profiles": {}}"#,
        )
        .unwrap();
        let err = ModelSnapshot::load(&path).unwrap_err();
        assert!(matches!(
            err,
            PersistError::SnapshotVersion { found: 99, supported: SNAPSHOT_VERSION }
        ));
    }
}
