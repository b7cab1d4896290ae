//! C7: the Checkpoint Descriptor Assembler (spec.md §4.7).
//!
//! Runs last, against the fully populated job-vertex set. Reads the stream
//! graph's checkpoint config, computes the retention policy from a small
//! decision table, partitions vertices into trigger/ack/commit sets, and
//! eagerly serializes every master checkpoint hook and the state backend
//! through the opaque [`crate::serialize::Serializable`] seam so a failure
//! surfaces during compilation rather than later at runtime.

use crate::error::CompileError;
use crate::job_graph::JobVertex;
use crate::node_id::JobVertexId;
use crate::stream_graph::{CheckpointingMode, ExternalizedCleanup, StreamGraph};

/// How externalized checkpoints survive job termination (spec.md §4.7
/// decision table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    NeverRetain,
    RetainOnFailure,
    RetainOnCancellation,
}

/// The assembled checkpointing coordination descriptor, attached verbatim
/// to the compiled job graph.
pub struct CheckpointingSettings {
    /// `i64::MAX` when checkpointing is disabled.
    pub interval_ms: i64,
    pub checkpointing_enabled: bool,
    pub exactly_once: bool,
    pub fail_on_checkpointing_errors: bool,
    pub retention_policy: RetentionPolicy,
    pub trigger_vertices: Vec<JobVertexId>,
    pub ack_vertices: Vec<JobVertexId>,
    pub commit_vertices: Vec<JobVertexId>,
    /// One serialized blob per collected master hook; `None` if none were
    /// declared anywhere in the graph.
    pub master_hooks_blob: Option<Vec<Vec<u8>>>,
    pub state_backend_blob: Option<Vec<u8>>,
}

pub fn assemble(graph: &StreamGraph, vertices: &[JobVertex]) -> Result<CheckpointingSettings, CompileError> {
    let cfg = graph.checkpoint_config.clone().unwrap_or_default();
    let checkpointing_enabled = cfg.interval_ms > 0;
    let interval_ms = if checkpointing_enabled { cfg.interval_ms } else { i64::MAX };

    let exactly_once = match cfg.mode {
        CheckpointingMode::ExactlyOnce => true,
        CheckpointingMode::AtLeastOnce => false,
        CheckpointingMode::Other(label) => return Err(CompileError::InvalidCheckpointMode(label.to_string())),
    };

    let retention_policy = match (cfg.externalized, cfg.cleanup_on_cancel) {
        (false, _) => RetentionPolicy::NeverRetain,
        (true, Some(ExternalizedCleanup::DeleteOnCancel)) => RetentionPolicy::RetainOnFailure,
        (true, Some(ExternalizedCleanup::RetainOnCancel)) => RetentionPolicy::RetainOnCancellation,
        (true, None) => return Err(CompileError::InvalidExternalizedCleanup),
    };

    let fail_on_checkpointing_errors = checkpointing_enabled && graph.execution_config.fail_task_on_checkpoint_error;

    let trigger_vertices: Vec<JobVertexId> = vertices
        .iter()
        .filter(|v| v.config.in_edges.is_empty())
        .map(|v| v.id)
        .collect();
    let ack_vertices: Vec<JobVertexId> = vertices.iter().map(|v| v.id).collect();
    let commit_vertices = ack_vertices.clone();

    let mut master_hooks = Vec::new();
    for id in graph.node_ids() {
        let node = graph.node(id);
        let Some(op) = &node.operator else { continue };
        let Some(hook) = op.master_hook_factory() else { continue };
        let bytes = hook
            .serialize()
            .map_err(|e| CompileError::NonSerializableHook {
                node: id,
                source: e.to_string(),
            })?;
        master_hooks.push(bytes);
    }
    let master_hooks_blob = if master_hooks.is_empty() { None } else { Some(master_hooks) };

    let state_backend_blob = graph
        .state_backend
        .as_ref()
        .map(|backend| backend.serialize())
        .transpose()
        .map_err(|e| CompileError::NonSerializableStateBackend(e.to_string()))?;

    Ok(CheckpointingSettings {
        interval_ms,
        checkpointing_enabled,
        exactly_once,
        fail_on_checkpointing_errors,
        retention_policy,
        trigger_vertices,
        ack_vertices,
        commit_vertices,
        master_hooks_blob,
        state_backend_blob,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_builder::build_all_chains;
    use crate::hashing::hash_graph;
    use crate::node_id::StreamNodeId;
    use crate::stream_graph::{CheckpointConfig, Partitioner, StreamNode};
    use std::sync::Arc;

    struct Noop;
    impl crate::stream_graph::OperatorSpec for Noop {}

    fn graph_with(cfg: CheckpointConfig) -> StreamGraph {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.checkpoint_config = Some(cfg);
        g.add_node(StreamNode::new(StreamNodeId::new(1), "a").with_operator(Arc::new(Noop)));
        g.add_node(StreamNode::new(StreamNodeId::new(2), "b").with_operator(Arc::new(Noop)));
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Forward, None);
        g
    }

    #[test]
    fn non_positive_interval_disables_checkpointing() {
        let g = graph_with(CheckpointConfig {
            interval_ms: 0,
            ..Default::default()
        });
        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();
        let settings = assemble(&g, &result.vertices).unwrap();
        assert!(!settings.checkpointing_enabled);
        assert_eq!(settings.interval_ms, i64::MAX);
    }

    #[test]
    fn externalized_with_unset_cleanup_fails() {
        let g = graph_with(CheckpointConfig {
            interval_ms: 1000,
            externalized: true,
            cleanup_on_cancel: None,
            ..Default::default()
        });
        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();
        let err = assemble(&g, &result.vertices).unwrap_err();
        assert!(matches!(err, CompileError::InvalidExternalizedCleanup));
    }

    #[test]
    fn retention_policy_decision_table() {
        let cases = [
            (false, None, RetentionPolicy::NeverRetain),
            (true, Some(ExternalizedCleanup::DeleteOnCancel), RetentionPolicy::RetainOnFailure),
            (true, Some(ExternalizedCleanup::RetainOnCancel), RetentionPolicy::RetainOnCancellation),
        ];
        for (externalized, cleanup_on_cancel, expected) in cases {
            let g = graph_with(CheckpointConfig {
                interval_ms: 1000,
                externalized,
                cleanup_on_cancel,
                ..Default::default()
            });
            let hashes = hash_graph(&g, &[]).unwrap();
            let result = build_all_chains(&g, &hashes).unwrap();
            let settings = assemble(&g, &result.vertices).unwrap();
            assert_eq!(settings.retention_policy, expected);
        }
    }

    #[test]
    fn invalid_checkpoint_mode_is_rejected() {
        let g = graph_with(CheckpointConfig {
            interval_ms: 1000,
            mode: CheckpointingMode::Other("weird"),
            ..Default::default()
        });
        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();
        let err = assemble(&g, &result.vertices).unwrap_err();
        assert!(matches!(err, CompileError::InvalidCheckpointMode(m) if m == "weird"));
    }

    #[test]
    fn trigger_vertices_are_exactly_those_with_no_in_edges() {
        let g = graph_with(CheckpointConfig {
            interval_ms: 1000,
            ..Default::default()
        });
        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();
        let settings = assemble(&g, &result.vertices).unwrap();
        assert_eq!(settings.trigger_vertices.len(), 1);
        assert_eq!(settings.ack_vertices.len(), result.vertices.len());
        assert_eq!(settings.commit_vertices.len(), result.vertices.len());
    }
}
