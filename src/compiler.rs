//! Top-level orchestration: wires C1 through C7 into the two public entry
//! points (spec.md §6 "Entry points").

use crate::chain_builder::{self};
use crate::checkpointing;
use crate::error::CompileError;
use crate::hashing::{self, NodeHasher};
use crate::job_graph::{JobGraph, ScheduleMode};
use crate::node_id::{Hash128, JobVertexId};
use crate::physical_edges;
use crate::placement;
use crate::stream_graph::StreamGraph;
use sha2::{Digest, Sha256};

/// Compile a stream graph into a job graph, generating a job id from the
/// graph's name and resulting vertex identities.
pub fn compile(stream_graph: &StreamGraph) -> Result<JobGraph, CompileError> {
    compile_inner(stream_graph, None, &[])
}

/// Compile a stream graph into a job graph under a caller-provided job id
/// (spec.md §6: "compile(streamGraph, providedJobId) -> jobGraph").
pub fn compile_with_id(stream_graph: &StreamGraph, job_id: JobVertexId) -> Result<JobGraph, CompileError> {
    compile_inner(stream_graph, Some(job_id), &[])
}

/// Like [`compile`], but also consults the given legacy hashers so their
/// identities are retained on every job vertex (spec.md §4.1: "zero or more
/// legacy producing additional identities retained for compatibility").
/// Not part of the spec's minimal two-entry-point surface, but required to
/// exercise legacy hashing at all since the graph itself carries none.
pub fn compile_with_legacy_hashers(
    stream_graph: &StreamGraph,
    legacy_hashers: &[Box<dyn NodeHasher>],
) -> Result<JobGraph, CompileError> {
    compile_inner(stream_graph, None, legacy_hashers)
}

#[tracing::instrument(level = "debug", skip_all, fields(job_name = %stream_graph.job_name, nodes = stream_graph.len()))]
fn compile_inner(
    stream_graph: &StreamGraph,
    provided_job_id: Option<JobVertexId>,
    legacy_hashers: &[Box<dyn NodeHasher>],
) -> Result<JobGraph, CompileError> {
    let hashes = hashing::hash_graph(stream_graph, legacy_hashers)?;
    tracing::debug!(hashed = hashes.len(), "node hashing complete");

    let mut chain_result = chain_builder::build_all_chains(stream_graph, &hashes)?;
    tracing::debug!(vertices = chain_result.vertices.len(), "chain building complete");

    physical_edges::index_in_edges(&mut chain_result.vertices, chain_result.physical_edges);

    placement::resolve_placement(stream_graph, &mut chain_result.vertices, &chain_result.node_to_start)?;

    let checkpointing_settings = checkpointing::assemble(stream_graph, &chain_result.vertices)?;

    let execution_config_blob = stream_graph
        .execution_config
        .user_config
        .serialize()
        .map_err(|e| CompileError::NonSerializableExecutionConfig(e.to_string()))?;

    let job_id = provided_job_id.unwrap_or_else(|| generate_job_id(stream_graph, &chain_result.vertices));

    Ok(JobGraph {
        job_id,
        job_name: stream_graph.job_name.clone(),
        schedule_mode: ScheduleMode::Eager,
        vertices: chain_result.vertices,
        edges: chain_result.job_edges,
        execution_config_blob,
        user_artifacts: stream_graph.cached_files.clone(),
        checkpointing_settings,
    })
}

/// Derive a job id from the job name and the ordered sequence of vertex
/// identities, so two compilations of the same graph (same name, same
/// vertex order) always agree absent a caller-provided id.
fn generate_job_id(graph: &StreamGraph, vertices: &[crate::job_graph::JobVertex]) -> JobVertexId {
    let mut hasher = Sha256::new();
    hasher.update(graph.job_name.as_bytes());
    for v in vertices {
        hasher.update(v.id.0 .0);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    JobVertexId(Hash128(bytes))
}
