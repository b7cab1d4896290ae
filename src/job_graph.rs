//! The output data model: job vertices, job edges, and the job graph itself
//! (spec.md §3 "Job vertex" / "Job edge", §6 "Output").

use crate::node_id::{JobVertexId, OperatorId, StreamNodeId};
use crate::stream_config::{ChainedConfigs, StreamConfig};
use crate::stream_graph::{CachedFile, InputFormat, ResourceSpec, StreamEdge};
use std::sync::Arc;

/// A named, interned slot-sharing group. Two vertices with groups of the
/// same name are eligible to share slots at runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSharingGroup {
    pub name: Arc<str>,
}

/// A co-location constraint: corresponding parallel subtasks of every vertex
/// in the group must run in the same slot. Always bound to a slot-sharing
/// group (spec.md §4.6, §8 "co-location ⇒ slot-sharing").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoLocationGroup {
    /// Interned by name, from a node's declared co-location group.
    Named {
        name: Arc<str>,
        slot_sharing_group: SlotSharingGroup,
    },
    /// Synthesized for one iteration's head/tail pair; has no caller-visible
    /// name, only an identity unique to that pair (spec.md §4.6).
    Iteration {
        iteration_id: u64,
        slot_sharing_group: SlotSharingGroup,
    },
}

impl CoLocationGroup {
    pub fn slot_sharing_group(&self) -> &SlotSharingGroup {
        match self {
            CoLocationGroup::Named {
                slot_sharing_group, ..
            }
            | CoLocationGroup::Iteration {
                slot_sharing_group, ..
            } => slot_sharing_group,
        }
    }
}

/// What kind of vertex this is: a plain streaming vertex, or one that reads
/// from a declared input format (spec.md §4.3.1).
#[derive(Clone, Debug)]
pub enum VertexKind {
    Plain,
    InputFormat(InputFormat),
}

/// A chain's materialized configuration: the head's own `StreamConfig`, the
/// tail members' configs, the edges leaving the chain, the (later-populated)
/// in-edges, and the chained operator identities (spec.md §3 "Job vertex").
pub struct JobVertexConfig {
    pub head: StreamConfig,
    pub chained_configs: ChainedConfigs,
    /// Edges leaving the chain (populated by the chain builder, C3 step 8).
    pub out_edges: Vec<StreamEdge>,
    /// Physical in-edges to this vertex, in `connect()` order (populated by
    /// the physical-edge indexer, C5).
    pub in_edges: Vec<StreamEdge>,
    /// Identity of every chained member, head included.
    pub chained_operator_ids: Vec<OperatorId>,
    /// User-defined-operator-id override per chained member, parallel to
    /// `chained_operator_ids`; `None` where no override was declared.
    pub chained_user_defined_operator_ids: Vec<Option<OperatorId>>,
}

/// A single execution vertex: one fused chain of stream operators
/// (spec.md §3 "Job vertex").
pub struct JobVertex {
    pub id: JobVertexId,
    /// Additional identities from legacy hashers, retained for backward
    /// identity compatibility (spec.md §3 "Legacy hasher").
    pub legacy_ids: Vec<JobVertexId>,
    pub name: String,
    pub kind: VertexKind,
    pub min_resources: ResourceSpec,
    pub preferred_resources: ResourceSpec,
    pub invokable_class: Arc<str>,
    pub parallelism: i32,
    pub max_parallelism: i32,
    pub slot_sharing_group: Option<SlotSharingGroup>,
    pub co_location_group: Option<CoLocationGroup>,
    pub config: JobVertexConfig,
}

impl JobVertex {
    /// Number of declared inputs, used by the edge connector to bump a
    /// running count as edges are wired (spec.md §4.4).
    pub fn input_count(&self) -> usize {
        self.config.in_edges.len()
    }
}

/// How a job edge distributes elements between two vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributionPattern {
    Pointwise,
    AllToAll,
}

/// Result-partition type for a job edge. The core always emits
/// `PipelinedBounded` (spec.md §3 "Job edge").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultPartitionType {
    PipelinedBounded,
}

/// A wired connection between two chain heads (spec.md §3 "Job edge").
#[derive(Clone, Debug)]
pub struct JobEdge {
    pub source: JobVertexId,
    pub target: JobVertexId,
    pub distribution: DistributionPattern,
    pub result_partition_type: ResultPartitionType,
    /// Display label derived from the originating partitioner.
    pub ship_strategy_name: String,
}

/// Fixed at `Eager` for every job this compiler produces (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleMode {
    Eager,
}

/// The checkpointing coordination descriptor assembled by C7; see
/// [`crate::checkpointing::CheckpointingSettings`] for the concrete type.
pub use crate::checkpointing::CheckpointingSettings;

/// The compiled output (spec.md §6 "Output").
pub struct JobGraph {
    pub job_id: JobVertexId,
    pub job_name: String,
    pub schedule_mode: ScheduleMode,
    pub vertices: Vec<JobVertex>,
    pub edges: Vec<JobEdge>,
    /// Serialized execution config blob (spec.md §6: "failure to serialize
    /// raises a configuration error").
    pub execution_config_blob: Vec<u8>,
    pub user_artifacts: Vec<CachedFile>,
    pub checkpointing_settings: CheckpointingSettings,
}

impl JobGraph {
    pub fn vertex(&self, id: JobVertexId) -> Option<&JobVertex> {
        self.vertices.iter().find(|v| v.id == id)
    }

    /// Look up a vertex that was originally identified by one of its legacy
    /// hashes, a secondary identity retained for backward compatibility
    /// with previously persisted state (spec.md §3).
    pub fn vertex_by_any_id(&self, id: JobVertexId) -> Option<&JobVertex> {
        self.vertices
            .iter()
            .find(|v| v.id == id || v.legacy_ids.contains(&id))
    }

    /// A small one-line-per-vertex text dump, useful for debugging and
    /// snapshot-style tests; not part of the spec's contract.
    pub fn summarize(&self) -> String {
        let mut out = String::new();
        for v in &self.vertices {
            out.push_str(&format!(
                "{} [{}] par={} ins={}\n",
                v.name,
                v.id,
                v.parallelism,
                v.input_count()
            ));
        }
        out
    }

    /// Vertices with no physical in-edges -- the checkpoint trigger set and
    /// the externalized-checkpoint "all source vertices" set share this
    /// definition (spec.md §4.7, §8).
    pub fn input_vertices(&self) -> Vec<JobVertexId> {
        self.vertices
            .iter()
            .filter(|v| v.config.in_edges.is_empty())
            .map(|v| v.id)
            .collect()
    }
}
