//! C4: the Edge Connector (spec.md §4.4).
//!
//! Invoked once per transitive out-edge of a chain head, after that chain
//! and every chain it points into already exist. Wires the two chain heads
//! together with a distribution pattern and a fixed result-partition type,
//! and appends the original edge to the global physical-edge list C5 later
//! groups by target.

use crate::job_graph::{DistributionPattern, JobEdge, ResultPartitionType};
use crate::node_id::JobVertexId;
use crate::stream_graph::StreamEdge;

/// One entry in the global, build-order physical-edge list (spec.md §4.5:
/// "Run after all chains built and all connects performed, so the ordering
/// reflects the build order").
pub struct PhysicalEdge {
    pub target_vertex: JobVertexId,
    pub edge: StreamEdge,
}

/// Wire `head` to the chain headed by `edge.target`.
///
/// `down_vertex` is that downstream chain's job vertex id, already known
/// from its primary hash by the time any edge reaches here (spec.md §4.3
/// step 3 always materializes the downstream chain before the upstream
/// head's step 8 runs `connect`).
pub fn connect(
    physical_edges: &mut Vec<PhysicalEdge>,
    job_edges: &mut Vec<JobEdge>,
    head: JobVertexId,
    down_vertex: JobVertexId,
    edge: StreamEdge,
) {
    let distribution = if edge.distribution_is_pointwise() {
        DistributionPattern::Pointwise
    } else {
        DistributionPattern::AllToAll
    };

    tracing::debug!(
        source = %head,
        target = %down_vertex,
        ship_strategy = edge.partitioner.display_name(),
        ?distribution,
        "connected chain heads"
    );

    job_edges.push(JobEdge {
        source: head,
        target: down_vertex,
        distribution,
        result_partition_type: ResultPartitionType::PipelinedBounded,
        ship_strategy_name: edge.partitioner.display_name().to_string(),
    });

    physical_edges.push(PhysicalEdge {
        target_vertex: down_vertex,
        edge,
    });
}
