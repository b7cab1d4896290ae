//! C5: the Physical-Edge Indexer (spec.md §4.5).
//!
//! Runs once, after every chain has been built and every `connect()` call
//! has happened, so the global physical-edge list reflects build order.
//! Groups that list by target vertex and writes each group into the
//! matching vertex's `in_edges`, preserving insertion order within a group.

use crate::edge_connector::PhysicalEdge;
use crate::job_graph::JobVertex;

pub fn index_in_edges(vertices: &mut [JobVertex], physical_edges: Vec<PhysicalEdge>) {
    for PhysicalEdge { target_vertex, edge } in physical_edges {
        if let Some(v) = vertices.iter_mut().find(|v| v.id == target_vertex) {
            v.config.in_edges.push(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_graph::{JobVertexConfig, VertexKind};
    use crate::node_id::{Hash128, JobVertexId};
    use crate::stream_config::StreamConfig;
    use crate::stream_config::{OperatorCheckpointingMode, TimeCharacteristic};
    use crate::stream_graph::{Partitioner, ResourceSpec, StreamEdge};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn id(b: u8) -> JobVertexId {
        JobVertexId(Hash128([b; 16]))
    }

    fn dummy_config(node_id: crate::node_id::StreamNodeId) -> StreamConfig {
        StreamConfig {
            node_id,
            operator_name: "op".into(),
            operator: None,
            operator_id: crate::node_id::OperatorId(Hash128([0; 16])),
            buffer_timeout_ms: 0,
            input_serializers: [None, None],
            output_serializer: None,
            side_output_serializers: Vec::new(),
            non_chainable_outputs: Vec::new(),
            chainable_outputs: Vec::new(),
            time_characteristic: TimeCharacteristic::ProcessingTime,
            state_backend_present: false,
            checkpointing_enabled: false,
            checkpointing_mode: OperatorCheckpointingMode::AtLeastOnce,
            state_partitioners: [None, None],
            state_key_serializer: None,
            iteration: None,
            chain_index: 0,
            chain_start: true,
            chain_end: true,
        }
    }

    fn vertex(b: u8) -> JobVertex {
        let node_id = crate::node_id::StreamNodeId::new(b as u64);
        JobVertex {
            id: id(b),
            legacy_ids: Vec::new(),
            name: format!("v{b}"),
            kind: VertexKind::Plain,
            min_resources: ResourceSpec::default(),
            preferred_resources: ResourceSpec::default(),
            invokable_class: Arc::from("StreamTask"),
            parallelism: 1,
            max_parallelism: 128,
            slot_sharing_group: None,
            co_location_group: None,
            config: JobVertexConfig {
                head: dummy_config(node_id),
                chained_configs: HashMap::new(),
                out_edges: Vec::new(),
                in_edges: Vec::new(),
                chained_operator_ids: Vec::new(),
                chained_user_defined_operator_ids: Vec::new(),
            },
        }
    }

    fn edge(source: u8, target: u8) -> StreamEdge {
        StreamEdge {
            source: crate::node_id::StreamNodeId::new(source as u64),
            target: crate::node_id::StreamNodeId::new(target as u64),
            partitioner: Partitioner::Forward,
            side_output_tag: None,
            position: 0,
        }
    }

    #[test]
    fn groups_physical_edges_by_target_preserving_order() {
        let mut vertices = vec![vertex(1), vertex(2)];
        let physical = vec![
            PhysicalEdge {
                target_vertex: id(2),
                edge: edge(1, 2),
            },
            PhysicalEdge {
                target_vertex: id(2),
                edge: edge(3, 2),
            },
        ];
        index_in_edges(&mut vertices, physical);
        assert_eq!(vertices[0].config.in_edges.len(), 0);
        assert_eq!(vertices[1].config.in_edges.len(), 2);
        assert_eq!(vertices[1].config.in_edges[0].source.raw(), 1);
        assert_eq!(vertices[1].config.in_edges[1].source.raw(), 3);
    }
}
