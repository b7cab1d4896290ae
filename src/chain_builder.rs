//! C3: the Chain Builder (spec.md §4.3, §4.3.1, §4.3.2).
//!
//! The core of the compiler. Walks the stream graph depth-first from its
//! roots, fusing chainable edges into a single job vertex per chain and
//! recursing into a fresh chain wherever an edge isn't chainable. Mirrors
//! the shape of the teacher's `planner.rs` linearizer (walk a graph,
//! recurse into children, accumulate into an owned structure) generalized
//! from a single linear chain to a branching DAG of chains.

use crate::chainability::is_chainable;
use crate::edge_connector::{self, PhysicalEdge};
use crate::error::CompileError;
use crate::hashing::NodeHashes;
use crate::job_graph::{JobEdge, JobVertex, JobVertexConfig, VertexKind};
use crate::node_id::{JobVertexId, OperatorId, StreamNodeId};
use crate::stream_config::{ChainedConfigs, OperatorCheckpointingMode, StreamConfig, TimeCharacteristic};
use crate::stream_graph::{ResourceSpec, StreamEdge, StreamGraph, StreamNode};
use std::collections::{HashMap, HashSet};

/// A chain vertex with no declared parallelism inherits this default
/// (spec.md §4.3.1: "else keep the vertex's default").
const DEFAULT_PARALLELISM: i32 = 1;

/// Everything the walk accumulates across the whole graph, threaded through
/// every recursive call by mutable reference.
struct ChainAccumulator {
    built: HashSet<StreamNodeId>,
    /// start id -> chain members, in depth-first preorder (head first,
    /// chainable children before non-chainable ones start a new entry).
    member_order: HashMap<StreamNodeId, Vec<StreamNodeId>>,
    /// Every node's chain-start id, including the head's own (start ==
    /// itself); lets placement (C6) find which vertex a node -- head or
    /// tail member -- ended up fused into.
    node_to_start: HashMap<StreamNodeId, StreamNodeId>,
    member_name: HashMap<StreamNodeId, String>,
    member_min_res: HashMap<StreamNodeId, ResourceSpec>,
    member_pref_res: HashMap<StreamNodeId, ResourceSpec>,
    /// start id -> {member id -> its populated config}, tail members only.
    tail_configs: HashMap<StreamNodeId, ChainedConfigs>,
    vertices: Vec<JobVertex>,
    physical_edges: Vec<PhysicalEdge>,
    job_edges: Vec<JobEdge>,
}

impl ChainAccumulator {
    fn new() -> Self {
        Self {
            built: HashSet::new(),
            member_order: HashMap::new(),
            node_to_start: HashMap::new(),
            member_name: HashMap::new(),
            member_min_res: HashMap::new(),
            member_pref_res: HashMap::new(),
            tail_configs: HashMap::new(),
            vertices: Vec::new(),
            physical_edges: Vec::new(),
            job_edges: Vec::new(),
        }
    }
}

/// Result of running C3 over the whole graph.
pub struct ChainBuildResult {
    pub vertices: Vec<JobVertex>,
    pub physical_edges: Vec<PhysicalEdge>,
    pub job_edges: Vec<JobEdge>,
    pub node_to_start: HashMap<StreamNodeId, StreamNodeId>,
}

/// Entry point: build every chain in the graph, starting from each root in
/// ascending id order (spec.md §4.3 "Entry").
pub fn build_all_chains(
    graph: &StreamGraph,
    hashes: &HashMap<StreamNodeId, NodeHashes>,
) -> Result<ChainBuildResult, CompileError> {
    let mut acc = ChainAccumulator::new();
    for root in graph.root_ids() {
        build(graph, hashes, root, root, 0, &mut acc)?;
    }
    Ok(ChainBuildResult {
        vertices: acc.vertices,
        physical_edges: acc.physical_edges,
        job_edges: acc.job_edges,
        node_to_start: acc.node_to_start,
    })
}

/// Recursive worker. Returns the transitive out-edges accumulated for
/// `current_id`'s own position in the chain (spec.md §4.3 steps 1-3).
fn build(
    graph: &StreamGraph,
    hashes: &HashMap<StreamNodeId, NodeHashes>,
    start_id: StreamNodeId,
    current_id: StreamNodeId,
    chain_index: usize,
    acc: &mut ChainAccumulator,
) -> Result<Vec<StreamEdge>, CompileError> {
    if current_id == start_id && acc.built.contains(&start_id) {
        return Ok(Vec::new());
    }
    acc.member_order.entry(start_id).or_default().push(current_id);
    acc.node_to_start.insert(current_id, start_id);

    let node = graph.node(current_id);
    let out_edges = graph.out_edges(current_id);
    let mut chainable = Vec::new();
    let mut non_chainable = Vec::new();
    for e in out_edges {
        if is_chainable(e, graph) {
            chainable.push(e);
        } else {
            non_chainable.push(e);
        }
    }

    let mut transitive_out = Vec::new();
    for e in &chainable {
        let child_out = build(graph, hashes, start_id, e.target, chain_index + 1, acc)?;
        transitive_out.extend(child_out);
    }
    for e in &non_chainable {
        transitive_out.push((*e).clone());
        build(graph, hashes, e.target, e.target, 0, acc)?;
    }

    let name = chained_name(node, &chainable, acc);
    let (min_res, pref_res) = merged_resources(node, &chainable, acc);
    acc.member_name.insert(current_id, name.clone());
    acc.member_min_res.insert(current_id, min_res);
    acc.member_pref_res.insert(current_id, pref_res);

    let node_hashes = hashes
        .get(&current_id)
        .ok_or(CompileError::MissingHash(current_id))?;
    let operator_id = OperatorId::from(node_hashes.primary);

    let mut config = populate_stream_config(graph, node, current_id, chain_index, &chainable, &non_chainable);
    config.operator_id = operator_id;
    config.chain_end = chainable.is_empty();

    if current_id == start_id {
        config.chain_start = true;
        config.chain_index = 0;
        materialize_job_vertex(graph, hashes, start_id, name, min_res, pref_res, config, &transitive_out, acc)?;
    } else {
        config.chain_start = false;
        config.chain_index = chain_index;
        acc.tail_configs
            .entry(start_id)
            .or_default()
            .insert(current_id, config);
    }

    Ok(transitive_out)
}

/// Spec.md §4.3 step 5, name half: `op` / `op -> child` / `op -> (a, b, …)`.
fn chained_name(node: &StreamNode, chainable: &[&StreamEdge], acc: &ChainAccumulator) -> String {
    match chainable {
        [] => node.operator_name.clone(),
        [only] => format!("{} -> {}", node.operator_name, acc.member_name[&only.target]),
        many => {
            let children: Vec<&str> = many.iter().map(|e| acc.member_name[&e.target].as_str()).collect();
            format!("{} -> ({})", node.operator_name, children.join(", "))
        }
    }
}

/// Spec.md §4.3 step 5, resources half: elementwise max across the node's
/// own spec and every chainable child's already-merged spec.
fn merged_resources(node: &StreamNode, chainable: &[&StreamEdge], acc: &ChainAccumulator) -> (ResourceSpec, ResourceSpec) {
    let mut min_res = node.min_resources;
    let mut pref_res = node.preferred_resources;
    for e in chainable {
        min_res = min_res.merge(acc.member_min_res[&e.target]);
        pref_res = pref_res.merge(acc.member_pref_res[&e.target]);
    }
    (min_res, pref_res)
}

/// Spec.md §4.3.2: "per-side-output serializers (iterated from both
/// chainable and non-chainable outputs that carry a side-output tag)".
/// Walks both output groups in order, keeping only edges with a tag, and
/// resolves each tag against the node's declared tag -> serializer map.
fn side_output_serializers(
    node: &StreamNode,
    chainable: &[&StreamEdge],
    non_chainable: &[&StreamEdge],
) -> Vec<(std::sync::Arc<str>, crate::stream_graph::TypeSerializer)> {
    chainable
        .iter()
        .chain(non_chainable.iter())
        .filter_map(|e| e.side_output_tag.as_ref())
        .filter_map(|tag| {
            node.side_output_serializers
                .iter()
                .find(|(t, _)| t == tag)
                .cloned()
        })
        .collect()
}

/// Spec.md §4.3.2: per-member stream-config population, common to both the
/// chain head and every tail member.
fn populate_stream_config(
    graph: &StreamGraph,
    node: &StreamNode,
    node_id: StreamNodeId,
    chain_index: usize,
    chainable: &[&StreamEdge],
    non_chainable: &[&StreamEdge],
) -> StreamConfig {
    StreamConfig {
        node_id,
        operator_name: node.operator_name.clone(),
        operator: node.operator.clone(),
        // Overwritten by the caller immediately after this returns, once
        // the node's hash is known.
        operator_id: OperatorId::from(crate::node_id::Hash128([0; 16])),
        buffer_timeout_ms: node.buffer_timeout_ms,
        input_serializers: node.input_serializers.clone(),
        output_serializer: node.output_serializer.clone(),
        side_output_serializers: side_output_serializers(node, chainable, non_chainable),
        non_chainable_outputs: non_chainable.iter().map(|e| (*e).clone()).collect(),
        chainable_outputs: chainable.iter().map(|e| (*e).clone()).collect(),
        time_characteristic: TimeCharacteristic::ProcessingTime,
        state_backend_present: graph.state_backend.is_some(),
        checkpointing_enabled: node.checkpointing_enabled,
        checkpointing_mode: if node.checkpointing_enabled {
            OperatorCheckpointingMode::ExactlyOnce
        } else {
            OperatorCheckpointingMode::AtLeastOnce
        },
        state_partitioners: node.state_partitioners.clone(),
        state_key_serializer: node.state_key_serializer.clone(),
        iteration: node.iteration.clone(),
        chain_index,
        chain_start: false,
        chain_end: false,
    }
}

/// Spec.md §4.3.1: job-vertex materialization, run once per chain at the
/// moment its head finishes processing.
#[allow(clippy::too_many_arguments)]
fn materialize_job_vertex(
    graph: &StreamGraph,
    hashes: &HashMap<StreamNodeId, NodeHashes>,
    start_id: StreamNodeId,
    name: String,
    min_res: ResourceSpec,
    pref_res: ResourceSpec,
    head_config: StreamConfig,
    transitive_out: &[StreamEdge],
    acc: &mut ChainAccumulator,
) -> Result<(), CompileError> {
    let node = graph.node(start_id);
    let node_hashes = hashes
        .get(&start_id)
        .ok_or(CompileError::MissingHash(start_id))?;
    let job_vertex_id = JobVertexId::from(node_hashes.primary);
    let legacy_ids = node_hashes.legacy.iter().filter_map(|h| h.map(JobVertexId::from)).collect();

    let kind = match &node.input_format {
        Some(fmt) => VertexKind::InputFormat(fmt.clone()),
        None => VertexKind::Plain,
    };
    let parallelism = if node.parallelism > 0 {
        node.parallelism
    } else {
        DEFAULT_PARALLELISM
    };

    let chained_configs = acc.tail_configs.remove(&start_id).unwrap_or_default();
    let member_order = acc.member_order.remove(&start_id).unwrap_or_default();

    let mut chained_operator_ids = Vec::with_capacity(member_order.len());
    let mut chained_user_defined_operator_ids = Vec::with_capacity(member_order.len());
    for member_id in &member_order {
        let operator_id = if *member_id == start_id {
            head_config.operator_id
        } else {
            chained_configs[member_id].operator_id
        };
        chained_operator_ids.push(operator_id);
        chained_user_defined_operator_ids.push(graph.node(*member_id).user_hash_override.map(OperatorId::from));
    }

    let job_vertex = JobVertex {
        id: job_vertex_id,
        legacy_ids,
        name,
        kind,
        min_resources: min_res,
        preferred_resources: pref_res,
        invokable_class: node.invokable_class.clone(),
        parallelism,
        max_parallelism: node.max_parallelism,
        slot_sharing_group: None,
        co_location_group: None,
        config: JobVertexConfig {
            head: head_config,
            chained_configs,
            out_edges: transitive_out.to_vec(),
            in_edges: Vec::new(),
            chained_operator_ids,
            chained_user_defined_operator_ids,
        },
    };

    acc.vertices.push(job_vertex);
    acc.built.insert(start_id);

    for edge in transitive_out {
        let down_hashes = hashes
            .get(&edge.target)
            .ok_or(CompileError::MissingHash(edge.target))?;
        let down_vertex = JobVertexId::from(down_hashes.primary);
        edge_connector::connect(
            &mut acc.physical_edges,
            &mut acc.job_edges,
            job_vertex_id,
            down_vertex,
            edge.clone(),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::hash_graph;
    use crate::node_id::StreamNodeId;
    use crate::stream_graph::{Partitioner, StreamNode};
    use std::sync::Arc;

    struct Noop;
    impl crate::stream_graph::OperatorSpec for Noop {}

    fn op(name: &str, id: u64) -> StreamNode {
        StreamNode::new(StreamNodeId::new(id), name).with_operator(Arc::new(Noop))
    }

    #[test]
    fn a_fully_chainable_linear_graph_becomes_one_vertex() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.add_node(op("source", 1));
        g.add_node(op("map", 2));
        g.add_node(op("sink", 3));
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Forward, None);
        g.add_edge(StreamNodeId::new(2), StreamNodeId::new(3), Partitioner::Forward, None);

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        assert_eq!(result.vertices.len(), 1);
        assert_eq!(result.vertices[0].name, "source -> map -> sink");
        assert_eq!(result.vertices[0].config.chained_configs.len(), 2);
        assert!(result.job_edges.is_empty());
    }

    #[test]
    fn a_parallelism_break_starts_a_new_chain() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.add_node(op("source", 1).with_parallelism(1));
        g.add_node(op("map", 2).with_parallelism(4));
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Forward, None);

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        assert_eq!(result.vertices.len(), 2);
        assert_eq!(result.job_edges.len(), 1);
        assert_eq!(result.job_edges[0].ship_strategy_name, "FORWARD");
    }

    #[test]
    fn a_broadcast_edge_is_all_to_all_and_not_chained() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.add_node(op("source", 1));
        g.add_node(op("sink", 2));
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Broadcast, None);

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        assert_eq!(result.vertices.len(), 2);
        use crate::job_graph::DistributionPattern;
        assert_eq!(result.job_edges[0].distribution, DistributionPattern::AllToAll);
    }

    #[test]
    fn a_fan_in_node_cannot_chain_onto_either_predecessor() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.add_node(op("a", 1));
        g.add_node(op("b", 2));
        g.add_node(op("join", 3));
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(3), Partitioner::Forward, None);
        g.add_edge(StreamNodeId::new(2), StreamNodeId::new(3), Partitioner::Forward, None);

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        assert_eq!(result.vertices.len(), 3);
        assert_eq!(result.job_edges.len(), 2);
    }

    #[test]
    fn a_diamond_reaches_the_shared_downstream_chain_exactly_once() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.add_node(op("source", 1));
        g.add_node(op("left", 2));
        g.add_node(op("right", 3));
        g.add_node(op("join", 4));
        // Both fan-out edges use Rebalance, so neither chains and "join"
        // ends up with two distinct incoming edges from two distinct chains.
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Rebalance, None);
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(3), Partitioner::Rebalance, None);
        g.add_edge(StreamNodeId::new(2), StreamNodeId::new(4), Partitioner::Forward, None);
        g.add_edge(StreamNodeId::new(3), StreamNodeId::new(4), Partitioner::Forward, None);

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        // source, left, right, join -- "join" has two incoming edges so C2
        // condition 1 fails and it never chains onto either predecessor.
        assert_eq!(result.vertices.len(), 4);
    }

    #[test]
    fn config_carries_the_operator_object_through() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        g.add_node(op("source", 1));

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        assert!(result.vertices[0].config.head.operator.is_some());
    }

    #[test]
    fn side_output_serializers_are_resolved_from_tagged_edges_only() {
        use crate::stream_graph::TypeSerializer;

        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let mut source = op("source", 1);
        source.side_output_serializers = vec![
            (Arc::from("late"), TypeSerializer::named("LateEvent")),
            (Arc::from("unused"), TypeSerializer::named("NeverEmitted")),
        ];
        g.add_node(source);
        g.add_node(op("main-sink", 2));
        g.add_node(op("late-sink", 3));
        g.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Forward, None);
        g.add_edge(
            StreamNodeId::new(1),
            StreamNodeId::new(3),
            Partitioner::Rebalance,
            Some(Arc::from("late")),
        );

        let hashes = hash_graph(&g, &[]).unwrap();
        let result = build_all_chains(&g, &hashes).unwrap();

        // "source" chains onto "main-sink" (Forward) but not onto
        // "late-sink" (Rebalance, tagged "late"); only the tagged edge's
        // serializer should surface, and the untagged "unused" entry in the
        // node's map (no matching output edge) must not appear.
        let head = &result.vertices.iter().find(|v| v.name.starts_with("source")).unwrap().config.head;
        assert_eq!(head.side_output_serializers.len(), 1);
        assert_eq!(head.side_output_serializers[0].0.as_ref(), "late");
    }
}
