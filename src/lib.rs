//! Compiles a logical **stream graph** into an executable **job graph**.
//!
//! Given a graph of user operators connected by typed edges, this crate
//! fuses chains of operators that can legally share a thread into single
//! execution vertices, assigns stable content-derived identities, wires the
//! remaining cross-vertex edges with the correct distribution mode, attaches
//! slot-sharing/co-location placement constraints, and assembles the
//! checkpointing coordination descriptor.
//!
//! The upstream graph-authoring API, the downstream runtime executor,
//! checkpoint coordination beyond the descriptor, state-backend
//! implementations, and user-function serialization beyond invoking an
//! opaque serializer are all out of scope -- this crate only compiles the
//! plan.
//!
//! ```no_run
//! use flowplan::stream_graph::{ExecutionConfig, StreamGraph, StreamNode, Partitioner};
//! use flowplan::node_id::StreamNodeId;
//! use flowplan::serialize::Postcard;
//! use std::sync::Arc;
//!
//! # #[derive(serde::Serialize)]
//! # struct Cfg;
//! let exec_config = ExecutionConfig {
//!     fail_task_on_checkpoint_error: true,
//!     user_config: Arc::new(Postcard(Cfg)),
//! };
//! let mut graph = StreamGraph::new("my-job", exec_config);
//! graph.add_node(StreamNode::new(StreamNodeId::new(1), "source"));
//! graph.add_node(StreamNode::new(StreamNodeId::new(2), "sink"));
//! graph.add_edge(StreamNodeId::new(1), StreamNodeId::new(2), Partitioner::Forward, None);
//!
//! let job = flowplan::compile(&graph)?;
//! println!("{}", job.summarize());
//! # Ok::<(), flowplan::CompileError>(())
//! ```

pub mod chain_builder;
pub mod chainability;
pub mod checkpointing;
pub mod compiler;
pub mod edge_connector;
pub mod error;
pub mod hashing;
pub mod job_graph;
pub mod node_id;
pub mod physical_edges;
pub mod placement;
pub mod serialize;
pub mod stream_config;
pub mod stream_graph;

#[cfg(test)]
mod testutil;

pub use compiler::{compile, compile_with_id, compile_with_legacy_hashers};
pub use error::CompileError;
pub use job_graph::JobGraph;
pub use node_id::{Hash128, JobVertexId, OperatorId, StreamNodeId};
pub use stream_graph::StreamGraph;
