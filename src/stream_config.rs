//! Per-operator configuration (spec.md §4.3.2).
//!
//! Every member of a chain -- the head and every tail -- gets one
//! `StreamConfig` populated by the chain builder. The head's own
//! `StreamConfig` is embedded directly in its job vertex; each tail's is
//! stashed in the head's `chained_configs` map (spec.md §3 "Job vertex").

use crate::node_id::{OperatorId, StreamNodeId};
use crate::stream_graph::{IterationInfo, KeySelector, OperatorSpec, StreamEdge, TypeSerializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Time semantics a node's processing is evaluated under. The compiler
/// never interprets these; they're carried through for the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimeCharacteristic {
    #[default]
    ProcessingTime,
    IngestionTime,
    EventTime,
}

/// The checkpointing mode recorded on a single operator's config, derived
/// from whether checkpointing is enabled on the node (spec.md §4.3.2:
/// "EXACTLY_ONCE if enabled else AT_LEAST_ONCE").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorCheckpointingMode {
    ExactlyOnce,
    AtLeastOnce,
}

/// One operator's worth of configuration, as recorded by the chain builder.
#[derive(Clone)]
pub struct StreamConfig {
    pub node_id: StreamNodeId,
    pub operator_name: String,
    pub operator_id: OperatorId,
    /// The operator object itself, carried through so the downstream runtime
    /// can reconstruct what this vertex executes (spec.md §4.3.2). `None`
    /// only for nodes that never carried one (e.g. test fixtures).
    pub operator: Option<Arc<dyn OperatorSpec>>,
    pub buffer_timeout_ms: i64,
    pub input_serializers: [Option<TypeSerializer>; 2],
    pub output_serializer: Option<TypeSerializer>,
    pub side_output_serializers: Vec<(Arc<str>, TypeSerializer)>,
    pub non_chainable_outputs: Vec<StreamEdge>,
    pub chainable_outputs: Vec<StreamEdge>,
    pub time_characteristic: TimeCharacteristic,
    pub state_backend_present: bool,
    pub checkpointing_enabled: bool,
    pub checkpointing_mode: OperatorCheckpointingMode,
    pub state_partitioners: [Option<KeySelector>; 2],
    pub state_key_serializer: Option<TypeSerializer>,
    pub iteration: Option<IterationInfo>,
    /// 0 for the chain head, depth-in-chain for tail members.
    pub chain_index: usize,
    pub chain_start: bool,
    pub chain_end: bool,
}

impl StreamConfig {
    pub fn non_chainable_output_count(&self) -> usize {
        self.non_chainable_outputs.len()
    }
}

/// The map a chain head embeds for its tail members (spec.md §3: "a map
/// {member-node-id -> stream-config} for the tail members").
pub type ChainedConfigs = HashMap<StreamNodeId, StreamConfig>;
