//! Compile-time error kinds.
//!
//! Every error the compiler can produce is fatal: compilation aborts and no
//! partial job graph is returned (spec.md §7). Each variant names the
//! offending node or option so a caller can report something actionable.

use crate::node_id::StreamNodeId;
use thiserror::Error;

/// All ways `compile()` can fail.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A node was referenced before hashing completed; either the graph has a
    /// cycle the hasher couldn't resolve (outside of a declared iteration
    /// pair), or a traversal bug left some predecessor unhashed.
    #[error("node {0} was referenced before its hash was resolved (unexpected cycle or traversal bug)")]
    MissingHash(StreamNodeId),

    /// Co-location was requested without a slot-sharing group, or across two
    /// distinct slot-sharing groups.
    #[error("illegal co-location for node {node}: {reason}")]
    IllegalCoLocation {
        /// The node whose co-location request is invalid.
        node: StreamNodeId,
        /// Human-readable explanation (`"co-location without slot sharing"` or
        /// `"co-locating across slot-sharing groups"`).
        reason: &'static str,
    },

    /// The graph's checkpointing mode is neither exactly-once nor
    /// at-least-once.
    #[error("invalid checkpoint mode: {0}")]
    InvalidCheckpointMode(String),

    /// Externalized checkpoints are enabled but the cleanup policy on cancel
    /// was left unset.
    #[error("externalized checkpoints enabled but cleanup-on-cancel policy is unset")]
    InvalidExternalizedCleanup,

    /// The graph's execution config failed eager serialization.
    #[error("execution config failed to serialize: {0}")]
    NonSerializableExecutionConfig(String),

    /// A master checkpoint hook failed eager serialization.
    #[error("checkpoint hook for node {node} failed to serialize: {source}")]
    NonSerializableHook {
        /// The node whose operator declared the hook.
        node: StreamNodeId,
        /// Underlying serialization failure.
        source: String,
    },

    /// The state backend failed eager serialization.
    #[error("state backend failed to serialize: {0}")]
    NonSerializableStateBackend(String),
}
