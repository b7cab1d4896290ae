//! C1: the Stable Node Hasher (spec.md §4.1).
//!
//! Given a [`StreamGraph`], assigns every node a 16-byte content hash such
//! that two submissions of the same logical graph produce identical hashes.
//! The BFS-and-fold shape below generalizes the digest-folding idiom the
//! teacher used in `checkpoint.rs` (`compute_checksum`/`generate_pipeline_id`,
//! both "feed a handful of fields into a `Sha256` and truncate") from "hash
//! one config string" to "fold a node's own metadata with its predecessors'
//! hashes, in traversal order."
//!
//! [`CurrentHasher`] is the primary identity source; [`LegacyHasher`] is
//! retained purely for backward-compatible secondary identities and uses a
//! deliberately different (non-cryptographic) algorithm, since nothing about
//! the spec requires legacy identities to be collision-resistant -- only
//! reproducible.

use crate::error::CompileError;
use crate::node_id::{Hash128, StreamNodeId};
use crate::stream_graph::{ChainingStrategy, StreamGraph};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// Everything a [`NodeHasher`] needs to fold a single node into a hash.
pub struct FoldContext<'a> {
    pub node_id: StreamNodeId,
    pub chaining_strategy: ChainingStrategy,
    pub user_hash_override: Option<Hash128>,
    /// Visitation order, 0-based, in the order nodes are popped off the BFS
    /// queue (spec.md §4.1 item (a)).
    pub visitation_index: u64,
    /// Already-computed predecessor hashes, in the node's in-edge order,
    /// with the iteration back-edge (if any) excluded.
    pub predecessor_hashes: &'a [Hash128],
}

/// A hashing algorithm that can fold one node's context into a stable hash.
/// Implementations are small, swappable strategy objects rather than an
/// inheritance hierarchy, the same shape as the teacher's `DynOp` trait.
pub trait NodeHasher: Send + Sync {
    fn fold(&self, ctx: FoldContext<'_>) -> Hash128;
}

/// The primary, authoritative hasher.
pub struct CurrentHasher;

impl NodeHasher for CurrentHasher {
    fn fold(&self, ctx: FoldContext<'_>) -> Hash128 {
        let mut hasher = Sha256::new();
        hasher.update(b"current\0");
        hasher.update(ctx.visitation_index.to_le_bytes());
        hasher.update([chaining_strategy_tag(ctx.chaining_strategy)]);
        match ctx.user_hash_override {
            Some(h) => {
                hasher.update([1u8]);
                hasher.update(h.0);
            }
            None => hasher.update([0u8]),
        }
        for pred in ctx.predecessor_hashes {
            hasher.update(pred.0);
        }
        truncate(hasher.finalize())
    }
}

/// A secondary hasher kept only so state keyed under an older identity
/// scheme can still be located. Uses a simple, non-cryptographic FNV-1a
/// fold so it is obviously distinguishable from [`CurrentHasher`]'s output.
pub struct LegacyHasher;

impl NodeHasher for LegacyHasher {
    fn fold(&self, ctx: FoldContext<'_>) -> Hash128 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
        let mut h: u64 = FNV_OFFSET;
        let mut fold_bytes = |bytes: &[u8]| {
            for &b in bytes {
                h ^= u64::from(b);
                h = h.wrapping_mul(FNV_PRIME);
            }
        };
        fold_bytes(b"legacy");
        fold_bytes(&ctx.visitation_index.to_le_bytes());
        fold_bytes(&[chaining_strategy_tag(ctx.chaining_strategy)]);
        if let Some(over) = ctx.user_hash_override {
            fold_bytes(&over.0);
        }
        for pred in ctx.predecessor_hashes {
            fold_bytes(&pred.0);
        }
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&h.to_le_bytes());
        out[8..].copy_from_slice(&h.rotate_left(17).to_le_bytes());
        Hash128(out)
    }
}

fn chaining_strategy_tag(s: ChainingStrategy) -> u8 {
    match s {
        ChainingStrategy::Always => 0,
        ChainingStrategy::Head => 1,
        ChainingStrategy::Never => 2,
    }
}

fn truncate(full: impl AsRef<[u8]>) -> Hash128 {
    let mut out = [0u8; 16];
    out.copy_from_slice(&full.as_ref()[..16]);
    Hash128(out)
}

/// Per-node hash bundle: the primary identity plus one slot per registered
/// legacy hasher. A `None` legacy slot means that hasher never resolved this
/// node -- tolerated per spec.md §9 ("sparse legacy maps").
#[derive(Clone, Debug)]
pub struct NodeHashes {
    pub primary: Hash128,
    pub legacy: Vec<Option<Hash128>>,
}

/// Run one hasher's BFS to completion over the whole graph, from sources in
/// ascending id order, deferring any node until all of its (non-back-edge)
/// predecessors are hashed.
///
/// Returns [`CompileError::MissingHash`] naming the first node that could
/// never be resolved -- an unexpected cycle outside a declared iteration
/// pair, or a traversal bug.
fn hash_with(graph: &StreamGraph, hasher: &dyn NodeHasher) -> Result<HashMap<StreamNodeId, Hash128>, CompileError> {
    let mut resolved: HashMap<StreamNodeId, Hash128> = HashMap::new();
    let mut queue: VecDeque<StreamNodeId> = graph.root_ids().into_iter().collect();
    let mut queued: std::collections::HashSet<StreamNodeId> = queue.iter().copied().collect();
    let mut visitation_index: u64 = 0;
    let mut deferred_rounds_without_progress = 0usize;
    let total = graph.len();

    while let Some(id) = queue.pop_front() {
        let preds = graph.hash_predecessor_edges(id);
        let mut predecessor_hashes = Vec::with_capacity(preds.len());
        let mut all_ready = true;
        for e in &preds {
            match resolved.get(&e.source) {
                Some(h) => predecessor_hashes.push(*h),
                None => {
                    all_ready = false;
                    break;
                }
            }
        }

        if !all_ready {
            // Not all predecessors hashed yet; requeue behind whatever is
            // still in flight and try again later.
            queue.push_back(id);
            deferred_rounds_without_progress += 1;
            if deferred_rounds_without_progress > queue.len().max(1) * total.max(1) {
                return Err(CompileError::MissingHash(id));
            }
            continue;
        }
        deferred_rounds_without_progress = 0;

        let node = graph.node(id);
        let hash = hasher.fold(FoldContext {
            node_id: id,
            chaining_strategy: node.chaining_strategy,
            user_hash_override: node.user_hash_override,
            visitation_index,
            predecessor_hashes: &predecessor_hashes,
        });
        visitation_index += 1;
        resolved.insert(id, hash);

        for out in graph.out_edges(id) {
            if graph.is_iteration_backedge(out) {
                continue;
            }
            if !resolved.contains_key(&out.target) && queued.insert(out.target) {
                queue.push_back(out.target);
            } else if !resolved.contains_key(&out.target) {
                // Already queued; nothing to do.
            }
        }
    }

    if resolved.len() != total {
        // Some node was never reachable from a source and thus never
        // queued at all.
        let missing = graph
            .node_ids()
            .find(|id| !resolved.contains_key(id))
            .expect("resolved.len() != total implies a missing id exists");
        return Err(CompileError::MissingHash(missing));
    }

    Ok(resolved)
}

/// Compute the full node -> hash map for both the primary hasher and every
/// registered legacy hasher.
pub fn hash_graph(
    graph: &StreamGraph,
    legacy_hashers: &[Box<dyn NodeHasher>],
) -> Result<HashMap<StreamNodeId, NodeHashes>, CompileError> {
    let primary_map = hash_with(graph, &CurrentHasher)?;
    let mut legacy_maps = Vec::with_capacity(legacy_hashers.len());
    for hasher in legacy_hashers {
        legacy_maps.push(hash_with(graph, hasher.as_ref())?);
    }

    let mut out = HashMap::with_capacity(primary_map.len());
    for (id, primary) in primary_map {
        let legacy = legacy_maps.iter().map(|m| m.get(&id).copied()).collect();
        out.insert(id, NodeHashes { primary, legacy });
    }
    Ok(out)
}
