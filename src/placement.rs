//! C6: the Placement Constraint Resolver (spec.md §4.6).
//!
//! Runs once, after every chain is built, against the populated job-vertex
//! set. Interns slot-sharing and co-location groups by name and then
//! overrides placement for every iteration head/tail pair with a freshly
//! synthesized co-location group, since those two vertices must always
//! share a slot regardless of whatever was declared on the nodes.

use crate::error::CompileError;
use crate::job_graph::{CoLocationGroup, JobVertex, SlotSharingGroup};
use crate::node_id::StreamNodeId;
use crate::stream_graph::StreamGraph;
use std::collections::HashMap;
use std::sync::Arc;

pub fn resolve_placement(
    graph: &StreamGraph,
    vertices: &mut [JobVertex],
    node_to_start: &HashMap<StreamNodeId, StreamNodeId>,
) -> Result<(), CompileError> {
    let mut slot_groups: HashMap<Arc<str>, SlotSharingGroup> = HashMap::new();
    let mut co_groups: HashMap<Arc<str>, CoLocationGroup> = HashMap::new();

    for vertex in vertices.iter_mut() {
        let node = graph.node(vertex.config.head.node_id);

        let Some(ssg_name) = &node.slot_sharing_group else {
            if node.co_location_group.is_some() {
                return Err(CompileError::IllegalCoLocation {
                    node: vertex.config.head.node_id,
                    reason: "co-location without slot sharing",
                });
            }
            continue;
        };

        let ssg_name: Arc<str> = Arc::from(ssg_name.as_ref());
        let ssg = slot_groups
            .entry(ssg_name.clone())
            .or_insert_with(|| SlotSharingGroup { name: ssg_name.clone() })
            .clone();
        vertex.slot_sharing_group = Some(ssg.clone());

        if let Some(clg_name) = &node.co_location_group {
            let clg_name: Arc<str> = Arc::from(clg_name.as_ref());
            let clg = match co_groups.get(&clg_name) {
                Some(existing) => {
                    if existing.slot_sharing_group() != &ssg {
                        return Err(CompileError::IllegalCoLocation {
                            node: vertex.config.head.node_id,
                            reason: "co-locating across slot-sharing groups",
                        });
                    }
                    existing.clone()
                }
                None => {
                    let clg = CoLocationGroup::Named {
                        name: clg_name.clone(),
                        slot_sharing_group: ssg.clone(),
                    };
                    co_groups.insert(clg_name, clg.clone());
                    clg
                }
            };
            vertex.co_location_group = Some(clg);
        }
    }

    for (iteration_id, (head, tail)) in graph.iteration_pairs().iter().enumerate() {
        let ssg = SlotSharingGroup {
            name: Arc::from(format!("__iteration_{iteration_id}")),
        };
        let clg = CoLocationGroup::Iteration {
            iteration_id: iteration_id as u64,
            slot_sharing_group: ssg.clone(),
        };
        for node_id in [*head, *tail] {
            let start = node_to_start
                .get(&node_id)
                .copied()
                .ok_or(CompileError::MissingHash(node_id))?;
            if let Some(vertex) = vertices.iter_mut().find(|v| v.config.head.node_id == start) {
                vertex.slot_sharing_group = Some(ssg.clone());
                vertex.co_location_group = Some(clg.clone());
            }
        }
    }

    Ok(())
}
