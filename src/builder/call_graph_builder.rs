// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! This module provides essential functions for resolving call targets.

use log::*;

use crate::graph::call_graph::{CallGraph, CallType};
use crate::graph::constraint_graph::ConstraintGraph;
use crate::graph::function::{CallSiteId, FuncId};
use crate::pta::{DiffPTDataTy, NodeId};
use crate::pts_set::points_to::PointsToSet;

/// Returns the functions `fn_ptr` may point to, ordered by `FuncId`.
///
/// Pointees that are not function objects are ignored.
pub fn resolve_call_targets(consg: &ConstraintGraph, pt_data: &DiffPTDataTy, fn_ptr: NodeId) -> Vec<FuncId> {
    let mut targets: Vec<FuncId> = pt_data
        .get_pts(fn_ptr)
        .iter()
        .filter_map(|pointee| consg.get_function(pointee))
        .collect();
    targets.sort();
    targets
}

/// Adds a call graph edge for every function an indirect callsite may invoke,
/// according to the solved points-to data.
///
/// Callsites without a caller, function pointers with an empty points-to set
/// and pointees that are not functions are skipped. Returns the number of
/// call graph edges that were not present before, so running this again on
/// the same data returns 0.
pub fn resolve_indirect_calls(
    consg: &ConstraintGraph,
    pt_data: &DiffPTDataTy,
    call_graph: &mut CallGraph<FuncId, CallSiteId>,
) -> usize {
    let mut num_new_edges = 0;
    for &(callsite, fn_ptr) in consg.get_indirect_callsites() {
        call_graph.set_callsite_type(callsite, CallType::Indirect);

        let Some(caller) = consg.call_site(callsite).caller else {
            debug!("Skipping callsite {} without a caller", consg.call_site(callsite).label);
            continue;
        };

        let pts = pt_data.get_pts(fn_ptr);
        if pts.is_empty() {
            debug!(
                "Unresolved callsite {}: {} points to nothing",
                consg.call_site(callsite).label,
                consg.node_name(fn_ptr)
            );
            continue;
        }

        for pointee in &pts {
            match consg.get_function(pointee) {
                Some(callee) => {
                    if call_graph.add_edge(callsite, caller, callee) {
                        num_new_edges += 1;
                    }
                }
                None => {
                    debug!(
                        "Ignoring non-function target {} at callsite {}",
                        consg.node_name(pointee),
                        consg.call_site(callsite).label
                    );
                }
            }
        }
    }
    info!("Resolved {} new indirect call edges", num_new_edges);
    num_new_edges
}
