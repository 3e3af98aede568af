// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt::{Debug, Formatter, Result};
use std::time::{Duration, Instant};

use log::*;

use super::propagator::propagator::{Propagator, PropagatorStat};
use super::PointerAnalysis;
use crate::builder::call_graph_builder;
use crate::graph::call_graph::CallGraph;
use crate::graph::constraint_graph::ConstraintGraph;
use crate::graph::function::{CallSiteId, FuncId};
use crate::pta::*;
use crate::util::options::AnalysisOptions;
use crate::util::pta_statistics::AndersenStat;
use crate::util::results_dumper;

/// One run of the inclusion-based pointer analysis over a constraint graph.
///
/// The analysis borrows the graph mutably because solving load and store
/// constraints adds copy edges to it.
pub struct AndersenPTA<'pta> {
    /// The constraint graph being solved
    pub(crate) consg: &'pta mut ConstraintGraph,
    /// Points-to data
    pub(crate) pt_data: DiffPTDataTy,
    pub(crate) options: AnalysisOptions,

    /// Number of address edges of the graph that have been consumed so far
    addr_edge_cursor: usize,

    pub(crate) stat: PropagatorStat,
    pub(crate) analysis_time: Duration,
}

impl<'pta> Debug for AndersenPTA<'pta> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        "AndersenPTA".fmt(f)
    }
}

impl<'pta> AndersenPTA<'pta> {
    pub fn new(consg: &'pta mut ConstraintGraph, options: AnalysisOptions) -> Self {
        AndersenPTA {
            consg,
            pt_data: DiffPTDataTy::new(),
            options,
            addr_edge_cursor: 0,
            stat: PropagatorStat::default(),
            analysis_time: Duration::ZERO,
        }
    }

    /// Initialize the analysis.
    pub fn initialize(&mut self) {
        self.consg.set_field_limit(self.options.field_limit);
        // every node starts with an empty points-to set
        for node_id in self.consg.node_ids() {
            self.pt_data.init_pts(node_id);
        }
        info!(
            "Constraint graph: {} nodes, {} edges, {} indirect callsites",
            self.consg.node_count(),
            self.consg.edge_count(),
            self.consg.get_indirect_callsites().len()
        );
    }

    /// Solve the worklist problem using Propagator.
    pub fn propagate(&mut self) {
        let mut propagator = Propagator::new(
            &mut self.pt_data,
            self.consg,
            &mut self.addr_edge_cursor,
            &mut self.stat,
        );
        propagator.solve_worklist();
        debug!(
            "Propagation finished: {} nodes processed, {} copy edges added",
            self.stat.processed_nodes, self.stat.new_copy_edges
        );
    }

    /// Adds the call edges of indirect callsites that can be resolved from the
    /// points-to results. Returns the number of edges added.
    pub fn update_call_graph(&self, call_graph: &mut CallGraph<FuncId, CallSiteId>) -> usize {
        call_graph_builder::resolve_indirect_calls(self.consg, &self.pt_data, call_graph)
    }

    #[inline]
    pub fn get_pt_data(&self) -> &DiffPTDataTy {
        &self.pt_data
    }

    /// Returns the points-to set of the given node.
    #[inline]
    pub fn get_pts(&self, node_id: NodeId) -> PointsTo<NodeId> {
        self.pt_data.get_pts(node_id)
    }

    #[inline]
    pub fn consg(&self) -> &ConstraintGraph {
        self.consg
    }

    #[inline]
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Finalize the analysis.
    pub fn finalize(&self, call_graph: &CallGraph<FuncId, CallSiteId>) -> anyhow::Result<()> {
        // dump call graph, points-to results
        results_dumper::dump_results(self, call_graph)?;

        // dump pta statistics
        if self.options.dump_stats {
            let pta_stat = AndersenStat::new(self, call_graph);
            pta_stat.dump_stats()?;
        }
        Ok(())
    }
}

impl<'pta> PointerAnalysis for AndersenPTA<'pta> {
    /// Solves the constraint graph to a fixpoint.
    fn analyze(&mut self) {
        let now = Instant::now();

        // Initialization for the analysis.
        self.initialize();

        // Solve the worklist problem.
        self.propagate();

        let elapsed = now.elapsed();
        self.analysis_time += elapsed;
        info!("Andersen completed.");
        info!(
            "Analysis time: {}",
            humantime::format_duration(elapsed).to_string()
        );
    }
}
