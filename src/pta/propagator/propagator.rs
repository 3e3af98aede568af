// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The key component of our pointer analysis.
//!
//! The propagator solves the constraint graph with a worklist. Each time a
//! node is taken from the worklist, only the part of its points-to set that
//! has not been propagated yet (its diff) is pushed through the node's
//! constraints:
//!
//! - `p --copy--> x`:   pts(x) ⊇ pts(p)
//! - `p --load--> r`:   o ∈ pts(p) ==> o --copy--> r
//! - `q --store--> p`:  o ∈ pts(p) ==> q --copy--> o
//! - `p --gep--> x`:    o ∈ pts(p) ==> field(o) ∈ pts(x)
//!
//! Load and store constraints are solved by materializing copy edges in the
//! constraint graph, so later growth of the source flows along the new edge
//! when the source is processed again.

use log::*;

use crate::graph::constraint_graph::{ConstraintEdgeKind, ConstraintGraph, GepOffset};
use crate::pta::*;
use crate::pts_set::points_to::PointsToSet;
use crate::util::worklist::Worklist;

/// Counters collected while solving.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropagatorStat {
    /// Number of times a node with new points-to facts was processed.
    pub processed_nodes: usize,
    /// Number of copy edges added for load and store constraints.
    pub new_copy_edges: usize,
}

/// Propagating the points-to information along the constraint graph edges.
pub struct Propagator<'pta> {
    /// Points-to data
    pub(crate) pt_data: &'pta mut DiffPTDataTy,
    /// Constraint graph
    pub(crate) consg: &'pta mut ConstraintGraph,

    /// Position in the graph's address edge list up to which address
    /// edges have already seeded the analysis.
    addr_edge_cursor: &'pta mut usize,

    /// Worklist for resolution
    worklist: Worklist<NodeId>,

    stat: &'pta mut PropagatorStat,
}

impl<'pta> Propagator<'pta> {
    /// Constructor
    pub fn new(
        pt_data: &'pta mut DiffPTDataTy,
        consg: &'pta mut ConstraintGraph,
        addr_edge_cursor: &'pta mut usize,
        stat: &'pta mut PropagatorStat,
    ) -> Self {
        Propagator {
            pt_data,
            consg,
            addr_edge_cursor,
            worklist: Worklist::new(),
            stat,
        }
    }

    /// Propogate pts data until the worklist is empty.
    pub fn solve_worklist(&mut self) {
        self.init_constraints();
        while let Some(node_id) = self.worklist.pop() {
            self.process_node(node_id);
        }
    }

    /// Initialize the worklist from the address edges not seen so far.
    pub fn init_constraints(&mut self) {
        while let Some(&edge_id) = self.consg.addr_edges.get(*self.addr_edge_cursor) {
            *self.addr_edge_cursor += 1;
            self.process_addr(edge_id);
        }
        debug!("{} nodes activated by address edges", self.worklist.len());
    }

    /// Applies the copy, load, store and gep constraints of a node to its diff points-to set.
    fn process_node(&mut self, node_id: NodeId) {
        let diff_pts = self.pt_data.flush(node_id);
        if diff_pts.is_empty() {
            return;
        }
        self.stat.processed_nodes += 1;

        self.handle_copy(node_id, &diff_pts);
        self.handle_load(node_id, &diff_pts);
        self.handle_store(node_id, &diff_pts);
        self.handle_gep(node_id, &diff_pts);
    }

    /// Process the given addr edge.
    /// src --addr--> dst:  src \in pts(dst)
    fn process_addr(&mut self, addr_edge: EdgeId) {
        let (src, dst) = self.consg.edge_endpoints(addr_edge);
        if self.pt_data.add_pts(dst, src) {
            self.worklist.push(dst);
        }
    }

    /// process all outgoing copy edges of the node.
    fn handle_copy(&mut self, node_id: NodeId, diff_pts: &PointsTo<NodeId>) {
        if let Some(copy_out_edges) = self.consg.copy_out_edges.get_mut(&node_id) {
            let copy_out_edges = std::mem::take(copy_out_edges);

            for copy_edge in &copy_out_edges {
                let (_src, dst) = self.consg.edge_endpoints(*copy_edge);
                self.propagate_to(dst, diff_pts);
            }

            if let Some(slot) = self.consg.copy_out_edges.get_mut(&node_id) {
                *slot = copy_out_edges;
            }
        }
    }

    /// process all outgoing load edges of the node.
    fn handle_load(&mut self, node_id: NodeId, diff_pts: &PointsTo<NodeId>) {
        if let Some(load_out_edges) = self.consg.load_out_edges.get_mut(&node_id) {
            let load_out_edges = std::mem::take(load_out_edges);

            for load_edge in &load_out_edges {
                self.process_load(*load_edge, diff_pts);
            }

            if let Some(slot) = self.consg.load_out_edges.get_mut(&node_id) {
                *slot = load_out_edges;
            }
        }
    }

    /// process all incoming store edges of the node.
    fn handle_store(&mut self, node_id: NodeId, diff_pts: &PointsTo<NodeId>) {
        if let Some(store_in_edges) = self.consg.store_in_edges.get_mut(&node_id) {
            let store_in_edges = std::mem::take(store_in_edges);

            for store_edge in &store_in_edges {
                self.process_store(*store_edge, diff_pts);
            }

            if let Some(slot) = self.consg.store_in_edges.get_mut(&node_id) {
                *slot = store_in_edges;
            }
        }
    }

    /// process all outgoing gep edges of the node.
    fn handle_gep(&mut self, node_id: NodeId, diff_pts: &PointsTo<NodeId>) {
        if let Some(gep_out_edges) = self.consg.gep_out_edges.get_mut(&node_id) {
            let gep_out_edges = std::mem::take(gep_out_edges);

            for gep_edge in &gep_out_edges {
                self.process_gep(*gep_edge, diff_pts);
            }

            if let Some(slot) = self.consg.gep_out_edges.get_mut(&node_id) {
                *slot = gep_out_edges;
            }
        }
    }

    /// Process the given load edge.
    /// src --load--> dst:  node \in pts(src) ==> node --copy--> dst
    fn process_load(&mut self, load_edge: EdgeId, base_pts: &PointsTo<NodeId>) {
        let (_src, dst) = self.consg.edge_endpoints(load_edge);
        for pointee in base_pts {
            self.add_copy_edge_and_propagate(pointee, dst);
        }
    }

    /// Process the given store edge.
    /// src --store--> dst:  node \in pts(dst) ==> src --copy--> node
    fn process_store(&mut self, store_edge: EdgeId, base_pts: &PointsTo<NodeId>) {
        let (src, _dst) = self.consg.edge_endpoints(store_edge);
        for pointee in base_pts {
            self.add_copy_edge_and_propagate(src, pointee);
        }
    }

    /// Process the given gep edge.
    ///
    /// With a variant offset the accessed field is unknown, and the base
    /// object itself stands for every field. This is sound but merges the
    /// fields of that object.
    fn process_gep(&mut self, gep_edge: EdgeId, base_pts: &PointsTo<NodeId>) {
        let (_src, dst) = self.consg.edge_endpoints(gep_edge);
        let ConstraintEdgeKind::Gep(offset) = self.consg.get_edge(gep_edge).kind else {
            unreachable!("gep edge map holds a non-gep edge")
        };

        let mut changed = false;
        for pointee in base_pts {
            let field = match offset {
                GepOffset::Constant(offset) => self.consg.get_gep_obj(pointee, offset),
                GepOffset::Variant => pointee,
            };
            self.pt_data.init_pts(field);
            changed |= self.pt_data.add_pts(dst, field);
        }
        if changed {
            self.worklist.push(dst);
        }
    }

    /// Adds a new copy edge from src to dst if it does not exist in the graph,
    /// and propagates the whole points-to set of src along it.
    fn add_copy_edge_and_propagate(&mut self, src: NodeId, dst: NodeId) {
        if self.consg.add_copy_edge(src, dst).is_some() {
            self.stat.new_copy_edges += 1;
            let src_pts = self.pt_data.get_pts(src);
            self.propagate_to(dst, &src_pts);
        }
    }

    /// Unions `pts` into the points-to set of `dst`, scheduling `dst` if it grew.
    fn propagate_to(&mut self, dst: NodeId, pts: &PointsTo<NodeId>) {
        if self.pt_data.union_pts_to(dst, pts) {
            self.worklist.push(dst);
        }
    }

    // Get points-to data
    #[inline]
    pub fn get_pt_data(&self) -> &DiffPTDataTy {
        self.pt_data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn solve(consg: &mut ConstraintGraph) -> (DiffPTDataTy, PropagatorStat) {
        let mut pt_data = DiffPTDataTy::with_keys(consg.node_ids());
        let mut cursor = 0;
        let mut stat = PropagatorStat::default();
        Propagator::new(&mut pt_data, consg, &mut cursor, &mut stat).solve_worklist();
        (pt_data, stat)
    }

    fn pts_of(pt_data: &DiffPTDataTy, node: NodeId) -> Vec<NodeId> {
        let mut pts: Vec<NodeId> = pt_data.get_pts(node).iter().collect();
        pts.sort();
        pts
    }

    #[test]
    fn copy_chain() {
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let p = consg.add_value_node("p");
        let q = consg.add_value_node("q");
        let r = consg.add_value_node("r");
        consg.add_addr_edge(o, p);
        consg.add_copy_edge(p, q);
        consg.add_copy_edge(q, r);

        let (pt_data, _) = solve(&mut consg);
        assert_eq!(pts_of(&pt_data, r), vec![o]);
        assert_eq!(pts_of(&pt_data, q), vec![o]);
    }

    #[test]
    fn store_then_load() {
        // p = &o; q = &a; *p = q; r = *p
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let a = consg.add_object_node("a");
        let p = consg.add_value_node("p");
        let q = consg.add_value_node("q");
        let r = consg.add_value_node("r");
        consg.add_addr_edge(o, p);
        consg.add_addr_edge(a, q);
        consg.add_store_edge(q, p);
        consg.add_load_edge(p, r);

        let (pt_data, stat) = solve(&mut consg);
        assert_eq!(pts_of(&pt_data, o), vec![a]);
        assert_eq!(pts_of(&pt_data, r), vec![a]);
        assert!(consg.contains_edge(q, o, ConstraintEdgeKind::Copy));
        assert!(consg.contains_edge(o, r, ConstraintEdgeKind::Copy));
        assert_eq!(stat.new_copy_edges, 2);
    }

    #[test]
    fn late_growth_flows_through_materialized_edges() {
        // The pointee of p only receives its contents after the load edge is materialized.
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let a = consg.add_object_node("a");
        let b = consg.add_object_node("b");
        let p = consg.add_value_node("p");
        let q = consg.add_value_node("q");
        let s = consg.add_value_node("s");
        let r = consg.add_value_node("r");
        consg.add_addr_edge(o, p);
        consg.add_load_edge(p, r);
        consg.add_addr_edge(a, q);
        consg.add_copy_edge(q, s);
        consg.add_store_edge(s, p);
        consg.add_addr_edge(b, s);

        let (pt_data, _) = solve(&mut consg);
        assert_eq!(pts_of(&pt_data, o), vec![a, b]);
        assert_eq!(pts_of(&pt_data, r), vec![a, b]);
    }

    #[test]
    fn constant_gep_creates_field_object() {
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let p = consg.add_value_node("p");
        let x = consg.add_value_node("x");
        consg.add_addr_edge(o, p);
        consg.add_gep_edge(p, x, GepOffset::Constant(1));

        let (pt_data, _) = solve(&mut consg);
        let field = consg.find_gep_obj(o, 1).unwrap();
        assert_eq!(pts_of(&pt_data, x), vec![field]);
        assert_eq!(consg.node_name(field), "o.1");
        assert!(pt_data.get_propa_pts(field).is_some());
    }

    #[test]
    fn variant_gep_falls_back_to_base_object() {
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let p = consg.add_value_node("p");
        let x = consg.add_value_node("x");
        consg.add_addr_edge(o, p);
        consg.add_gep_edge(p, x, GepOffset::Variant);

        let (pt_data, _) = solve(&mut consg);
        assert_eq!(pts_of(&pt_data, x), vec![o]);
        assert!(consg.find_gep_obj(o, 0).is_none());
    }

    #[test]
    fn cycles_terminate() {
        // p = &o; q = p; p = q; *p = p; p = *p
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let p = consg.add_value_node("p");
        let q = consg.add_value_node("q");
        consg.add_addr_edge(o, p);
        consg.add_copy_edge(p, q);
        consg.add_copy_edge(q, p);
        consg.add_copy_edge(p, p);
        consg.add_store_edge(p, p);
        consg.add_load_edge(p, p);

        let (pt_data, _) = solve(&mut consg);
        assert_eq!(pts_of(&pt_data, p), vec![o]);
        assert_eq!(pts_of(&pt_data, q), vec![o]);
        assert_eq!(pts_of(&pt_data, o), vec![o]);
    }

    #[test]
    fn all_diffs_are_flushed_at_fixpoint() {
        let mut consg = ConstraintGraph::new();
        let o = consg.add_object_node("o");
        let a = consg.add_object_node("a");
        let p = consg.add_value_node("p");
        let q = consg.add_value_node("q");
        let r = consg.add_value_node("r");
        consg.add_addr_edge(o, p);
        consg.add_addr_edge(a, q);
        consg.add_store_edge(q, p);
        consg.add_load_edge(p, r);
        consg.add_gep_edge(r, q, GepOffset::Constant(0));

        let (pt_data, _) = solve(&mut consg);
        for node in pt_data.keys() {
            assert!(pt_data.get_diff_pts(node).map_or(true, |diff| diff.is_empty()));
        }
    }

    #[test]
    fn resolving_again_only_consumes_new_address_edges() {
        let mut consg = ConstraintGraph::new();
        let o1 = consg.add_object_node("o1");
        let o2 = consg.add_object_node("o2");
        let p = consg.add_value_node("p");
        let x = consg.add_value_node("x");
        consg.add_addr_edge(o1, p);
        consg.add_copy_edge(p, x);

        let mut pt_data = DiffPTDataTy::with_keys(consg.node_ids());
        let mut cursor = 0;
        let mut stat = PropagatorStat::default();
        Propagator::new(&mut pt_data, &mut consg, &mut cursor, &mut stat).solve_worklist();
        assert_eq!(cursor, 1);
        let processed = stat.processed_nodes;

        // Nothing new: no node is processed again.
        Propagator::new(&mut pt_data, &mut consg, &mut cursor, &mut stat).solve_worklist();
        assert_eq!(stat.processed_nodes, processed);

        consg.add_addr_edge(o2, p);
        Propagator::new(&mut pt_data, &mut consg, &mut cursor, &mut stat).solve_worklist();
        assert_eq!(cursor, 2);
        assert_eq!(pts_of(&pt_data, x), vec![o1, o2]);
    }
}
