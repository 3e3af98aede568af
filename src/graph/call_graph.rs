// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use petgraph::dot::Dot;
use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::hash::Hash;

use super::constraint_graph::ConstraintGraph;
use super::function::{CallSiteId, FuncId};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;

pub trait CGFunction: Copy + Clone + PartialEq + Eq + Hash + Debug {
    fn dot_fmt(&self, consg: &ConstraintGraph, f: &mut fmt::Formatter) -> fmt::Result;
}

impl CGFunction for FuncId {
    fn dot_fmt(&self, consg: &ConstraintGraph, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(consg.function_name(*self))
    }
}

pub trait CGCallSite: Copy + Clone + PartialEq + Eq + Hash + Debug {
    fn dot_fmt(&self, consg: &ConstraintGraph, f: &mut fmt::Formatter) -> fmt::Result;
}

impl CGCallSite for CallSiteId {
    fn dot_fmt(&self, consg: &ConstraintGraph, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&consg.call_site(*self).label)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// How the target of a call was determined.
pub enum CallType {
    /// The callee is named by the call instruction itself.
    Direct,
    /// The callee was resolved from the points-to set of a function pointer.
    Indirect,
}

#[derive(Debug)]
pub struct CallGraphNode<F: CGFunction> {
    pub(crate) func: F,
}

impl<F: CGFunction> CallGraphNode<F> {
    pub fn new(func: F) -> Self {
        CallGraphNode { func }
    }
}

#[derive(Debug)]
pub struct CallGraphEdge<S: CGCallSite> {
    pub(crate) callsite: S,
}

impl<S: CGCallSite> CallGraphEdge<S> {
    pub fn new(callsite: S) -> Self {
        CallGraphEdge { callsite }
    }
}

pub struct CallGraph<F: CGFunction, S: CGCallSite> {
    /// The graph structure capturing call relationships.
    pub graph: Graph<CallGraphNode<F>, CallGraphEdge<S>>,
    /// A map from functions to their corresponding call graph nodes.
    pub func_nodes: HashMap<F, CGNodeId>,
    /// A map from call sites to call graph edges.
    pub callsite_to_edges: HashMap<S, HashSet<CGEdgeId>>,
    /// Record the type of each call.
    pub(crate) callsite_to_type: HashMap<S, CallType>,
}

impl<F: CGFunction, S: CGCallSite> Debug for CallGraph<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CallGraph({} functions, {} edges)",
            self.graph.node_count(),
            self.graph.edge_count()
        )
    }
}

impl<F: CGFunction, S: CGCallSite> CallGraph<F, S> {
    pub fn new() -> Self {
        CallGraph {
            graph: Graph::<CallGraphNode<F>, CallGraphEdge<S>>::new(),
            func_nodes: HashMap::new(),
            callsite_to_edges: HashMap::new(),
            callsite_to_type: HashMap::new(),
        }
    }

    /// Add a new node to the call graph.
    pub fn add_node(&mut self, func: F) {
        self.get_or_insert_node(func);
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    fn get_or_insert_node(&mut self, func: F) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                let node_id = self.graph.add_node(CallGraphNode::new(func));
                *v.insert(node_id)
            }
        }
    }

    pub fn set_callsite_type(&mut self, callsite: S, call_type: CallType) {
        self.callsite_to_type.insert(callsite, call_type);
    }

    pub fn get_callsite_type(&self, callsite: &S) -> Option<&CallType> {
        self.callsite_to_type.get(callsite)
    }

    /// Returns the caller and callee of the given edge.
    pub fn edge_functions(&self, edge_id: CGEdgeId) -> Option<(F, F)> {
        let (caller, callee) = self.graph.edge_endpoints(edge_id)?;
        Some((self.graph[caller].func, self.graph[callee].func))
    }

    /// Returns all functions called at `callsite`.
    pub fn get_callees(&self, callsite: &S) -> HashSet<F> {
        match self.callsite_to_edges.get(callsite) {
            Some(edges) => edges
                .iter()
                .filter_map(|edge_id| self.edge_functions(*edge_id).map(|(_, callee)| callee))
                .collect(),
            None => HashSet::new(),
        }
    }

    /// Returns all functions called by `caller`.
    pub fn get_callees_of(&self, caller: F) -> HashSet<F> {
        match self.func_nodes.get(&caller) {
            Some(node_id) => self
                .graph
                .neighbors(*node_id)
                .map(|callee| self.graph[callee].func)
                .collect(),
            None => HashSet::new(),
        }
    }

    /// Returns true if an edge to the callee already existed for the callsite.
    pub fn has_edge(&self, callsite: &S, callee_id: F) -> bool {
        self.get_callees(callsite).contains(&callee_id)
    }

    /// Adds a new edge to the call graph.
    /// The edge is a call from `caller_id` to `callee_id` at `callsite`.
    /// Returns false if the edge already existed, and true otherwise.
    pub fn add_edge(&mut self, callsite: S, caller_id: F, callee_id: F) -> bool {
        let caller_node = self.get_or_insert_node(caller_id);
        let callee_node = self.get_or_insert_node(callee_id);

        if self.has_edge(&callsite, callee_id) {
            return false;
        }
        let edge_id = self
            .graph
            .add_edge(caller_node, callee_node, CallGraphEdge::new(callsite));
        self.callsite_to_edges
            .entry(callsite)
            .or_default()
            .insert(edge_id);
        true
    }

    #[inline]
    pub fn num_functions(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Produce a dot representation of the call graph for displaying with Graphviz.
    pub fn to_dot(&self, consg: &ConstraintGraph) -> String {
        struct Label<'a, T>(&'a ConstraintGraph, T);

        impl<'a, F: CGFunction> fmt::Display for Label<'a, &CallGraphNode<F>> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.1.func.dot_fmt(self.0, f)
            }
        }

        impl<'a, S: CGCallSite> fmt::Display for Label<'a, &CallGraphEdge<S>> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.1.callsite.dot_fmt(self.0, f)
            }
        }

        let labeled = self
            .graph
            .map(|_, node| Label(consg, node), |_, edge| Label(consg, edge));
        format!("{}", Dot::new(&labeled))
    }
}
