// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;
use petgraph::dot::Dot;
use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::function::{CallSite, CallSiteId, FuncId, Function};
use crate::util::bit_vec::Idx;

/// Field offsets at or beyond this limit are not distinguished by default.
pub const DEFAULT_FIELD_LIMIT: usize = 512;

// Unique identifiers for graph node and edges.
pub type ConstraintNodeId = NodeIndex<DefaultIx>;
pub type ConstraintEdgeId = EdgeIndex<DefaultIx>;

impl Idx for ConstraintNodeId {
    #[inline]
    fn new(idx: usize) -> Self {
        NodeIndex::new(idx)
    }

    #[inline]
    fn index(self) -> usize {
        self.index()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintNodeKind {
    /// A top-level pointer variable.
    Value,
    /// An abstract memory object such as a stack, global or heap allocation.
    /// A field-insensitive object stands for all of its fields at once.
    Object { field_insensitive: bool },
    /// The object of a function whose address can be taken.
    Function(FuncId),
    /// A field of `base` at a constant offset, synthesized on demand.
    Field { base: ConstraintNodeId, offset: usize },
}

#[derive(Clone, Debug)]
pub struct ConstraintNode {
    name: String,
    kind: ConstraintNodeKind,
}

impl ConstraintNode {
    pub fn new(name: String, kind: ConstraintNodeKind) -> Self {
        ConstraintNode { name, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ConstraintNodeKind {
        &self.kind
    }
}

/// Offset carried by a gep edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GepOffset {
    Constant(usize),
    /// The offset is not statically known, e.g. an array index held in a variable.
    Variant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintEdgeKind {
    /// `o --addr--> p`: p holds the address of o.
    Address,
    /// `p --copy--> x`: x = p.
    Copy,
    /// `p --load--> r`: r = *p.
    Load,
    /// `q --store--> p`: *p = q.
    Store,
    /// `p --gep--> x`: x = &p->field.
    Gep(GepOffset),
}

impl fmt::Display for ConstraintEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintEdgeKind::Address => write!(f, "addr"),
            ConstraintEdgeKind::Copy => write!(f, "copy"),
            ConstraintEdgeKind::Load => write!(f, "load"),
            ConstraintEdgeKind::Store => write!(f, "store"),
            ConstraintEdgeKind::Gep(GepOffset::Constant(offset)) => write!(f, "gep[{}]", offset),
            ConstraintEdgeKind::Gep(GepOffset::Variant) => write!(f, "gep[*]"),
        }
    }
}

pub struct ConstraintEdge {
    pub kind: ConstraintEdgeKind,
}

type EdgeMap = HashMap<ConstraintNodeId, BTreeSet<ConstraintEdgeId>>;

pub struct ConstraintGraph {
    /// The graph structure capturing the constraints between nodes.
    pub(crate) graph: Graph<ConstraintNode, ConstraintEdge>,
    /// Field objects synthesized so far, keyed by (base object, offset).
    pub(crate) field_objects: HashMap<(ConstraintNodeId, usize), ConstraintNodeId>,
    /// A field access at an offset at or beyond the limit yields the base object itself.
    field_limit: usize,
    /// Function table, indexed by `FuncId`.
    pub(crate) functions: Vec<Function>,
    /// The object node of each function, indexed by `FuncId`.
    pub(crate) func_nodes: Vec<ConstraintNodeId>,
    /// Call-site table, indexed by `CallSiteId`.
    pub(crate) call_sites: Vec<CallSite>,
    /// Calls through a function pointer, paired with the node of that pointer.
    pub(crate) indirect_calls: Vec<(CallSiteId, ConstraintNodeId)>,
    /// Address edges in insertion order. The pointer analysis keeps a cursor
    /// into this list so that only new address edges seed a later run.
    pub(crate) addr_edges: Vec<ConstraintEdgeId>,

    pub(crate) addr_in_edges: EdgeMap,
    pub(crate) addr_out_edges: EdgeMap,
    pub(crate) copy_in_edges: EdgeMap,
    pub(crate) copy_out_edges: EdgeMap,
    pub(crate) load_in_edges: EdgeMap,
    pub(crate) load_out_edges: EdgeMap,
    pub(crate) store_in_edges: EdgeMap,
    pub(crate) store_out_edges: EdgeMap,
    pub(crate) gep_in_edges: EdgeMap,
    pub(crate) gep_out_edges: EdgeMap,
}

impl fmt::Debug for ConstraintGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstraintGraph({} nodes, {} edges)",
            self.graph.node_count(),
            self.graph.edge_count()
        )
    }
}

impl ConstraintGraph {
    /// Constructor
    pub fn new() -> Self {
        ConstraintGraph {
            graph: Graph::<ConstraintNode, ConstraintEdge>::new(),
            field_objects: HashMap::new(),
            field_limit: DEFAULT_FIELD_LIMIT,
            functions: Vec::new(),
            func_nodes: Vec::new(),
            call_sites: Vec::new(),
            indirect_calls: Vec::new(),
            addr_edges: Vec::new(),

            addr_in_edges: EdgeMap::new(),
            addr_out_edges: EdgeMap::new(),
            copy_in_edges: EdgeMap::new(),
            copy_out_edges: EdgeMap::new(),
            load_in_edges: EdgeMap::new(),
            load_out_edges: EdgeMap::new(),
            store_in_edges: EdgeMap::new(),
            store_out_edges: EdgeMap::new(),
            gep_in_edges: EdgeMap::new(),
            gep_out_edges: EdgeMap::new(),
        }
    }

    /// Returns a reference to the underlying graph.
    #[inline]
    pub fn graph(&self) -> &Graph<ConstraintNode, ConstraintEdge> {
        &self.graph
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterates over all node ids, including synthesized field objects.
    pub fn node_ids(&self) -> impl Iterator<Item = ConstraintNodeId> {
        self.graph.node_indices()
    }

    /// Iterates over all edges as `(src, dst, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = (ConstraintNodeId, ConstraintNodeId, ConstraintEdgeKind)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight().kind))
    }

    /// Returns the node for the given node_id.
    pub fn get_node(&self, node_id: ConstraintNodeId) -> &ConstraintNode {
        &self.graph[node_id]
    }

    #[inline]
    pub fn node_name(&self, node_id: ConstraintNodeId) -> &str {
        self.get_node(node_id).name()
    }

    /// Returns the edge for the given edge_id.
    pub fn get_edge(&self, edge_id: ConstraintEdgeId) -> &ConstraintEdge {
        &self.graph[edge_id]
    }

    /// Returns `(src, dst)` of the given edge.
    pub fn edge_endpoints(&self, edge_id: ConstraintEdgeId) -> (ConstraintNodeId, ConstraintNodeId) {
        self.graph
            .edge_endpoints(edge_id)
            .expect("edge id does not belong to this constraint graph")
    }

    pub fn add_value_node(&mut self, name: &str) -> ConstraintNodeId {
        self.graph.add_node(ConstraintNode::new(name.to_owned(), ConstraintNodeKind::Value))
    }

    pub fn add_object_node(&mut self, name: &str) -> ConstraintNodeId {
        let kind = ConstraintNodeKind::Object { field_insensitive: false };
        self.graph.add_node(ConstraintNode::new(name.to_owned(), kind))
    }

    /// Adds an object whose fields are not distinguished, e.g. an array.
    pub fn add_field_insensitive_object_node(&mut self, name: &str) -> ConstraintNodeId {
        let kind = ConstraintNodeKind::Object { field_insensitive: true };
        self.graph.add_node(ConstraintNode::new(name.to_owned(), kind))
    }

    /// Adds a function together with its function object node.
    pub fn add_function(&mut self, name: &str) -> (FuncId, ConstraintNodeId) {
        let func_id = FuncId::new(self.functions.len());
        self.functions.push(Function { name: name.to_owned() });
        let node_id = self
            .graph
            .add_node(ConstraintNode::new(name.to_owned(), ConstraintNodeKind::Function(func_id)));
        self.func_nodes.push(node_id);
        (func_id, node_id)
    }

    /// Returns true if the edge from `src` to `dst` of the `kind` exists.
    pub fn contains_edge(&self, src: ConstraintNodeId, dst: ConstraintNodeId, kind: ConstraintEdgeKind) -> bool {
        self.graph
            .edges_connecting(src, dst)
            .any(|edge| edge.weight().kind == kind)
    }

    /// Adds an edge from `src` to `dst` according to the edge type.
    /// Returns the edge id if this edge is newly added to the graph.
    pub fn add_edge(
        &mut self,
        src: ConstraintNodeId,
        dst: ConstraintNodeId,
        kind: ConstraintEdgeKind,
    ) -> Option<ConstraintEdgeId> {
        if self.contains_edge(src, dst, kind) {
            return None;
        }
        let edge_id = self.graph.add_edge(src, dst, ConstraintEdge { kind });
        match kind {
            ConstraintEdgeKind::Address => {
                self.addr_edges.push(edge_id);
                self.addr_out_edges.entry(src).or_default().insert(edge_id);
                self.addr_in_edges.entry(dst).or_default().insert(edge_id);
            }
            ConstraintEdgeKind::Copy => {
                self.copy_out_edges.entry(src).or_default().insert(edge_id);
                self.copy_in_edges.entry(dst).or_default().insert(edge_id);
            }
            ConstraintEdgeKind::Load => {
                self.load_out_edges.entry(src).or_default().insert(edge_id);
                self.load_in_edges.entry(dst).or_default().insert(edge_id);
            }
            ConstraintEdgeKind::Store => {
                self.store_out_edges.entry(src).or_default().insert(edge_id);
                self.store_in_edges.entry(dst).or_default().insert(edge_id);
            }
            ConstraintEdgeKind::Gep(_) => {
                self.gep_out_edges.entry(src).or_default().insert(edge_id);
                self.gep_in_edges.entry(dst).or_default().insert(edge_id);
            }
        }
        Some(edge_id)
    }

    fn edge_map(&self, kind: ConstraintEdgeKind, outgoing: bool) -> &EdgeMap {
        match (kind, outgoing) {
            (ConstraintEdgeKind::Address, true) => &self.addr_out_edges,
            (ConstraintEdgeKind::Address, false) => &self.addr_in_edges,
            (ConstraintEdgeKind::Copy, true) => &self.copy_out_edges,
            (ConstraintEdgeKind::Copy, false) => &self.copy_in_edges,
            (ConstraintEdgeKind::Load, true) => &self.load_out_edges,
            (ConstraintEdgeKind::Load, false) => &self.load_in_edges,
            (ConstraintEdgeKind::Store, true) => &self.store_out_edges,
            (ConstraintEdgeKind::Store, false) => &self.store_in_edges,
            (ConstraintEdgeKind::Gep(_), true) => &self.gep_out_edges,
            (ConstraintEdgeKind::Gep(_), false) => &self.gep_in_edges,
        }
    }

    /// Outgoing edges of `node_id` of the given kind. Gep edges of every offset
    /// are returned for any `Gep` kind.
    pub fn get_out_edges(&self, node_id: ConstraintNodeId, kind: ConstraintEdgeKind) -> Vec<ConstraintEdgeId> {
        self.edge_map(kind, true)
            .get(&node_id)
            .map_or_else(Vec::new, |edges| edges.iter().copied().collect())
    }

    /// Incoming edges of `node_id` of the given kind.
    pub fn get_in_edges(&self, node_id: ConstraintNodeId, kind: ConstraintEdgeKind) -> Vec<ConstraintEdgeId> {
        self.edge_map(kind, false)
            .get(&node_id)
            .map_or_else(Vec::new, |edges| edges.iter().copied().collect())
    }

    #[inline]
    pub fn add_addr_edge(&mut self, src: ConstraintNodeId, dst: ConstraintNodeId) -> Option<ConstraintEdgeId> {
        self.add_edge(src, dst, ConstraintEdgeKind::Address)
    }

    #[inline]
    pub fn add_copy_edge(&mut self, src: ConstraintNodeId, dst: ConstraintNodeId) -> Option<ConstraintEdgeId> {
        self.add_edge(src, dst, ConstraintEdgeKind::Copy)
    }

    #[inline]
    pub fn add_load_edge(&mut self, src: ConstraintNodeId, dst: ConstraintNodeId) -> Option<ConstraintEdgeId> {
        self.add_edge(src, dst, ConstraintEdgeKind::Load)
    }

    #[inline]
    pub fn add_store_edge(&mut self, src: ConstraintNodeId, dst: ConstraintNodeId) -> Option<ConstraintEdgeId> {
        self.add_edge(src, dst, ConstraintEdgeKind::Store)
    }

    #[inline]
    pub fn add_gep_edge(
        &mut self,
        src: ConstraintNodeId,
        dst: ConstraintNodeId,
        offset: GepOffset,
    ) -> Option<ConstraintEdgeId> {
        self.add_edge(src, dst, ConstraintEdgeKind::Gep(offset))
    }

    /// Address edges in the order they were added.
    #[inline]
    pub fn addr_edges(&self) -> &[ConstraintEdgeId] {
        &self.addr_edges
    }

    #[inline]
    pub fn field_limit(&self) -> usize {
        self.field_limit
    }

    pub fn set_field_limit(&mut self, field_limit: usize) {
        self.field_limit = field_limit;
    }

    /// Returns the node of the field at `offset` inside the object `base`,
    /// creating it on first request.
    ///
    /// A field of a field object is the field of the underlying object at the
    /// summed offset. Field-insensitive objects, function objects and
    /// non-object nodes are returned as they are, and so is any object accessed
    /// at an offset beyond the field limit. The limit keeps field synthesis
    /// finite when a gep edge lies on a cycle.
    pub fn get_gep_obj(&mut self, base: ConstraintNodeId, offset: usize) -> ConstraintNodeId {
        let kind = self.get_node(base).kind().clone();
        match kind {
            ConstraintNodeKind::Object { field_insensitive: false } => {}
            ConstraintNodeKind::Field { base: obj, offset: base_offset } => {
                return self.get_gep_obj(obj, base_offset.saturating_add(offset));
            }
            _ => return base,
        }
        if offset >= self.field_limit {
            debug!("Offset {} of {:?} exceeds the field limit", offset, base);
            return base;
        }

        match self.field_objects.entry((base, offset)) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                let name = format!("{}.{}", self.graph[base].name, offset);
                let field = ConstraintNode::new(name, ConstraintNodeKind::Field { base, offset });
                let node_id = self.graph.add_node(field);
                debug!("Created field object {:?} for ({:?}, {})", node_id, base, offset);
                *v.insert(node_id)
            }
        }
    }

    /// Returns the field object of (`base`, `offset`) if it has been synthesized.
    pub fn find_gep_obj(&self, base: ConstraintNodeId, offset: usize) -> Option<ConstraintNodeId> {
        self.field_objects.get(&(base, offset)).copied()
    }

    /// Returns true if the node is the object of a function.
    #[inline]
    pub fn is_function(&self, node_id: ConstraintNodeId) -> bool {
        matches!(self.get_node(node_id).kind(), ConstraintNodeKind::Function(_))
    }

    /// Returns the function denoted by a function object node.
    pub fn get_function(&self, node_id: ConstraintNodeId) -> Option<FuncId> {
        match self.get_node(node_id).kind() {
            ConstraintNodeKind::Function(func_id) => Some(*func_id),
            _ => None,
        }
    }

    #[inline]
    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn function_name(&self, func_id: FuncId) -> &str {
        &self.functions[func_id.index()].name
    }

    /// Returns the object node of the given function.
    pub fn function_node(&self, func_id: FuncId) -> ConstraintNodeId {
        self.func_nodes[func_id.index()]
    }

    pub fn add_call_site(&mut self, label: &str, caller: Option<FuncId>) -> CallSiteId {
        let callsite = CallSiteId::new(self.call_sites.len());
        self.call_sites.push(CallSite::new(label.to_owned(), caller));
        callsite
    }

    pub fn call_site(&self, callsite: CallSiteId) -> &CallSite {
        &self.call_sites[callsite.index()]
    }

    /// Records that `callsite` calls through the function pointer `fn_ptr`.
    pub fn add_indirect_call(&mut self, callsite: CallSiteId, fn_ptr: ConstraintNodeId) {
        self.indirect_calls.push((callsite, fn_ptr));
    }

    /// All indirect call sites with the node of the invoked function pointer.
    #[inline]
    pub fn get_indirect_callsites(&self) -> &[(CallSiteId, ConstraintNodeId)] {
        &self.indirect_calls
    }

    /// Produce a dot representation of the constraint graph.
    pub fn to_dot(&self) -> String {
        let labeled = self
            .graph
            .map(|_, node| node.name.clone(), |_, edge| edge.kind.to_string());
        format!("{}", Dot::new(&labeled))
    }
}
