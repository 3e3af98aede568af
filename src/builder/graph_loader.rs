// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Builds a constraint graph and the direct part of the call graph from a
//! JSON description of the program's constraints.

use anyhow::{bail, Context, Result};
use log::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::graph::call_graph::{CallGraph, CallType};
use crate::graph::constraint_graph::{ConstraintGraph, ConstraintNodeId, GepOffset};
use crate::graph::function::{CallSiteId, FuncId};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProgramDesc {
    #[serde(default)]
    nodes: Vec<NodeDesc>,
    #[serde(default)]
    edges: Vec<EdgeDesc>,
    #[serde(default)]
    indirect_calls: Vec<IndirectCallDesc>,
    #[serde(default)]
    direct_calls: Vec<DirectCallDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NodeDesc {
    Value {
        name: String,
    },
    Object {
        name: String,
        #[serde(default)]
        field_insensitive: bool,
    },
    Function {
        name: String,
    },
}

impl NodeDesc {
    fn name(&self) -> &str {
        match self {
            NodeDesc::Value { name } | NodeDesc::Object { name, .. } | NodeDesc::Function { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EdgeKindDesc {
    Addr,
    Copy,
    Load,
    Store,
    Gep,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeDesc {
    kind: EdgeKindDesc,
    src: String,
    dst: String,
    /// Constant field offset of a gep edge. A gep edge without offset has a variant offset.
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndirectCallDesc {
    label: String,
    caller: Option<String>,
    fn_ptr: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectCallDesc {
    label: String,
    caller: String,
    callee: String,
}

/// A loaded program: its constraint graph and a call graph holding every
/// function and the direct calls.
#[derive(Debug)]
pub struct LoadedProgram {
    pub consg: ConstraintGraph,
    pub call_graph: CallGraph<FuncId, CallSiteId>,
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<LoadedProgram> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read constraint graph file: {:?}", path))?;
    load_from_str(&content).with_context(|| format!("Failed to load constraint graph from {:?}", path))
}

pub fn load_from_str(content: &str) -> Result<LoadedProgram> {
    let desc: ProgramDesc = serde_json::from_str(content).context("Malformed constraint graph description")?;
    GraphLoader::new().load(desc)
}

struct GraphLoader {
    consg: ConstraintGraph,
    call_graph: CallGraph<FuncId, CallSiteId>,
    nodes: HashMap<String, ConstraintNodeId>,
}

impl GraphLoader {
    fn new() -> Self {
        GraphLoader {
            consg: ConstraintGraph::new(),
            call_graph: CallGraph::new(),
            nodes: HashMap::new(),
        }
    }

    fn load(mut self, desc: ProgramDesc) -> Result<LoadedProgram> {
        for node in &desc.nodes {
            self.add_node(node)?;
        }
        for edge in &desc.edges {
            self.add_edge(edge)?;
        }
        for call in &desc.direct_calls {
            self.add_direct_call(call)?;
        }
        for call in &desc.indirect_calls {
            self.add_indirect_call(call)?;
        }
        info!(
            "Loaded {} nodes, {} edges, {} direct and {} indirect calls",
            self.consg.node_count(),
            self.consg.edge_count(),
            desc.direct_calls.len(),
            desc.indirect_calls.len()
        );
        Ok(LoadedProgram {
            consg: self.consg,
            call_graph: self.call_graph,
        })
    }

    fn add_node(&mut self, node: &NodeDesc) -> Result<()> {
        let name = node.name();
        if self.nodes.contains_key(name) {
            bail!("Duplicate node name `{}`", name);
        }
        let node_id = match node {
            NodeDesc::Value { name } => self.consg.add_value_node(name),
            NodeDesc::Object { name, field_insensitive: false } => self.consg.add_object_node(name),
            NodeDesc::Object { name, field_insensitive: true } => {
                self.consg.add_field_insensitive_object_node(name)
            }
            NodeDesc::Function { name } => {
                let (func_id, node_id) = self.consg.add_function(name);
                self.call_graph.add_node(func_id);
                node_id
            }
        };
        self.nodes.insert(name.to_owned(), node_id);
        Ok(())
    }

    fn node(&self, name: &str) -> Result<ConstraintNodeId> {
        match self.nodes.get(name) {
            Some(node_id) => Ok(*node_id),
            None => bail!("Unknown node `{}`", name),
        }
    }

    fn function(&self, name: &str) -> Result<FuncId> {
        let node_id = self.node(name)?;
        match self.consg.get_function(node_id) {
            Some(func_id) => Ok(func_id),
            None => bail!("Node `{}` is not a function", name),
        }
    }

    fn add_edge(&mut self, edge: &EdgeDesc) -> Result<()> {
        let src = self.node(&edge.src)?;
        let dst = self.node(&edge.dst)?;
        if edge.offset.is_some() && !matches!(edge.kind, EdgeKindDesc::Gep) {
            warn!("Ignoring offset of non-gep edge {} -> {}", edge.src, edge.dst);
        }
        let added = match edge.kind {
            EdgeKindDesc::Addr => self.consg.add_addr_edge(src, dst),
            EdgeKindDesc::Copy => self.consg.add_copy_edge(src, dst),
            EdgeKindDesc::Load => self.consg.add_load_edge(src, dst),
            EdgeKindDesc::Store => self.consg.add_store_edge(src, dst),
            EdgeKindDesc::Gep => {
                let offset = match edge.offset {
                    Some(offset) => GepOffset::Constant(offset),
                    None => GepOffset::Variant,
                };
                self.consg.add_gep_edge(src, dst, offset)
            }
        };
        if added.is_none() {
            debug!("Duplicate {:?} edge {} -> {}", edge.kind, edge.src, edge.dst);
        }
        Ok(())
    }

    fn add_direct_call(&mut self, call: &DirectCallDesc) -> Result<()> {
        let caller = self
            .function(&call.caller)
            .with_context(|| format!("Invalid caller of callsite `{}`", call.label))?;
        let callee = self
            .function(&call.callee)
            .with_context(|| format!("Invalid callee of callsite `{}`", call.label))?;
        let callsite = self.consg.add_call_site(&call.label, Some(caller));
        self.call_graph.add_edge(callsite, caller, callee);
        self.call_graph.set_callsite_type(callsite, CallType::Direct);
        Ok(())
    }

    fn add_indirect_call(&mut self, call: &IndirectCallDesc) -> Result<()> {
        let caller = match &call.caller {
            Some(caller) => Some(
                self.function(caller)
                    .with_context(|| format!("Invalid caller of callsite `{}`", call.label))?,
            ),
            None => None,
        };
        let fn_ptr = self
            .node(&call.fn_ptr)
            .with_context(|| format!("Invalid function pointer of callsite `{}`", call.label))?;
        let callsite = self.consg.add_call_site(&call.label, caller);
        self.consg.add_indirect_call(callsite, fn_ptr);
        Ok(())
    }
}
