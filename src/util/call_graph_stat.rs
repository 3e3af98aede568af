// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::io::{BufWriter, Write};

use crate::graph::call_graph::{CallGraph, CallType};
use crate::graph::constraint_graph::ConstraintGraph;
use crate::graph::function::{CallSiteId, FuncId};

/// Counters describing a call graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallGraphStat {
    pub num_functions: usize,
    pub num_call_graph_edges: usize,
    pub num_direct_calls: usize,
    pub num_direct_call_edges: usize,
    pub num_indirect_calls: usize,
    pub num_indirect_call_edges: usize,
    /// Indirect callsites of the constraint graph without any call edge.
    pub num_unresolved_indirect_calls: usize,
}

impl CallGraphStat {
    pub fn new(consg: &ConstraintGraph, call_graph: &CallGraph<FuncId, CallSiteId>) -> Self {
        let mut stat = CallGraphStat {
            num_functions: call_graph.num_functions(),
            num_call_graph_edges: call_graph.num_edges(),
            ..Default::default()
        };

        for (callsite, call_edges) in &call_graph.callsite_to_edges {
            match call_graph.get_callsite_type(callsite) {
                Some(CallType::Indirect) => {
                    stat.num_indirect_calls += 1;
                    stat.num_indirect_call_edges += call_edges.len();
                }
                Some(CallType::Direct) | None => {
                    stat.num_direct_calls += 1;
                    stat.num_direct_call_edges += call_edges.len();
                }
            }
        }

        stat.num_unresolved_indirect_calls = consg
            .get_indirect_callsites()
            .iter()
            .filter(|(callsite, _)| {
                call_graph
                    .callsite_to_edges
                    .get(callsite)
                    .map_or(true, |edges| edges.is_empty())
            })
            .count();
        stat
    }

    pub fn dump<W: Write>(&self, stat_writer: &mut BufWriter<W>) -> std::io::Result<()> {
        writeln!(stat_writer, "Call Graph Statistics: ")?;
        writeln!(stat_writer, "#Functions: {}", self.num_functions)?;
        writeln!(stat_writer, "#Call graph edges: {}", self.num_call_graph_edges)?;
        writeln!(
            stat_writer,
            "#Direct calls: {}, #call graph edges: {}",
            self.num_direct_calls, self.num_direct_call_edges
        )?;
        writeln!(
            stat_writer,
            "#Indirect calls: {}, #call graph edges: {}",
            self.num_indirect_calls, self.num_indirect_call_edges
        )?;
        writeln!(
            stat_writer,
            "#Unresolved indirect calls: {}",
            self.num_unresolved_indirect_calls
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_direct_indirect_and_unresolved_calls() {
        let mut consg = ConstraintGraph::new();
        let (main, _) = consg.add_function("main");
        let (f, _) = consg.add_function("f");
        let (g, _) = consg.add_function("g");
        let fp = consg.add_value_node("fp");
        let direct = consg.add_call_site("main:1", Some(main));
        let resolved = consg.add_call_site("main:2", Some(main));
        let unresolved = consg.add_call_site("main:3", Some(main));
        consg.add_indirect_call(resolved, fp);
        consg.add_indirect_call(unresolved, fp);

        let mut call_graph = CallGraph::new();
        call_graph.add_edge(direct, main, f);
        call_graph.set_callsite_type(direct, CallType::Direct);
        call_graph.add_edge(resolved, main, f);
        call_graph.add_edge(resolved, main, g);
        call_graph.set_callsite_type(resolved, CallType::Indirect);
        call_graph.set_callsite_type(unresolved, CallType::Indirect);

        let stat = CallGraphStat::new(&consg, &call_graph);
        assert_eq!(stat.num_functions, 3);
        assert_eq!(stat.num_call_graph_edges, 3);
        assert_eq!(stat.num_direct_calls, 1);
        assert_eq!(stat.num_indirect_calls, 1);
        assert_eq!(stat.num_indirect_call_edges, 2);
        assert_eq!(stat.num_unresolved_indirect_calls, 1);

        let mut writer = BufWriter::new(Vec::new());
        stat.dump(&mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(text.contains("#Indirect calls: 1, #call graph edges: 2"));
    }
}
