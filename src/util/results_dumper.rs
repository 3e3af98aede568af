// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Context;
use itertools::Itertools;
use log::*;
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::builder::call_graph_builder;
use crate::graph::call_graph::CallGraph;
use crate::graph::constraint_graph::ConstraintGraph;
use crate::graph::function::{CallSiteId, FuncId};
use crate::pta::andersen::AndersenPTA;
use crate::pta::DiffPTDataTy;
use crate::pts_set::points_to::PointsToSet;

/// Writes the results selected by the analysis options.
pub fn dump_results(pta: &AndersenPTA, call_graph: &CallGraph<FuncId, CallSiteId>) -> anyhow::Result<()> {
    let options = pta.options();

    // dump points-to results
    if let Some(pts_output) = &options.pts_output {
        info!("Dumping points-to results...");
        let mut writer = create_writer(pts_output)?;
        dump_pts(pta.consg(), pta.get_pt_data(), &mut writer)
            .with_context(|| format!("Failed to write points-to results to {}", pts_output))?;
    }

    // dump call graph
    if let Some(cg_output) = &options.call_graph_output {
        info!("Dumping call graph...");
        std::fs::write(cg_output, call_graph.to_dot(pta.consg()))
            .with_context(|| format!("Failed to write call graph to {}", cg_output))?;
    }

    // dump constraint graph, including the copy edges added while solving
    if let Some(consg_output) = &options.constraint_graph_output {
        info!("Dumping constraint graph...");
        std::fs::write(consg_output, pta.consg().to_dot())
            .with_context(|| format!("Failed to write constraint graph to {}", consg_output))?;
    }

    // dump indirect calls with their resolved targets
    if let Some(calls_output) = &options.indirect_calls_output {
        info!("Dumping indirect calls...");
        let mut writer = create_writer(calls_output)?;
        dump_indirect_calls(pta.consg(), pta.get_pt_data(), &mut writer)
            .with_context(|| format!("Failed to write indirect calls to {}", calls_output))?;
    }
    Ok(())
}

/// Opens `path` for writing, `stdout` denoting the standard output.
fn create_writer(path: &str) -> anyhow::Result<BufWriter<Box<dyn Write>>> {
    let writer = match path {
        "stdout" => Box::new(std::io::stdout()) as Box<dyn Write>,
        _ => Box::new(File::create(path).with_context(|| format!("Unable to create file {}", path))?)
            as Box<dyn Write>,
    };
    Ok(BufWriter::new(writer))
}

/// Writes one line `name ==> { pointee ... }` for each node with a non-empty
/// points-to set, ordered by node index.
pub fn dump_pts<W: Write>(consg: &ConstraintGraph, pt_data: &DiffPTDataTy, writer: &mut W) -> std::io::Result<()> {
    for node in pt_data.keys().sorted() {
        let pts = pt_data.get_pts(node);
        if pts.is_empty() {
            continue;
        }
        write!(writer, "{} ==> {{ ", consg.node_name(node))?;
        for pointee in pts.iter().sorted() {
            write!(writer, "{} ", consg.node_name(pointee))?;
        }
        writeln!(writer, "}}")?;
    }
    writer.flush()
}

/// Writes every indirect callsite with its caller and the functions it may call.
pub fn dump_indirect_calls<W: Write>(
    consg: &ConstraintGraph,
    pt_data: &DiffPTDataTy,
    writer: &mut W,
) -> std::io::Result<()> {
    writeln!(writer, "#Indirect calls:")?;
    for &(callsite, fn_ptr) in consg.get_indirect_callsites() {
        let callsite_info = consg.call_site(callsite);
        let caller = match callsite_info.caller {
            Some(caller) => consg.function_name(caller),
            None => "<unknown>",
        };
        writeln!(
            writer,
            "\tcallsite: {}, caller: {}, fn_ptr: {}, callee:",
            callsite_info.label,
            caller,
            consg.node_name(fn_ptr)
        )?;
        for callee in call_graph_builder::resolve_call_targets(consg, pt_data, fn_ptr) {
            writeln!(writer, "\t\t{}", consg.function_name(callee))?;
        }
    }
    writer.flush()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pta::PointerAnalysis;
    use crate::util::options::AnalysisOptions;

    fn sample_graph() -> ConstraintGraph {
        let mut consg = ConstraintGraph::new();
        let (main, _) = consg.add_function("main");
        let (_, f_node) = consg.add_function("f");
        let o = consg.add_object_node("o");
        let p = consg.add_value_node("p");
        let fp = consg.add_value_node("fp");
        consg.add_addr_edge(o, p);
        consg.add_addr_edge(f_node, fp);
        let cs = consg.add_call_site("main:9", Some(main));
        consg.add_indirect_call(cs, fp);
        consg
    }

    #[test]
    fn points_to_dump_is_sorted_and_skips_empty_sets() {
        let mut consg = sample_graph();
        let mut pta = AndersenPTA::new(&mut consg, AnalysisOptions::default());
        pta.analyze();

        let mut out = Vec::new();
        dump_pts(pta.consg(), pta.get_pt_data(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "p ==> { o }\nfp ==> { f }\n");
    }

    #[test]
    fn indirect_calls_dump_lists_callees() {
        let mut consg = sample_graph();
        let mut pta = AndersenPTA::new(&mut consg, AnalysisOptions::default());
        pta.analyze();

        let mut out = Vec::new();
        dump_indirect_calls(pta.consg(), pta.get_pt_data(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("callsite: main:9, caller: main, fn_ptr: fp, callee:\n\t\tf\n"));
    }
}
