// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;
use std::io::{BufWriter, Write};

use crate::graph::call_graph::CallGraph;
use crate::graph::function::{CallSiteId, FuncId};
use crate::pta::andersen::AndersenPTA;
use crate::pts_set::points_to::PointsToSet;
use crate::util::call_graph_stat::CallGraphStat;

pub struct AndersenStat<'a, 'pta> {
    pta: &'a AndersenPTA<'pta>,
    call_graph: &'a CallGraph<FuncId, CallSiteId>,
}

impl<'a, 'pta> AndersenStat<'a, 'pta> {
    pub fn new(pta: &'a AndersenPTA<'pta>, call_graph: &'a CallGraph<FuncId, CallSiteId>) -> Self {
        AndersenStat { pta, call_graph }
    }

    pub fn dump_stats(&self) -> std::io::Result<()> {
        let mut stat_writer = BufWriter::new(Box::new(std::io::stdout()) as Box<dyn Write>);

        info!("Dumping pta statistics...");
        self.write_stats(&mut stat_writer)?;
        stat_writer.flush()
    }

    pub fn write_stats<W: Write>(&self, stat_writer: &mut BufWriter<W>) -> std::io::Result<()> {
        writeln!(stat_writer, "##########################################################")?;
        CallGraphStat::new(self.pta.consg(), self.call_graph).dump(stat_writer)?;
        writeln!(stat_writer, "----------------------------------------------------------")?;
        self.dump_pts_stat(stat_writer)?;
        writeln!(stat_writer, "##########################################################")?;
        Ok(())
    }

    pub fn dump_pts_stat<W: Write>(&self, stat_writer: &mut BufWriter<W>) -> std::io::Result<()> {
        let pts_map = &self.pta.pt_data.propa_pts_map;
        let num_pointers = pts_map.values().filter(|pts| !pts.is_empty()).count();
        let num_pts_relations: usize = pts_map.values().map(|pts| pts.count()).sum();
        let avg_pts = if num_pointers == 0 {
            0.0
        } else {
            num_pts_relations as f64 / num_pointers as f64
        };

        writeln!(stat_writer, "Points-to Statistics: ")?;
        writeln!(stat_writer, "#Pointers: {}", num_pointers)?;
        writeln!(stat_writer, "#Points-to relations: {}", num_pts_relations)?;
        writeln!(stat_writer, "#Avg points-to size: {:.2}", avg_pts)?;
        writeln!(stat_writer, "#Processed nodes: {}", self.pta.stat.processed_nodes)?;
        writeln!(stat_writer, "#Added copy edges: {}", self.pta.stat.new_copy_edges)?;
        writeln!(
            stat_writer,
            "Analysis time: {}",
            humantime::format_duration(self.pta.analysis_time)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::constraint_graph::ConstraintGraph;
    use crate::pta::PointerAnalysis;
    use crate::util::options::AnalysisOptions;

    #[test]
    fn pts_statistics_count_non_empty_pointers() {
        let mut consg = ConstraintGraph::new();
        let o1 = consg.add_object_node("o1");
        let o2 = consg.add_object_node("o2");
        let p = consg.add_value_node("p");
        let q = consg.add_value_node("q");
        consg.add_addr_edge(o1, p);
        consg.add_addr_edge(o2, p);
        consg.add_copy_edge(p, q);

        let mut pta = AndersenPTA::new(&mut consg, AnalysisOptions::default());
        pta.analyze();
        let call_graph = CallGraph::new();
        let stat = AndersenStat::new(&pta, &call_graph);

        let mut writer = BufWriter::new(Vec::new());
        stat.write_stats(&mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(text.contains("#Pointers: 2"));
        assert!(text.contains("#Points-to relations: 4"));
        assert!(text.contains("#Avg points-to size: 2.00"));
    }
}
