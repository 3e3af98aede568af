// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.
//
// Runs the analysis on the constraint graphs under tests/unit_tests.

use std::collections::HashSet;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use andersen_cg::builder::graph_loader::{self, LoadedProgram};
use andersen_cg::graph::call_graph::CallType;
use andersen_cg::graph::constraint_graph::{ConstraintEdgeKind, ConstraintGraph, ConstraintNodeKind, GepOffset};
use andersen_cg::graph::function::FuncId;
use andersen_cg::pta::andersen::AndersenPTA;
use andersen_cg::pta::{NodeId, PointerAnalysis};
use andersen_cg::pts_set::points_to::PointsToSet;
use andersen_cg::util::options::AnalysisOptions;

fn load(name: &str) -> LoadedProgram {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "unit_tests", name].iter().collect();
    graph_loader::load_from_file(&path).unwrap()
}

fn node(consg: &ConstraintGraph, name: &str) -> NodeId {
    consg
        .node_ids()
        .find(|node_id| consg.node_name(*node_id) == name)
        .unwrap_or_else(|| panic!("no node named {}", name))
}

fn func(consg: &ConstraintGraph, name: &str) -> FuncId {
    consg.get_function(node(consg, name)).unwrap()
}

fn names(pta: &AndersenPTA, node_id: NodeId) -> HashSet<String> {
    pta.get_pts(node_id)
        .iter()
        .map(|pointee| pta.consg().node_name(pointee).to_owned())
        .collect()
}

fn set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn address() {
    let mut program = load("address.json");
    let p = node(&program.consg, "p");
    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();
    assert_eq!(names(&pta, p), set(&["o1"]));
}

#[test]
fn copy() {
    let mut program = load("copy.json");
    let x = node(&program.consg, "x");
    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();
    assert_eq!(names(&pta, x), set(&["o1"]));
}

#[test]
fn store() {
    let mut program = load("store.json");
    let o1 = node(&program.consg, "o1");
    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();
    assert_eq!(names(&pta, o1), set(&["o2"]));
}

#[test]
fn load_through_pointer() {
    let mut program = load("load.json");
    let r = node(&program.consg, "r");
    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();
    assert_eq!(names(&pta, r), set(&["o3"]));
}

#[test]
fn gep() {
    let mut program = load("gep.json");
    let consg = &program.consg;
    let (o1, x, y, e) = (node(consg, "o1"), node(consg, "x"), node(consg, "y"), node(consg, "e"));
    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();

    let field = pta.consg().find_gep_obj(o1, 2).unwrap();
    assert_eq!(pta.get_pts(x).iter().collect::<Vec<_>>(), vec![field]);
    // A field of the field o1.2 at offset 1 is o1.3.
    assert_eq!(names(&pta, y), set(&["o1.3"]));
    // Variant offsets into a field-insensitive array yield the array itself.
    assert_eq!(names(&pta, e), set(&["arr"]));
}

#[test]
fn function_pointer_calls() {
    let mut program = load("func_ptr.json");
    let consg = &program.consg;
    let (main, f1, f2, unused) = (
        func(consg, "main"),
        func(consg, "f1"),
        func(consg, "f2"),
        func(consg, "unused"),
    );
    let callsites: Vec<_> = consg.get_indirect_callsites().iter().map(|(cs, _)| *cs).collect();
    let (cs, cs_null, cs_ctor) = (callsites[0], callsites[1], callsites[2]);

    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();
    assert_eq!(pta.update_call_graph(&mut program.call_graph), 2);

    let call_graph = &program.call_graph;
    assert_eq!(call_graph.get_callees(&cs), HashSet::from([f1, f2]));
    assert_eq!(call_graph.get_callsite_type(&cs), Some(&CallType::Indirect));
    assert!(call_graph.get_callees(&cs_null).is_empty());
    assert!(call_graph.get_callees(&cs_ctor).is_empty());
    assert!(call_graph.get_callees_of(main).contains(&f1));
    assert!(!call_graph.get_callees_of(main).contains(&unused));
    // the direct call and the two resolved targets
    assert_eq!(call_graph.num_edges(), 3);

    // Resolving again adds nothing.
    assert_eq!(pta.update_call_graph(&mut program.call_graph), 0);
    assert_eq!(program.call_graph.num_edges(), 3);
}

#[test]
fn callback_stored_in_struct_field() {
    let mut program = load("callback_struct.json");
    let consg = &program.consg;
    let (register, on_read, on_write) = (
        func(consg, "register"),
        func(consg, "on_read"),
        func(consg, "on_write"),
    );
    let cb = node(consg, "cb");

    let mut pta = AndersenPTA::new(&mut program.consg, AnalysisOptions::default());
    pta.analyze();
    assert_eq!(names(&pta, cb), set(&["on_read"]));
    assert_eq!(pta.update_call_graph(&mut program.call_graph), 1);

    let callees = program.call_graph.get_callees_of(register);
    assert!(callees.contains(&on_read));
    assert!(!callees.contains(&on_write));
}

/// Builds a random constraint graph over a few objects and pointers.
fn random_graph(rng: &mut StdRng) -> ConstraintGraph {
    let mut consg = ConstraintGraph::new();
    let objects: Vec<NodeId> = (0..6).map(|i| consg.add_object_node(&format!("o{}", i))).collect();
    let values: Vec<NodeId> = (0..10).map(|i| consg.add_value_node(&format!("v{}", i))).collect();
    let all: Vec<NodeId> = objects.iter().chain(values.iter()).copied().collect();

    for _ in 0..8 {
        let o = objects[rng.gen_range(0..objects.len())];
        let p = all[rng.gen_range(0..all.len())];
        consg.add_addr_edge(o, p);
    }
    for _ in 0..30 {
        let src = all[rng.gen_range(0..all.len())];
        let dst = all[rng.gen_range(0..all.len())];
        match rng.gen_range(0..5) {
            0 | 1 => consg.add_copy_edge(src, dst),
            2 => consg.add_load_edge(src, dst),
            3 => consg.add_store_edge(src, dst),
            _ => consg.add_gep_edge(src, dst, GepOffset::Constant(rng.gen_range(0..3))),
        };
    }
    consg
}

/// The node a constant gep from `obj` must reach, following the field layout rules.
fn expected_field(consg: &ConstraintGraph, obj: NodeId, offset: usize) -> NodeId {
    match consg.get_node(obj).kind() {
        ConstraintNodeKind::Object { field_insensitive: false } => {
            if offset >= consg.field_limit() {
                obj
            } else {
                consg.find_gep_obj(obj, offset).unwrap()
            }
        }
        ConstraintNodeKind::Field { base, offset: base_offset } => {
            expected_field(consg, *base, base_offset + offset)
        }
        _ => obj,
    }
}

#[test]
fn random_graphs_reach_a_sound_fixpoint() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let mut consg = random_graph(&mut rng);
        let options = AnalysisOptions {
            field_limit: 6,
            ..AnalysisOptions::default()
        };
        let mut pta = AndersenPTA::new(&mut consg, options);
        pta.analyze();

        let edges: Vec<_> = pta.consg().edges().collect();
        for (src, dst, kind) in edges {
            let pts_src = pta.get_pts(src);
            let pts_dst = pta.get_pts(dst);
            match kind {
                ConstraintEdgeKind::Address => assert!(pts_dst.contains(src)),
                ConstraintEdgeKind::Copy => assert!(pts_dst.superset(&pts_src)),
                ConstraintEdgeKind::Load => {
                    for o in &pts_src {
                        assert!(pta.get_pts(dst).superset(&pta.get_pts(o)));
                    }
                }
                ConstraintEdgeKind::Store => {
                    for o in &pts_dst {
                        assert!(pta.get_pts(o).superset(&pts_src));
                    }
                }
                ConstraintEdgeKind::Gep(GepOffset::Constant(offset)) => {
                    for o in &pts_src {
                        assert!(pts_dst.contains(expected_field(pta.consg(), o, offset)));
                    }
                }
                ConstraintEdgeKind::Gep(GepOffset::Variant) => {}
            }
        }

        // A converged analysis stays unchanged when run again.
        let before: Vec<_> = pta.consg().node_ids().map(|n| pta.get_pts(n).count()).collect();
        let num_edges = pta.consg().edge_count();
        pta.analyze();
        let after: Vec<_> = pta.consg().node_ids().map(|n| pta.get_pts(n).count()).collect();
        assert_eq!(before, after);
        assert_eq!(pta.consg().edge_count(), num_edges);
    }
}

#[test]
fn missing_input_file_is_reported() {
    let err = graph_loader::load_from_file("tests/unit_tests/does_not_exist.json").unwrap_err();
    assert!(err.to_string().contains("Failed to read constraint graph file"));
}
