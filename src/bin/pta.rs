// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `pta`.
//!
//! Loads a constraint graph, solves it, resolves the indirect calls and
//! writes the requested results.

use anyhow::{bail, Context};
use log::*;
use std::env;

use andersen_cg::builder::graph_loader;
use andersen_cg::pta::andersen::AndersenPTA;
use andersen_cg::pta::PointerAnalysis;
use andersen_cg::util::options::AnalysisOptions;

fn main() -> anyhow::Result<()> {
    // Initialize loggers.
    if env::var("PTA_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PTA_LOG")
            .write_style("PTA_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    // Get any options specified via the PTA_FLAGS environment variable
    let mut options = AnalysisOptions::default();
    if let Ok(pta_flags) = env::var("PTA_FLAGS") {
        let pta_args = AnalysisOptions::args_from_env_value(&pta_flags)
            .context("PTA_FLAGS must be a JSON array of strings")?;
        options.parse_from_args(&pta_args);
    }

    // Let arguments supplied on the command line override the environment variable.
    let args: Vec<String> = env::args().skip(1).collect();
    options.parse_from_args(&args);
    info!("PTA Options: {:?}", options);

    let Some(input) = options.input.clone() else {
        bail!("No input constraint graph given. Usage: pta [OPTIONS] INPUT");
    };
    let mut program = graph_loader::load_from_file(&input)?;

    let mut pta = AndersenPTA::new(&mut program.consg, options);
    pta.analyze();
    pta.update_call_graph(&mut program.call_graph);
    pta.finalize(&program.call_graph)
}
