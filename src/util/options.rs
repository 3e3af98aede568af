// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use clap::{Arg, Command};

use crate::graph::constraint_graph::DEFAULT_FIELD_LIMIT;

const PTA_USAGE: &str = r#"pta [OPTIONS] INPUT"#;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command<'static> {
    Command::new("pta")
        .no_binary_name(true)
        .override_usage(PTA_USAGE)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("field-limit")
            .long("field-limit")
            .takes_value(true)
            .value_parser(clap::value_parser!(usize))
            .help("Field offsets at or beyond this limit are merged into their base object.")
            .long_help("Bounds the number of field objects synthesized per object, which keeps \
                        the analysis finite when a field access lies on a cycle."))
        .arg(Arg::new("dump-stats")
            .long("dump-stats")
            .takes_value(false)
            .help("Dump the statistics of the analysis results."))
        .arg(Arg::new("pts-output")
            .long("dump-pts")
            .takes_value(true)
            .value_name("FILE")
            .help("Dump points-to results to the output file, or `stdout`."))
        .arg(Arg::new("call-graph-output")
            .long("dump-call-graph")
            .takes_value(true)
            .value_name("FILE")
            .help("Dump the call graph in DOT format to the output file."))
        .arg(Arg::new("constraint-graph-output")
            .long("dump-constraint-graph")
            .takes_value(true)
            .value_name("FILE")
            .help("Dump the solved constraint graph in DOT format to the output file.")
            .long_help("Copy edges materialized for load and store constraints are included."))
        .arg(Arg::new("indirect-calls-output")
            .long("dump-indirect-calls")
            .takes_value(true)
            .value_name("FILE")
            .help("Dump resolved indirect callsites with their call targets, to a file or `stdout`."))
        .arg(Arg::new("INPUT")
            .help("The constraint graph to be analyzed, in JSON format."))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub input: Option<String>,
    pub field_limit: usize,

    pub dump_stats: bool,
    pub pts_output: Option<String>,
    pub call_graph_output: Option<String>,
    pub constraint_graph_output: Option<String>,
    pub indirect_calls_output: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            input: None,
            field_limit: DEFAULT_FIELD_LIMIT,
            dump_stats: false,
            pts_output: None,
            call_graph_output: None,
            constraint_graph_output: None,
            indirect_calls_output: None,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from a list of strings. Options that are not given keep their
    /// current values, so arguments parsed later override earlier ones.
    ///
    /// Invalid arguments print a diagnostic and exit the process.
    pub fn parse_from_args(&mut self, args: &[String]) {
        let matches = match make_options_parser().try_get_matches_from(args.iter()) {
            Ok(matches) => matches,
            // Help and version requests exit successfully, anything else with an error code.
            Err(e) => e.exit(),
        };

        if let Some(input) = matches.get_one::<String>("INPUT") {
            self.input = Some(input.clone());
        }
        if let Some(field_limit) = matches.get_one::<usize>("field-limit") {
            self.field_limit = *field_limit;
        }
        self.dump_stats |= matches.contains_id("dump-stats");
        Self::override_with(&mut self.pts_output, matches.get_one::<String>("pts-output"));
        Self::override_with(&mut self.call_graph_output, matches.get_one::<String>("call-graph-output"));
        Self::override_with(
            &mut self.constraint_graph_output,
            matches.get_one::<String>("constraint-graph-output"),
        );
        Self::override_with(
            &mut self.indirect_calls_output,
            matches.get_one::<String>("indirect-calls-output"),
        );
    }

    /// Parses the JSON array of strings held by an environment variable such as `PTA_FLAGS`.
    pub fn args_from_env_value(value: &str) -> anyhow::Result<Vec<String>> {
        let args: Vec<String> = serde_json::from_str(value)?;
        Ok(args)
    }

    fn override_with(slot: &mut Option<String>, value: Option<&String>) {
        if let Some(value) = value {
            *slot = Some(value.clone());
        }
    }
}
