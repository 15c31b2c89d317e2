//! Static timing analysis for gate-level netlists.
//!
//! This library translates a structural netlist into a directed timing
//! graph, propagates arrival and required times over it, and enumerates the
//! K worst edge-disjoint critical paths between sequential endpoints.
//!
//! # Overview
//!
//! Analysis runs as a leaves-first pipeline:
//!
//! 1. **Load** ([`netlist`]): parse the netlist, classify each assignment
//!    or primitive instance into a gate tag, and build the timing graph.
//!    Flip-flops split into a D-side endpoint and a Q-side startpoint, so
//!    the sequential circuit becomes a DAG.
//! 2. **Order** ([`order`]): Kahn's algorithm produces the topological
//!    order shared by both timing passes.
//! 3. **Analyse** ([`analyse`]): the forward pass computes arrival times,
//!    the backward pass computes required times, slack is their
//!    difference, and the extractor peels off edge-disjoint critical
//!    paths worst-first.
//!
//! Every tie in the pipeline resolves by vertex/edge insertion order, so
//! repeated runs over the same netlist produce byte-identical reports.
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use verista::{build_graph, find_k_critical_paths, run_sta, StaConfig};
//!
//! let (graph, warnings) = build_graph(Path::new("counter.v"))?;
//! let cfg = StaConfig { tclk: Some(2.0), setup: 0.05, clock_to_q: 0.08 };
//!
//! let result = run_sta(&graph, &cfg)?;
//! println!("WNS = {:.6} ns, TNS = {:.6} ns", result.wns, result.tns);
//!
//! let (paths, _) = find_k_critical_paths(&graph, &cfg, 4, false)?;
//! for path in &paths {
//!     println!("{:?}: slack {:.6}", path.vertices, path.endpoint_slack);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **[`netlist`]**: netlist parsing, gate classification, and the
//!   [`TimingGraph`] representation
//! - **[`order`]**: deterministic topological ordering, including the
//!   step-wise wave mode
//! - **[`analyse`]**: the timing passes, the K-path extractor, and the
//!   report subcommands

use std::{error::Error, fmt, fs, path::Path};

use anyhow::Result;
use clap::Parser;

pub mod analyse;
pub mod netlist;
pub mod order;

pub use analyse::{
    find_k_critical_paths, paths_main, report_main, run_sta, waves_main, PathReport, PathsArgs,
    ReportArgs, StaConfig, StaResult, WavesArgs,
};
pub use netlist::{DelayTable, GateKind, Role, SignalNode, Symbol, TimingGraph};

/// Fatal analysis errors. Any of these aborts the whole STA invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaError {
    /// The netlist does not parse, or a net is driven illegally.
    MalformedNetlist(String),
    /// An expression references a net that is neither a declared input nor
    /// produced by any assignment or instance.
    UndefinedSignal(Symbol),
    /// A cycle through combinational logic, with a witness vertex.
    CycleInCombinational(Symbol),
    /// Path extraction was requested on a graph with no endpoints.
    NoEndpoints,
}

impl fmt::Display for StaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaError::MalformedNetlist(msg) => write!(f, "malformed netlist: {}", msg),
            StaError::UndefinedSignal(name) => write!(f, "undefined signal '{}'", name),
            StaError::CycleInCombinational(name) => {
                write!(f, "combinational cycle through '{}'", name)
            }
            StaError::NoEndpoints => write!(f, "timing graph has no endpoints"),
        }
    }
}

impl Error for StaError {}

/// Non-fatal diagnostics, collected into a list returned alongside results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An instance of an unrecognized primitive; its outputs are tagged
    /// UNKNOWN with zero delay.
    UnknownPrimitive(Symbol),
    /// An endpoint became unreachable during path extraction and was
    /// dropped from further consideration.
    NoPathToEndpoint(Symbol),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownPrimitive(name) => {
                write!(f, "unknown primitive '{}' treated as a black box", name)
            }
            Warning::NoPathToEndpoint(name) => {
                write!(f, "no remaining path to endpoint '{}'", name)
            }
        }
    }
}

/// Read a netlist file and build its timing graph with the default
/// gate-delay table.
pub fn build_graph(path: &Path) -> Result<(TimingGraph, Vec<Warning>)> {
    build_graph_with(path, &DelayTable::default())
}

/// Read a netlist file and build its timing graph with a caller-supplied
/// gate-delay table. Combinational cycles surface here, at load time.
pub fn build_graph_with(
    path: &Path,
    delays: &DelayTable,
) -> Result<(TimingGraph, Vec<Warning>)> {
    let text = fs::read_to_string(path)?;
    let (graph, warnings) = netlist::parse(&text, delays)?;
    order::topological_order(&graph)?;
    Ok((graph, warnings))
}

/// Command-line interface of the analysis tools.
#[derive(Debug, Parser)]
#[clap(
    name = "Verista",
    about = "Gate-level netlist static timing analysis tools"
)]
pub enum CLIArguments {
    /// Compute arrival/required times and report slack metrics
    Report(ReportArgs),
    /// Enumerate the K worst edge-disjoint critical paths
    Paths(PathsArgs),
    /// Print the topological waves of the timing graph
    Waves(WavesArgs),
}
