//! Analysis subcommands: slack report, critical-path enumeration, and the
//! step-wise topological wave listing.

pub mod paths;
pub mod sta;

use std::{fs, path::PathBuf};

use anyhow::*;
use clap::Parser;
use ordered_float::OrderedFloat;
use petgraph::dot;
use petgraph::graph::NodeIndex;
use prettytable::*;
use rayon::prelude::*;

use crate::netlist::{DelayTable, GateKind};
use crate::{build_graph_with, order};

pub use paths::{find_k_critical_paths, PathReport};
pub use sta::{run_sta, StaConfig, StaResult};

fn parse_delay_override(s: &str) -> Result<(GateKind, f64), String> {
    let (tag, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TAG=NS, got '{}'", s))?;
    let kind: GateKind = tag.parse()?;
    let ns: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid delay value '{}'", value))?;
    if ns < 0.0 {
        return Err(format!("delay must be non-negative: {}", s));
    }
    std::result::Result::Ok((kind, ns))
}

/// Timing scalars shared by the report and paths subcommands.
#[derive(clap::Args, Debug, Clone)]
pub struct TimingArgs {
    /// Clock period in nanoseconds
    #[clap(short('t'), long, default_value_t = 2.0)]
    pub clock_period: f64,

    /// Setup time subtracted from the clock period at endpoints
    #[clap(long, default_value_t = 0.05)]
    pub setup: f64,

    /// Clock-to-Q delay seeding flip-flop startpoints
    #[clap(long, default_value_t = 0.08)]
    pub clock_to_q: f64,

    /// Analyse without a clock: required times default to arrival times
    #[clap(long)]
    pub no_clock: bool,

    /// Override a gate-delay table entry, e.g. --delay AND=0.025
    #[clap(long, value_parser = parse_delay_override)]
    pub delay: Vec<(GateKind, f64)>,
}

impl TimingArgs {
    fn config(&self) -> StaConfig {
        StaConfig {
            tclk: (!self.no_clock).then_some(self.clock_period),
            setup: self.setup,
            clock_to_q: self.clock_to_q,
        }
    }

    fn delays(&self) -> DelayTable {
        let mut table = DelayTable::default();
        for (kind, ns) in &self.delay {
            table.set(*kind, *ns);
        }
        table
    }
}

#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Gate-level netlist input file
    pub input: PathBuf,

    #[clap(flatten)]
    pub timing: TimingArgs,

    /// DOT file displaying the timing graph
    #[clap(long)]
    pub dot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct PathsArgs {
    /// Gate-level netlist input file
    pub input: PathBuf,

    /// Number of edge-disjoint critical paths to extract
    #[clap(short('k'), long("count"), default_value_t = 1)]
    pub count: usize,

    /// After the worst path, report only paths with negative slack
    #[clap(long)]
    pub only_violating: bool,

    #[clap(flatten)]
    pub timing: TimingArgs,
}

#[derive(Parser, Debug)]
pub struct WavesArgs {
    /// Gate-level netlist input file
    pub input: PathBuf,
}

pub fn report_main(args: ReportArgs) -> Result<()> {
    let ReportArgs { input, timing, dot } = args;

    let (tg, warnings) = build_graph_with(&input, &timing.delays())?;
    let res = run_sta(&tg, &timing.config())?;

    println!(
        "Module '{}': {} vertices, {} edges, {} startpoints, {} endpoints",
        tg.name,
        tg.graph.node_count(),
        tg.graph.edge_count(),
        tg.startpoints.len(),
        tg.endpoints.len()
    );
    println!("WNS = {:.6} ns", res.wns);
    println!("TNS = {:.6} ns", res.tns);

    let mut rows: Vec<(f64, NodeIndex)> = tg
        .endpoints
        .iter()
        .copied()
        .filter(|&e| res.is_reachable(e))
        .map(|e| (res.slack(e), e))
        .collect();
    rows.par_sort_unstable_by_key(|&(slack, e)| (OrderedFloat(slack), e.index()));

    let mut table = Table::new();
    table.set_titles(row!["V", "Endpoint", "AT", "RT", "Slack"]);
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    for (slack, e) in rows {
        table.add_row(row![
            if slack < 0.0 { "*" } else { " " },
            tg.graph[e].name,
            format!("{:.6}", res.arrival(e)),
            format!("{:.6}", res.required(e)),
            format!("{:.6}", slack),
        ]);
    }
    table.printstd();

    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    if let Some(filename) = dot {
        fs::write(filename, format!("{:?}", dot::Dot::new(&tg.graph)))?;
    }

    Ok(())
}

pub fn paths_main(args: PathsArgs) -> Result<()> {
    let PathsArgs {
        input,
        count,
        only_violating,
        timing,
    } = args;

    let (tg, mut warnings) = build_graph_with(&input, &timing.delays())?;
    let res = run_sta(&tg, &timing.config())?;
    let (paths, path_warnings) =
        find_k_critical_paths(&tg, &timing.config(), count, only_violating)?;
    warnings.extend(path_warnings);

    println!(
        "Found {} critical path{}",
        paths.len(),
        if paths.len() == 1 { "" } else { "s" }
    );

    for (i, path) in paths.iter().enumerate() {
        let mut table = Table::new();
        table.set_titles(row!["V", "Signal", "Gate", "Delay", "AT", "Slack"]);
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        for &ix in &path.nodes {
            let node = &tg.graph[ix];
            let slack = res.slack(ix);
            table.add_row(row![
                if slack < 0.0 { "*" } else { " " },
                node.name,
                node.kind,
                format!("{:.3}", node.delay),
                format!("{:.6}", res.arrival(ix)),
                format!("{:.6}", slack),
            ]);
        }
        println!(
            "\nPath {}: endpoint slack = {:.6} ns, total delay = {:.6} ns ({} vertices)",
            i,
            path.endpoint_slack,
            path.total_delay,
            path.vertices.len()
        );
        table.printstd();
    }

    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    Ok(())
}

pub fn waves_main(args: WavesArgs) -> Result<()> {
    let WavesArgs { input } = args;

    let (tg, _warnings) = build_graph_with(&input, &DelayTable::default())?;
    for (i, wave) in order::waves(&tg).enumerate() {
        let names: Vec<&str> = wave.iter().map(|&ix| tg.graph[ix].name.as_ref()).collect();
        println!("wave {:>3}: {}", i, names.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_override_parses() {
        let (kind, ns) = parse_delay_override("AND=0.025").expect("parses");
        assert_eq!(kind, GateKind::And);
        assert!((ns - 0.025).abs() < 1e-12);

        let (kind, _) = parse_delay_override("mux2_not=0.1").expect("case-insensitive");
        assert_eq!(kind, GateKind::Mux2Not);

        assert!(parse_delay_override("AND").is_err());
        assert!(parse_delay_override("FOO=0.1").is_err());
        assert!(parse_delay_override("AND=-1").is_err());
    }

    #[test]
    fn timing_args_build_the_config() {
        let args = TimingArgs {
            clock_period: 1.5,
            setup: 0.1,
            clock_to_q: 0.2,
            no_clock: false,
            delay: vec![(GateKind::Or, 0.5)],
        };
        let cfg = args.config();
        assert_eq!(cfg.tclk, Some(1.5));
        assert!((args.delays().get(GateKind::Or) - 0.5).abs() < 1e-12);

        let unclocked = TimingArgs {
            no_clock: true,
            ..args
        };
        assert_eq!(unclocked.config().tclk, None);
    }
}
