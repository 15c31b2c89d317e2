//! Forward/backward timing propagation and slack computation.
//!
//! Arrival times (AT) propagate along the topological order: each vertex
//! settles at its own gate delay plus the latest predecessor arrival.
//! Required times (RT) propagate against the same order, seeded at the
//! endpoints with `Tclk - setup`. Slack is `RT - AT`; the worst and total
//! negative slack are aggregated over the endpoints.
//!
//! All three passes are pure functions of the immutable graph plus the
//! scalar configuration; results live in parallel arrays indexed by vertex
//! id, never in the graph itself.

use fixedbitset::FixedBitSet;
use petgraph::graph::NodeIndex;
use petgraph::visit::NodeIndexable;

use crate::netlist::{Role, TimingGraph};
use crate::order;
use crate::StaError;

/// Scalar timing configuration of one analysis run.
///
/// `tclk: None` means the design omits a clock; required times then default
/// to the arrival times (zero slack at every endpoint).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaConfig {
    pub tclk: Option<f64>,
    pub setup: f64,
    pub clock_to_q: f64,
}

impl Default for StaConfig {
    fn default() -> Self {
        StaConfig {
            tclk: Some(2.0),
            setup: 0.05,
            clock_to_q: 0.08,
        }
    }
}

/// Result of one STA invocation over a [`TimingGraph`].
#[derive(Debug, Clone)]
pub struct StaResult {
    /// The topological order shared by the forward pass and (reversed) by
    /// the backward pass.
    pub order: Vec<NodeIndex>,
    arrival: Vec<f64>,
    required: Vec<f64>,
    slack: Vec<f64>,
    critical_pred: Vec<Option<NodeIndex>>,
    reachable: FixedBitSet,
    /// Worst negative slack over the reachable endpoints.
    pub wns: f64,
    /// Total negative slack over the reachable endpoints.
    pub tns: f64,
}

impl StaResult {
    pub fn arrival(&self, ix: NodeIndex) -> f64 {
        self.arrival[ix.index()]
    }

    pub fn required(&self, ix: NodeIndex) -> f64 {
        self.required[ix.index()]
    }

    pub fn slack(&self, ix: NodeIndex) -> f64 {
        self.slack[ix.index()]
    }

    /// The argmax predecessor recorded by the forward pass, used for
    /// critical-path reconstruction.
    pub fn critical_pred(&self, ix: NodeIndex) -> Option<NodeIndex> {
        self.critical_pred[ix.index()]
    }

    /// Whether `ix` is reachable from some startpoint. Endpoints that are
    /// not (constant-driven islands) keep their per-vertex values but are
    /// excluded from WNS/TNS and from path extraction.
    pub fn is_reachable(&self, ix: NodeIndex) -> bool {
        self.reachable.contains(ix.index())
    }
}

/// Run the three timing passes over the graph.
pub fn run_sta(tg: &TimingGraph, cfg: &StaConfig) -> Result<StaResult, StaError> {
    let g = &tg.graph;
    let order = order::topological_order(tg)?;
    let bound = g.node_bound();

    let mut arrival = vec![0.0; bound];
    let mut critical_pred: Vec<Option<NodeIndex>> = vec![None; bound];
    let mut reachable = FixedBitSet::with_capacity(bound);

    for &v in &order {
        let node = &g[v];
        match node.role {
            Role::PrimaryInput => {
                arrival[v.index()] = 0.0;
                reachable.insert(v.index());
            }
            Role::FlipFlopQ => {
                arrival[v.index()] = cfg.clock_to_q;
                reachable.insert(v.index());
            }
            _ => {
                // AT(v) = delay(v) + max over predecessors; with no
                // predecessor the vertex is an implicit constant driver.
                let mut latest = 0.0;
                let mut best: Option<NodeIndex> = None;
                let mut reached = false;
                for (u, _) in tg.fanin(v) {
                    if best.is_none() || arrival[u.index()] > latest {
                        latest = arrival[u.index()];
                        best = Some(u);
                    }
                    reached |= reachable.contains(u.index());
                }
                arrival[v.index()] = node.delay + latest;
                critical_pred[v.index()] = best;
                if reached {
                    reachable.insert(v.index());
                }
            }
        }
    }

    let mut required = vec![f64::INFINITY; bound];
    for &v in order.iter().rev() {
        let node = &g[v];
        if node.role.is_endpoint() {
            required[v.index()] = match cfg.tclk {
                Some(tclk) => tclk - cfg.setup,
                None => arrival[v.index()],
            };
            continue;
        }
        let fanout = tg.fanout(v);
        if fanout.is_empty() {
            // not a declared endpoint: excluded from reporting
            continue;
        }
        let mut earliest = f64::INFINITY;
        for (w, _) in fanout {
            let candidate = required[w.index()] - g[w].delay;
            if candidate < earliest {
                earliest = candidate;
            }
        }
        required[v.index()] = earliest;
    }

    let mut slack = vec![f64::INFINITY; bound];
    for ix in g.node_indices() {
        slack[ix.index()] = required[ix.index()] - arrival[ix.index()];
    }

    let mut wns = f64::INFINITY;
    let mut tns = 0.0;
    for &e in &tg.endpoints {
        if !reachable.contains(e.index()) {
            continue;
        }
        let s = slack[e.index()];
        if s < wns {
            wns = s;
        }
        if s < 0.0 {
            tns += s;
        }
    }

    Ok(StaResult {
        order,
        arrival,
        required,
        slack,
        critical_pred,
        reachable,
        wns,
        tns,
    })
}
