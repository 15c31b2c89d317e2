//! Enumeration of the K worst edge-disjoint critical paths.
//!
//! Paths are extracted worst endpoint first. Each reconstruction follows
//! the `critical_pred` chain recorded by the forward pass, falling back to
//! the latest-arriving predecessor whose edge is still available once the
//! recorded edge has been consumed by an earlier path. Consumed edges are
//! tracked in a bitset over edge ids; the graph itself is never mutated, so
//! callers may extract paths for several configurations from one graph.

use fixedbitset::FixedBitSet;
use itertools::Itertools;
use petgraph::graph::NodeIndex;
use petgraph::visit::NodeIndexable;

use crate::netlist::{Symbol, TimingGraph};
use crate::{StaError, Warning};

use super::sta::{run_sta, StaConfig, StaResult};

/// One extracted source-to-sink path, startpoint first.
#[derive(Debug, Clone)]
pub struct PathReport {
    pub nodes: Vec<NodeIndex>,
    pub vertices: Vec<Symbol>,
    pub edges: Vec<(Symbol, Symbol)>,
    pub per_vertex_delay: Vec<f64>,
    pub total_delay: f64,
    pub endpoint_at: f64,
    pub endpoint_slack: f64,
}

/// Extract up to `k` edge-disjoint paths ordered by ascending endpoint
/// slack.
///
/// With `only_violating` the first path is always reported and extraction
/// stops once the worst remaining endpoint slack is non-negative; otherwise
/// paths are returned regardless of sign. Endpoints that can no longer
/// reach a startpoint over available edges are dropped with a
/// [`Warning::NoPathToEndpoint`].
pub fn find_k_critical_paths(
    tg: &TimingGraph,
    cfg: &StaConfig,
    k: usize,
    only_violating: bool,
) -> Result<(Vec<PathReport>, Vec<Warning>), StaError> {
    if tg.endpoints.is_empty() {
        return Err(StaError::NoEndpoints);
    }
    let res = run_sta(tg, cfg)?;

    let edge_bound = tg
        .graph
        .edge_indices()
        .map(|e| e.index())
        .max()
        .map_or(0, |m| m + 1);
    let mut consumed = FixedBitSet::with_capacity(edge_bound);
    let mut dropped = FixedBitSet::with_capacity(tg.graph.node_bound());
    let mut reports = Vec::new();
    let mut warnings = Vec::new();

    while reports.len() < k {
        let mut target: Option<NodeIndex> = None;
        for &e in &tg.endpoints {
            if dropped.contains(e.index()) || !res.is_reachable(e) {
                continue;
            }
            if target.map_or(true, |t| res.slack(e) < res.slack(t)) {
                target = Some(e);
            }
        }
        let Some(endpoint) = target else { break };
        if only_violating && !reports.is_empty() && res.slack(endpoint) >= 0.0 {
            break;
        }
        match trace_back(tg, &res, &consumed, endpoint) {
            Some(nodes) => {
                for (u, v) in nodes.iter().tuple_windows() {
                    if let Some(edge) = tg.graph.find_edge(*u, *v) {
                        consumed.insert(edge.index());
                    }
                }
                reports.push(report(tg, &res, nodes));
            }
            None => {
                dropped.insert(endpoint.index());
                warnings.push(Warning::NoPathToEndpoint(tg.graph[endpoint].name.clone()));
            }
        }
    }

    Ok((reports, warnings))
}

/// Walk from an endpoint back to a startpoint over available edges.
fn trace_back(
    tg: &TimingGraph,
    res: &StaResult,
    consumed: &FixedBitSet,
    endpoint: NodeIndex,
) -> Option<Vec<NodeIndex>> {
    let g = &tg.graph;
    let mut path = vec![endpoint];
    let mut cur = endpoint;
    while !g[cur].role.is_startpoint() {
        let fanin = tg.fanin(cur);
        let recorded = res.critical_pred(cur).and_then(|p| {
            fanin
                .iter()
                .find(|(u, e)| *u == p && !consumed.contains(e.index()))
                .map(|(u, _)| *u)
        });
        let next = recorded.or_else(|| {
            // recorded edge consumed: latest-arriving available predecessor
            let mut best: Option<NodeIndex> = None;
            for (u, e) in &fanin {
                if consumed.contains(e.index()) {
                    continue;
                }
                if best.map_or(true, |b| res.arrival(*u) > res.arrival(b)) {
                    best = Some(*u);
                }
            }
            best
        })?;
        path.push(next);
        cur = next;
    }
    path.reverse();
    Some(path)
}

fn report(tg: &TimingGraph, res: &StaResult, nodes: Vec<NodeIndex>) -> PathReport {
    let g = &tg.graph;
    let vertices: Vec<Symbol> = nodes.iter().map(|&ix| g[ix].name.clone()).collect();
    let edges: Vec<(Symbol, Symbol)> = vertices.iter().cloned().tuple_windows().collect();
    let per_vertex_delay: Vec<f64> = nodes.iter().map(|&ix| g[ix].delay).collect();
    let total_delay = per_vertex_delay.iter().sum();
    let endpoint = nodes[nodes.len() - 1];
    PathReport {
        endpoint_at: res.arrival(endpoint),
        endpoint_slack: res.slack(endpoint),
        nodes,
        vertices,
        edges,
        per_vertex_delay,
        total_delay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{parse, DelayTable};
    use std::collections::HashSet;

    fn load(input: &str) -> TimingGraph {
        parse(input, &DelayTable::default()).expect("netlist should parse").0
    }

    fn path_names(p: &PathReport) -> Vec<&str> {
        p.vertices.iter().map(|s| s.as_ref()).collect()
    }

    #[test]
    fn diamond_yields_two_disjoint_paths() {
        let tg = load(
            r#"module t(a, y);
               input a;
               output y;
               assign p = ~a;
               assign q = ~a;
               assign y = p & q;
               endmodule"#,
        );
        let (paths, warnings) =
            find_k_critical_paths(&tg, &StaConfig::default(), 2, false).expect("extracts");
        assert!(warnings.is_empty());
        assert_eq!(paths.len(), 2);
        assert_eq!(path_names(&paths[0]), vec!["a", "p", "y"]);
        assert_eq!(path_names(&paths[1]), vec!["a", "q", "y"]);
        assert!((paths[0].endpoint_slack - paths[1].endpoint_slack).abs() < 1e-12);

        let mut seen = HashSet::new();
        for p in &paths {
            for e in &p.edges {
                assert!(seen.insert(e.clone()), "paths share edge {:?}", e);
            }
        }
    }

    #[test]
    fn k_beyond_available_paths_truncates() {
        let tg = load(
            r#"module t(a, y);
               input a;
               output y;
               assign p = ~a;
               assign q = ~a;
               assign y = p & q;
               endmodule"#,
        );
        let (paths, warnings) =
            find_k_critical_paths(&tg, &StaConfig::default(), 5, false).expect("extracts");
        assert_eq!(paths.len(), 2);
        assert_eq!(
            warnings,
            vec![Warning::NoPathToEndpoint(Symbol::from("y"))]
        );
    }

    #[test]
    fn path_totals_match_arrival() {
        let tg = load(
            r#"module t(a, b, c, y);
               input a, b, c;
               output y;
               assign n1 = ~a;
               assign n2 = n1 & b;
               assign y = n2 | c;
               endmodule"#,
        );
        let (paths, _) =
            find_k_critical_paths(&tg, &StaConfig::default(), 1, false).expect("extracts");
        assert_eq!(paths.len(), 1);
        let p = &paths[0];
        assert_eq!(path_names(p), vec!["a", "n1", "n2", "y"]);
        assert!((p.total_delay - 0.07).abs() < 1e-9);
        assert!((p.endpoint_at - 0.07).abs() < 1e-9);
        assert_eq!(p.edges.len(), p.vertices.len() - 1);
        assert_eq!(p.per_vertex_delay.len(), p.vertices.len());
    }

    #[test]
    fn slacks_are_non_decreasing() {
        let tg = load(
            r#"module t(a, b, y, z);
               input a, b;
               output y, z;
               assign n1 = ~a;
               assign n2 = n1 & b;
               assign y = n2 | a;
               assign z = ~b;
               endmodule"#,
        );
        let (paths, _) =
            find_k_critical_paths(&tg, &StaConfig::default(), 4, false).expect("extracts");
        assert!(paths.len() >= 2);
        for pair in paths.windows(2) {
            assert!(pair[0].endpoint_slack <= pair[1].endpoint_slack + 1e-12);
        }
    }

    #[test]
    fn worst_endpoint_comes_first() {
        let tg = load(
            r#"module t(a, b, y, z);
               input a, b;
               output y, z;
               assign n1 = ~a;
               assign n2 = n1 & b;
               assign y = n2 | a;
               assign z = ~b;
               endmodule"#,
        );
        let (paths, _) =
            find_k_critical_paths(&tg, &StaConfig::default(), 1, false).expect("extracts");
        // y sits behind the deeper cone, so it is the worst endpoint
        assert_eq!(path_names(&paths[0]).last(), Some(&"y"));
    }

    #[test]
    fn only_violating_stops_after_first_clean_path() {
        let tg = load(
            r#"module t(a, y);
               input a;
               output y;
               assign p = ~a;
               assign q = ~a;
               assign y = p & q;
               endmodule"#,
        );
        let (paths, _) =
            find_k_critical_paths(&tg, &StaConfig::default(), 3, true).expect("extracts");
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn only_violating_keeps_negative_paths() {
        let tg = load(
            r#"module t(a, y);
               input a;
               output y;
               assign p = ~a;
               assign q = ~a;
               assign y = p & q;
               endmodule"#,
        );
        let cfg = StaConfig {
            tclk: Some(0.05),
            ..StaConfig::default()
        };
        let (paths, _) = find_k_critical_paths(&tg, &cfg, 3, true).expect("extracts");
        assert_eq!(paths.len(), 2);
        for p in &paths {
            assert!(p.endpoint_slack < 0.0);
        }
    }

    #[test]
    fn no_endpoints_is_an_error() {
        let tg = load(
            r#"module t(a);
               input a;
               endmodule"#,
        );
        assert!(matches!(
            find_k_critical_paths(&tg, &StaConfig::default(), 1, false),
            Err(StaError::NoEndpoints)
        ));
    }

    #[test]
    fn constant_driven_endpoint_is_skipped() {
        let tg = load(
            r#"module t(a, y, z);
               input a;
               output y, z;
               assign y = ~a;
               assign z = 1'b0;
               endmodule"#,
        );
        let (paths, _) =
            find_k_critical_paths(&tg, &StaConfig::default(), 4, false).expect("extracts");
        for p in &paths {
            assert_ne!(path_names(p).last(), Some(&"z"));
        }
    }

    #[test]
    fn shared_vertices_are_allowed() {
        // both paths pass through p, entering and leaving over distinct edges
        let tg = load(
            r#"module t(a, b, y, z);
               input a, b;
               output y, z;
               assign p = a & b;
               assign y = ~p;
               assign z = ~p;
               endmodule"#,
        );
        let (paths, warnings) =
            find_k_critical_paths(&tg, &StaConfig::default(), 2, false).expect("extracts");
        assert!(warnings.is_empty());
        assert_eq!(paths.len(), 2);
        assert_eq!(path_names(&paths[0]), vec!["a", "p", "y"]);
        assert_eq!(path_names(&paths[1]), vec!["b", "p", "z"]);
    }
}
