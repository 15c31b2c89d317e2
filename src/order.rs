//! Topological ordering of the timing graph.
//!
//! Kahn's algorithm over the combinational subgraph; sequential cycles are
//! already broken at flip-flop boundaries by the loader. The same order is
//! consumed forwards by the arrival-time pass and backwards by the
//! required-time pass, so its determinism (insertion-order tie-breaking)
//! fixes the tie-breaking of everything downstream.

use std::collections::{HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::NodeIndexable;
use petgraph::Direction;

use crate::netlist::{Symbol, TimingGraph};
use crate::StaError;

/// Linear ordering of all vertices consistent with edge directions.
///
/// The work queue is seeded with the in-degree-zero vertices in insertion
/// order and successors are enqueued in edge insertion order, so repeated
/// runs produce the identical sequence. A leftover vertex with non-zero
/// in-degree means a combinational cycle.
pub fn topological_order(tg: &TimingGraph) -> Result<Vec<NodeIndex>, StaError> {
    let g = &tg.graph;
    let mut indeg = vec![0usize; g.node_bound()];
    for ix in g.node_indices() {
        indeg[ix.index()] = g.edges_directed(ix, Direction::Incoming).count();
    }

    let mut queue: VecDeque<NodeIndex> = g
        .node_indices()
        .filter(|ix| indeg[ix.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(g.node_count());
    while let Some(u) = queue.pop_front() {
        order.push(u);
        for (v, _) in tg.fanout(u) {
            indeg[v.index()] -= 1;
            if indeg[v.index()] == 0 {
                queue.push_back(v);
            }
        }
    }

    if order.len() != g.node_count() {
        Err(StaError::CycleInCombinational(cycle_witness(tg, &indeg)))
    } else {
        Ok(order)
    }
}

/// Name a vertex that lies on a cycle: walk predecessors inside the stuck
/// set (every stuck vertex has at least one stuck predecessor) until a
/// vertex repeats.
fn cycle_witness(tg: &TimingGraph, indeg: &[usize]) -> Symbol {
    let g = &tg.graph;
    let Some(start) = g.node_indices().find(|ix| indeg[ix.index()] > 0) else {
        return Symbol::from("?");
    };
    let mut seen = HashSet::new();
    let mut cur = start;
    loop {
        if !seen.insert(cur) {
            return g[cur].name.clone();
        }
        match tg
            .fanin(cur)
            .into_iter()
            .find(|(p, _)| indeg[p.index()] > 0)
        {
            Some((p, _)) => cur = p,
            None => return g[cur].name.clone(),
        }
    }
}

/// Step-wise Kahn: each item is one "wave", the set of vertices that are
/// simultaneously in-degree zero. Ends early on a cycle; timing correctness
/// never depends on wave granularity.
pub struct Waves<'g> {
    tg: &'g TimingGraph,
    indeg: Vec<usize>,
    ready: Vec<NodeIndex>,
}

pub fn waves(tg: &TimingGraph) -> Waves<'_> {
    let g = &tg.graph;
    let mut indeg = vec![0usize; g.node_bound()];
    for ix in g.node_indices() {
        indeg[ix.index()] = g.edges_directed(ix, Direction::Incoming).count();
    }
    let ready = g
        .node_indices()
        .filter(|ix| indeg[ix.index()] == 0)
        .collect();
    Waves { tg, indeg, ready }
}

impl Iterator for Waves<'_> {
    type Item = Vec<NodeIndex>;

    fn next(&mut self) -> Option<Vec<NodeIndex>> {
        if self.ready.is_empty() {
            return None;
        }
        let wave = std::mem::take(&mut self.ready);
        let mut next = Vec::new();
        for &u in &wave {
            for (v, _) in self.tg.fanout(u) {
                self.indeg[v.index()] -= 1;
                if self.indeg[v.index()] == 0 {
                    next.push(v);
                }
            }
        }
        next.sort_unstable_by_key(|ix| ix.index());
        self.ready = next;
        Some(wave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{parse, DelayTable};

    fn load(input: &str) -> TimingGraph {
        parse(input, &DelayTable::default()).expect("netlist should parse").0
    }

    fn names(tg: &TimingGraph, ixs: &[NodeIndex]) -> Vec<String> {
        ixs.iter().map(|&ix| tg.graph[ix].name.to_string()).collect()
    }

    #[test]
    fn chain_orders_sources_first() {
        let tg = load(
            r#"module t(a, b, y);
               input a, b;
               output y;
               assign n1 = ~a;
               assign n2 = ~b;
               assign y = n1 & n2;
               endmodule"#,
        );
        let order = topological_order(&tg).expect("acyclic");
        assert_eq!(names(&tg, &order), vec!["a", "b", "n1", "n2", "y"]);
    }

    #[test]
    fn order_is_reproducible() {
        let src = r#"module t(a, b, y);
               input a, b;
               output y;
               assign n1 = a ^ b;
               assign n2 = n1 | a;
               assign y = n2 & n1;
               endmodule"#;
        let tg = load(src);
        let first = topological_order(&tg).expect("acyclic");
        let second = topological_order(&tg).expect("acyclic");
        assert_eq!(first, second);

        let again = load(src);
        assert_eq!(names(&tg, &first), names(&again, &topological_order(&again).unwrap()));
    }

    #[test]
    fn combinational_cycle_is_detected() {
        let tg = load(
            r#"module t(a, b, y);
               input a, b;
               output y;
               assign n1 = n2 & a;
               assign n2 = n1 | b;
               assign y = n2;
               endmodule"#,
        );
        let err = topological_order(&tg).unwrap_err();
        match err {
            StaError::CycleInCombinational(name) => {
                assert!(name.as_ref() == "n1" || name.as_ref() == "n2");
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn flops_break_sequential_cycles() {
        let tg = load(
            r#"module t(clk, y);
               input clk;
               output y;
               DFF ff ( .D(n1), .CLK(clk), .Q(q) );
               assign n1 = ~q;
               assign y = q;
               endmodule"#,
        );
        assert!(topological_order(&tg).is_ok());
    }

    #[test]
    fn waves_group_simultaneous_vertices() {
        let tg = load(
            r#"module t(a, y);
               input a;
               output y;
               assign p = ~a;
               assign q = ~a;
               assign y = p & q;
               endmodule"#,
        );
        let got: Vec<Vec<String>> = waves(&tg).map(|w| names(&tg, &w)).collect();
        assert_eq!(
            got,
            vec![
                vec!["a".to_string()],
                vec!["p".to_string(), "q".to_string()],
                vec!["y".to_string()],
            ]
        );
    }

    #[test]
    fn waves_end_early_on_cycle() {
        let tg = load(
            r#"module t(a, y);
               input a;
               output y;
               assign n1 = n2 & a;
               assign n2 = n1 & a;
               assign y = n2;
               endmodule"#,
        );
        let emitted: usize = waves(&tg).map(|w| w.len()).sum();
        assert!(emitted < tg.graph.node_count());
    }
}
