//! Netlist loader: translates a gate-level description into the timing graph.
//!
//! The loader accepts two input styles and normalizes both into the same
//! graph shape:
//!
//! - continuous assignments `assign lhs = expr;`, whose right-hand side is
//!   classified into a single gate tag after normalization (double negations
//!   collapse, `~` distributes over `&`/`|` by De Morgan, negations on XOR
//!   operands fold into the XOR/XNOR polarity, associative operators
//!   flatten);
//! - primitive instantiations with named port connections, where composite
//!   primitives (`MUX2`, `FULL_ADDER`) expand into their gate subgraphs and
//!   `DFF` splits into a D-side endpoint and a Q-side startpoint with no
//!   edge between them.
//!
//! Every vertex carries the propagation delay of its gate tag; edges are
//! unweighted and denote direct fan-in. The graph is built once and is
//! read-only for all timing computations.

mod ast;

lalrpop_util::lalrpop_mod! {parser, "/netlist/parser.rs"}

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use string_cache::DefaultAtom;

use crate::{StaError, Warning};
use ast::{Connection, Expr, Item, NetRef};

pub type Symbol = DefaultAtom;

/// Position of a vertex relative to the timing path structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    PrimaryInput,
    PrimaryOutput,
    FlipFlopD,
    FlipFlopQ,
    Internal,
}

impl Role {
    pub fn is_startpoint(self) -> bool {
        matches!(self, Role::PrimaryInput | Role::FlipFlopQ)
    }

    pub fn is_endpoint(self) -> bool {
        matches!(self, Role::PrimaryOutput | Role::FlipFlopD)
    }
}

/// Gate-type tag attributed to a vertex; keys the delay table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    Not,
    And,
    Or,
    Nand,
    Nor,
    Xor,
    Xnor,
    Buf,
    Assign,
    Mux2Not,
    Mux2And,
    Mux2Or,
    Dff,
    Primary,
    Unknown,
}

impl GateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GateKind::Not => "NOT",
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Nand => "NAND",
            GateKind::Nor => "NOR",
            GateKind::Xor => "XOR",
            GateKind::Xnor => "XNOR",
            GateKind::Buf => "BUF",
            GateKind::Assign => "ASSIGN",
            GateKind::Mux2Not => "MUX2_NOT",
            GateKind::Mux2And => "MUX2_AND",
            GateKind::Mux2Or => "MUX2_OR",
            GateKind::Dff => "DFF",
            GateKind::Primary => "PRIMARY",
            GateKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT" => Ok(GateKind::Not),
            "AND" => Ok(GateKind::And),
            "OR" => Ok(GateKind::Or),
            "NAND" => Ok(GateKind::Nand),
            "NOR" => Ok(GateKind::Nor),
            "XOR" => Ok(GateKind::Xor),
            "XNOR" => Ok(GateKind::Xnor),
            "BUF" => Ok(GateKind::Buf),
            "ASSIGN" => Ok(GateKind::Assign),
            "MUX2_NOT" => Ok(GateKind::Mux2Not),
            "MUX2_AND" => Ok(GateKind::Mux2And),
            "MUX2_OR" => Ok(GateKind::Mux2Or),
            "DFF" => Ok(GateKind::Dff),
            "PRIMARY" => Ok(GateKind::Primary),
            "UNKNOWN" => Ok(GateKind::Unknown),
            other => Err(format!("unknown gate tag '{}'", other)),
        }
    }
}

/// Per-tag propagation delays in nanoseconds. Callers may override
/// individual entries but not add new tags.
#[derive(Debug, Clone)]
pub struct DelayTable(HashMap<GateKind, f64>);

impl Default for DelayTable {
    fn default() -> Self {
        use GateKind::*;
        DelayTable(
            [
                (Assign, 0.001),
                (Not, 0.01),
                (And, 0.02),
                (Or, 0.04),
                (Xor, 0.03),
                (Xnor, 0.03),
                (Nand, 0.025),
                (Nor, 0.045),
                (Mux2Not, 0.05),
                (Mux2And, 0.09),
                (Mux2Or, 0.08),
                (Buf, 0.01),
                (Dff, 0.0),
                (Primary, 0.0),
                (Unknown, 0.0),
            ]
            .into_iter()
            .collect(),
        )
    }
}

impl DelayTable {
    pub fn get(&self, kind: GateKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, kind: GateKind, ns: f64) {
        self.0.insert(kind, ns);
    }

    /// Scale every entry by a positive factor.
    pub fn scale(&mut self, factor: f64) {
        for ns in self.0.values_mut() {
            *ns *= factor;
        }
    }
}

/// A named signal vertex of the timing graph.
#[derive(Debug, Clone)]
pub struct SignalNode {
    pub name: Symbol,
    pub role: Role,
    pub kind: GateKind,
    pub delay: f64,
}

impl fmt::Display for SignalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} {:.3}ns]", self.name, self.kind, self.delay)
    }
}

pub type SignalGraph = StableGraph<SignalNode, ()>;

/// The timing graph together with its startpoint and endpoint sets, both in
/// vertex insertion order. Built once by [`parse`]; read-only afterwards.
#[derive(Debug)]
pub struct TimingGraph {
    /// Name of the netlist module this graph was built from.
    pub name: Symbol,
    pub graph: SignalGraph,
    pub startpoints: Vec<NodeIndex>,
    pub endpoints: Vec<NodeIndex>,
    lut: HashMap<Symbol, NodeIndex>,
}

impl TimingGraph {
    pub fn node_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.lut.get(&Symbol::from(name)).copied()
    }

    /// Fan-in of `v` as `(source, edge)` pairs in edge insertion order.
    /// petgraph iterates adjacency newest-first; every tie-break in the
    /// timing passes is defined on insertion order, so reverse here.
    pub fn fanin(&self, v: NodeIndex) -> Vec<(NodeIndex, EdgeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(v, Direction::Incoming)
            .map(|e| (e.source(), e.id()))
            .collect();
        edges.reverse();
        edges
    }

    /// Fan-out of `v` as `(target, edge)` pairs in edge insertion order.
    pub fn fanout(&self, v: NodeIndex) -> Vec<(NodeIndex, EdgeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(v, Direction::Outgoing)
            .map(|e| (e.target(), e.id()))
            .collect();
        edges.reverse();
        edges
    }
}

/// Parse a netlist and build the timing graph, stamping vertex delays from
/// `delays`. Non-fatal diagnostics are collected alongside the graph.
pub fn parse(input: &str, delays: &DelayTable) -> Result<(TimingGraph, Vec<Warning>), StaError> {
    let unit = parser::SourceParser::new()
        .parse(input)
        .map_err(|e| StaError::MalformedNetlist(e.to_string()))?;

    let mut builder = Builder::new(delays);

    // Port declarations first, so directions are known before any driver.
    for item in &unit.items {
        match item {
            Item::Input(range, names) => {
                for name in declared_bits(range, names) {
                    builder.declare_input(name)?;
                }
            }
            Item::Output(range, names) => {
                for name in declared_bits(range, names) {
                    builder.declare_output(name)?;
                }
            }
            _ => {}
        }
    }

    for item in &unit.items {
        match item {
            Item::Assign { lhs, rhs } => builder.assign(lhs, rhs)?,
            Item::Instance {
                module,
                name,
                connections,
            } => builder.instance(module, name, connections)?,
            _ => {}
        }
    }

    builder.finish(unit.name)
}

fn declared_bits(range: &Option<(u32, u32)>, names: &[Symbol]) -> Vec<Symbol> {
    match range {
        None => names.to_vec(),
        Some((a, b)) => {
            let (lo, hi) = if a <= b { (*a, *b) } else { (*b, *a) };
            names
                .iter()
                .flat_map(|n| (lo..=hi).map(move |i| Symbol::from(format!("{}[{}]", n, i))))
                .collect()
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
    Xor,
}

/// Leaf operand of a normalized expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Net { name: Symbol, negated: bool },
    Const { value: bool },
}

/// Canonical form of an assignment right-hand side.
enum NormExpr {
    Leaf(Operand),
    Gate {
        op: Op,
        inverted: bool,
        operands: Vec<Operand>,
    },
    Mux {
        sel: Operand,
        on_true: Operand,
        on_false: Operand,
    },
    /// Heterogeneous operator nest; classified as a plain assignment with
    /// one fan-in edge per referenced leaf.
    Opaque(Vec<NetRef>),
}

fn leaf(expr: &Expr, negated: bool) -> Option<Operand> {
    match expr {
        Expr::Not(inner) => leaf(inner, !negated),
        Expr::Ident(name) => Some(Operand::Net {
            name: name.clone(),
            negated,
        }),
        Expr::Const(value) => Some(Operand::Const {
            value: *value != negated,
        }),
        _ => None,
    }
}

fn flatten<'e>(expr: &'e Expr, op: Op, out: &mut Vec<&'e Expr>) {
    match (op, expr) {
        (Op::And, Expr::And(l, r)) | (Op::Or, Expr::Or(l, r)) | (Op::Xor, Expr::Xor(l, r)) => {
            flatten(l, op, out);
            flatten(r, op, out);
        }
        _ => out.push(expr),
    }
}

fn collect_refs(expr: &Expr, out: &mut Vec<NetRef>) {
    match expr {
        Expr::Ident(name) => out.push(NetRef::Net(name.clone())),
        Expr::Const(value) => out.push(NetRef::Const(*value)),
        Expr::Not(inner) => collect_refs(inner, out),
        Expr::And(l, r) | Expr::Or(l, r) | Expr::Xor(l, r) => {
            collect_refs(l, out);
            collect_refs(r, out);
        }
        Expr::Cond {
            sel,
            on_true,
            on_false,
        } => {
            collect_refs(sel, out);
            collect_refs(on_true, out);
            collect_refs(on_false, out);
        }
    }
}

fn opaque(expr: &Expr) -> NormExpr {
    let mut refs = Vec::new();
    collect_refs(expr, &mut refs);
    NormExpr::Opaque(refs)
}

fn gate(expr: &Expr, op: Op, negated: bool) -> NormExpr {
    let mut parts = Vec::new();
    flatten(expr, op, &mut parts);
    let mut operands = Vec::with_capacity(parts.len());

    if op == Op::Xor {
        // a negated XOR operand flips the output polarity: a ^ ~b == ~(a ^ b)
        let mut inverted = negated;
        for part in parts {
            match leaf(part, false) {
                Some(Operand::Net { name, negated: n }) => {
                    if n {
                        inverted = !inverted;
                    }
                    operands.push(Operand::Net {
                        name,
                        negated: false,
                    });
                }
                Some(c @ Operand::Const { .. }) => operands.push(c),
                None => return opaque(expr),
            }
        }
        NormExpr::Gate {
            op,
            inverted,
            operands,
        }
    } else {
        // De Morgan: negation flips the operator and moves onto the operands
        let eff = match (op, negated) {
            (Op::And, false) | (Op::Or, true) => Op::And,
            _ => Op::Or,
        };
        for part in parts {
            match leaf(part, negated) {
                Some(o) => operands.push(o),
                None => return opaque(expr),
            }
        }
        NormExpr::Gate {
            op: eff,
            inverted: false,
            operands,
        }
    }
}

fn normalize(expr: &Expr, negated: bool) -> NormExpr {
    match expr {
        Expr::Not(inner) => normalize(inner, !negated),
        Expr::Ident(name) => NormExpr::Leaf(Operand::Net {
            name: name.clone(),
            negated,
        }),
        Expr::Const(value) => NormExpr::Leaf(Operand::Const {
            value: *value != negated,
        }),
        Expr::And(..) => gate(expr, Op::And, negated),
        Expr::Or(..) => gate(expr, Op::Or, negated),
        Expr::Xor(..) => gate(expr, Op::Xor, negated),
        Expr::Cond {
            sel,
            on_true,
            on_false,
        } => {
            let (Some(s), Some(t), Some(f)) = (
                leaf(sel, false),
                leaf(on_true, negated),
                leaf(on_false, negated),
            ) else {
                return opaque(expr);
            };
            match s {
                // ~s ? b : a reads as s ? a : b
                Operand::Net {
                    name,
                    negated: true,
                } => NormExpr::Mux {
                    sel: Operand::Net {
                        name,
                        negated: false,
                    },
                    on_true: f,
                    on_false: t,
                },
                s @ Operand::Net { .. } => NormExpr::Mux {
                    sel: s,
                    on_true: t,
                    on_false: f,
                },
                Operand::Const { value } => NormExpr::Leaf(if value { t } else { f }),
            }
        }
    }
}

struct Builder<'a> {
    delays: &'a DelayTable,
    graph: SignalGraph,
    lut: HashMap<Symbol, NodeIndex>,
    inputs: HashSet<Symbol>,
    outputs: HashSet<Symbol>,
    driven: HashSet<Symbol>,
    /// Deferred fan-in edges `(source name, target)`, resolved once every
    /// driver is known so forward references parse cleanly.
    pending: Vec<(Symbol, NodeIndex)>,
    warnings: Vec<Warning>,
    unknown_seen: HashSet<Symbol>,
}

impl<'a> Builder<'a> {
    fn new(delays: &'a DelayTable) -> Self {
        Builder {
            delays,
            graph: SignalGraph::default(),
            lut: HashMap::new(),
            inputs: HashSet::new(),
            outputs: HashSet::new(),
            driven: HashSet::new(),
            pending: Vec::new(),
            warnings: Vec::new(),
            unknown_seen: HashSet::new(),
        }
    }

    fn vertex(&mut self, name: &Symbol) -> NodeIndex {
        if let Some(&ix) = self.lut.get(name) {
            return ix;
        }
        let ix = self.graph.add_node(SignalNode {
            name: name.clone(),
            role: Role::Internal,
            kind: GateKind::Unknown,
            delay: 0.0,
        });
        self.lut.insert(name.clone(), ix);
        ix
    }

    fn tag(&mut self, ix: NodeIndex, kind: GateKind) {
        let delay = self.delays.get(kind);
        let node = &mut self.graph[ix];
        node.kind = kind;
        node.delay = delay;
    }

    /// Create (or look up) the vertex for a driven net and tag it with the
    /// gate kind of its driver.
    fn drive(&mut self, name: &Symbol, kind: GateKind) -> Result<NodeIndex, StaError> {
        if self.inputs.contains(name) {
            return Err(StaError::MalformedNetlist(format!(
                "input port '{}' cannot be driven",
                name
            )));
        }
        if !self.driven.insert(name.clone()) {
            return Err(StaError::MalformedNetlist(format!(
                "signal '{}' has multiple drivers",
                name
            )));
        }
        let ix = self.vertex(name);
        self.tag(ix, kind);
        Ok(ix)
    }

    /// Synthetic internal vertex named `{base}/{suffix}`.
    fn synth(&mut self, base: &Symbol, suffix: &str, kind: GateKind) -> NodeIndex {
        let name: Symbol = format!("{}/{}", base, suffix).into();
        let ix = self.vertex(&name);
        self.tag(ix, kind);
        ix
    }

    fn constant(&mut self, value: bool) -> NodeIndex {
        let name: Symbol = if value { "1'b1" } else { "1'b0" }.into();
        if let Some(&ix) = self.lut.get(&name) {
            return ix;
        }
        let ix = self.graph.add_node(SignalNode {
            name: name.clone(),
            role: Role::Internal,
            kind: GateKind::Primary,
            delay: 0.0,
        });
        self.lut.insert(name, ix);
        ix
    }

    fn connect(&mut self, src: NodeIndex, dst: NodeIndex) {
        self.graph.update_edge(src, dst, ());
    }

    fn refer(&mut self, src: &Symbol, dst: NodeIndex) {
        self.pending.push((src.clone(), dst));
    }

    fn refer_net(&mut self, net: &NetRef, dst: NodeIndex) {
        match net {
            NetRef::Net(name) => self.refer(name, dst),
            NetRef::Const(value) => {
                let c = self.constant(*value);
                self.connect(c, dst);
            }
        }
    }

    /// Feed one gate input from an operand, materializing an inverter for a
    /// negated net and a constant-source vertex for a constant.
    fn operand_input(&mut self, base: &Symbol, n: usize, operand: &Operand, dst: NodeIndex) {
        match operand {
            Operand::Const { value } => {
                let c = self.constant(*value);
                self.connect(c, dst);
            }
            Operand::Net {
                name,
                negated: false,
            } => self.refer(name, dst),
            Operand::Net {
                name,
                negated: true,
            } => {
                let inv = self.synth(base, &format!("n{}", n), GateKind::Not);
                self.refer(name, inv);
                self.connect(inv, dst);
            }
        }
    }

    fn declare_input(&mut self, name: Symbol) -> Result<(), StaError> {
        if self.outputs.contains(&name) {
            return Err(StaError::MalformedNetlist(format!(
                "port '{}' declared both input and output",
                name
            )));
        }
        let ix = self.vertex(&name);
        self.tag(ix, GateKind::Primary);
        self.graph[ix].role = Role::PrimaryInput;
        self.inputs.insert(name);
        Ok(())
    }

    fn declare_output(&mut self, name: Symbol) -> Result<(), StaError> {
        if self.inputs.contains(&name) {
            return Err(StaError::MalformedNetlist(format!(
                "port '{}' declared both input and output",
                name
            )));
        }
        let ix = self.vertex(&name);
        self.tag(ix, GateKind::Primary);
        self.graph[ix].role = Role::PrimaryOutput;
        self.outputs.insert(name);
        Ok(())
    }

    fn assign(&mut self, lhs: &Symbol, rhs: &Expr) -> Result<(), StaError> {
        match normalize(rhs, false) {
            NormExpr::Leaf(Operand::Net { name, negated }) => {
                let kind = if negated { GateKind::Not } else { GateKind::Assign };
                let ix = self.drive(lhs, kind)?;
                self.refer(&name, ix);
            }
            NormExpr::Leaf(Operand::Const { value }) => {
                let ix = self.drive(lhs, GateKind::Assign)?;
                let c = self.constant(value);
                self.connect(c, ix);
            }
            NormExpr::Gate {
                op,
                inverted,
                operands,
            } => {
                let negs = operands
                    .iter()
                    .filter(|o| matches!(o, Operand::Net { negated: true, .. }))
                    .count();
                let all_negated = negs == operands.len() && negs >= 2;
                let kind = match op {
                    Op::Xor => {
                        if inverted {
                            GateKind::Xnor
                        } else {
                            GateKind::Xor
                        }
                    }
                    Op::And => {
                        if all_negated {
                            GateKind::Nor
                        } else {
                            GateKind::And
                        }
                    }
                    Op::Or => {
                        if all_negated {
                            GateKind::Nand
                        } else {
                            GateKind::Or
                        }
                    }
                };
                let ix = self.drive(lhs, kind)?;
                match kind {
                    // inversions are absorbed by the gate function itself
                    GateKind::Nor | GateKind::Nand | GateKind::Xor | GateKind::Xnor => {
                        for operand in &operands {
                            match operand {
                                Operand::Net { name, .. } => self.refer(name, ix),
                                Operand::Const { value } => {
                                    let c = self.constant(*value);
                                    self.connect(c, ix);
                                }
                            }
                        }
                    }
                    _ => {
                        for (i, operand) in operands.iter().enumerate() {
                            self.operand_input(lhs, i, operand, ix);
                        }
                    }
                }
            }
            NormExpr::Mux {
                sel,
                on_true,
                on_false,
            } => {
                self.mux(lhs, Some(&sel), Some(&on_false), Some(&on_true))?;
            }
            NormExpr::Opaque(refs) => {
                let ix = self.drive(lhs, GateKind::Assign)?;
                for r in &refs {
                    self.refer_net(r, ix);
                }
            }
        }
        Ok(())
    }

    /// Expand a 2:1 multiplexer `out = sel ? on_true : on_false` into
    /// MUX2_NOT + MUX2_AND x2 + MUX2_OR, matching the composite delay.
    fn mux(
        &mut self,
        out: &Symbol,
        sel: Option<&Operand>,
        on_false: Option<&Operand>,
        on_true: Option<&Operand>,
    ) -> Result<NodeIndex, StaError> {
        let y = self.drive(out, GateKind::Mux2Or)?;
        let ns = self.synth(out, "ns", GateKind::Mux2Not);
        let a0 = self.synth(out, "a0", GateKind::Mux2And);
        let a1 = self.synth(out, "a1", GateKind::Mux2And);
        if let Some(s) = sel {
            self.operand_input(out, 0, s, ns);
        }
        if let Some(a) = on_false {
            self.operand_input(out, 1, a, a0);
        }
        self.connect(ns, a0);
        if let Some(b) = on_true {
            self.operand_input(out, 2, b, a1);
        }
        if let Some(s) = sel {
            self.operand_input(out, 3, s, a1);
        }
        self.connect(a0, y);
        self.connect(a1, y);
        Ok(y)
    }

    fn pin(&self, conns: &[Connection], name: &str) -> Option<NetRef> {
        conns
            .iter()
            .find(|c| c.port.as_ref().eq_ignore_ascii_case(name))
            .and_then(|c| c.net.clone())
    }

    fn output_net(
        &self,
        inst: &Symbol,
        pin: &str,
        conns: &[Connection],
    ) -> Result<Symbol, StaError> {
        match self.pin(conns, pin) {
            Some(NetRef::Net(n)) => Ok(n),
            Some(NetRef::Const(_)) => Err(StaError::MalformedNetlist(format!(
                "instance '{}' drives a constant on pin {}",
                inst, pin
            ))),
            None => Err(StaError::MalformedNetlist(format!(
                "instance '{}' has no {} connection",
                inst, pin
            ))),
        }
    }

    fn optional_output_net(
        &self,
        inst: &Symbol,
        pin: &str,
        conns: &[Connection],
    ) -> Result<Option<Symbol>, StaError> {
        match self.pin(conns, pin) {
            Some(NetRef::Net(n)) => Ok(Some(n)),
            Some(NetRef::Const(_)) => Err(StaError::MalformedNetlist(format!(
                "instance '{}' drives a constant on pin {}",
                inst, pin
            ))),
            None => Ok(None),
        }
    }

    fn instance(
        &mut self,
        module: &Symbol,
        inst: &Symbol,
        conns: &[Connection],
    ) -> Result<(), StaError> {
        match module.to_ascii_uppercase().as_ref() {
            "NOT" => self.gate_instance(inst, GateKind::Not, &["A"], conns),
            "BUF" => self.gate_instance(inst, GateKind::Buf, &["A"], conns),
            "AND" => self.gate_instance(inst, GateKind::And, &["A", "B"], conns),
            "OR" => self.gate_instance(inst, GateKind::Or, &["A", "B"], conns),
            "NAND" => self.gate_instance(inst, GateKind::Nand, &["A", "B"], conns),
            "NOR" => self.gate_instance(inst, GateKind::Nor, &["A", "B"], conns),
            "XOR" => self.gate_instance(inst, GateKind::Xor, &["A", "B"], conns),
            "XNOR" => self.gate_instance(inst, GateKind::Xnor, &["A", "B"], conns),
            "MUX2" => self.mux2_instance(inst, conns),
            "DFF" => self.dff_instance(inst, conns),
            "FULL_ADDER" => self.full_adder_instance(inst, conns),
            _ => self.unknown_instance(module, conns),
        }
    }

    fn gate_instance(
        &mut self,
        inst: &Symbol,
        kind: GateKind,
        inputs: &[&str],
        conns: &[Connection],
    ) -> Result<(), StaError> {
        let out = self.output_net(inst, "Y", conns)?;
        let ix = self.drive(&out, kind)?;
        for pin in inputs {
            if let Some(net) = self.pin(conns, pin) {
                self.refer_net(&net, ix);
            }
        }
        Ok(())
    }

    fn mux2_instance(&mut self, inst: &Symbol, conns: &[Connection]) -> Result<(), StaError> {
        let out = self.output_net(inst, "Y", conns)?;
        let as_operand = |net: Option<NetRef>| match net {
            Some(NetRef::Net(name)) => Some(Operand::Net {
                name,
                negated: false,
            }),
            Some(NetRef::Const(value)) => Some(Operand::Const { value }),
            None => None,
        };
        let sel = as_operand(self.pin(conns, "S"));
        let a = as_operand(self.pin(conns, "A"));
        let b = as_operand(self.pin(conns, "B"));
        self.mux(&out, sel.as_ref(), a.as_ref(), b.as_ref())?;
        Ok(())
    }

    /// A DFF cuts the path: the D pin sinks into a D-side endpoint and the
    /// Q net sources a fresh startpoint, with no edge between the two.
    /// Clock and asynchronous pins carry no data dependency and are ignored.
    fn dff_instance(&mut self, inst: &Symbol, conns: &[Connection]) -> Result<(), StaError> {
        let d = self.synth(inst, "D", GateKind::Dff);
        self.graph[d].role = Role::FlipFlopD;
        if let Some(net) = self.pin(conns, "D") {
            self.refer_net(&net, d);
        }
        if let Some(q_net) = self.optional_output_net(inst, "Q", conns)? {
            let q = self.drive(&q_net, GateKind::Dff)?;
            if self.graph[q].role == Role::Internal {
                self.graph[q].role = Role::FlipFlopQ;
            }
        }
        Ok(())
    }

    fn full_adder_instance(&mut self, inst: &Symbol, conns: &[Connection]) -> Result<(), StaError> {
        let a = self.pin(conns, "A");
        let b = self.pin(conns, "B");
        let cin = self.pin(conns, "CIN");

        let s1 = self.synth(inst, "s1", GateKind::Xor);
        if let Some(net) = &a {
            self.refer_net(net, s1);
        }
        if let Some(net) = &b {
            self.refer_net(net, s1);
        }
        if let Some(sum) = self.optional_output_net(inst, "SUM", conns)? {
            let ix = self.drive(&sum, GateKind::Xor)?;
            self.connect(s1, ix);
            if let Some(net) = &cin {
                self.refer_net(net, ix);
            }
        }

        let c1 = self.synth(inst, "c1", GateKind::And);
        if let Some(net) = &a {
            self.refer_net(net, c1);
        }
        if let Some(net) = &b {
            self.refer_net(net, c1);
        }
        let c2 = self.synth(inst, "c2", GateKind::And);
        self.connect(s1, c2);
        if let Some(net) = &cin {
            self.refer_net(net, c2);
        }
        if let Some(cout) = self.optional_output_net(inst, "COUT", conns)? {
            let ix = self.drive(&cout, GateKind::Or)?;
            self.connect(c1, ix);
            self.connect(c2, ix);
        }
        Ok(())
    }

    fn unknown_instance(&mut self, module: &Symbol, conns: &[Connection]) -> Result<(), StaError> {
        if self.unknown_seen.insert(module.clone()) {
            self.warnings.push(Warning::UnknownPrimitive(module.clone()));
        }
        let is_output = |c: &Connection| {
            ["Y", "Z", "Q", "OUT"]
                .iter()
                .any(|p| c.port.as_ref().eq_ignore_ascii_case(p))
        };
        let mut outputs: Vec<usize> = (0..conns.len()).filter(|&i| is_output(&conns[i])).collect();
        if outputs.is_empty() && !conns.is_empty() {
            outputs.push(conns.len() - 1);
        }
        for &oi in &outputs {
            let Some(NetRef::Net(out_net)) = conns[oi].net.clone() else {
                continue;
            };
            let ix = self.drive(&out_net, GateKind::Unknown)?;
            for (i, c) in conns.iter().enumerate() {
                if outputs.contains(&i) {
                    continue;
                }
                if let Some(net) = &c.net {
                    self.refer_net(net, ix);
                }
            }
        }
        Ok(())
    }

    fn finish(mut self, name: Symbol) -> Result<(TimingGraph, Vec<Warning>), StaError> {
        let pending = std::mem::take(&mut self.pending);
        for (src, dst) in pending {
            if !self.driven.contains(&src) && !self.inputs.contains(&src) {
                return Err(StaError::UndefinedSignal(src));
            }
            if let Some(&ix) = self.lut.get(&src) {
                self.graph.update_edge(ix, dst, ());
            }
        }

        // Drop nets no edge touches, keeping ports and flops.
        self.graph.retain_nodes(|g, ix| {
            g.neighbors_undirected(ix).next().is_some()
                || matches!(g[ix].kind, GateKind::Primary | GateKind::Dff)
        });
        let graph = self.graph;
        self.lut.retain(|_, ix| graph.contains_node(*ix));

        let mut startpoints = Vec::new();
        let mut endpoints = Vec::new();
        for ix in graph.node_indices() {
            let role = graph[ix].role;
            if role.is_startpoint() {
                startpoints.push(ix);
            } else if role.is_endpoint() {
                endpoints.push(ix);
            }
        }

        Ok((
            TimingGraph {
                name,
                graph,
                startpoints,
                endpoints,
                lut: self.lut,
            },
            self.warnings,
        ))
    }
}
