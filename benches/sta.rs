//! Benchmarks for netlist loading, the timing passes, and K-path
//! extraction.
//!
//! Inputs are generated rather than read from disk: `wide_cone` builds
//! `width` parallel inverter chains of `depth` stages, each capturing into
//! its own flip-flop, so the extractor has one endpoint per chain to peel.

use std::fmt::Write;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use verista::analyse::{find_k_critical_paths, run_sta, StaConfig};
use verista::netlist::{parse, DelayTable};

/// (name, width, depth) of the generated circuits
const SHAPES: &[(&str, usize, usize)] = &[
    ("small", 4, 8),
    ("medium", 16, 32),
    ("large", 64, 64),
];

fn wide_cone(width: usize, depth: usize) -> String {
    let mut v = String::from("module cone(a, b, clk, y);\ninput a, b, clk;\noutput y;\n");
    for w in 0..width {
        writeln!(v, "assign c{}_0 = a ^ b;", w).unwrap();
        for d in 1..depth {
            writeln!(v, "assign c{}_{} = ~c{}_{};", w, d, w, d - 1).unwrap();
        }
        writeln!(
            v,
            "DFF ff{} ( .D(c{}_{}), .CLK(clk), .Q(q{}) );",
            w,
            w,
            depth - 1,
            w
        )
        .unwrap();
    }
    let regs: Vec<String> = (0..width).map(|w| format!("q{}", w)).collect();
    writeln!(v, "assign y = {};", regs.join(" | ")).unwrap();
    v.push_str("endmodule\n");
    v
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let delays = DelayTable::default();

    for &(name, width, depth) in SHAPES {
        let source = wide_cone(width, depth);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("netlist", name), &source, |b, source| {
            b.iter(|| black_box(parse(black_box(source), &delays)))
        });
    }

    group.finish();
}

fn bench_run_sta(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_sta");
    let delays = DelayTable::default();
    let cfg = StaConfig::default();

    for &(name, width, depth) in SHAPES {
        let source = wide_cone(width, depth);
        let (tg, _) = parse(&source, &delays).expect("generated netlist parses");
        group.throughput(Throughput::Elements(
            (tg.graph.node_count() + tg.graph.edge_count()) as u64,
        ));
        group.bench_with_input(BenchmarkId::new("passes", name), &tg, |b, tg| {
            b.iter(|| black_box(run_sta(black_box(tg), &cfg)))
        });
    }

    group.finish();
}

fn bench_critical_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("critical_paths");
    let delays = DelayTable::default();
    let cfg = StaConfig::default();

    for &(name, width, depth) in SHAPES {
        let source = wide_cone(width, depth);
        let (tg, _) = parse(&source, &delays).expect("generated netlist parses");
        group.throughput(Throughput::Elements(
            (tg.graph.node_count() + tg.graph.edge_count()) as u64,
        ));
        for k in [1usize, 8] {
            group.bench_with_input(
                BenchmarkId::new(format!("k{}", k), name),
                &tg,
                |b, tg| b.iter(|| black_box(find_k_critical_paths(black_box(tg), &cfg, k, false))),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_run_sta, bench_critical_paths);
criterion_main!(benches);
