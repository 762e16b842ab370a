//! Pipeline benchmarks for Cliconf
//!
//! Measures the three hot paths:
//!
//! 1. GRAMMAR COMPILATION: YAML grammar to node tree, at growing mode counts.
//! 2. FACT EXTRACTION: device text to fact document, at growing line counts.
//! 3. COMMAND SYNTHESIS: want/have difference to CLI commands, per state.
//!
//! Run with: cargo bench --bench compile_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use cliconf::prelude::*;

// ============================================================================
// Fixture generators
// ============================================================================

/// A grammar with `modes` interface-like mode blocks, each carrying a keyed
/// list command and a couple of subcommands.
fn grammar_yaml(modes: usize) -> String {
    let mut yaml = String::new();
    for index in 0..modes {
        yaml.push_str(&format!(
            r#"mode{index}:
  command: "ifc{index}=LIST:list{index}&KEYS:$name Ethernet $name=NAME:name"
  subcommands:
    - "mtu $m=NAME:mtu"
    - "description $d=NAME:description"
    - "shutdown=NAME:shutdown&VALUE:true&NEGATE_CMD:ALLOW"
"#
        ));
    }
    yaml
}

const VLAN_GRAMMAR: &str = r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name mtu $m=NAME:mtu&OPTIONAL"
"#;

/// Flat device text with one vlan line per entry.
fn vlan_config(lines: usize) -> String {
    let mut text = String::new();
    for index in 0..lines {
        text.push_str(&format!("vlan {index} mtu 1500\n"));
    }
    text
}

/// A want document renaming every other vlan's mtu.
fn vlan_want(lines: usize) -> Value {
    let entries: Vec<Value> = (0..lines)
        .map(|index| {
            let mtu = if index % 2 == 0 { 9000 } else { 1500 };
            json!({"name": index.to_string(), "mtu": mtu})
        })
        .collect();
    json!({ "vlan": entries })
}

fn vlan_tree() -> Tree {
    compile(&Grammar::from_yaml_str(VLAN_GRAMMAR).unwrap()).unwrap()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_grammar_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("grammar_compile");
    for modes in [1, 10, 50] {
        let yaml = grammar_yaml(modes);
        let grammar = Grammar::from_yaml_str(&yaml).unwrap();
        group.throughput(Throughput::Elements(modes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(modes), &grammar, |b, grammar| {
            b.iter(|| compile(black_box(grammar)).unwrap());
        });
    }
    group.finish();
}

fn bench_yaml_parse(c: &mut Criterion) {
    let yaml = grammar_yaml(50);
    c.bench_function("grammar_yaml_parse", |b| {
        b.iter(|| Grammar::from_yaml_str(black_box(&yaml)).unwrap());
    });
}

fn bench_fact_extraction(c: &mut Criterion) {
    let tree = vlan_tree();
    let mut group = c.benchmark_group("fact_extraction");
    for lines in [10, 100, 1000] {
        let device = DeviceConfig::parse(&vlan_config(lines));
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &device, |b, device| {
            b.iter(|| extract(black_box(&tree), black_box(device)).unwrap());
        });
    }
    group.finish();
}

fn bench_command_synthesis(c: &mut Criterion) {
    let tree = vlan_tree();
    let lines = 200;
    let have = extract(&tree, &DeviceConfig::parse(&vlan_config(lines))).unwrap();
    let want = vlan_want(lines);

    let mut group = c.benchmark_group("command_synthesis");
    for state in [State::Merged, State::Deleted, State::Replaced, State::Overridden] {
        group.bench_with_input(
            BenchmarkId::from_parameter(state.as_str()),
            &state,
            |b, &state| {
                b.iter(|| {
                    synthesize(black_box(&tree), black_box(&want), black_box(&have), state)
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_grammar_compile,
    bench_yaml_parse,
    bench_fact_extraction,
    bench_command_synthesis
);
criterion_main!(benches);
