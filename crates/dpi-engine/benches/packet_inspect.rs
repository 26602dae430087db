//! Packet inspection benchmark
//!
//! Target: <10μs per packet with a small rule set

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dpi_common::FlowKey;
use dpi_engine::{AlertSeverity, DpiEngine, EngineConfig, Protocol, Rule, RuleKind};

const HTTP_GET: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n";

fn engine_with_rules(rule_count: u32) -> DpiEngine {
    let engine = DpiEngine::new(EngineConfig::default());

    for n in 0..rule_count {
        engine.add_rule(
            Rule::new(RuleKind::Regex, &format!("bench-{n}"), format!("attack{n}\\.bin").as_bytes())
                .with_protocol(Protocol::Http)
                .with_severity(AlertSeverity::Critical),
        );
    }

    engine
}

fn packet_path_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_path");

    // Established flow, no rules: classification is already frozen
    group.bench_function("established_no_rules", |b| {
        let engine = engine_with_rules(0);
        let key = FlowKey::new(0xC0A80101, 0x08080808, 12345, 80, 6);
        engine.process_packet(key, HTTP_GET, 0, false);

        let mut ts = 1u64;
        b.iter(|| {
            ts += 1;
            black_box(engine.process_packet(black_box(key), black_box(HTTP_GET), ts, false))
        })
    });

    // First packet of a fresh flow: dissector chain plus session setup
    group.bench_function("fresh_flow_classify", |b| {
        let engine = engine_with_rules(0);
        let mut n = 0u32;

        b.iter(|| {
            n = n.wrapping_add(1);
            let key = FlowKey::new(n, 0x08080808, 12345, 80, 6);
            black_box(engine.process_packet(key, black_box(HTTP_GET), 1, false))
        })
    });

    group.finish();
}

fn rule_scaling_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_scaling");

    for rules in [1u32, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(rules), &rules, |b, &rules| {
            let engine = engine_with_rules(rules);
            let key = FlowKey::new(0xC0A80101, 0x08080808, 12345, 80, 6);
            engine.process_packet(key, HTTP_GET, 0, false);

            let mut ts = 1u64;
            b.iter(|| {
                ts += 1;
                black_box(engine.process_packet(key, black_box(HTTP_GET), ts, false))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, packet_path_benchmark, rule_scaling_benchmark);
criterion_main!(benches);
