//! Rewrite benchmarks
//!
//! Measures query rewriting, result rewriting and the gzip response path.

use axum::body::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prom_relabel_proxy::config::Rule;
use prom_relabel_proxy::proxy::rewrite_response_body;
use prom_relabel_proxy::proxy::pipeline::gzip;
use prom_relabel_proxy::rewriter::{rewrite_query, rewrite_result_json};
use serde_json::json;

fn rules() -> Vec<Rule> {
    vec![
        Rule::new("instance", "host"),
        Rule::new("job", "service"),
        Rule::new("pod", "workload"),
    ]
}

/// Matrix response with `series` label sets of `points` samples each
fn matrix_response(series: usize, points: usize) -> Vec<u8> {
    let result: Vec<_> = (0..series)
        .map(|i| {
            let values: Vec<_> = (0..points)
                .map(|p| json!([1677758935 + p as i64 * 15, format!("{}", p)]))
                .collect();
            json!({
                "metric": {
                    "__name__": "http_requests_total",
                    "instance": format!("10.0.0.{}:9100", i % 255),
                    "job": "node",
                    "pod": format!("web-{}", i)
                },
                "values": values
            })
        })
        .collect();

    serde_json::to_vec(&json!({
        "status": "success",
        "data": {"resultType": "matrix", "result": result}
    }))
    .unwrap()
}

fn benchmark_rewrite_query(c: &mut Criterion) {
    let rules = rules();
    let queries = [
        ("selector", r#"up{instance="localhost:9090"}"#),
        (
            "aggregation",
            r#"sum by (job) (rate(http_requests_total{job="api", instance=~"10\\..*", code!="200"}[5m]))"#,
        ),
        (
            "binary",
            r#"node_memory_MemAvailable_bytes{instance="a",job="node"} / node_memory_MemTotal_bytes{instance="a",job="node"}"#,
        ),
        ("no_selector", "sum(rate(http_requests_total[5m]))"),
    ];

    let mut group = c.benchmark_group("rewrite_query");

    for (name, query) in queries.iter() {
        group.bench_with_input(BenchmarkId::new("query", name), query, |b, q| {
            b.iter(|| rewrite_query(q, &rules))
        });
    }

    group.finish();
}

fn benchmark_rewrite_result(c: &mut Criterion) {
    let rules = rules();
    let mut group = c.benchmark_group("rewrite_result");

    for series in [1usize, 100, 1000] {
        let body = matrix_response(series, 60);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("matrix", series), &body, |b, body| {
            b.iter(|| rewrite_result_json(body, &rules))
        });
    }

    group.finish();
}

fn benchmark_gzip_response(c: &mut Criterion) {
    let rules = rules();
    let body = Bytes::from(gzip(&matrix_response(100, 60)).unwrap());

    let mut group = c.benchmark_group("rewrite_response_body");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("gzip_matrix_100", |b| {
        b.iter(|| rewrite_response_body(body.clone(), true, &rules))
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_rewrite_query,
    benchmark_rewrite_result,
    benchmark_gzip_response
);
criterion_main!(benches);
