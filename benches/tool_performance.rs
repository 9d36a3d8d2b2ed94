// Run with: cargo bench --bench tool_performance

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use freetools_core::dispatch;
use serde_json::json;

fn command(action: &str, field: &str, value: &str) -> String {
    json!({
        "action": action,
        "now_ms": 0,
        "bindings": { field: value },
    })
    .to_string()
}

fn benchmark_tools(c: &mut Criterion) {
    dispatch(r#"{"action":"init","config":{"persistence_enabled":false}}"#);

    let nested: Vec<_> = (0..200)
        .map(|i| json!({"id": i, "name": format!("item {i}"), "tags": ["a", "b"], "ok": i % 2 == 0}))
        .collect();
    let json_cmd = command("json_format", "json-input", &json!({ "items": nested }).to_string());
    c.bench_function("json_format_200_items", |b| {
        b.iter(|| black_box(dispatch(&json_cmd)))
    });

    let qr_short = command("qr_generate", "qr-input", "https://example.com/some/path?q=1");
    c.bench_function("qr_generate_url", |b| b.iter(|| black_box(dispatch(&qr_short))));

    // Too long for level H, exercises the secondary renderer.
    let qr_long = command("qr_generate", "qr-input", &"a".repeat(1500));
    c.bench_function("qr_generate_fallback", |b| b.iter(|| black_box(dispatch(&qr_long))));
}

criterion_group!(benches, benchmark_tools);
criterion_main!(benches);
