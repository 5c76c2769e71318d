use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nova_stream_migration::StreamApiMigrationInspection;

const LOOPS: [&str; 4] = [
    "List<String> r{i} = new ArrayList<>(); for (String s : list) { if (!s.isEmpty()) r{i}.add(s.trim()); }",
    "int c{i} = 0; for (String s : list) { if (s.length() > {i}) c{i}++; }",
    "StringBuilder sb{i} = new StringBuilder(); for (String s : list) { if (sb{i}.length() > 0) sb{i}.append(\",\"); sb{i}.append(s); }",
    "for (int j = 0; j < list.size(); j++) { if (list.get(j).isEmpty()) return {i}; }",
];

/// A class with `methods` methods, each holding one loop of every kind.
fn java_source(methods: usize) -> String {
    let mut out = String::from("package bench;\n\nimport java.util.*;\n\npublic class Loops {\n");
    for i in 0..methods {
        out.push_str(&format!("  int method{i}(List<String> list) {{\n"));
        for template in LOOPS {
            out.push_str("    ");
            out.push_str(&template.replace("{i}", &i.to_string()));
            out.push('\n');
        }
        out.push_str("    return -1;\n  }\n");
    }
    out.push_str("}\n");
    out
}

fn bench_inspection(c: &mut Criterion) {
    let inspection = StreamApiMigrationInspection::default();

    let mut group = c.benchmark_group("stream_migration_inspection");
    group.measurement_time(Duration::from_secs(2));
    group.warm_up_time(Duration::from_secs(1));
    group.sample_size(20);

    for (id, methods) in [("small", 1), ("medium", 20), ("large", 200)] {
        let src = java_source(methods);
        group.bench_with_input(BenchmarkId::from_parameter(id), &src, |b, src| {
            b.iter(|| black_box(inspection.check_text(black_box(src))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_inspection);
criterion_main!(benches);
