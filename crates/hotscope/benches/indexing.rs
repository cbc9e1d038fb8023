// indexing.rs - Performance benchmarks for purification, parsing and workspace indexing
//
// Run with: cargo bench --bench indexing --features test-support
// Compare baselines: cargo bench --bench indexing --features test-support -- --baseline before

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use url::Url;

use hotscope::collector::PathCollector;
use hotscope::completion::compose_completions;
use hotscope::index::{DiskTextFetcher, SymbolIndex};
use hotscope::parser::parse_script;
use hotscope::purify::purify;
use hotscope::test_utils::fixture_workspace::{create_fixture_workspace, FixtureConfig};

const SAMPLE_LINES: &[&str] = &[
    "a := 5 ; trailing comment",
    r#"b := {str: "object", nested: {x: 1}}"#,
    "Gui, %hwnd%: Color, % color",
    r#"MsgBox % "status: " . state"#,
    "MouseGetPos, OutputVarX, OutputVarY, OutputVarWin",
    "    result := x + y * 2",
];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
}

// ---------------------------------------------------------------------------
// Benchmark: single-line purification
// ---------------------------------------------------------------------------

fn bench_purify(c: &mut Criterion) {
    let mut group = c.benchmark_group("purify");
    for (i, line) in SAMPLE_LINES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("line", i), line, |b, line| {
            b.iter(|| black_box(purify(black_box(line))))
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: whole-file parsing
// ---------------------------------------------------------------------------

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_script");
    let uri = Url::parse("file:///bench/file_0.ahk").unwrap();

    for (label, config) in [("small", FixtureConfig::small()), ("large", FixtureConfig::large())] {
        let config = FixtureConfig {
            file_count: 1,
            ..config
        };
        let workspace = create_fixture_workspace(&config);
        let text = std::fs::read_to_string(workspace.path().join(config.relative_path(0))).unwrap();
        group.bench_with_input(BenchmarkId::new("file", label), &text, |b, text| {
            b.iter(|| black_box(parse_script(&uri, black_box(text))))
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: collect + read + parse + index a fixture workspace
// ---------------------------------------------------------------------------

fn bench_workspace_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("workspace_index");
    group.sample_size(10);
    let rt = runtime();

    for (label, config) in [("small_10", FixtureConfig::small()), ("medium_50", FixtureConfig::medium())] {
        // Pre-create the workspace so fixture generation isn't measured.
        let workspace = create_fixture_workspace(&config);

        group.bench_with_input(BenchmarkId::new("collect", label), &workspace, |b, ws| {
            b.to_async(&rt).iter(|| async move {
                let paths = PathCollector::from_fs()
                    .collect(ws.path(), &[], &[])
                    .await
                    .unwrap();
                black_box(paths)
            })
        });

        group.bench_with_input(BenchmarkId::new("index", label), &workspace, |b, ws| {
            b.to_async(&rt).iter(|| async move {
                let paths = PathCollector::from_fs()
                    .collect(ws.path(), &[], &[])
                    .await
                    .unwrap();
                let index = SymbolIndex::with_fetcher(Arc::new(DiskTextFetcher));
                black_box(index.index_paths(&paths, usize::MAX).await)
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: completion composition over an indexed workspace
// ---------------------------------------------------------------------------

fn bench_completion(c: &mut Criterion) {
    let rt = runtime();
    let workspace = create_fixture_workspace(&FixtureConfig::medium());
    let index = SymbolIndex::with_fetcher(Arc::new(DiskTextFetcher));
    rt.block_on(async {
        let paths = PathCollector::from_fs()
            .collect(workspace.path(), &[], &[])
            .await
            .unwrap();
        index.index_paths(&paths, usize::MAX).await;
    });

    let uri = index.uris()[0].clone();
    let script = index.get(&uri).unwrap();

    c.bench_function("compose_completions_medium", |b| {
        b.iter(|| {
            let methods = index.all_methods();
            black_box(compose_completions(&methods, &uri, 5, &script.variables))
        })
    });
}

criterion_group!(
    benches,
    bench_purify,
    bench_parse,
    bench_workspace_index,
    bench_completion,
);
criterion_main!(benches);
