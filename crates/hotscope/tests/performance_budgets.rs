//! Time-budget regression tests for hotscope.
//!
//! These tests assert that key operations complete within wall-clock thresholds.
//! They are gated behind `#[cfg(not(debug_assertions))]` because debug-mode
//! timings are not meaningful.
//!
//! Run with: `cargo test --release -p hotscope --features test-support --test performance_budgets`
//!
//! CI adaptation: when the `CI` environment variable is set, thresholds are
//! multiplied by a relaxation factor (default 3×, configurable via
//! `HOTSCOPE_PERF_CI_FACTOR`).

// Only compile in release mode: debug timings are meaningless.
#![cfg(not(debug_assertions))]

use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use hotscope::collector::PathCollector;
use hotscope::index::{DiskTextFetcher, SymbolIndex};
use hotscope::parser::parse_script;
use hotscope::purify::purify;
use hotscope::test_utils::fixture_workspace::{create_fixture_workspace, FixtureConfig};

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

/// Run `f` three times and return the median duration.
fn median_of_3<F: FnMut()>(mut f: F) -> Duration {
    let mut times = [Duration::ZERO; 3];
    for t in &mut times {
        let start = Instant::now();
        f();
        *t = start.elapsed();
    }
    times.sort();
    times[1]
}

fn ci_factor_from(ci: Option<&str>, factor: Option<&str>) -> f64 {
    let is_ci = ci.map(|v| !v.is_empty()).unwrap_or(false);

    if is_ci {
        factor
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|&f| f >= 1.0)
            .unwrap_or(3.0)
    } else {
        1.0
    }
}

fn ci_factor() -> f64 {
    ci_factor_from(
        std::env::var("CI").ok().as_deref(),
        std::env::var("HOTSCOPE_PERF_CI_FACTOR").ok().as_deref(),
    )
}

/// Assert that `measured` is within `budget_ms × ci_factor()`.
fn assert_within_budget(label: &str, measured: Duration, budget_ms: u64) {
    let factor = ci_factor();
    let threshold = Duration::from_secs_f64(budget_ms as f64 * factor / 1000.0);
    let ci_note = if factor > 1.0 {
        format!(" (CI relaxation {factor:.1}× applied)")
    } else {
        String::new()
    };

    assert!(
        measured <= threshold,
        "Time budget exceeded for '{label}': \
         measured {measured:.1?}, threshold {threshold:.1?} \
         (base {budget_ms}ms × {factor:.1}){ci_note}",
    );
}

/// Generate a synthetic script of approximately `target_bytes` size.
fn generate_script_of_size(target_bytes: usize) -> String {
    let mut content = String::new();
    let mut method_idx = 0;

    while content.len() < target_bytes {
        writeln!(
            content,
            r#"; Step {0}
method_{0}(x, y := {1}) {{
    result := x + y * {1} ; scale
    cfg := {{name: "m{0}", size: {1}}}
    if (result = "") {{
        return 0
    }}
    return result
}}
"#,
            method_idx,
            method_idx + 1
        )
        .unwrap();
        method_idx += 1;
    }

    if content.len() > target_bytes {
        if let Some(pos) = content[..target_bytes].rfind('\n') {
            content.truncate(pos + 1);
        }
    }

    content
}

// ---------------------------------------------------------------------------
// Harness self-tests
// ---------------------------------------------------------------------------

#[test]
fn median_of_3_calls_f_exactly_3_times() {
    let mut count = 0u32;
    let _ = median_of_3(|| {
        count += 1;
    });
    assert_eq!(count, 3, "median_of_3 should call f exactly 3 times");
}

#[test]
fn ci_factor_defaults() {
    assert!((ci_factor_from(None, None) - 1.0).abs() < f64::EPSILON);
    assert!((ci_factor_from(Some("true"), None) - 3.0).abs() < f64::EPSILON);
    assert!((ci_factor_from(Some("true"), Some("5.0")) - 5.0).abs() < f64::EPSILON);
    assert!((ci_factor_from(Some("true"), Some("0.5")) - 3.0).abs() < f64::EPSILON);
}

#[test]
#[should_panic(expected = "Time budget exceeded")]
fn assert_within_budget_panics_for_slow_op() {
    assert_within_budget("slow_op", Duration::from_secs(1), 5);
}

// ---------------------------------------------------------------------------
// Purification and parsing budgets
// 1KB file < 2ms, 100KB file < 100ms
// ---------------------------------------------------------------------------

#[test]
fn budget_purify_1000_lines() {
    let code = generate_script_of_size(40_000);
    let lines: Vec<&str> = code.lines().take(1000).collect();

    let elapsed = median_of_3(|| {
        for line in &lines {
            let _ = purify(line);
        }
    });

    assert_within_budget("purify_1000_lines", elapsed, 10);
}

#[test]
fn budget_parse_1kb() {
    let code = generate_script_of_size(1_024);
    let uri = Url::parse("file:///bench/one_kb.ahk").unwrap();
    let _ = parse_script(&uri, &code);

    let elapsed = median_of_3(|| {
        let _ = parse_script(&uri, &code);
    });

    assert_within_budget("parse_1kb", elapsed, 2);
}

#[test]
fn budget_parse_100kb() {
    let code = generate_script_of_size(102_400);
    assert!(
        code.len() >= 90_000,
        "Generated code should be approximately 100KB, got {} bytes",
        code.len()
    );
    let uri = Url::parse("file:///bench/hundred_kb.ahk").unwrap();
    let script = parse_script(&uri, &code);
    assert!(script.methods.len() > 500);

    let elapsed = median_of_3(|| {
        let _ = parse_script(&uri, &code);
    });

    assert_within_budget("parse_100kb", elapsed, 100);
}

// ---------------------------------------------------------------------------
// Workspace indexing budget
// medium fixture (50 files) collected and indexed < 500ms
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn budget_index_medium_workspace() {
    let config = FixtureConfig::medium();
    let workspace = create_fixture_workspace(&config);

    let start = Instant::now();
    let paths = PathCollector::from_fs()
        .collect(workspace.path(), &[], &[])
        .await
        .unwrap();
    let index = SymbolIndex::with_fetcher(Arc::new(DiskTextFetcher));
    let summary = index.index_paths(&paths, usize::MAX).await;
    let elapsed = start.elapsed();

    assert_eq!(summary.files_indexed, config.file_count);
    assert_eq!(summary.methods, config.file_count * config.methods_per_file);
    assert_within_budget("index_medium_workspace", elapsed, 500);
}
