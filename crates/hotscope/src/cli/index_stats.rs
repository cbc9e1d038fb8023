// cli/index_stats.rs - `hotscope index-stats` subcommand
//
// Indexes a directory once and reports timing metrics for each phase.
//
// Phases measured:
//   1. scan  : discovering script files with the configured filters
//   2. read  : loading file contents
//   3. parse : purifying and extracting methods/variables
//   4. index : populating the symbol index and flattening all methods

use std::path::PathBuf;
use std::time::{Duration, Instant};

use url::Url;

use crate::collector::PathCollector;
use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::index::{decode_script_text, SymbolIndex};
use crate::parser::parse_script;
use crate::perf::TimingGuard;
use crate::script::Script;

/// Parsed arguments for the `index-stats` subcommand.
#[derive(Debug)]
pub struct IndexStatsArgs {
    pub path: PathBuf,
    pub csv: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Files larger than this are read but not parsed
    pub max_file_size: usize,
}

/// Result of running a single phase.
pub struct PhaseResult {
    pub name: String,
    pub duration: Duration,
    pub peak_rss_bytes: Option<u64>,
    pub detail: String,
}

impl PhaseResult {
    fn new(name: &str, duration: Duration, detail: String) -> Self {
        Self {
            name: name.to_string(),
            duration,
            peak_rss_bytes: crate::perf::peak_rss_bytes(),
            detail,
        }
    }
}

/// Parse `index-stats` arguments from the remaining CLI args.
///
/// Expected usage: `hotscope index-stats <path> [--csv] [--include <glob>]... [--exclude <glob>]... [--max-file-size <bytes>]`
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<IndexStatsArgs, String> {
    let mut path: Option<PathBuf> = None;
    let mut csv = false;
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut max_file_size = IndexConfig::default().max_file_size_bytes;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--csv" => csv = true,
            "--include" => include.push(
                args.next()
                    .ok_or_else(|| "--include requires a glob".to_string())?,
            ),
            "--exclude" => exclude.push(
                args.next()
                    .ok_or_else(|| "--exclude requires a glob".to_string())?,
            ),
            "--max-file-size" => {
                max_file_size = args
                    .next()
                    .and_then(|value| value.parse().ok())
                    .ok_or_else(|| "--max-file-size requires a byte count".to_string())?;
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let path = path.ok_or_else(|| "Missing required <path> argument".to_string())?;
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }

    Ok(IndexStatsArgs {
        path,
        csv,
        include,
        exclude,
        max_file_size,
    })
}

/// Run the index-stats command and return phase results.
pub async fn run_index_stats(args: &IndexStatsArgs) -> Result<Vec<PhaseResult>, IndexError> {
    let mut results = Vec::new();

    // Phase 1: Scan
    let paths = {
        let _guard = TimingGuard::new("index-stats:scan");
        let start = Instant::now();
        let paths = PathCollector::from_fs()
            .collect(&args.path, &args.include, &args.exclude)
            .await?;
        results.push(PhaseResult::new(
            "scan",
            start.elapsed(),
            format!("{} files", paths.len()),
        ));
        paths
    };

    // Phase 2: Read
    let mut texts: Vec<(Url, String)> = Vec::with_capacity(paths.len());
    {
        let _guard = TimingGuard::new("index-stats:read");
        let start = Instant::now();
        let mut bytes_read = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        for path in &paths {
            let Ok(uri) = Url::from_file_path(path) else {
                failed += 1;
                continue;
            };
            match tokio::fs::read(path).await {
                Ok(bytes) if bytes.len() > args.max_file_size => {
                    log::debug!(
                        "Skipping {} ({} bytes exceeds limit of {})",
                        path.display(),
                        bytes.len(),
                        args.max_file_size
                    );
                    skipped += 1;
                }
                Ok(bytes) => {
                    bytes_read += bytes.len();
                    texts.push((uri, decode_script_text(&bytes)));
                }
                Err(err) => {
                    log::warn!("Cannot read {}: {}", path.display(), err);
                    failed += 1;
                }
            }
        }
        results.push(PhaseResult::new(
            "read",
            start.elapsed(),
            format!(
                "{} files, {} bytes, {} skipped, {} failed",
                texts.len(),
                bytes_read,
                skipped,
                failed
            ),
        ));
    }

    // Phase 3: Parse
    let scripts: Vec<(Url, Script)> = {
        let _guard = TimingGuard::new("index-stats:parse");
        let start = Instant::now();
        let scripts: Vec<(Url, Script)> = texts
            .iter()
            .map(|(uri, text)| (uri.clone(), parse_script(uri, text)))
            .collect();
        let methods: usize = scripts.iter().map(|(_, s)| s.methods.len()).sum();
        let variables: usize = scripts
            .iter()
            .map(|(_, s)| {
                s.variables.len() + s.methods.iter().map(|m| m.variables.len()).sum::<usize>()
            })
            .sum();
        results.push(PhaseResult::new(
            "parse",
            start.elapsed(),
            format!("{} methods, {} variables", methods, variables),
        ));
        scripts
    };

    // Phase 4: Index
    {
        let _guard = TimingGuard::new("index-stats:index");
        let start = Instant::now();
        let index = SymbolIndex::new();
        for (uri, script) in scripts {
            index.upsert(uri, script);
        }
        let all_methods = index.all_methods();
        results.push(PhaseResult::new(
            "index",
            start.elapsed(),
            format!("{} scripts, {} methods", index.len(), all_methods.len()),
        ));
    }

    Ok(results)
}

/// Print phase results in human-readable format.
pub fn print_results(results: &[PhaseResult]) {
    println!("=== hotscope Index Stats ===\n");
    for result in results {
        let rss_str = match result.peak_rss_bytes {
            Some(bytes) => format_bytes(bytes),
            None => "N/A".to_string(),
        };
        println!(
            "  {:<8} {:>10.2?}   RSS: {:<10}  ({})",
            result.name, result.duration, rss_str, result.detail
        );
    }

    if results.len() > 1 {
        let total: Duration = results.iter().map(|r| r.duration).sum();
        println!("\n  {:<8} {:>10.2?}", "TOTAL", total);
    }
    println!();
}

/// Print phase results in CSV format.
pub fn print_results_csv(results: &[PhaseResult]) {
    for line in csv_lines(results) {
        println!("{}", line);
    }
}

fn csv_lines(results: &[PhaseResult]) -> Vec<String> {
    let mut lines = vec!["phase,duration_ms,peak_rss_bytes,detail".to_string()];
    for result in results {
        let rss = result
            .peak_rss_bytes
            .map_or(String::new(), |b| b.to_string());
        lines.push(format!(
            "{},{:.3},{},\"{}\"",
            result.name,
            result.duration.as_secs_f64() * 1000.0,
            rss,
            result.detail.replace('"', "\"\"")
        ));
    }
    lines
}

/// Format a byte count as a human-readable string (e.g., "12.3 MB").
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
