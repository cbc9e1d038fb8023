//
// main.rs
//
// Copyright (C) 2022-2025 Posit Software, PBC. All rights reserved.
// Modifications copyright (C) 2026 Jonathan Marc Bearak
//

use std::env;

use hotscope::backend;
use hotscope::cli::index_stats;

fn print_usage() {
    println!(
        "hotscope {}, a static AutoHotkey Language Server.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: hotscope [OPTIONS]
       hotscope index-stats <path> [--csv] [--include <glob>]... [--exclude <glob>]...
                            [--max-file-size <bytes>]

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

Subcommands:

index-stats <path>           Index a directory and report per-phase timings
  --csv                      Print results as CSV
  --include <glob>           Only index root-relative paths matching the glob
  --exclude <glob>           Skip root-relative paths matching the glob
  --max-file-size <bytes>    Skip files larger than this (default 524288)

"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut use_stdio = false;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--stdio" => use_stdio = true,
            "--version" => {
                println!("hotscope {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            "index-stats" => {
                env_logger::init();
                let args = index_stats::parse_args(&mut argv).map_err(anyhow::Error::msg)?;
                let results = index_stats::run_index_stats(&args).await?;
                if args.csv {
                    index_stats::print_results_csv(&results);
                } else {
                    index_stats::print_results(&results);
                }
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    if !use_stdio {
        print_usage();
        return Ok(());
    }

    env_logger::init();

    backend::start_lsp().await
}
