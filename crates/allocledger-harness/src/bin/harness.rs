//! CLI entrypoint for the allocledger harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use allocledger_harness::{HarnessError, LogEmitter, StressConfig};

/// Verification tooling for allocledger.
#[derive(Debug, Parser)]
#[command(name = "allocledger-harness")]
#[command(about = "Scenario, stress and leak-sweep harness for allocledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scripted registry checks.
    Scenario {
        /// Write one JSONL log entry per check to this path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Run identifier recorded in the log.
        #[arg(long, default_value = "scenario")]
        run_id: String,
    },
    /// Hammer one registry from many threads.
    Stress {
        #[arg(long, default_value_t = 8)]
        threads: usize,
        /// Inserts per thread.
        #[arg(long, default_value_t = 1_000)]
        per_thread: usize,
        #[arg(long, default_value_t = 32)]
        block_size: usize,
        /// Output path for the JSON report (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Leak blocks on purpose and print the teardown leak report as JSONL.
    LeakSweep {
        #[arg(long, default_value_t = 16)]
        leaks: usize,
        #[arg(long, default_value_t = 64)]
        size: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scenario { log, run_id } => {
            let mut emitter = match &log {
                Some(path) => LogEmitter::to_file(path, &run_id)?,
                None => LogEmitter::sink(&run_id),
            };
            let report = allocledger_harness::run_scenarios(&mut emitter)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            eprintln!(
                "Scenario run complete: total={}, passed={}, failed={}",
                report.total, report.passed, report.failed
            );
            if let Some(path) = log {
                eprintln!("Log written to {}", path.display());
            }
            if !report.all_passed() {
                return Err(HarnessError::CheckFailed {
                    failed: report.failed,
                    total: report.total,
                }
                .into());
            }
        }
        Command::Stress {
            threads,
            per_thread,
            block_size,
            output,
        } => {
            eprintln!("Stressing with {threads} threads x {per_thread} inserts");
            let report = allocledger_harness::run_stress(StressConfig {
                threads,
                per_thread,
                block_size,
            })?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{json}"),
            }
            if !report.passed {
                return Err(format!(
                    "stress failed: live {} of {}, {} mismatches",
                    report.live_count, report.expected, report.mismatches
                )
                .into());
            }
        }
        Command::LeakSweep { leaks, size } => {
            let report = allocledger_harness::run_leak_sweep(leaks, size)?;
            report.write_jsonl(std::io::stdout().lock())?;
            eprintln!(
                "Swept {} leaked blocks ({} bytes)",
                report.released, report.released_bytes
            );
        }
    }

    Ok(())
}
