//! Murmur maintenance tasks: `cargo xtask <command>`.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::process::Command;

const FMT: &[&str] = &["fmt", "--all", "--check"];
const CLIPPY: &[&str] = &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"];
const TEST: &[&str] = &["test", "--workspace"];
const FUZZ_TARGETS: &[&str] = &["fuzz_stream_decrypt", "fuzz_keybox_message", "fuzz_config_parse"];

#[derive(Parser)]
#[command(name = "xtask", about = "Murmur maintenance tasks")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Formatting and clippy
    Check,

    /// Workspace tests, including property tests
    Test,

    /// Check, then test
    Ci,

    /// Criterion benchmarks
    Bench,

    /// Run one fuzz target for a bounded time (nightly + cargo-fuzz)
    Fuzz {
        #[arg(value_parser = clap::builder::PossibleValuesParser::new(FUZZ_TARGETS))]
        target: String,

        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Task::Check => {
            cargo(FMT)?;
            cargo(CLIPPY)
        }
        Task::Test => cargo(TEST),
        Task::Ci => {
            for step in [FMT, CLIPPY, TEST] {
                cargo(step)?;
            }
            eprintln!("ci: ok");
            Ok(())
        }
        Task::Bench => cargo(&["bench", "--workspace"]),
        Task::Fuzz { target, seconds } => {
            let max_time = format!("-max_total_time={seconds}");
            cargo(&["+nightly", "fuzz", "run", "--fuzz-dir", "fuzz", &target, "--", &max_time])
        }
    }
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    eprintln!("$ cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("cargo {} exited with {status}", args.join(" "));
    }
    Ok(())
}
