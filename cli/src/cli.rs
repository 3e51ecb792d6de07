//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for run results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every variation's outcome followed by the aggregated answer
    Full,
    /// Only the aggregated answer
    Answer,
    /// JSON report
    Json,
}

/// CLI arguments for fanout
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(author, version, about = "Run several variations of one task in parallel and merge the results")]
#[command(long_about = r#"
fanout runs the same task several ways at once (different models, thinking
levels or prompt framings), keeps them inside shared budgets, and merges the
outcomes into one answer.

Each variation is executed by the program configured under [execution]
(or --program). The program receives the variation as JSON on stdin and
prints its answer on stdout.

Configuration files are loaded from (in priority order):
1. FANOUT_<SECTION>__<KEY>    Environment overrides
2. --config <path>            Explicit config file
3. ./fanout.toml              Project-level config
4. ~/.config/fanout/config.toml   Global config

Example:
  fanout -m claude-sonnet-4.5 -m gpt-5 "Fix the flaky login test"
  fanout -m gpt-5 -t low -t high --aggregation consensus "Summarize the design doc"
  fanout --strategy sequential --variant "Prefer a minimal diff" "Refactor parser.rs"
"#)]
pub struct Cli {
    /// The task every variation works on
    pub task: Option<String>,

    /// Models to try (can be specified multiple times)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Vec<String>,

    /// Thinking levels to try: off, minimal, low, medium, high
    #[arg(short, long = "thinking", value_name = "LEVEL")]
    pub thinking: Vec<String>,

    /// Extra prompt framing; each one becomes its own variation axis value
    #[arg(long = "variant", value_name = "TEXT")]
    pub variants: Vec<String>,

    /// Cap on the number of generated variations
    #[arg(long, value_name = "N")]
    pub max_combinations: Option<usize>,

    /// How results are merged: best, voting, consensus, ensemble
    #[arg(long, value_name = "STRATEGY")]
    pub aggregation: Option<String>,

    /// Admission strategy: parallel or sequential
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Program that executes one variation (overrides [execution] program)
    #[arg(long, value_name = "PATH")]
    pub program: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "answer")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress lines
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write diagnostics to a daily log file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
