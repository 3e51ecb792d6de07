//! CLI entrypoint for fanout
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod cli;
mod output;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use cli::{Cli, OutputFormat};
use colored::Colorize;
use fanout_application::RunIterationsUseCase;
use fanout_domain::util::preview;
use fanout_domain::{
    HybridConfig, IterationResult, Plan, PromptVariant, TaskSpec, ThinkingLevel, Variation,
    VariationFactory, has_errors,
};
use fanout_infrastructure::{
    ConfigLoader, FileConfig, JsonlIterationLogger, ProcessExecutionService,
};
use output::{ConsoleFormatter, RunReport};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Characters of the task kept in the plan title
const TITLE_CHARS: usize = 60;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&cli)?;

    info!("Starting fanout");

    // === Configuration ===
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    apply_overrides(&mut config, &cli);

    let issues = config.validate();
    for issue in &issues {
        if issue.is_error() {
            eprintln!("{}", issue.to_string().red());
        } else {
            warn!("{}", issue.message);
        }
    }
    if has_errors(&issues) {
        bail!("Configuration has errors");
    }

    // === Plan ===
    let task = match cli.task.as_deref().map(str::trim) {
        Some(task) if !task.is_empty() => task.to_string(),
        _ => bail!("Task is required. See --help for usage."),
    };
    let variations = build_variations(&cli, &task)?;
    let plan = config.configure_plan(
        Plan::new(TaskSpec::new(preview(&task, TITLE_CHARS), task.clone()), variations)
            .context("Could not build a plan")?,
    );

    // === Dependency Injection ===
    let process = config.execution.to_process_config().ok_or_else(|| {
        anyhow!(
            "No execution program configured. Set [execution] program in fanout.toml, \
             FANOUT_EXECUTION__PROGRAM, or pass --program"
        )
    })?;
    let service = Arc::new(ProcessExecutionService::new(process));

    let mut runner = RunIterationsUseCase::new(service, plan, config.runner_params());
    if let Some(path) = config.logging.event_log_path() {
        match JsonlIterationLogger::new(&path) {
            Some(logger) => {
                info!(path = %logger.path().display(), "Writing event log");
                runner = runner.with_event_logger(Arc::new(logger));
            }
            None => warn!(path = %path.display(), "Event log disabled"),
        }
    }

    if !cli.quiet {
        print_header(&runner, &task);
        register_progress(&runner);
    }

    let token = runner.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping...".yellow());
            token.cancel();
        }
    });

    let aggregated = runner.execute().await?;
    interrupt.abort();

    let report = RunReport::new(runner.status(), aggregated, runner.results());
    let rendered = match cli.output {
        OutputFormat::Full => ConsoleFormatter::format(&report),
        OutputFormat::Answer => ConsoleFormatter::format_answer(&report),
        OutputFormat::Json => ConsoleFormatter::format_json(&report),
    };
    println!("{}", rendered);

    if report.aggregated.is_empty() {
        bail!("No variation succeeded");
    }
    Ok(())
}

/// Console logging by verbosity, plus an optional daily file.
///
/// `RUST_LOG` takes precedence over `-v`.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Could not create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "fanout.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Command-line flags win over every configuration source.
fn apply_overrides(config: &mut FileConfig, cli: &Cli) {
    if let Some(strategy) = &cli.strategy {
        config.runner.strategy = strategy.clone();
    }
    if let Some(aggregation) = &cli.aggregation {
        config.runner.aggregation = aggregation.clone();
    }
    if let Some(program) = &cli.program {
        config.execution.program = Some(program.clone());
    }
}

fn build_variations(cli: &Cli, task: &str) -> Result<Vec<Variation>> {
    let thinking_levels = cli
        .thinking
        .iter()
        .map(|s| s.parse::<ThinkingLevel>().map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;

    let prompt_variants = cli
        .variants
        .iter()
        .enumerate()
        .map(|(i, text)| {
            PromptVariant::new(format!("prompt-{}", i))
                .with_label(preview(text, 24))
                .with_context(text.clone())
        })
        .collect();

    let config = HybridConfig {
        models: cli.model.clone(),
        thinking_levels,
        prompt_variants,
        max_combinations: cli.max_combinations,
    };
    Ok(VariationFactory::hybrid(
        &TaskSpec::new(preview(task, TITLE_CHARS), task),
        &config,
    ))
}

fn print_header<S>(runner: &RunIterationsUseCase<S>, task: &str)
where
    S: fanout_application::ExecutionService + 'static,
{
    let status = runner.status();
    let plan = &status.plan;
    eprintln!();
    eprintln!("{} {}", "Task:".cyan().bold(), preview(task, 200));
    eprintln!(
        "{} {} ({} strategy, {} aggregation, up to {} at once)",
        "Variations:".cyan().bold(),
        plan.variations.len(),
        plan.strategy,
        plan.aggregation,
        plan.limits.max_concurrent_iterations
    );
    eprintln!();
}

fn register_progress<S>(runner: &RunIterationsUseCase<S>)
where
    S: fanout_application::ExecutionService + 'static,
{
    runner.on_spawn(Arc::new(|variation: &Variation| {
        eprintln!("  {} {}", "→".cyan(), variation.label);
    }));
    runner.on_result(Arc::new(|result: &IterationResult| {
        if result.success {
            eprintln!(
                "  {} {} (score {:.2}, {} ms)",
                "✓".green(),
                result.variation_id,
                result.score(),
                result.duration_ms
            );
        } else {
            eprintln!(
                "  {} {}: {}",
                "✗".red(),
                result.variation_id,
                result.error.as_deref().unwrap_or("failed")
            );
        }
    }));
}
