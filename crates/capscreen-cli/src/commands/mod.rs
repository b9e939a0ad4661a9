mod rubric;
mod score;
mod screen;
mod universe;

use std::sync::Arc;

use capscreen_core::{
    BatchEvaluator, BatchResult, CircuitBreaker, FundamentalsFetcher, RubricConfig, Scorer,
    ScreenerConfig, SeededFetcher, YahooFetcher,
};
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Data produced by a command, serialized as the report's `result`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Screen(BatchResult),
    Score(BatchResult),
    Universe(Vec<String>),
    Rubric(RubricConfig),
}

pub struct CommandResult {
    pub output: CommandOutput,
    pub source: &'static str,
    pub latency_ms: u64,
}

impl CommandResult {
    pub fn ok(output: CommandOutput) -> Self {
        Self {
            output,
            source: "config",
            latency_ms: 0,
        }
    }

    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn failure_count(&self) -> usize {
        match &self.output {
            CommandOutput::Screen(result) | CommandOutput::Score(result) => result.failures.len(),
            CommandOutput::Universe(_) | CommandOutput::Rubric(_) => 0,
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = load_config(cli)?;

    match &cli.command {
        Command::Screen(args) => screen::run(args, &config, cli.mock).await,
        Command::Score(args) => score::run(args, &config, cli.mock).await,
        Command::Universe => Ok(universe::run(&config)),
        Command::Rubric => Ok(rubric::run(&config)),
    }
}

/// Defaults, then the config file, then environment, then flags.
fn load_config(cli: &Cli) -> Result<ScreenerConfig, CliError> {
    let config = match &cli.config {
        Some(path) => ScreenerConfig::load(path)?,
        None => ScreenerConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(concurrency) = cli.concurrency {
        config.batch.max_concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.batch.batch_timeout_ms = timeout_ms;
    }
    config.validate()?;

    debug!(
        max_concurrency = config.batch.max_concurrency,
        batch_timeout_ms = config.batch.batch_timeout_ms,
        universe = config.universe.len(),
        "resolved configuration"
    );
    Ok(config)
}

fn build_evaluator(config: &ScreenerConfig, mock: bool) -> BatchEvaluator {
    let fetcher: Arc<dyn FundamentalsFetcher> = if mock {
        Arc::new(SeededFetcher::new())
    } else {
        Arc::new(
            YahooFetcher::new()
                .with_retry_policy(config.retry_policy())
                .with_circuit_breaker(Arc::new(CircuitBreaker::new(
                    config.circuit_breaker_config(),
                ))),
        )
    };

    let evaluator = BatchEvaluator::new(
        fetcher,
        Scorer::new(config.rubric),
        config.batch_config(),
    );
    match config.throttle() {
        Some(throttle) if !mock => evaluator.with_throttle(throttle),
        _ => evaluator,
    }
}
