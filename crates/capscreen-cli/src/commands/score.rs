use std::time::Instant;

use capscreen_core::ScreenerConfig;

use crate::cli::ScoreArgs;
use crate::error::CliError;

use super::{build_evaluator, CommandOutput, CommandResult};

pub async fn run(
    args: &ScoreArgs,
    config: &ScreenerConfig,
    mock: bool,
) -> Result<CommandResult, CliError> {
    let evaluator = build_evaluator(config, mock);
    let started = Instant::now();
    let result = evaluator
        .evaluate_all(std::slice::from_ref(&args.symbol))
        .await?;

    Ok(CommandResult::ok(CommandOutput::Score(result))
        .with_source(evaluator.fetcher_id())
        .with_latency(started.elapsed().as_millis() as u64))
}
