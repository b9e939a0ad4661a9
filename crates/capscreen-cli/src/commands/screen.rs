use std::time::Instant;

use capscreen_core::ScreenerConfig;

use crate::cli::ScreenArgs;
use crate::error::CliError;

use super::{build_evaluator, CommandOutput, CommandResult};

pub async fn run(
    args: &ScreenArgs,
    config: &ScreenerConfig,
    mock: bool,
) -> Result<CommandResult, CliError> {
    let symbols = if args.symbols.is_empty() {
        config.universe.as_slice()
    } else {
        args.symbols.as_slice()
    };

    let evaluator = build_evaluator(config, mock);
    let started = Instant::now();
    let result = evaluator.evaluate_all(symbols).await?;

    Ok(CommandResult::ok(CommandOutput::Screen(result))
        .with_source(evaluator.fetcher_id())
        .with_latency(started.elapsed().as_millis() as u64))
}
