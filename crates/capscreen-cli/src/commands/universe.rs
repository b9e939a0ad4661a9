use capscreen_core::ScreenerConfig;

use super::{CommandOutput, CommandResult};

pub fn run(config: &ScreenerConfig) -> CommandResult {
    CommandResult::ok(CommandOutput::Universe(config.universe.clone()))
}
