use capscreen_core::{format_market_cap, BatchResult, CompositeResult, Factor};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::cli::OutputFormat;
use crate::commands::{CommandOutput, CommandResult};
use crate::error::CliError;

const NAME_WIDTH: usize = 28;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    generated_at: String,
    latency_ms: u64,
    source: &'a str,
    result: &'a CommandOutput,
}

pub fn render(result: &CommandResult, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let report = Report {
                generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
                latency_ms: result.latency_ms,
                source: result.source,
                result: &result.output,
            };
            let payload = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(result)?,
    }

    Ok(())
}

fn render_table(result: &CommandResult) -> Result<(), CliError> {
    match &result.output {
        CommandOutput::Screen(batch) => {
            print!("{}", screen_table(batch));
            println!(
                "scored {} of {} symbol(s) in {} ms (source: {})",
                batch.ranked.len(),
                batch.evaluated(),
                result.latency_ms,
                result.source
            );
        }
        CommandOutput::Score(batch) => print!("{}", score_breakdown(batch)),
        CommandOutput::Universe(symbols) => {
            for symbol in symbols {
                println!("{symbol}");
            }
        }
        CommandOutput::Rubric(rubric) => {
            println!("{}", serde_json::to_string_pretty(rubric)?);
        }
    }
    Ok(())
}

pub fn screen_table(batch: &BatchResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<8} {:<NAME_WIDTH$} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>10}\n",
        "RANK", "SYMBOL", "NAME", "SCORE", "MCAP", "P/E", "P/B", "D/E", "MARGIN", "MARKET CAP"
    ));

    for (index, result) in batch.ranked.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {:<8} {:<NAME_WIDTH$} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>10}\n",
            index + 1,
            result.symbol.as_str(),
            display_name(result),
            result.total_score,
            result.points(Factor::MarketCap),
            result.points(Factor::PeRatio),
            result.points(Factor::PbRatio),
            result.points(Factor::DebtToEquity),
            result.points(Factor::ProfitMargin),
            result
                .snapshot
                .market_cap
                .map_or_else(|| String::from("N/A"), format_market_cap),
        ));
    }

    if !batch.failures.is_empty() {
        out.push_str("\ncould not evaluate:\n");
        for failure in &batch.failures {
            out.push_str(&format!(
                "  {}: {} ({})\n",
                failure.symbol, failure.reason, failure.code
            ));
        }
    }

    out
}

pub fn score_breakdown(batch: &BatchResult) -> String {
    let mut out = String::new();

    for result in &batch.ranked {
        out.push_str(&format!(
            "{} {}\ntotal score: {:.2} / 100\n\n",
            result.symbol,
            result.snapshot.company_name.as_deref().unwrap_or(""),
            result.total_score
        ));
        for score in &result.factor_scores {
            out.push_str(&format!(
                "  {:<10} {:>6.2}  {}\n",
                score.factor.label(),
                score.points,
                score.rationale
            ));
        }
    }

    for failure in &batch.failures {
        out.push_str(&format!(
            "{}: could not evaluate: {} ({})\n",
            failure.symbol, failure.reason, failure.code
        ));
    }

    out
}

fn display_name(result: &CompositeResult) -> String {
    let name = result.snapshot.company_name.as_deref().unwrap_or("N/A");
    if name.chars().count() <= NAME_WIDTH {
        name.to_owned()
    } else {
        let mut truncated: String = name.chars().take(NAME_WIDTH - 3).collect();
        truncated.push_str("...");
        truncated
    }
}
