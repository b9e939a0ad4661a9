use serde::{Deserialize, Serialize};

use crate::rubric::{BandPosition, FactorCurve};
use crate::{Factor, FundamentalsSnapshot, RubricConfig, Symbol};

/// Points awarded for one factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScore {
    pub factor: Factor,
    pub points: f64,
    pub rationale: String,
}

/// Composite score of one snapshot against the rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub symbol: Symbol,
    pub total_score: f64,
    pub factor_scores: Vec<FactorScore>,
    pub snapshot: FundamentalsSnapshot,
}

impl CompositeResult {
    pub fn factor(&self, factor: Factor) -> Option<&FactorScore> {
        self.factor_scores.iter().find(|score| score.factor == factor)
    }

    pub fn points(&self, factor: Factor) -> f64 {
        self.factor(factor).map_or(0.0, |score| score.points)
    }
}

/// Pure rubric evaluation; shares nothing mutable, so one instance can be
/// used from every worker at once.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    rubric: RubricConfig,
}

impl Scorer {
    pub fn new(rubric: RubricConfig) -> Self {
        Self { rubric }
    }

    pub fn rubric(&self) -> &RubricConfig {
        &self.rubric
    }

    pub fn score(&self, snapshot: &FundamentalsSnapshot) -> CompositeResult {
        let factor_scores: Vec<FactorScore> = Factor::ALL
            .iter()
            .map(|factor| self.score_factor(*factor, factor_value(snapshot, *factor)))
            .collect();

        let total_score = round2(factor_scores.iter().map(|score| score.points).sum());

        CompositeResult {
            symbol: snapshot.symbol.clone(),
            total_score,
            factor_scores,
            snapshot: snapshot.clone(),
        }
    }

    fn score_factor(&self, factor: Factor, value: Option<f64>) -> FactorScore {
        let Some(value) = value else {
            return FactorScore {
                factor,
                points: 0.0,
                rationale: format!("{} unavailable", factor.label()),
            };
        };

        let curve = self.rubric.curve(factor);
        let shown = format_factor_value(factor, value);
        let band = describe_band(factor, curve);
        let position = if value < 0.0 && !factor.allows_negative() {
            BandPosition::NotMeaningful
        } else {
            curve.position(value)
        };
        let points = match position {
            BandPosition::NotMeaningful => 0.0,
            _ => round2(curve.points(value)),
        };

        let rationale = match position {
            BandPosition::NotMeaningful => format!(
                "{} {shown} not meaningful ({})",
                factor.label(),
                not_meaningful_reason(value)
            ),
            BandPosition::FullBand => {
                format!("{} {shown} within value band {band}", factor.label())
            }
            BandPosition::BelowFloor | BandPosition::RisingEdge => {
                format!("{} {shown} below value band {band}", factor.label())
            }
            BandPosition::FallingEdge | BandPosition::AboveCeiling => {
                format!("{} {shown} above value band {band}", factor.label())
            }
        };

        FactorScore {
            factor,
            points,
            rationale,
        }
    }
}

fn not_meaningful_reason(value: f64) -> &'static str {
    if !value.is_finite() {
        "non-finite"
    } else if value < 0.0 {
        "negative"
    } else {
        "non-positive"
    }
}

fn factor_value(snapshot: &FundamentalsSnapshot, factor: Factor) -> Option<f64> {
    match factor {
        Factor::MarketCap => snapshot.market_cap,
        Factor::PeRatio => snapshot.pe_ratio,
        Factor::PbRatio => snapshot.pb_ratio,
        Factor::DebtToEquity => snapshot.debt_to_equity,
        Factor::ProfitMargin => snapshot.profit_margin,
    }
}

fn format_factor_value(factor: Factor, value: f64) -> String {
    match factor {
        Factor::MarketCap => format_market_cap(value),
        Factor::PeRatio | Factor::PbRatio => format!("{value:.2}"),
        Factor::DebtToEquity => format!("{value:.1}%"),
        Factor::ProfitMargin => format!("{:.1}%", value * 100.0),
    }
}

fn describe_band(factor: Factor, curve: &FactorCurve) -> String {
    let show = |value| format_factor_value(factor, value);
    match (curve.lower_full, curve.upper_full) {
        (Some(lower), Some(upper)) => format!("{}-{}", show(lower), show(upper)),
        (None, Some(upper)) => format!("<= {}", show(upper)),
        (Some(lower), None) => format!(">= {}", show(lower)),
        (None, None) => "unbounded".to_owned(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Human-readable market capitalization (`$1.23B`, `$450.00M`).
pub fn format_market_cap(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 1.0e12 {
        format!("${:.2}T", value / 1.0e12)
    } else if magnitude >= 1.0e9 {
        format!("${:.2}B", value / 1.0e9)
    } else if magnitude >= 1.0e6 {
        format!("${:.2}M", value / 1.0e6)
    } else {
        format!("${value:.0}")
    }
}
