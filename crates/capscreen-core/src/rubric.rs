//! Scoring rubric configuration.
//!
//! Each factor is scored by a [`FactorCurve`]: a trapezoid that awards
//! `max_points` on its full band and decays linearly to zero along its
//! optional rising and falling edges. [`RubricConfig::default`] carries the
//! small-cap value rubric:
//!
//! | Factor | Zero at / below | Full band | Zero at / above | Positive only |
//! |--------|-----------------|-----------|-----------------|---------------|
//! | market cap | - | `<= 2e9` | `3e9` | no |
//! | P/E | `0` | `5..=15` | `25` | yes |
//! | P/B | - | `<= 1` | `3` | yes |
//! | debt/equity (%) | - | `<= 50` | `150` | no |
//! | profit margin | `0.0` | `>= 0.20` | - | no |

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Upper bound on any single factor's contribution.
pub const MAX_FACTOR_POINTS: f64 = 20.0;

/// One rubric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    MarketCap,
    PeRatio,
    PbRatio,
    DebtToEquity,
    ProfitMargin,
}

impl Factor {
    /// Scoring and reporting order.
    pub const ALL: [Self; 5] = [
        Self::MarketCap,
        Self::PeRatio,
        Self::PbRatio,
        Self::DebtToEquity,
        Self::ProfitMargin,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarketCap => "market_cap",
            Self::PeRatio => "pe_ratio",
            Self::PbRatio => "pb_ratio",
            Self::DebtToEquity => "debt_to_equity",
            Self::ProfitMargin => "profit_margin",
        }
    }

    /// Short column label for tables and rationales.
    pub const fn label(self) -> &'static str {
        match self {
            Self::MarketCap => "market cap",
            Self::PeRatio => "P/E",
            Self::PbRatio => "P/B",
            Self::DebtToEquity => "D/E",
            Self::ProfitMargin => "margin",
        }
    }

    /// Whether a negative reading is a real value rather than bad data.
    ///
    /// Market cap and debt-to-equity are magnitudes; ratios and margins can
    /// legitimately go below zero.
    pub const fn allows_negative(self) -> bool {
        !matches!(self, Self::MarketCap | Self::DebtToEquity)
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a value sits relative to a curve's full band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    NotMeaningful,
    BelowFloor,
    RisingEdge,
    FullBand,
    FallingEdge,
    AboveCeiling,
}

/// Piecewise-linear scoring curve for one factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorCurve {
    pub max_points: f64,
    pub lower_zero: Option<f64>,
    pub lower_full: Option<f64>,
    pub upper_full: Option<f64>,
    pub upper_zero: Option<f64>,
    pub require_positive: bool,
}

impl FactorCurve {
    /// Full credit at or below `full_until`, none at or above `zero_at`.
    pub const fn falling(full_until: f64, zero_at: f64) -> Self {
        Self {
            max_points: MAX_FACTOR_POINTS,
            lower_zero: None,
            lower_full: None,
            upper_full: Some(full_until),
            upper_zero: Some(zero_at),
            require_positive: false,
        }
    }

    /// Full credit at or above `full_from`, none at or below `zero_at`.
    pub const fn rising(zero_at: f64, full_from: f64) -> Self {
        Self {
            max_points: MAX_FACTOR_POINTS,
            lower_zero: Some(zero_at),
            lower_full: Some(full_from),
            upper_full: None,
            upper_zero: None,
            require_positive: false,
        }
    }

    pub const fn positive_only(mut self) -> Self {
        self.require_positive = true;
        self
    }

    pub const fn with_max_points(mut self, max_points: f64) -> Self {
        self.max_points = max_points;
        self
    }

    pub fn position(&self, value: f64) -> BandPosition {
        if !value.is_finite() || (self.require_positive && value <= 0.0) {
            return BandPosition::NotMeaningful;
        }

        if let Some(full) = self.upper_full {
            if value > full {
                return match self.upper_zero {
                    Some(zero) if value < zero => BandPosition::FallingEdge,
                    _ => BandPosition::AboveCeiling,
                };
            }
        }

        if let Some(full) = self.lower_full {
            if value < full {
                return match self.lower_zero {
                    Some(zero) if value > zero => BandPosition::RisingEdge,
                    _ => BandPosition::BelowFloor,
                };
            }
        }

        BandPosition::FullBand
    }

    /// Points awarded for a present value, always within `0..=max_points`.
    pub fn points(&self, value: f64) -> f64 {
        let membership = match self.position(value) {
            BandPosition::NotMeaningful | BandPosition::BelowFloor | BandPosition::AboveCeiling => {
                0.0
            }
            BandPosition::FullBand => 1.0,
            BandPosition::FallingEdge => match (self.upper_full, self.upper_zero) {
                (Some(full), Some(zero)) => (zero - value) / (zero - full),
                _ => 0.0,
            },
            BandPosition::RisingEdge => match (self.lower_zero, self.lower_full) {
                (Some(zero), Some(full)) => (value - zero) / (full - zero),
                _ => 0.0,
            },
        };

        (self.max_points * membership).clamp(0.0, self.max_points)
    }

    pub fn validate(&self, factor: Factor) -> Result<(), ValidationError> {
        let values = [
            Some(self.max_points),
            self.lower_zero,
            self.lower_full,
            self.upper_full,
            self.upper_zero,
        ];
        if values.iter().flatten().any(|value| !value.is_finite()) {
            return Err(ValidationError::FactorCurveNotFinite { factor });
        }

        if !(0.0..=MAX_FACTOR_POINTS).contains(&self.max_points) {
            return Err(ValidationError::FactorWeightOutOfRange { factor });
        }

        let order = |detail| ValidationError::FactorCurveOrder { factor, detail };

        match (self.lower_zero, self.lower_full) {
            (Some(_), None) => return Err(order("lower_zero requires lower_full")),
            (Some(zero), Some(full)) if zero >= full => {
                return Err(order("lower_zero must be below lower_full"))
            }
            _ => {}
        }

        match (self.upper_full, self.upper_zero) {
            (None, Some(_)) => return Err(order("upper_zero requires upper_full")),
            (Some(full), Some(zero)) if full >= zero => {
                return Err(order("upper_full must be below upper_zero"))
            }
            _ => {}
        }

        if let (Some(lower), Some(upper)) = (self.lower_full, self.upper_full) {
            if lower > upper {
                return Err(order("lower_full must not exceed upper_full"));
            }
        }

        Ok(())
    }

    fn merge(mut self, patch: CurveOverride) -> Self {
        if let Some(max_points) = patch.max_points {
            self.max_points = max_points;
        }
        self.lower_zero = patch.lower_zero.or(self.lower_zero);
        self.lower_full = patch.lower_full.or(self.lower_full);
        self.upper_full = patch.upper_full.or(self.upper_full);
        self.upper_zero = patch.upper_zero.or(self.upper_zero);
        if let Some(require_positive) = patch.require_positive {
            self.require_positive = require_positive;
        }
        self
    }
}

/// Full rubric: one curve per factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RubricConfig {
    pub market_cap: FactorCurve,
    pub pe_ratio: FactorCurve,
    pub pb_ratio: FactorCurve,
    pub debt_to_equity: FactorCurve,
    pub profit_margin: FactorCurve,
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self {
            market_cap: FactorCurve::falling(2.0e9, 3.0e9),
            pe_ratio: FactorCurve {
                max_points: MAX_FACTOR_POINTS,
                lower_zero: Some(0.0),
                lower_full: Some(5.0),
                upper_full: Some(15.0),
                upper_zero: Some(25.0),
                require_positive: true,
            },
            pb_ratio: FactorCurve::falling(1.0, 3.0).positive_only(),
            debt_to_equity: FactorCurve::falling(50.0, 150.0),
            profit_margin: FactorCurve::rising(0.0, 0.20),
        }
    }
}

impl RubricConfig {
    pub const fn curve(&self, factor: Factor) -> &FactorCurve {
        match factor {
            Factor::MarketCap => &self.market_cap,
            Factor::PeRatio => &self.pe_ratio,
            Factor::PbRatio => &self.pb_ratio,
            Factor::DebtToEquity => &self.debt_to_equity,
            Factor::ProfitMargin => &self.profit_margin,
        }
    }

    /// Highest composite score this rubric can award.
    pub fn max_total(&self) -> f64 {
        Factor::ALL
            .iter()
            .map(|factor| self.curve(*factor).max_points)
            .sum()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        Factor::ALL
            .iter()
            .try_for_each(|factor| self.curve(*factor).validate(*factor))
    }

    /// Apply per-factor overrides and validate the result.
    pub fn with_overrides(self, overrides: RubricOverrides) -> Result<Self, ValidationError> {
        let merged = Self {
            market_cap: apply(self.market_cap, overrides.market_cap),
            pe_ratio: apply(self.pe_ratio, overrides.pe_ratio),
            pb_ratio: apply(self.pb_ratio, overrides.pb_ratio),
            debt_to_equity: apply(self.debt_to_equity, overrides.debt_to_equity),
            profit_margin: apply(self.profit_margin, overrides.profit_margin),
        };
        merged.validate()?;
        Ok(merged)
    }
}

fn apply(curve: FactorCurve, patch: Option<CurveOverride>) -> FactorCurve {
    match patch {
        Some(patch) => curve.merge(patch),
        None => curve,
    }
}

/// Partial rubric as written in a config file; unset keys keep defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RubricOverrides {
    pub market_cap: Option<CurveOverride>,
    pub pe_ratio: Option<CurveOverride>,
    pub pb_ratio: Option<CurveOverride>,
    pub debt_to_equity: Option<CurveOverride>,
    pub profit_margin: Option<CurveOverride>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurveOverride {
    pub max_points: Option<f64>,
    pub lower_zero: Option<f64>,
    pub lower_full: Option<f64>,
    pub upper_full: Option<f64>,
    pub upper_zero: Option<f64>,
    pub require_positive: Option<bool>,
}
