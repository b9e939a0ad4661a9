use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Point-in-time fundamentals for one equity.
///
/// Every metric is optional: `None` means the provider returned nothing for
/// it, which is a different state from a reported zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundamentalsSnapshot {
    pub symbol: Symbol,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub profit_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl FundamentalsSnapshot {
    pub fn new(
        symbol: Symbol,
        market_cap: Option<f64>,
        pe_ratio: Option<f64>,
        pb_ratio: Option<f64>,
        debt_to_equity: Option<f64>,
        profit_margin: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("market_cap", market_cap)?;
        validate_optional_finite("pe_ratio", pe_ratio)?;
        validate_optional_finite("pb_ratio", pb_ratio)?;
        validate_optional_non_negative("debt_to_equity", debt_to_equity)?;
        validate_optional_finite("profit_margin", profit_margin)?;

        Ok(Self {
            symbol,
            market_cap,
            pe_ratio,
            pb_ratio,
            debt_to_equity,
            profit_margin,
            company_name: None,
        })
    }

    /// Snapshot with every metric absent.
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            market_cap: None,
            pe_ratio: None,
            pb_ratio: None,
            debt_to_equity: None,
            profit_margin: None,
            company_name: None,
        }
    }

    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.company_name = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self
    }

    /// Number of metrics the provider actually reported.
    pub fn populated_fields(&self) -> usize {
        [
            self.market_cap,
            self.pe_ratio,
            self.pb_ratio,
            self.debt_to_equity,
            self.profit_margin,
        ]
        .iter()
        .filter(|value| value.is_some())
        .count()
    }
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
        if value < 0.0 {
            return Err(ValidationError::NegativeValue { field });
        }
    }
    Ok(())
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.is_finite() => Err(ValidationError::NonFiniteValue { field }),
        _ => Ok(()),
    }
}
