use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// How the portfolio-level performance percentage is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnMethod {
    /// Geometrically chained daily returns; neutral to cash flow timing.
    #[default]
    #[serde(rename = "TWR")]
    TimeWeighted,
    /// Internal rate of return over external cash flows.
    #[serde(rename = "MWR")]
    MoneyWeighted,
    /// Net performance over the initial value.
    #[serde(rename = "ROI")]
    ReturnOnInvestment,
    /// Net performance over the time-weighted average investment.
    #[serde(rename = "ROAI")]
    ReturnOnAverageInvestment,
}

impl ReturnMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnMethod::TimeWeighted => "TWR",
            ReturnMethod::MoneyWeighted => "MWR",
            ReturnMethod::ReturnOnInvestment => "ROI",
            ReturnMethod::ReturnOnAverageInvestment => "ROAI",
        }
    }
}

impl fmt::Display for ReturnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TWR" => Ok(ReturnMethod::TimeWeighted),
            "MWR" => Ok(ReturnMethod::MoneyWeighted),
            "ROI" => Ok(ReturnMethod::ReturnOnInvestment),
            "ROAI" => Ok(ReturnMethod::ReturnOnAverageInvestment),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown return method: {}",
                other
            ))),
        }
    }
}
