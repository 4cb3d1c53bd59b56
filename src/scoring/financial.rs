//! Financial resilience factor.
//!
//! Sign convention used throughout the crate: the health factor rises with
//! resilience, and the impact formula combines it as
//! `(1 - health_factor) * w_fin`, so a stronger balance sheet always lowers
//! net risk.

use serde::{Deserialize, Serialize};

/// Raw indicators as supplied by the (external) financial data layer.
/// Any indicator may be missing; missing data reads as neutral, not risky.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    /// Market capitalization in USD.
    pub market_cap: Option<f64>,
    /// Trailing free cash flow in USD.
    pub free_cash_flow: Option<f64>,
    /// Total-debt to equity ratio.
    pub debt_to_equity: Option<f64>,
}

impl FinancialMetrics {
    /// Map the available indicators monotonically into [0,1].
    ///
    /// Each present indicator contributes its own [0,1] sub-score and the
    /// result is their mean; with no indicators at all the factor is 0.5.
    #[must_use]
    pub fn health_factor(&self) -> f32 {
        let mut scores: Vec<f64> = Vec::with_capacity(3);
        if let Some(mc) = self.market_cap {
            // Saturates around the mega-cap range.
            scores.push(saturating(mc, 1.0e11));
        }
        if let Some(fcf) = self.free_cash_flow {
            // Negative cash flow is scored zero, not negative.
            scores.push(if fcf <= 0.0 {
                0.0
            } else {
                saturating(fcf, 1.0e10)
            });
        }
        if let Some(de) = self.debt_to_equity {
            // Monotonically decreasing in leverage.
            scores.push(if de <= 0.0 { 1.0 } else { 1.0 / (1.0 + de) });
        }
        if scores.is_empty() {
            return 0.5;
        }
        (scores.iter().sum::<f64>() / scores.len() as f64) as f32
    }
}

fn saturating(value: f64, scale: f64) -> f64 {
    if value <= 0.0 {
        0.0
    } else {
        1.0 - (-value / scale).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_is_neutral() {
        assert_eq!(FinancialMetrics::default().health_factor(), 0.5);
    }

    #[test]
    fn factor_stays_in_unit_interval() {
        let extremes = [
            FinancialMetrics {
                market_cap: Some(3.0e12),
                free_cash_flow: Some(1.0e11),
                debt_to_equity: Some(0.0),
            },
            FinancialMetrics {
                market_cap: Some(1.0),
                free_cash_flow: Some(-5.0e9),
                debt_to_equity: Some(50.0),
            },
        ];
        for metrics in extremes {
            let factor = metrics.health_factor();
            assert!((0.0..=1.0).contains(&factor), "factor {factor} out of range");
        }
    }

    #[test]
    fn factor_is_monotonic_in_each_indicator() {
        let weak = FinancialMetrics {
            market_cap: Some(1.0e9),
            free_cash_flow: Some(1.0e8),
            debt_to_equity: Some(3.0),
        };
        let strong = FinancialMetrics {
            market_cap: Some(2.0e12),
            free_cash_flow: Some(5.0e10),
            debt_to_equity: Some(0.3),
        };
        assert!(strong.health_factor() > weak.health_factor());
    }

    #[test]
    fn leverage_alone_orders_as_expected() {
        let low = FinancialMetrics {
            debt_to_equity: Some(0.5),
            ..FinancialMetrics::default()
        };
        let high = FinancialMetrics {
            debt_to_equity: Some(4.0),
            ..FinancialMetrics::default()
        };
        assert!(low.health_factor() > high.health_factor());
    }
}
