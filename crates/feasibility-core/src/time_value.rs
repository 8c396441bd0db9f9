use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FeasibilityError;
use crate::numeric::{self, Precision};
use crate::types::{with_metadata, CashFlowSeries, ComputationOutput, Money, Rate};
use crate::FeasibilityResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const BRACKET_TOLERANCE: Decimal = dec!(0.0000000001);
const MAX_IRR_ITERATIONS: u32 = 200;

/// Candidate rates scanned, in order, for the first NPV sign change.
const IRR_LADDER: [Decimal; 18] = [
    dec!(-0.99),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(-0.1),
    dec!(0),
    dec!(0.05),
    dec!(0.1),
    dec!(0.2),
    dec!(0.35),
    dec!(0.5),
    dec!(0.75),
    dec!(1),
    dec!(2),
    dec!(5),
    dec!(10),
    dec!(100),
];

/// Net Present Value of a series of cash flows, quantized to currency.
///
/// Period 0 is undiscounted. An empty series is worth zero.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> FeasibilityResult<Money> {
    if rate <= dec!(-1) {
        return Err(FeasibilityError::invalid(
            "discount_rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let value = raw_npv(rate, cash_flows).ok_or_else(|| {
        FeasibilityError::invalid(
            "cash_flows",
            format!("NPV at rate {rate} overflows decimal range"),
        )
    })?;
    Ok(numeric::money(value))
}

/// Unrounded NPV using checked arithmetic. `None` on overflow or a
/// discount factor that underflows to zero.
fn raw_npv(rate: Rate, cash_flows: &[Money]) -> Option<Decimal> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        result = result.checked_add(cf.checked_div(discount)?)?;
    }

    Some(result)
}

fn has_sign_change(cash_flows: &[Money]) -> bool {
    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    has_positive && has_negative
}

/// Internal Rate of Return by bracketed bisection, quantized to 4 places.
///
/// The series must contain at least one sign change. The bracket is the
/// first adjacent pair on a fixed rate ladder whose NPVs differ in sign,
/// so identical input always lands on the same root.
pub fn irr(cash_flows: &[Money]) -> FeasibilityResult<Rate> {
    if !has_sign_change(cash_flows) {
        return Err(FeasibilityError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            reason: "cash flows contain no sign change, no root exists".into(),
        });
    }

    let mut previous: Option<(Decimal, Decimal)> = None;
    let mut bracket = None;

    for candidate in IRR_LADDER {
        let Some(value) = raw_npv(candidate, cash_flows) else {
            continue;
        };
        if value.is_zero() {
            return Ok(numeric::quantize(candidate, Precision::Ratio));
        }
        if let Some((prev_rate, prev_value)) = previous {
            if prev_value.is_sign_negative() != value.is_sign_negative() {
                bracket = Some((prev_rate, prev_value, candidate));
                break;
            }
        }
        previous = Some((candidate, value));
    }

    let Some((mut low, mut low_value, mut high)) = bracket else {
        return Err(FeasibilityError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            reason: "NPV does not change sign between -99% and 10000%".into(),
        });
    };
    debug!(low = %low, high = %high, "irr bracket located");

    for iteration in 0..MAX_IRR_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let mid_value = raw_npv(mid, cash_flows).ok_or_else(|| {
            FeasibilityError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: iteration,
                reason: format!("NPV overflow at rate {mid}"),
            }
        })?;

        if mid_value.abs() < CONVERGENCE_THRESHOLD || high - low < BRACKET_TOLERANCE {
            debug!(iterations = iteration, rate = %mid, "irr converged");
            return Ok(numeric::quantize(mid, Precision::Ratio));
        }

        if mid_value.is_sign_negative() == low_value.is_sign_negative() {
            low = mid;
            low_value = mid_value;
        } else {
            high = mid;
        }
    }

    Err(FeasibilityError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        reason: format!("bracket [{low}, {high}] still wider than tolerance"),
    })
}

/// Simple payback period in periods, interpolated within the recovery
/// period and quantized to one place. `None` if the investment never
/// pays back.
pub fn payback_period(cash_flows: &[Money]) -> Option<Decimal> {
    let mut cumulative = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        let before = cumulative;
        cumulative += cf;
        if cumulative >= Decimal::ZERO && (t == 0 || before < Decimal::ZERO) {
            if t == 0 || cf.is_zero() {
                return Some(numeric::quantize(Decimal::from(t as u64), Precision::Duration));
            }
            let fraction = -before / cf;
            let periods = Decimal::from((t - 1) as u64) + fraction;
            return Some(numeric::quantize(periods, Precision::Duration));
        }
    }

    None
}

/// NPV, IRR and payback for one cash-flow series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowMetrics {
    pub npv: Money,
    /// Omitted when the flows have no sign change or never bracket a root
    pub irr: Option<Rate>,
    pub payback_period: Option<Decimal>,
    pub periods: usize,
}

/// Evaluate a cash-flow series. A missing IRR is reported as a warning
/// rather than an error.
pub fn analyze_cash_flows(
    series: &CashFlowSeries,
) -> FeasibilityResult<ComputationOutput<CashFlowMetrics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let npv = npv(series.discount_rate, &series.flows)?;
    let irr = match irr(&series.flows) {
        Ok(rate) => Some(rate),
        Err(FeasibilityError::ConvergenceFailure { reason, .. }) => {
            warnings.push(format!("IRR omitted: {reason}"));
            None
        }
        Err(e) => return Err(e),
    };
    let payback_period = payback_period(&series.flows);
    if payback_period.is_none() && !series.flows.is_empty() {
        warnings.push("Cash flows never pay back the initial outlay".into());
    }

    let output = CashFlowMetrics {
        npv,
        irr,
        payback_period,
        periods: series.flows.len(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted Cash Flow (NPV, IRR, Payback)",
        &serde_json::json!({
            "discount_rate": series.discount_rate.to_string(),
            "irr_method": "ladder bracket + bisection",
            "max_iterations": MAX_IRR_ITERATIONS,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 272.727 + 330.579 + 375.657 = -21.04
        assert_eq!(result, dec!(-21.04));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        let result = npv(dec!(0.0), &cfs).unwrap();
        assert_eq!(result, dec!(50));
        assert_eq!(result.to_string(), "50.00");
    }

    #[test]
    fn test_npv_empty_series() {
        assert_eq!(npv(dec!(0.08), &[]).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(dec!(-1), &[dec!(100)]).is_err());
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs).unwrap();
        // IRR is 9.701%
        assert_eq!(result, dec!(0.0970));
    }

    #[test]
    fn test_irr_single_period() {
        let result = irr(&[dec!(-100), dec!(110)]).unwrap();
        assert_eq!(result, dec!(0.1000));
    }

    #[test]
    fn test_irr_negative_return() {
        let result = irr(&[dec!(-100), dec!(50)]).unwrap();
        assert_eq!(result, dec!(-0.5000));
    }

    #[test]
    fn test_irr_no_sign_change() {
        let err = irr(&[dec!(100), dec!(50), dec!(25)]).unwrap_err();
        assert!(matches!(err, FeasibilityError::ConvergenceFailure { .. }));
        assert!(irr(&[]).is_err());
    }

    #[test]
    fn test_irr_is_deterministic() {
        let cfs = vec![dec!(-2500), dec!(300), dec!(700), dec!(900), dec!(1400)];
        assert_eq!(irr(&cfs).unwrap(), irr(&cfs).unwrap());
    }

    #[test]
    fn test_payback_interpolates() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        // 200 still outstanding after period 2, recovered halfway through period 3
        assert_eq!(payback_period(&cfs), Some(dec!(2.5)));
    }

    #[test]
    fn test_payback_never_recovered() {
        assert_eq!(payback_period(&[dec!(-1000), dec!(100)]), None);
    }

    #[test]
    fn test_analyze_cash_flows_downgrades_irr_failure() {
        let series = CashFlowSeries {
            discount_rate: dec!(0.05),
            flows: vec![dec!(100), dec!(50), dec!(25)],
        };
        let out = analyze_cash_flows(&series).unwrap();
        assert_eq!(out.result.irr, None);
        assert_eq!(out.result.npv, dec!(170.29));
        assert!(out.warnings.iter().any(|w| w.starts_with("IRR omitted")));
    }

    #[test]
    fn test_analyze_cash_flows_reports_all_metrics() {
        let series = CashFlowSeries {
            discount_rate: dec!(0),
            flows: vec![dec!(-1000), dec!(400), dec!(400), dec!(400)],
        };
        let out = analyze_cash_flows(&series).unwrap();
        assert_eq!(out.result.npv, dec!(200));
        assert_eq!(out.result.irr, Some(dec!(0.0970)));
        assert_eq!(out.result.payback_period, Some(dec!(2.5)));
        assert!(out.warnings.is_empty());
    }
}
