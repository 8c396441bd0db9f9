use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::types::{with_metadata, ComputationOutput, Currency, Money};
use crate::FeasibilityResult;

/// One period's equity and debt draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownInput {
    pub period: String,
    #[serde(default)]
    pub equity_draw: Money,
    #[serde(default)]
    pub debt_draw: Money,
}

/// One period of the simulated schedule. Outstanding debt equals
/// cumulative debt; repayments are not modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEntry {
    pub period: String,
    pub equity_draw: Money,
    pub debt_draw: Money,
    pub cumulative_equity: Money,
    pub cumulative_debt: Money,
    pub outstanding_debt: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownSchedule {
    pub currency: String,
    pub entries: Vec<DrawdownEntry>,
    pub total_equity: Money,
    pub total_debt: Money,
    pub total_drawn: Money,
    pub peak_debt: Money,
    pub final_debt: Money,
    /// Equity share of total draws
    pub equity_share: Option<Decimal>,
}

/// Accumulate draws, in input order, into running balances.
pub fn build_drawdown_schedule(
    periods: &[DrawdownInput],
    currency: &Currency,
) -> DrawdownSchedule {
    let mut cumulative_equity = Decimal::ZERO;
    let mut cumulative_debt = Decimal::ZERO;
    let mut peak_debt = Decimal::ZERO;
    let mut entries = Vec::with_capacity(periods.len());

    for p in periods {
        cumulative_equity += p.equity_draw;
        cumulative_debt += p.debt_draw;
        peak_debt = peak_debt.max(cumulative_debt);

        entries.push(DrawdownEntry {
            period: p.period.clone(),
            equity_draw: numeric::money(p.equity_draw),
            debt_draw: numeric::money(p.debt_draw),
            cumulative_equity: numeric::money(cumulative_equity),
            cumulative_debt: numeric::money(cumulative_debt),
            outstanding_debt: numeric::money(cumulative_debt),
        });
    }

    let total_drawn = cumulative_equity + cumulative_debt;
    DrawdownSchedule {
        currency: currency.code().to_string(),
        entries,
        total_equity: numeric::money(cumulative_equity),
        total_debt: numeric::money(cumulative_debt),
        total_drawn: numeric::money(total_drawn),
        peak_debt: numeric::money(peak_debt),
        final_debt: numeric::money(cumulative_debt),
        equity_share: numeric::checked_ratio(cumulative_equity, total_drawn).map(numeric::ratio),
    }
}

/// Simulate a drawdown schedule and wrap it in the standard envelope.
pub fn simulate_drawdown(
    periods: &[DrawdownInput],
    currency: &Currency,
) -> FeasibilityResult<ComputationOutput<DrawdownSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    for p in periods {
        if p.equity_draw < Decimal::ZERO || p.debt_draw < Decimal::ZERO {
            warnings.push(format!(
                "Negative draw in period '{}'; outstanding debt may decrease",
                p.period
            ));
        }
    }

    let schedule = build_drawdown_schedule(periods, currency);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Construction Drawdown Schedule (cumulative, no repayment)",
        &serde_json::json!({
            "periods": periods.len(),
            "currency": currency.code(),
        }),
        warnings,
        elapsed,
        schedule,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draw(period: &str, equity: Decimal, debt: Decimal) -> DrawdownInput {
        DrawdownInput {
            period: period.into(),
            equity_draw: equity,
            debt_draw: debt,
        }
    }

    #[test]
    fn test_cumulative_balances() {
        let periods = vec![
            draw("2025-01", dec!(500), dec!(0)),
            draw("2025-02", dec!(250), dec!(400)),
            draw("2025-03", dec!(0), dec!(600)),
        ];
        let schedule = build_drawdown_schedule(&periods, &Currency::USD);

        assert_eq!(schedule.entries[1].cumulative_equity, dec!(750));
        assert_eq!(schedule.entries[2].cumulative_debt, dec!(1000));
        assert_eq!(schedule.total_drawn, dec!(1750));
        assert_eq!(schedule.peak_debt, dec!(1000));
        assert_eq!(schedule.final_debt, dec!(1000));
        assert_eq!(schedule.equity_share, Some(dec!(0.4286)));
    }

    #[test]
    fn test_peak_tracks_negative_draws() {
        let periods = vec![draw("P1", dec!(0), dec!(300)), draw("P2", dec!(0), dec!(-100))];
        let out = simulate_drawdown(&periods, &Currency::EUR).unwrap();
        assert_eq!(out.result.peak_debt, dec!(300));
        assert_eq!(out.result.final_debt, dec!(200));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = build_drawdown_schedule(&[], &Currency::USD);
        assert!(schedule.entries.is_empty());
        assert_eq!(schedule.total_drawn, Decimal::ZERO);
        assert_eq!(schedule.equity_share, None);
    }
}
