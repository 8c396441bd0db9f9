use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FeasibilityError;
use crate::numeric::{self, Precision};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One published construction-cost index value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostIndexPoint {
    pub series: String,
    pub jurisdiction: String,
    pub provider: String,
    /// `YYYY`, `YYYY-Qn`, `YYYY-Hn`, `YYYY-MM` or `YYYY-MM-DD`
    pub period: String,
    pub value: Decimal,
}

/// Escalation request. Filters left as `None` match any index row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEscalationInput {
    pub amount: Money,
    pub base_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub indices: Vec<CostIndexPoint>,
}

/// Why escalation left the amount unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    MissingBasePoint,
    ZeroBaseValue,
    MissingLatestPoint,
}

/// Result of resolving an escalation request. The base and latest
/// snapshots are carried in both arms so a reviewer can see what the
/// resolver found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EscalationOutcome {
    Escalated {
        value: Money,
        scalar: Decimal,
        base: CostIndexPoint,
        latest: CostIndexPoint,
    },
    Unchanged {
        value: Money,
        reason: FallbackReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        base: Option<CostIndexPoint>,
        #[serde(skip_serializing_if = "Option::is_none")]
        latest: Option<CostIndexPoint>,
    },
}

impl EscalationOutcome {
    pub fn value(&self) -> Money {
        match self {
            EscalationOutcome::Escalated { value, .. }
            | EscalationOutcome::Unchanged { value, .. } => *value,
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, EscalationOutcome::Escalated { .. })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Escalate `amount` from `base_period` to the latest matching index period.
///
/// Falls back to the original amount (quantized) when the base point is
/// missing, its value is zero, or no latest point exists.
pub fn escalate_amount(
    amount: Money,
    base_period: &str,
    indices: &[CostIndexPoint],
    series: Option<&str>,
    jurisdiction: Option<&str>,
    provider: Option<&str>,
) -> FeasibilityResult<Money> {
    let outcome = resolve(amount, base_period, indices, series, jurisdiction, provider)?;
    Ok(outcome.value())
}

/// Resolve an escalation request into a tagged outcome.
pub fn resolve_escalation(input: &CostEscalationInput) -> FeasibilityResult<EscalationOutcome> {
    resolve(
        input.amount,
        &input.base_period,
        &input.indices,
        input.series.as_deref(),
        input.jurisdiction.as_deref(),
        input.provider.as_deref(),
    )
}

/// Resolve an escalation request and wrap it in the standard envelope.
pub fn escalate(
    input: &CostEscalationInput,
) -> FeasibilityResult<ComputationOutput<EscalationOutcome>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let outcome = resolve_escalation(input)?;

    if let EscalationOutcome::Unchanged { reason, .. } = &outcome {
        warnings.push(format!(
            "Cost escalation fell back to the base amount ({})",
            describe_reason(*reason)
        ));
    }

    let matching: Vec<&CostIndexPoint> = input
        .indices
        .iter()
        .filter(|p| {
            matches_filter(
                p,
                input.series.as_deref(),
                input.jurisdiction.as_deref(),
                input.provider.as_deref(),
            )
        })
        .collect();
    let duplicates = duplicate_keys(&matching);
    if !duplicates.is_empty() {
        warnings.push(format!(
            "Duplicate index rows for period(s) {}; the last row wins",
            duplicates.join(", ")
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Construction Cost Escalation (latest / base index scalar)",
        &serde_json::json!({
            "amount": input.amount.to_string(),
            "base_period": input.base_period,
            "series": input.series,
            "jurisdiction": input.jurisdiction,
            "provider": input.provider,
            "index_rows": input.indices.len(),
        }),
        warnings,
        elapsed,
        outcome,
    ))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn resolve(
    amount: Money,
    base_period: &str,
    indices: &[CostIndexPoint],
    series: Option<&str>,
    jurisdiction: Option<&str>,
    provider: Option<&str>,
) -> FeasibilityResult<EscalationOutcome> {
    if amount < Decimal::ZERO {
        return Err(FeasibilityError::invalid(
            "amount",
            "Escalation amount cannot be negative",
        ));
    }

    let matching: Vec<&CostIndexPoint> = indices
        .iter()
        .filter(|p| matches_filter(p, series, jurisdiction, provider))
        .collect();

    let base = matching
        .iter()
        .rev()
        .find(|p| p.period.trim() == base_period.trim())
        .map(|p| (*p).clone());

    let latest = matching
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            period_sort_key(&a.period)
                .cmp(&period_sort_key(&b.period))
                .then(ia.cmp(ib))
        })
        .map(|(_, p)| (*p).clone());

    let fallback = |reason: FallbackReason,
                    base: Option<CostIndexPoint>,
                    latest: Option<CostIndexPoint>| {
        debug!(
            base_period = %base_period,
            reason = ?reason,
            candidates = matching.len(),
            "cost escalation fell back to base amount"
        );
        EscalationOutcome::Unchanged {
            value: numeric::money(amount),
            reason,
            base,
            latest,
        }
    };

    let Some(base) = base else {
        return Ok(fallback(FallbackReason::MissingBasePoint, None, latest));
    };
    if base.value.is_zero() {
        return Ok(fallback(FallbackReason::ZeroBaseValue, Some(base), latest));
    }
    let Some(latest) = latest else {
        return Ok(fallback(FallbackReason::MissingLatestPoint, Some(base), None));
    };

    let scalar = latest.value.checked_div(base.value).ok_or_else(|| {
        FeasibilityError::invalid(
            "indices",
            format!(
                "index ratio {} / {} exceeds decimal range",
                latest.value, base.value
            ),
        )
    })?;
    let value = amount.checked_mul(scalar).map(numeric::money).ok_or_else(|| {
        FeasibilityError::invalid(
            "amount",
            format!("escalating {amount} by {scalar} exceeds decimal range"),
        )
    })?;

    Ok(EscalationOutcome::Escalated {
        value,
        scalar: numeric::quantize(scalar, Precision::Ratio),
        base,
        latest,
    })
}

fn matches_filter(
    point: &CostIndexPoint,
    series: Option<&str>,
    jurisdiction: Option<&str>,
    provider: Option<&str>,
) -> bool {
    let eq = |filter: Option<&str>, actual: &str| {
        filter.is_none_or(|f| f.trim().eq_ignore_ascii_case(actual.trim()))
    };
    eq(series, &point.series)
        && eq(jurisdiction, &point.jurisdiction)
        && eq(provider, &point.provider)
}

fn duplicate_keys(points: &[&CostIndexPoint]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for p in points {
        let key = (
            p.series.as_str(),
            p.jurisdiction.as_str(),
            p.provider.as_str(),
            p.period.trim(),
        );
        if !seen.insert(key) && !duplicates.contains(&p.period) {
            duplicates.push(p.period.clone());
        }
    }
    duplicates
}

fn describe_reason(reason: FallbackReason) -> &'static str {
    match reason {
        FallbackReason::MissingBasePoint => "no index point at the base period",
        FallbackReason::ZeroBaseValue => "base index value is zero",
        FallbackReason::MissingLatestPoint => "no latest index point",
    }
}

// ---------------------------------------------------------------------------
// Period ordering
// ---------------------------------------------------------------------------

/// Unparseable labels sort before every parseable one, then by raw text.
fn period_sort_key(label: &str) -> (Option<NaiveDate>, String) {
    (period_start(label), label.trim().to_string())
}

/// First calendar day of a period label.
pub fn period_start(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    let (year_part, rest) = match label.split_once('-') {
        Some((y, r)) => (y, Some(r)),
        None => (label, None),
    };
    if year_part.len() != 4 {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;

    let Some(rest) = rest else {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    };

    let upper = rest.to_ascii_uppercase();
    if let Some(q) = upper.strip_prefix('Q') {
        let quarter: u32 = q.parse().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        return NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1);
    }
    if let Some(h) = upper.strip_prefix('H') {
        let half: u32 = h.parse().ok()?;
        if !(1..=2).contains(&half) {
            return None;
        }
        return NaiveDate::from_ymd_opt(year, (half - 1) * 6 + 1, 1);
    }

    match rest.split_once('-') {
        Some((m, d)) => NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?),
        None => NaiveDate::from_ymd_opt(year, rest.parse().ok()?, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn point(period: &str, value: Decimal) -> CostIndexPoint {
        CostIndexPoint {
            series: "BCI".into(),
            jurisdiction: "NSW".into(),
            provider: "ABS".into(),
            period: period.into(),
            value,
        }
    }

    #[test]
    fn test_period_start_formats() {
        assert_eq!(period_start("2023"), NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(period_start("2023-Q4"), NaiveDate::from_ymd_opt(2023, 10, 1));
        assert_eq!(period_start("2024-h2"), NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(period_start("2024-03"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(period_start("2024-03-15"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(period_start("2024-Q5"), None);
        assert_eq!(period_start("March 2024"), None);
    }

    #[test]
    fn test_latest_is_chronological_not_lexical() {
        // "2024-Q1" sorts after "2023-12" chronologically
        let indices = vec![
            point("2023-12", dec!(100)),
            point("2024-Q1", dec!(110)),
            point("2023-Q2", dec!(95)),
        ];
        let outcome = resolve(dec!(1000), "2023-12", &indices, None, None, None).unwrap();
        assert!(outcome.is_escalated());
        assert_eq!(outcome.value(), dec!(1100.00));
    }

    #[test]
    fn test_zero_base_falls_back() {
        let indices = vec![point("2023-Q4", Decimal::ZERO), point("2024-Q2", dec!(120))];
        let outcome = resolve(dec!(250), "2023-Q4", &indices, None, None, None).unwrap();
        match outcome {
            EscalationOutcome::Unchanged { value, reason, .. } => {
                assert_eq!(value, dec!(250.00));
                assert_eq!(reason, FallbackReason::ZeroBaseValue);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let indices = vec![point("2023-Q4", dec!(100)), point("2024-Q4", dec!(104.5))];
        let amount =
            escalate_amount(dec!(200), "2023-Q4", &indices, Some("bci"), Some("nsw"), None)
                .unwrap();
        assert_eq!(amount, dec!(209.00));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = resolve(dec!(-1), "2023", &[], None, None, None).unwrap_err();
        assert!(matches!(err, FeasibilityError::InvalidInput { .. }));
    }

    #[test]
    fn test_escalation_overflow_is_rejected() {
        let indices = vec![point("2023", dec!(0.0001)), point("2024", dec!(10000000000))];
        let err = escalate_amount(dec!(1000000000000000), "2023", &indices, None, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            FeasibilityError::InvalidInput { ref field, .. } if field == "amount"
        ));
    }
}
