use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeasibilityError;
use crate::numeric::{self, checked_ratio};
use crate::types::{with_metadata, ComputationOutput, Currency, Money, Rate};
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Source types and categories
// ---------------------------------------------------------------------------

/// Financing source type. Labels are matched case-insensitively with
/// spaces and hyphens treated as underscores; anything unrecognised is
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    Equity,
    PreferredEquity,
    JointVentureEquity,
    SeniorDebt,
    ConstructionLoan,
    BridgeLoan,
    Mezzanine,
    Bond,
    Grant,
    Subsidy,
    TaxCredit,
    Other,
}

/// The three buckets every source type maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingCategory {
    Equity,
    Debt,
    Other,
}

impl SourceType {
    pub fn category(self) -> FundingCategory {
        match self {
            SourceType::Equity | SourceType::PreferredEquity | SourceType::JointVentureEquity => {
                FundingCategory::Equity
            }
            SourceType::SeniorDebt
            | SourceType::ConstructionLoan
            | SourceType::BridgeLoan
            | SourceType::Mezzanine
            | SourceType::Bond => FundingCategory::Debt,
            SourceType::Grant | SourceType::Subsidy | SourceType::TaxCredit | SourceType::Other => {
                FundingCategory::Other
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceType::Equity => "equity",
            SourceType::PreferredEquity => "preferred_equity",
            SourceType::JointVentureEquity => "joint_venture_equity",
            SourceType::SeniorDebt => "senior_debt",
            SourceType::ConstructionLoan => "construction_loan",
            SourceType::BridgeLoan => "bridge_loan",
            SourceType::Mezzanine => "mezzanine",
            SourceType::Bond => "bond",
            SourceType::Grant => "grant",
            SourceType::Subsidy => "subsidy",
            SourceType::TaxCredit => "tax_credit",
            SourceType::Other => "other",
        }
    }
}

impl From<&str> for SourceType {
    fn from(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "equity" | "common_equity" | "sponsor_equity" => SourceType::Equity,
            "preferred_equity" | "pref_equity" => SourceType::PreferredEquity,
            "joint_venture_equity" | "jv_equity" => SourceType::JointVentureEquity,
            "senior_debt" | "senior_loan" | "senior" | "debt" | "loan" => SourceType::SeniorDebt,
            "construction_loan" => SourceType::ConstructionLoan,
            "bridge_loan" => SourceType::BridgeLoan,
            "mezzanine" | "mezzanine_debt" | "mezz" => SourceType::Mezzanine,
            "bond" => SourceType::Bond,
            "grant" => SourceType::Grant,
            "subsidy" => SourceType::Subsidy,
            "tax_credit" => SourceType::TaxCredit,
            _ => SourceType::Other,
        }
    }
}

impl From<String> for SourceType {
    fn from(raw: String) -> Self {
        SourceType::from(raw.as_str())
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        source.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One financing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalStackSlice {
    pub name: String,
    pub source_type: SourceType,
    pub amount: Money,
    /// Annual rate as a decimal (0.045 = 4.5%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tranche_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Raw capital stack request. Slices arrive as JSON and are validated
/// by [`parse_slices`] before allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalStackInput {
    pub slices: Vec<Value>,
    /// Defaults to the stack total when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_development_cost: Option<Money>,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceAllocation {
    pub name: String,
    pub source_type: SourceType,
    pub category: FundingCategory,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tranche_order: Option<u32>,
    /// Share of the stack total; `None` when the total is zero
    pub share: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalStackSummary {
    pub currency: String,
    pub total: Money,
    pub equity_total: Money,
    pub debt_total: Money,
    pub other_total: Money,
    pub slices: Vec<SliceAllocation>,
    pub equity_ratio: Option<Decimal>,
    pub debt_ratio: Option<Decimal>,
    pub other_ratio: Option<Decimal>,
    pub total_development_cost: Money,
    /// (debt + other) / total development cost
    pub loan_to_cost: Option<Decimal>,
    pub weighted_average_debt_rate: Option<Rate>,
    /// Total development cost less stack total
    pub funding_gap: Money,
}

impl CapitalStackSummary {
    /// Slices in tranche order; unordered slices follow in input order.
    pub fn by_tranche(&self) -> Vec<&SliceAllocation> {
        let mut ordered: Vec<&SliceAllocation> = self.slices.iter().collect();
        ordered.sort_by_key(|s| s.tranche_order.unwrap_or(u32::MAX));
        ordered
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate raw JSON slice entries. Any non-object or undecodable entry
/// rejects the whole stack.
pub fn parse_slices(raw: &[Value]) -> FeasibilityResult<Vec<CapitalStackSlice>> {
    raw.iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(FeasibilityError::MalformedEntry {
                    index,
                    reason: format!("expected an object, found {}", json_kind(entry)),
                });
            }
            let slice: CapitalStackSlice = serde_json::from_value(entry.clone())
                .map_err(|e| FeasibilityError::MalformedEntry {
                    index,
                    reason: e.to_string(),
                })?;
            if slice.amount < Decimal::ZERO {
                return Err(FeasibilityError::invalid(
                    format!("slices[{index}].amount"),
                    "Slice amount cannot be negative",
                ));
            }
            Ok(slice)
        })
        .collect()
}

/// Allocate a validated capital stack into shares, categories and ratios.
pub fn allocate_capital_stack(
    slices: &[CapitalStackSlice],
    total_development_cost: Option<Money>,
    currency: &Currency,
) -> FeasibilityResult<CapitalStackSummary> {
    if let Some(tdc) = total_development_cost {
        if tdc < Decimal::ZERO {
            return Err(FeasibilityError::invalid(
                "total_development_cost",
                "Total development cost cannot be negative",
            ));
        }
    }
    if let Some(s) = slices.iter().find(|s| s.amount < Decimal::ZERO) {
        return Err(FeasibilityError::invalid(
            format!("slice:{}", s.name),
            "Slice amount cannot be negative",
        ));
    }

    let total: Money = slices.iter().map(|s| s.amount).sum();
    let category_total = |category: FundingCategory| -> Money {
        slices
            .iter()
            .filter(|s| s.source_type.category() == category)
            .map(|s| s.amount)
            .sum()
    };
    let equity_total = category_total(FundingCategory::Equity);
    let debt_total = category_total(FundingCategory::Debt);
    let other_total = category_total(FundingCategory::Other);

    let shares = allocate_shares(slices, total);
    let allocations = slices
        .iter()
        .zip(shares)
        .map(|(s, share)| SliceAllocation {
            name: s.name.clone(),
            source_type: s.source_type,
            category: s.source_type.category(),
            amount: numeric::money(s.amount),
            rate: s.rate,
            tranche_order: s.tranche_order,
            share,
            metadata: s.metadata.clone(),
        })
        .collect();

    let tdc = total_development_cost.unwrap_or(total);

    let (weighted_sum, rated_debt) = slices
        .iter()
        .filter(|s| s.source_type.category() == FundingCategory::Debt)
        .filter_map(|s| s.rate.map(|r| (s.amount * r, s.amount)))
        .fold((Decimal::ZERO, Decimal::ZERO), |(ws, w), (x, a)| (ws + x, w + a));

    Ok(CapitalStackSummary {
        currency: currency.code().to_string(),
        total: numeric::money(total),
        equity_total: numeric::money(equity_total),
        debt_total: numeric::money(debt_total),
        other_total: numeric::money(other_total),
        slices: allocations,
        equity_ratio: checked_ratio(equity_total, total).map(numeric::ratio),
        debt_ratio: checked_ratio(debt_total, total).map(numeric::ratio),
        other_ratio: checked_ratio(other_total, total).map(numeric::ratio),
        total_development_cost: numeric::money(tdc),
        loan_to_cost: checked_ratio(debt_total + other_total, tdc).map(numeric::ratio),
        weighted_average_debt_rate: checked_ratio(weighted_sum, rated_debt).map(numeric::ratio),
        funding_gap: numeric::money(tdc - total),
    })
}

/// Parse, allocate and wrap a capital stack in the standard envelope.
pub fn summarize_capital_stack(
    input: &CapitalStackInput,
) -> FeasibilityResult<ComputationOutput<CapitalStackSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let slices = parse_slices(&input.slices)?;
    let summary = allocate_capital_stack(&slices, input.total_development_cost, &input.currency)?;

    if slices.is_empty() {
        warnings.push("Capital stack is empty; shares and ratios are undefined".into());
    }
    if summary.funding_gap > Decimal::ZERO {
        warnings.push(format!(
            "Capital stack is {} short of total development cost",
            summary.funding_gap
        ));
    }
    for s in &slices {
        if s.source_type.category() == FundingCategory::Debt && s.rate.is_none() {
            warnings.push(format!(
                "Debt slice '{}' has no rate and is excluded from the weighted rate",
                s.name
            ));
        }
    }

    for s in &summary.slices {
        if s.share.is_some_and(|share| share < Decimal::ZERO) {
            warnings.push(format!(
                "Slice '{}' absorbed rounding drift and carries a negative share",
                s.name
            ));
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Capital Stack Allocation",
        &serde_json::json!({
            "slices": slices.len(),
            "total_development_cost": input.total_development_cost.map(|v| v.to_string()),
            "currency": input.currency.code(),
        }),
        warnings,
        elapsed,
        summary,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Shares rounded to 4 places with the last slice absorbing rounding
/// drift, so the shares always sum to exactly 1.0000.
///
/// When earlier slices round up, a zero or tiny last slice can be left with
/// a small negative share; `summarize_capital_stack` warns when that happens.
fn allocate_shares(slices: &[CapitalStackSlice], total: Money) -> Vec<Option<Decimal>> {
    if total.is_zero() {
        return vec![None; slices.len()];
    }

    let mut shares = Vec::with_capacity(slices.len());
    let mut allocated = Decimal::ZERO;
    for (i, s) in slices.iter().enumerate() {
        let share = if i + 1 == slices.len() {
            numeric::ratio(Decimal::ONE - allocated)
        } else {
            numeric::ratio(s.amount / total)
        };
        allocated += share;
        shares.push(Some(share));
    }
    shares
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn slice(name: &str, source: &str, amount: Decimal) -> CapitalStackSlice {
        CapitalStackSlice {
            name: name.into(),
            source_type: SourceType::from(source),
            amount,
            rate: None,
            tranche_order: None,
            metadata: None,
        }
    }

    #[test]
    fn test_source_type_normalisation() {
        assert_eq!(SourceType::from("Senior Loan"), SourceType::SeniorDebt);
        assert_eq!(SourceType::from("mezzanine-debt"), SourceType::Mezzanine);
        assert_eq!(SourceType::from("crowdfunding"), SourceType::Other);
        assert_eq!(SourceType::Mezzanine.category(), FundingCategory::Debt);
        assert_eq!(SourceType::Grant.category(), FundingCategory::Other);
    }

    #[test]
    fn test_shares_absorb_drift() {
        let slices = vec![
            slice("A", "equity", dec!(1)),
            slice("B", "equity", dec!(1)),
            slice("C", "equity", dec!(1)),
        ];
        let summary = allocate_capital_stack(&slices, None, &Currency::USD).unwrap();
        let shares: Vec<Decimal> = summary.slices.iter().map(|s| s.share.unwrap()).collect();
        assert_eq!(shares, vec![dec!(0.3333), dec!(0.3333), dec!(0.3334)]);
        assert_eq!(shares.iter().sum::<Decimal>(), dec!(1.0000));
    }

    #[test]
    fn test_negative_drift_share_is_flagged() {
        let input = CapitalStackInput {
            slices: vec![
                json!({"name": "Sponsor", "source_type": "equity", "amount": "0.66665"}),
                json!({"name": "Bank", "source_type": "senior_debt", "amount": "0.33335", "rate": "0.05"}),
                json!({"name": "Grant", "source_type": "grant", "amount": "0"}),
            ],
            total_development_cost: None,
            currency: Currency::USD,
        };
        let out = summarize_capital_stack(&input).unwrap();
        let shares: Vec<Decimal> = out.result.slices.iter().filter_map(|s| s.share).collect();
        assert_eq!(shares, vec![dec!(0.6667), dec!(0.3334), dec!(-0.0001)]);
        assert_eq!(shares.iter().sum::<Decimal>(), dec!(1.0000));
        assert!(out
            .warnings
            .iter()
            .any(|w| w.starts_with("Slice 'Grant' absorbed rounding drift")));
    }

    #[test]
    fn test_zero_total_yields_null_ratios() {
        let slices = vec![slice("A", "equity", Decimal::ZERO)];
        let summary = allocate_capital_stack(&slices, Some(Decimal::ZERO), &Currency::USD).unwrap();
        assert_eq!(summary.slices[0].share, None);
        assert_eq!(summary.equity_ratio, None);
        assert_eq!(summary.loan_to_cost, None);
        assert_eq!(summary.weighted_average_debt_rate, None);
    }

    #[test]
    fn test_non_object_entry_rejects_stack() {
        let raw = vec![
            json!({"name": "Equity", "source_type": "equity", "amount": "600"}),
            json!("Senior Loan"),
        ];
        let err = parse_slices(&raw).unwrap_err();
        match err {
            FeasibilityError::MalformedEntry { index, .. } => assert_eq!(index, 1),
            other => panic!("expected malformed entry, got {other:?}"),
        }
    }

    #[test]
    fn test_tranche_ordering() {
        let mut a = slice("Mezz", "mezzanine", dec!(50));
        a.tranche_order = Some(2);
        let mut b = slice("Senior", "senior_debt", dec!(350));
        b.tranche_order = Some(1);
        let c = slice("Equity", "equity", dec!(600));
        let summary = allocate_capital_stack(&[a, b, c], None, &Currency::USD).unwrap();
        let names: Vec<&str> = summary.by_tranche().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Senior", "Mezz", "Equity"]);
    }
}
