use serde_json::Value;

use super::{format_scalar, result_of};

/// Headline figures, most specific first.
const PRIORITY_KEYS: [&str; 10] = [
    "npv",
    "irr",
    "value",
    "total_interest",
    "escalated_cost",
    "loan_to_cost",
    "min_ratio",
    "total_noi",
    "total",
    "total_drawn",
];

/// Print just the headline value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

fn headline(value: &Value) -> String {
    let result = result_of(value);

    if let Value::Object(map) = result {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                return format_scalar(val);
            }
        }
        // Nested summaries (dscr, asset mix) carry the headline one level down
        for nested in ["summary", "portfolio", "job"] {
            if let Some(inner @ Value::Object(_)) = map.get(nested) {
                let line = headline(inner);
                if !line.is_empty() {
                    return line;
                }
            }
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{key}: {}", format_scalar(val));
        }
        return String::new();
    }

    format_scalar(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_npv_wins_over_other_fields() {
        let out = json!({"result": {"periods": 4, "irr": "0.0970", "npv": "200.00"}});
        assert_eq!(headline(&out), "200.00");
    }

    #[test]
    fn test_null_irr_is_skipped() {
        let out = json!({"result": {"irr": null, "total": "1000.00"}});
        assert_eq!(headline(&out), "1000.00");
    }

    #[test]
    fn test_nested_summary_headline() {
        let out = json!({"result": {"entries": [], "summary": {"min_ratio": "1.2000"}}});
        assert_eq!(headline(&out), "1.2000");
    }
}
