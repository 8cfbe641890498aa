//! Shared parsing and formatting helpers used across multiple crates.

use serde_json::Value;

// ── Numeric Parsing ─────────────────────────────────────────────────

/// Parse a numeric string that may carry a percent sign, thousands
/// separators or surrounding whitespace, e.g. `"15.8%"` -> `15.8`,
/// `"1,234.5"` -> `1234.5`. Placeholder tokens (`""`, `"--"`) and
/// anything unparseable yield `None`.
pub fn parse_percent(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '%' && *c != ',')
        .collect();
    if cleaned.is_empty() || cleaned == "--" {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Convert a JSON value to `f64` if possible.
///
/// Providers use `false`, `null` and `"--"` interchangeably as "no data"
/// markers, so booleans and nulls map to `None` rather than an error.
pub fn safe_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_percent(s),
        _ => None,
    }
}

// ── Display Formatting ──────────────────────────────────────────────

/// Format a share count for prompt display: `1.2e8` -> `"1.20 亿股"`.
pub fn format_volume(volume: Option<f64>) -> String {
    match volume {
        None => "N/A".to_string(),
        Some(v) if v >= 1e8 => format!("{:.2} 亿股", v / 1e8),
        Some(v) if v >= 1e4 => format!("{:.2} 万股", v / 1e4),
        Some(v) => format!("{:.0} 股", v),
    }
}

/// Format a currency amount for prompt display: `1.82e10` -> `"182.00 亿元"`.
pub fn format_amount(amount: Option<f64>) -> String {
    match amount {
        None => "N/A".to_string(),
        Some(v) if v >= 1e8 => format!("{:.2} 亿元", v / 1e8),
        Some(v) if v >= 1e4 => format!("{:.2} 万元", v / 1e4),
        Some(v) => format!("{:.0} 元", v),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("15.8%"), Some(15.8));
        assert_eq!(parse_percent(" 15.8 % "), Some(15.8));
        assert_eq!(parse_percent("1,234.5"), Some(1234.5));
        assert_eq!(parse_percent("-3.2"), Some(-3.2));
    }

    #[test]
    fn test_parse_percent_placeholders() {
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("--"), None);
        assert_eq!(parse_percent("N/A"), None);
        assert_eq!(parse_percent("abc%"), None);
    }

    #[test]
    fn test_safe_float() {
        assert_eq!(safe_float(&json!(12.5)), Some(12.5));
        assert_eq!(safe_float(&json!("12.5%")), Some(12.5));
        assert_eq!(safe_float(&json!("1,000")), Some(1000.0));
    }

    #[test]
    fn test_safe_float_null_markers() {
        // Providers use `false` and `null` as null markers
        assert_eq!(safe_float(&json!(false)), None);
        assert_eq!(safe_float(&json!(null)), None);
        assert_eq!(safe_float(&json!("--")), None);
        assert_eq!(safe_float(&json!([1.0])), None);
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(Some(2.5e8)), "2.50 亿股");
        assert_eq!(format_volume(Some(3.0e4)), "3.00 万股");
        assert_eq!(format_volume(Some(512.0)), "512 股");
        assert_eq!(format_volume(None), "N/A");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Some(1.82e10)), "182.00 亿元");
        assert_eq!(format_amount(Some(5.5e4)), "5.50 万元");
        assert_eq!(format_amount(Some(999.0)), "999 元");
        assert_eq!(format_amount(None), "N/A");
    }
}
