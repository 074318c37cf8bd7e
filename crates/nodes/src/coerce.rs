//! Loose value coercion used by condition blocks.
//!
//! Flow configs are authored in a browser, so comparisons follow the
//! JavaScript `Number()` and `String()` conversions. A missing variable is
//! treated like `undefined`.

use serde_json::Value;

/// Convert to a number the way `Number(value)` does. Unconvertible input is NaN.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        // Arrays convert through their joined text: [] is 0, [7] is 7, [1, 2] is NaN.
        Some(Value::Array(_)) => parse_number(&to_text(value)),
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust accepts "inf"/"nan" spellings that JS rejects.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Convert to a string the way `String(value)` does.
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_text(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() => format_float(f),
        _ => n.to_string(),
    }
}

/// JS switches to exponent notation outside `[1e-6, 1e21)`.
fn format_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    let magnitude = f.abs();
    if (1e-6..1e21).contains(&magnitude) {
        // Display is shortest round-trip and drops a zero fraction ("5" for 5.0).
        return f.to_string();
    }
    let formatted = format!("{f:e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => formatted,
    }
}

/// Whether a value counts as empty for `is_empty` / `is_not_empty`.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_follow_js_rules() {
        assert_eq!(to_number(Some(&json!("42"))), 42.0);
        assert_eq!(to_number(Some(&json!(" 3.5 "))), 3.5);
        assert_eq!(to_number(Some(&json!(""))), 0.0);
        assert_eq!(to_number(Some(&json!(null))), 0.0);
        assert_eq!(to_number(Some(&json!(true))), 1.0);
        assert_eq!(to_number(Some(&json!("0x10"))), 16.0);
        assert_eq!(to_number(Some(&json!([7]))), 7.0);
        assert_eq!(to_number(Some(&json!([]))), 0.0);
        assert_eq!(to_number(Some(&json!([null]))), 0.0);
        assert_eq!(to_number(Some(&json!([" 12 "]))), 12.0);
        assert!(to_number(Some(&json!([1, 2]))).is_nan());
        assert!(to_number(None).is_nan());
        assert!(to_number(Some(&json!("abc"))).is_nan());
        assert!(to_number(Some(&json!("inf"))).is_nan());
        assert!(to_number(Some(&json!({}))).is_nan());
    }

    #[test]
    fn strings_follow_js_rules() {
        assert_eq!(to_text(Some(&json!(5))), "5");
        assert_eq!(to_text(Some(&json!(5.0))), "5");
        assert_eq!(to_text(Some(&json!(0.25))), "0.25");
        assert_eq!(to_text(Some(&json!(-0.0))), "0");
        assert_eq!(to_text(Some(&json!(1e20))), "100000000000000000000");
        assert_eq!(to_text(Some(&json!(1e21))), "1e+21");
        assert_eq!(to_text(Some(&json!(-2.5e22))), "-2.5e+22");
        assert_eq!(to_text(Some(&json!(1e-7))), "1e-7");
        assert_eq!(to_text(Some(&json!(1.5e-7))), "1.5e-7");
        assert_eq!(to_text(Some(&json!(0.000001))), "0.000001");
        assert_eq!(to_text(Some(&json!(null))), "null");
        assert_eq!(to_text(None), "undefined");
        assert_eq!(to_text(Some(&json!([1, "a", null]))), "1,a,");
        assert_eq!(to_text(Some(&json!({ "k": 1 }))), "[object Object]");
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!("  "))));
        assert!(is_blank(Some(&json!([]))));
        assert!(!is_blank(Some(&json!(0))));
        assert!(!is_blank(Some(&json!(false))));
        assert!(!is_blank(Some(&json!("x"))));
    }
}
